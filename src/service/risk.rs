//! Explainable sybil/farming risk scoring across a batch of claims
//!
//! Every signal is recomputed from the full batch on every run; there is no
//! incremental state. Scoring is order-independent and deterministic.

use std::collections::{HashMap, HashSet};
use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;
use similar::TextDiff;

use crate::model::{RiskLevel, RiskPolicy};

pub const ACCOUNT_AGE: &str = "ACCOUNT_AGE";
pub const CLAIM_VELOCITY: &str = "CLAIM_VELOCITY";
pub const REPO_SPREAD: &str = "REPO_SPREAD";
pub const WALLET_REUSE: &str = "WALLET_REUSE";
pub const PROOF_DUPLICATE: &str = "PROOF_DUPLICATE";
pub const TEXT_SIMILARITY: &str = "TEXT_SIMILARITY";

const MAX_SCORE: u32 = 100;
const SIMILARITY_EPSILON: f64 = 1e-9;

static NORM_URL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"https?://[^\s<>()\]]+").expect("invalid URL pattern"));

static NORM_MENTION_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"@[a-z0-9_-]+").expect("invalid mention pattern"));

// Structured "label: value" lines carry no authored prose and would inflate
// similarity between unrelated claims.
static NORM_CLAIM_LINE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?im)^\s*(?:wallet|miner[_\-\s]?id|eta|timezone|github|proof|claimant|applicant)\s*[:：\-].*$",
    )
    .expect("invalid claim line pattern")
});

static NORM_INLINE_CODE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"`[^`]*`").expect("invalid inline code pattern"));

static NORM_NON_ALNUM_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^a-z0-9_\s]").expect("invalid strip pattern"));

static NORM_TOKEN_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[a-z0-9_]{3,}").expect("invalid token pattern"));

// Boilerplate vocabulary present in almost every legitimate claim.
const STOP_TOKENS: &[&str] = &[
    "claim",
    "claiming",
    "bounty",
    "wallet",
    "miner",
    "issue",
    "github",
    "timezone",
    "proof",
    "ready",
    "start",
    "immediately",
    "implementation",
    "plan",
    "approach",
    "eta",
    "rtc",
];

/// Per-claim input to the scorer, assembled from a session plus resolved
/// account data.
#[derive(Debug, Clone, Default)]
pub struct RiskInput {
    pub claim_id: String,
    pub user: String,
    pub issue_ref: String,
    pub body: String,
    pub account_age_days: Option<i64>,
    pub wallet: Option<String>,
    pub proof_links: Vec<String>,
}

/// One weighted, explainable contributor to a claim's score.
#[derive(Debug, Clone, Serialize)]
pub struct RiskSignal {
    pub code: &'static str,
    pub points: u32,
    pub detail: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct RiskResult {
    pub claim_id: String,
    pub user: String,
    pub issue_ref: String,
    pub score: u32,
    pub level: RiskLevel,
    pub reasons: Vec<String>,
    pub details: Vec<RiskSignal>,
}

/// Normalize a claim body for similarity comparison: lower-case, strip
/// URLs, mentions, structured claim lines and inline code, then keep only
/// tokens of three or more characters outside the stop list.
pub fn normalize_text(text: &str) -> String {
    let text = text.to_lowercase();
    let text = NORM_URL_RE.replace_all(&text, " ");
    let text = NORM_MENTION_RE.replace_all(&text, " user ");
    let text = NORM_CLAIM_LINE_RE.replace_all(&text, " ");
    let text = NORM_INLINE_CODE_RE.replace_all(&text, " token ");
    let text = NORM_NON_ALNUM_RE.replace_all(&text, " ");

    let tokens: Vec<&str> = NORM_TOKEN_RE
        .find_iter(&text)
        .map(|m| m.as_str())
        .filter(|tok| !STOP_TOKENS.contains(tok))
        .collect();
    tokens.join(" ")
}

/// Similarity between two normalized texts: the larger of the
/// character-sequence ratio and the token-set Jaccard index. Symmetric.
pub fn text_similarity(a: &str, b: &str) -> f64 {
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }
    let seq_ratio = TextDiff::from_chars(a, b).ratio() as f64;

    let a_tokens: HashSet<&str> = a.split_whitespace().collect();
    let b_tokens: HashSet<&str> = b.split_whitespace().collect();
    let token_ratio = if a_tokens.is_empty() || b_tokens.is_empty() {
        0.0
    } else {
        let intersection = a_tokens.intersection(&b_tokens).count() as f64;
        let union = a_tokens.union(&b_tokens).count() as f64;
        intersection / union
    };

    seq_ratio.max(token_ratio)
}

fn repo_from_issue_ref(issue_ref: &str) -> &str {
    let owner_repo = issue_ref.split('#').next().unwrap_or(issue_ref);
    match owner_repo.split_once('/') {
        Some((_, repo)) if !repo.is_empty() => repo,
        _ => owner_repo,
    }
}

/// Score every claim in the batch under the given policy.
///
/// Cross-claim indices (velocity, spread, wallet and proof reuse,
/// similarity) are built in one pre-pass before any claim is scored.
/// Results are ordered by score descending, then user, then issue ref.
pub fn score_claims(claims: &[RiskInput], policy: &RiskPolicy) -> Vec<RiskResult> {
    let mut user_claim_counts: HashMap<&str, usize> = HashMap::new();
    let mut user_repos: HashMap<&str, HashSet<&str>> = HashMap::new();
    let mut wallet_users: HashMap<&str, HashSet<&str>> = HashMap::new();
    let mut proof_users: HashMap<&str, HashSet<&str>> = HashMap::new();

    for claim in claims {
        *user_claim_counts.entry(&claim.user).or_default() += 1;
        user_repos
            .entry(&claim.user)
            .or_default()
            .insert(repo_from_issue_ref(&claim.issue_ref));
        if let Some(wallet) = &claim.wallet {
            wallet_users.entry(wallet).or_default().insert(&claim.user);
        }
        for link in &claim.proof_links {
            proof_users.entry(link).or_default().insert(&claim.user);
        }
    }

    let normalized: Vec<String> = claims.iter().map(|c| normalize_text(&c.body)).collect();

    let mut results: Vec<RiskResult> = Vec::with_capacity(claims.len());
    for (idx, claim) in claims.iter().enumerate() {
        let mut signals: Vec<RiskSignal> = Vec::new();

        if let Some(age_days) = claim.account_age_days {
            if age_days < policy.new_account_days {
                signals.push(RiskSignal {
                    code: ACCOUNT_AGE,
                    points: 24,
                    detail: format!("account age {age_days}d"),
                });
            } else if age_days < policy.young_account_days {
                signals.push(RiskSignal {
                    code: ACCOUNT_AGE,
                    points: 12,
                    detail: format!("account age {age_days}d"),
                });
            }
        }

        let claim_count = user_claim_counts.get(claim.user.as_str()).copied().unwrap_or(0);
        if claim_count >= policy.high_velocity_claims {
            signals.push(RiskSignal {
                code: CLAIM_VELOCITY,
                points: 18,
                detail: format!("{claim_count} claims in window"),
            });
        } else if claim_count >= policy.medium_velocity_claims {
            signals.push(RiskSignal {
                code: CLAIM_VELOCITY,
                points: 8,
                detail: format!("{claim_count} claims in window"),
            });
        }

        let repo_count = user_repos
            .get(claim.user.as_str())
            .map(|repos| repos.len())
            .unwrap_or(0);
        if repo_count >= policy.high_repo_spread {
            signals.push(RiskSignal {
                code: REPO_SPREAD,
                points: 10,
                detail: format!("claims span {repo_count} repos"),
            });
        } else if repo_count >= policy.medium_repo_spread
            && claim_count >= policy.medium_velocity_claims
        {
            signals.push(RiskSignal {
                code: REPO_SPREAD,
                points: 5,
                detail: format!("claims span {repo_count} repos"),
            });
        }

        if let Some(wallet) = &claim.wallet {
            let overlap = wallet_users
                .get(wallet.as_str())
                .map(|users| users.len())
                .unwrap_or(0);
            if overlap >= 3 {
                signals.push(RiskSignal {
                    code: WALLET_REUSE,
                    points: 24,
                    detail: format!("wallet reused by {overlap} accounts"),
                });
            } else if overlap >= 2 {
                signals.push(RiskSignal {
                    code: WALLET_REUSE,
                    points: 14,
                    detail: format!("wallet reused by {overlap} accounts"),
                });
            }
        }

        let mut duplicate_links = 0usize;
        let mut strongest_overlap = 0usize;
        for link in &claim.proof_links {
            let overlap = proof_users
                .get(link.as_str())
                .map(|users| users.len())
                .unwrap_or(0);
            if overlap >= 2 {
                duplicate_links += 1;
                strongest_overlap = strongest_overlap.max(overlap);
            }
        }
        if duplicate_links > 0 {
            let points = if strongest_overlap >= 3 { 20 } else { 12 };
            signals.push(RiskSignal {
                code: PROOF_DUPLICATE,
                points,
                detail: format!("{duplicate_links} proof link(s) reused across claims"),
            });
        }

        // Highest similarity against claims by other users only; a user's
        // own template reuse across issues is not a cross-claim signal.
        let mut best_similarity = 0.0f64;
        let mut best_users: Vec<&str> = Vec::new();
        if !normalized[idx].is_empty() {
            for (other_idx, other) in claims.iter().enumerate() {
                if other_idx == idx || other.user == claim.user {
                    continue;
                }
                let sim = text_similarity(&normalized[idx], &normalized[other_idx]);
                if sim > best_similarity + SIMILARITY_EPSILON {
                    best_similarity = sim;
                    best_users = vec![&other.user];
                } else if (sim - best_similarity).abs() <= SIMILARITY_EPSILON
                    && sim > 0.0
                    && !best_users.contains(&other.user.as_str())
                {
                    best_users.push(&other.user);
                }
            }
        }
        if best_similarity >= policy.medium_similarity {
            best_users.sort_unstable();
            let peers = best_users
                .iter()
                .take(2)
                .copied()
                .collect::<Vec<_>>()
                .join(", ");
            if best_similarity >= policy.high_similarity {
                signals.push(RiskSignal {
                    code: TEXT_SIMILARITY,
                    points: 20,
                    detail: format!(
                        "template-level similarity {best_similarity:.2} with {peers}"
                    ),
                });
            } else {
                signals.push(RiskSignal {
                    code: TEXT_SIMILARITY,
                    points: 10,
                    detail: format!("similar claim text {best_similarity:.2} with {peers}"),
                });
            }
        }

        let score = signals
            .iter()
            .map(|signal| signal.points)
            .sum::<u32>()
            .min(MAX_SCORE);
        results.push(RiskResult {
            claim_id: claim.claim_id.clone(),
            user: claim.user.clone(),
            issue_ref: claim.issue_ref.clone(),
            score,
            level: policy.level_for(score),
            reasons: signals.iter().map(|s| s.code.to_string()).collect(),
            details: signals,
        });
    }

    results.sort_by(|a, b| {
        b.score
            .cmp(&a.score)
            .then_with(|| a.user.to_lowercase().cmp(&b.user.to_lowercase()))
            .then_with(|| a.issue_ref.to_lowercase().cmp(&b.issue_ref.to_lowercase()))
    });
    results
}
