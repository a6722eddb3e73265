//! Core records produced by the triage pipeline

use std::collections::BTreeSet;
use std::fmt;
use std::sync::LazyLock;

use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};

/// Matches GitHub pull request web URLs anywhere in a string.
pub(crate) static PULL_URL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)https?://github\.com/(?P<owner>[A-Za-z0-9_.-]+)/(?P<repo>[A-Za-z0-9_.-]+)/pull/(?P<number>\d+)",
    )
    .expect("invalid pull URL pattern")
});

/// Identity of a pull request: `(owner, repo, number)`.
///
/// Ordered so that candidate sets iterate deterministically.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PrRef {
    pub owner: String,
    pub repo: String,
    pub number: u64,
}

impl PrRef {
    /// Parse a pull request web URL. The URL must start with the pull link;
    /// trailing content is ignored.
    pub fn from_pull_url(url: &str) -> Option<Self> {
        let caps = PULL_URL_RE.captures(url)?;
        if caps.get(0)?.start() != 0 {
            return None;
        }
        Some(Self {
            owner: caps["owner"].to_string(),
            repo: caps["repo"].to_string(),
            number: caps["number"].parse().ok()?,
        })
    }
}

impl fmt::Display for PrRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}#{}", self.owner, self.repo, self.number)
    }
}

/// Pull request state as asserted by the data source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PullRequestState {
    Open,
    Closed,
    Merged,
}

impl fmt::Display for PullRequestState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PullRequestState::Open => write!(f, "open"),
            PullRequestState::Closed => write!(f, "closed"),
            PullRequestState::Merged => write!(f, "merged"),
        }
    }
}

/// Canonical metadata for a pull request referenced by a claim.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinkedPullRequest {
    pub owner: String,
    pub repo: String,
    pub number: u64,
    pub url: String,
    pub state: PullRequestState,
    pub draft: Option<bool>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub author: String,
}

impl LinkedPullRequest {
    pub fn repo_ref(&self) -> String {
        format!("{}/{}", self.owner, self.repo)
    }

    pub fn short_ref(&self) -> String {
        format!("{}#{}", self.repo_ref(), self.number)
    }

    pub fn is_draft(&self) -> bool {
        self.draft.unwrap_or(false)
    }
}

/// Reconciled view of all claim-related comments by one user on one issue.
///
/// Opened on the first comment that passes the claim classifier; every later
/// comment from the same user merges into it. `wallet` and `bottube_user`
/// keep the last extracted non-empty value and are never cleared by a
/// comment that extracts nothing.
#[derive(Debug, Clone)]
pub struct ClaimSession {
    pub user: String,
    pub issue_ref: String,
    pub created_at: DateTime<Utc>,
    pub first_claim_url: String,
    pub first_claim_body: String,
    pub latest_update_at: DateTime<Utc>,
    pub latest_update_url: String,
    pub latest_update_body: String,
    pub wallet: Option<String>,
    pub bottube_user: Option<String>,
    pub proof_links: BTreeSet<String>,
    pub pr_refs: BTreeSet<PrRef>,
}

/// Risk bucket derived from the score and the active policy thresholds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RiskLevel::Low => write!(f, "low"),
            RiskLevel::Medium => write!(f, "medium"),
            RiskLevel::High => write!(f, "high"),
        }
    }
}

/// Recommended maintainer action, one per claim.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TriageAction {
    Prioritize,
    RequestDetails,
    ReleaseClaim,
    Watch,
}

impl TriageAction {
    /// Ordering used when sorting assessments within one issue.
    pub fn rank(self) -> u8 {
        match self {
            TriageAction::Prioritize => 0,
            TriageAction::RequestDetails => 1,
            TriageAction::ReleaseClaim => 2,
            TriageAction::Watch => 3,
        }
    }
}

impl fmt::Display for TriageAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TriageAction::Prioritize => write!(f, "prioritize"),
            TriageAction::RequestDetails => write!(f, "request_details"),
            TriageAction::ReleaseClaim => write!(f, "release_claim"),
            TriageAction::Watch => write!(f, "watch"),
        }
    }
}

/// Terminal per-claim record: eligibility, risk, and recommended action.
///
/// Rebuilt from scratch on every run; nothing here persists between runs.
#[derive(Debug, Clone, Serialize)]
pub struct ClaimAssessment {
    pub claim_id: String,
    pub user: String,
    pub issue_ref: String,
    pub comment_url: String,
    pub created_at: DateTime<Utc>,
    pub account_age_days: Option<i64>,
    pub wallet: Option<String>,
    pub bottube_user: Option<String>,
    pub blockers: Vec<String>,
    pub proof_links: Vec<String>,
    pub body: String,
    pub latest_update_at: DateTime<Utc>,
    pub claim_age_hours: Option<f64>,
    pub silence_hours: Option<f64>,
    pub primary_pr: Option<LinkedPullRequest>,
    pub risk_score: u32,
    pub risk_level: RiskLevel,
    pub risk_reasons: Vec<String>,
    pub action: TriageAction,
    pub action_reason: String,
}

impl ClaimAssessment {
    /// `eligible` when no blocker applies, `needs-action` otherwise.
    pub fn status(&self) -> &'static str {
        if self.blockers.is_empty() {
            "eligible"
        } else {
            "needs-action"
        }
    }

    pub fn is_eligible(&self) -> bool {
        self.blockers.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_action_rank_order() {
        assert!(TriageAction::Prioritize.rank() < TriageAction::RequestDetails.rank());
        assert!(TriageAction::RequestDetails.rank() < TriageAction::ReleaseClaim.rank());
        assert!(TriageAction::ReleaseClaim.rank() < TriageAction::Watch.rank());
    }

    #[test]
    fn test_pr_ref_ordering_is_deterministic() {
        let mut refs = BTreeSet::new();
        refs.insert(PrRef {
            owner: "elyan".into(),
            repo: "bounties".into(),
            number: 9,
        });
        refs.insert(PrRef {
            owner: "elyan".into(),
            repo: "bounties".into(),
            number: 2,
        });
        let numbers: Vec<u64> = refs.iter().map(|r| r.number).collect();
        assert_eq!(numbers, vec![2, 9]);
    }

    #[test]
    fn test_pr_ref_from_pull_url() {
        let parsed = PrRef::from_pull_url("https://github.com/Scottcjn/rustchain-bounties/pull/495");
        assert_eq!(
            parsed,
            Some(PrRef {
                owner: "Scottcjn".into(),
                repo: "rustchain-bounties".into(),
                number: 495,
            })
        );
        assert!(PrRef::from_pull_url("https://github.com/Scottcjn/rustchain-bounties/issues/495").is_none());
        assert!(PrRef::from_pull_url("see https://github.com/a/b/pull/1").is_none());
    }
}
