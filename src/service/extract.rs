//! Field extractors: pure functions from one comment body to structured fields

use std::collections::BTreeSet;
use std::sync::LazyLock;

use regex::Regex;
use url::Url;

use crate::model::PrRef;
use crate::model::claim::PULL_URL_RE;

// Strips inline code and emphasis markup that commonly wraps labels like
// **RTC Wallet:** without corrupting underscores or hyphens inside values.
static MARKUP_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[`*]").expect("invalid markup pattern"));

static PR_MENTION_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(?:draft\s+)?(?:pr|pull\s+request)\s*#(?P<number>\d+)\b")
        .expect("invalid PR mention pattern")
});

static URL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"https?://[^\s<>()\]]+").expect("invalid URL pattern"));

static WALLET_VALUE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9_\-]{4,80}$").expect("invalid wallet value pattern"));

// Chinese wallet label with the value on the same line, e.g. "钱包地址： abc_01".
static WALLET_CN_INLINE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"钱包(?:地址)?\s*[:：\-]\s*([A-Za-z0-9_\-]{4,80})\b")
        .expect("invalid CN wallet pattern")
});

static WALLET_CN_LABEL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"钱包(?:地址)?\s*[:：\-]\s*$").expect("invalid CN wallet label pattern")
});

// English label line ending with the separator; the value follows on the
// next line.
static WALLET_LABEL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(?:rtc\s*)?(?:wallet|miner[_\-\s]?id|address)\b.*[:：\-]\s*$")
        .expect("invalid wallet label pattern")
});

// English label and value on the same line, also accepting
// "Payout target miner_id: X" and a parenthesized qualifier.
static WALLET_INLINE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\b(?:payout\s*target\s*)?(?:rtc\s*)?(wallet|miner[_\-\s]?id|address)\s*(?:\((?:miner_?id|id|address)\))?\s*[:：\-]\s*([A-Za-z0-9_\-]{4,80})\b",
    )
    .expect("invalid inline wallet pattern")
});

static WALLET_PLAUSIBLE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[0-9_\-]").expect("invalid plausibility pattern"));

static BASE58_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[1-9A-HJ-NP-Za-km-z]{28,64}$").expect("invalid base58 pattern"));

static BASE62_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9]{30,64}$").expect("invalid base62 pattern"));

static BOTTUBE_PROFILE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"https?://(?:www\.)?bottube\.ai/@([A-Za-z0-9_-]{2,64})")
        .expect("invalid profile pattern")
});

static BOTTUBE_AGENT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"https?://(?:www\.)?bottube\.ai/agent/([A-Za-z0-9_-]{2,64})")
        .expect("invalid agent pattern")
});

static BOTTUBE_LABEL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?im)^\s*bottube(?:\s*(?:username|user|account))?\s*[:：\-]\s*([A-Za-z0-9_-]{2,64})\s*$")
        .expect("invalid label pattern")
});

// Plain words that follow a wallet label but are never payout values.
const WALLET_STOP_WORDS: &[&str] = &["wallet", "address", "miner_id", "please", "thanks", "thankyou"];

// Broad on purpose: a false positive only creates an empty-blocker session,
// a false negative silently drops a claim.
const CLAIM_VOCABULARY: &[&str] = &[
    "claim",
    "starred",
    "wallet",
    "proof",
    "bounty",
    "rtc",
    "payout",
    "submission",
    "submit",
    "pr",
    "pull request",
    "demo",
];

fn is_stop_word(value: &str) -> bool {
    let lowered = value.to_lowercase();
    WALLET_STOP_WORDS.iter().any(|w| *w == lowered)
}

fn plausible_wallet(value: &str) -> bool {
    WALLET_PLAUSIBLE_RE.is_match(value)
        || value.to_uppercase().starts_with("RTC")
        || value.len() >= 6
}

/// Extract a payout wallet from a comment body.
///
/// Recognizes a labeled value on the same line after a `:`/`：`/`-`
/// separator, or on the following line when the label line ends with the
/// separator. The last plausible value in the body wins.
pub fn extract_wallet(body: &str) -> Option<String> {
    let body = MARKUP_RE.replace_all(body, "");

    let mut found: Option<String> = None;
    let mut expect_next = false;
    for line in body.lines() {
        let s = line.trim();
        if s.is_empty() {
            continue;
        }

        // Value on the line after "Wallet:".
        if expect_next {
            expect_next = false;
            if WALLET_VALUE_RE.is_match(s) && !is_stop_word(s) && plausible_wallet(s) {
                found = Some(s.to_string());
                continue;
            }
        }

        if let Some(caps) = WALLET_CN_INLINE_RE.captures(s) {
            let val = caps[1].trim();
            if !is_stop_word(val) {
                found = Some(val.to_string());
                continue;
            }
        }
        if WALLET_CN_LABEL_RE.is_match(s) {
            expect_next = true;
            continue;
        }

        if WALLET_LABEL_RE.is_match(s) {
            expect_next = true;
            continue;
        }

        let Some(caps) = WALLET_INLINE_RE.captures(s) else {
            continue;
        };
        let val = caps[2].trim();
        if is_stop_word(val) {
            continue;
        }
        // Avoid capturing short plain words after "wallet:".
        if !plausible_wallet(val) {
            continue;
        }
        found = Some(val.to_string());
    }

    found
}

/// Extract a BoTTube username, preferring profile URLs over labeled lines.
/// The last match of the first matching pattern wins.
pub fn extract_bottube_user(body: &str) -> Option<String> {
    let body = MARKUP_RE.replace_all(body, "");
    for pattern in [&*BOTTUBE_PROFILE_RE, &*BOTTUBE_AGENT_RE, &*BOTTUBE_LABEL_RE] {
        let Some(caps) = pattern.captures_iter(&body).last() else {
            continue;
        };
        let val = caps[1].trim();
        // A labeled line carrying a URL is not a username.
        if val.eq_ignore_ascii_case("http") || val.eq_ignore_ascii_case("https") {
            continue;
        }
        return Some(val.to_string());
    }
    None
}

/// Extract every URL in the text, canonicalized and de-duplicated.
///
/// Canonical form: scheme and host lower-cased, trailing path slash and
/// fragment stripped, query kept.
pub fn extract_links(text: &str) -> BTreeSet<String> {
    let mut links = BTreeSet::new();
    for found in URL_RE.find_iter(text) {
        let raw = found
            .as_str()
            .trim_end_matches(|c| matches!(c, ')' | '.' | ',' | ';' | '!' | '?'));
        let Ok(mut url) = Url::parse(raw) else {
            continue;
        };
        url.set_fragment(None);
        let trimmed = url.path().trim_end_matches('/').to_string();
        let path = if trimmed.is_empty() { "/" } else { &trimmed };
        url.set_path(path);
        links.insert(url.to_string());
    }
    links
}

/// Collect pull request references: full pull URLs anywhere in the body,
/// plus bare `PR #N` mentions resolved against the issue's own repo.
pub fn extract_pr_refs(body: &str, owner: &str, repo: &str) -> BTreeSet<PrRef> {
    let mut refs = BTreeSet::new();
    for caps in PULL_URL_RE.captures_iter(body) {
        if let Ok(number) = caps["number"].parse() {
            refs.insert(PrRef {
                owner: caps["owner"].to_string(),
                repo: caps["repo"].to_string(),
                number,
            });
        }
    }
    for caps in PR_MENTION_RE.captures_iter(body) {
        if let Ok(number) = caps["number"].parse() {
            refs.insert(PrRef {
                owner: owner.to_string(),
                repo: repo.to_string(),
                number,
            });
        }
    }
    refs
}

/// Coarse keyword classifier for "this comment is a bounty claim".
pub fn looks_like_claim(body: &str) -> bool {
    let text = body.to_lowercase();
    CLAIM_VOCABULARY.iter().any(|token| text.contains(token))
}

/// Very long base58/base62 tokens are usually external chain addresses,
/// not the short wallet names used in these bounties.
pub fn wallet_looks_external(wallet: &str) -> bool {
    BASE58_RE.is_match(wallet) || BASE62_RE.is_match(wallet)
}
