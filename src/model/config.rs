//! Run configuration: environment, per-issue triage targets, ledger

use std::collections::HashSet;
use std::fs;
use std::path::Path;

use serde::Deserialize;

use super::policy::RiskPolicy;

const ENV_GITHUB_TOKEN: &str = "GITHUB_TOKEN";
const ENV_SINCE_HOURS: &str = "SINCE_HOURS";
const ENV_SESSION_LOOKBACK_HOURS: &str = "TRIAGE_SESSION_LOOKBACK_HOURS";
const ENV_RISK_POLICY: &str = "TRIAGE_RISK_POLICY";
const ENV_IGNORE_USERS: &str = "TRIAGE_IGNORE_USERS";
const ENV_TARGETS_JSON: &str = "TRIAGE_TARGETS_JSON";
const ENV_TARGETS_PATH: &str = "TRIAGE_TARGETS_PATH";
const ENV_STAR_OWNER: &str = "TRIAGE_STAR_OWNER";
const ENV_LEDGER_REPO: &str = "LEDGER_REPO";
const ENV_LEDGER_ISSUE: &str = "LEDGER_ISSUE";

const DEFAULT_TARGETS_PATH: &str = "triage-targets.yaml";
const DEFAULT_SINCE_HOURS: i64 = 72;
const MIN_SESSION_LOOKBACK_HOURS: i64 = 168;
const DEFAULT_RISK_POLICY: &str = "balanced";
const DEFAULT_STAR_OWNER: &str = "Scottcjn";

// Maintainers and bots whose informational comments must never open a
// claim session.
const DEFAULT_IGNORED_USERS: &[&str] = &["scottcjn", "github-actions[bot]", "sophiaeagent-beep"];

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("missing required env: {0}")]
    MissingEnv(&'static str),

    #[error("invalid triage targets: {0}")]
    InvalidTargets(String),

    #[error("unknown risk policy: {0}")]
    UnknownPolicy(String),
}

/// Declarative eligibility policy for one bounty issue.
#[derive(Debug, Clone, Deserialize)]
pub struct TriageTarget {
    pub owner: String,
    pub repo: String,
    pub issue: u64,
    #[serde(default)]
    pub min_account_age_days: i64,
    #[serde(default)]
    pub required_stars: Vec<String>,
    #[serde(default = "default_true")]
    pub require_wallet: bool,
    #[serde(default)]
    pub require_bottube_username: bool,
    #[serde(default)]
    pub require_payout_target: bool,
    #[serde(default)]
    pub require_proof_link: bool,
    #[serde(default)]
    pub name: String,
}

fn default_true() -> bool {
    true
}

impl TriageTarget {
    pub fn issue_ref(&self) -> String {
        format!("{}/{}#{}", self.owner, self.repo, self.issue)
    }
}

/// YAML target file structure.
#[derive(Debug, Clone, Default, Deserialize)]
struct TargetsFile {
    #[serde(default)]
    targets: Vec<TriageTarget>,
}

/// Ledger issue whose report block is replaced in place after each run.
#[derive(Debug, Clone)]
pub struct LedgerTarget {
    pub repo: String,
    pub issue: u64,
}

/// Application configuration, resolved once at run start.
#[derive(Debug, Clone)]
pub struct Config {
    pub github_token: String,
    pub since_hours: i64,
    pub session_lookback_hours: i64,
    pub risk_policy: &'static RiskPolicy,
    pub ignored_users: HashSet<String>,
    pub star_owner: String,
    pub targets: Vec<TriageTarget>,
    pub ledger: Option<LedgerTarget>,
}

impl Config {
    /// Load configuration from the environment and optional targets file.
    ///
    /// A missing `GITHUB_TOKEN` or an unknown policy name is fatal; every
    /// other setting falls back to a default.
    pub fn from_env() -> Result<Self, ConfigError> {
        let github_token = std::env::var(ENV_GITHUB_TOKEN)
            .ok()
            .filter(|t| !t.trim().is_empty())
            .ok_or(ConfigError::MissingEnv(ENV_GITHUB_TOKEN))?;

        let since_hours = env_i64(ENV_SINCE_HOURS, DEFAULT_SINCE_HOURS);
        let session_lookback_hours = env_i64(
            ENV_SESSION_LOOKBACK_HOURS,
            since_hours.max(MIN_SESSION_LOOKBACK_HOURS),
        );

        let policy_name =
            std::env::var(ENV_RISK_POLICY).unwrap_or_else(|_| DEFAULT_RISK_POLICY.to_string());
        let risk_policy = RiskPolicy::by_name(&policy_name)
            .ok_or_else(|| ConfigError::UnknownPolicy(policy_name.clone()))?;

        let star_owner =
            std::env::var(ENV_STAR_OWNER).unwrap_or_else(|_| DEFAULT_STAR_OWNER.to_string());

        let targets = Self::load_targets()?;
        let ledger = Self::load_ledger();

        Ok(Self {
            github_token,
            since_hours,
            session_lookback_hours,
            risk_policy,
            ignored_users: ignored_users(),
            star_owner,
            targets,
            ledger,
        })
    }

    /// Targets come from `TRIAGE_TARGETS_JSON`, else the YAML targets file,
    /// else the built-in table.
    fn load_targets() -> Result<Vec<TriageTarget>, ConfigError> {
        if let Ok(json) = std::env::var(ENV_TARGETS_JSON) {
            let json = json.trim().to_string();
            if !json.is_empty() {
                return serde_json::from_str(&json)
                    .map_err(|e| ConfigError::InvalidTargets(e.to_string()));
            }
        }

        let path =
            std::env::var(ENV_TARGETS_PATH).unwrap_or_else(|_| DEFAULT_TARGETS_PATH.to_string());
        if let Some(file) = Self::load_targets_file(&path)? {
            return Ok(file.targets);
        }

        Ok(default_targets())
    }

    fn load_targets_file(path: &str) -> Result<Option<TargetsFile>, ConfigError> {
        let path = Path::new(path);
        if !path.exists() {
            tracing::debug!(path = %path.display(), "Targets file not found, using defaults");
            return Ok(None);
        }

        let contents = fs::read_to_string(path)
            .map_err(|e| ConfigError::InvalidTargets(format!("{}: {e}", path.display())))?;
        if contents.trim().is_empty() {
            tracing::debug!(path = %path.display(), "Targets file is empty, using defaults");
            return Ok(None);
        }

        let file: TargetsFile = serde_yaml::from_str(&contents)
            .map_err(|e| ConfigError::InvalidTargets(format!("{}: {e}", path.display())))?;
        tracing::info!(path = %path.display(), targets = file.targets.len(), "Loaded triage targets from file");
        Ok(Some(file))
    }

    fn load_ledger() -> Option<LedgerTarget> {
        let repo = std::env::var(ENV_LEDGER_REPO).ok()?.trim().to_string();
        let issue = std::env::var(ENV_LEDGER_ISSUE).ok()?.trim().parse().ok()?;
        if repo.is_empty() {
            return None;
        }
        Some(LedgerTarget { repo, issue })
    }
}

fn env_i64(name: &str, default: i64) -> i64 {
    std::env::var(name)
        .ok()
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

fn ignored_users() -> HashSet<String> {
    let mut ignored: HashSet<String> = DEFAULT_IGNORED_USERS
        .iter()
        .map(|u| u.to_string())
        .collect();
    if let Ok(extra) = std::env::var(ENV_IGNORE_USERS) {
        for user in extra.split(',') {
            let user = user.trim().to_lowercase();
            if !user.is_empty() {
                ignored.insert(user);
            }
        }
    }
    ignored
}

/// Built-in bounty issue table, used when no explicit targets are supplied.
pub fn default_targets() -> Vec<TriageTarget> {
    #[allow(clippy::too_many_arguments)]
    fn target(
        repo: &str,
        issue: u64,
        required_stars: &[&str],
        require_wallet: bool,
        require_bottube_username: bool,
        require_payout_target: bool,
        require_proof_link: bool,
        name: &str,
    ) -> TriageTarget {
        TriageTarget {
            owner: DEFAULT_STAR_OWNER.to_string(),
            repo: repo.to_string(),
            issue,
            min_account_age_days: 30,
            required_stars: required_stars.iter().map(|s| s.to_string()).collect(),
            require_wallet,
            require_bottube_username,
            require_payout_target,
            require_proof_link,
            name: name.to_string(),
        }
    }

    vec![
        target(
            "rustchain-bounties",
            87,
            &["Rustchain", "bottube"],
            true,
            false,
            false,
            false,
            "Community Support",
        ),
        // Allows either a RustChain wallet name or a BoTTube username as
        // the payout target.
        target(
            "Rustchain",
            47,
            &["Rustchain"],
            false,
            false,
            true,
            false,
            "Rustchain Star",
        ),
        target(
            "bottube",
            74,
            &["bottube"],
            false,
            true,
            false,
            false,
            "BoTTube Star+Join",
        ),
        target(
            "rustchain-bounties",
            103,
            &[],
            true,
            true,
            false,
            true,
            "X + BoTTube Social",
        ),
        target(
            "rustchain-bounties",
            374,
            &[],
            true,
            false,
            false,
            true,
            "First Attest Bonus",
        ),
        target(
            "rustchain-bounties",
            157,
            &["beacon-skill"],
            true,
            false,
            false,
            true,
            "Beacon Star + Share",
        ),
        target(
            "rustchain-bounties",
            158,
            &[],
            true,
            false,
            false,
            true,
            "Beacon Integration",
        ),
        target(
            "bottube",
            122,
            &["bottube"],
            true,
            false,
            false,
            true,
            "BoTTube Star + Share Why",
        ),
        target(
            "rustchain-bounties",
            377,
            &[],
            true,
            false,
            false,
            true,
            "Beacon Mechanism Falsification",
        ),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_targets_cover_all_bounty_issues() {
        let targets = default_targets();
        assert_eq!(targets.len(), 9);
        assert!(targets.iter().all(|t| t.min_account_age_days == 30));
        let either_of = targets.iter().find(|t| t.issue == 47).unwrap();
        assert!(either_of.require_payout_target);
        assert!(!either_of.require_wallet);
    }

    #[test]
    fn test_targets_parse_from_json_with_defaults() {
        let json = r#"[{"owner": "elyan", "repo": "bounties", "issue": 12}]"#;
        let targets: Vec<TriageTarget> = serde_json::from_str(json).unwrap();
        assert_eq!(targets[0].issue_ref(), "elyan/bounties#12");
        assert!(targets[0].require_wallet);
        assert!(!targets[0].require_proof_link);
        assert!(targets[0].required_stars.is_empty());
    }

    #[test]
    fn test_targets_parse_from_yaml() {
        let yaml = "targets:\n  - owner: elyan\n    repo: bounties\n    issue: 5\n    require_proof_link: true\n    required_stars: [bounties]\n";
        let file: TargetsFile = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(file.targets.len(), 1);
        assert!(file.targets[0].require_proof_link);
        assert_eq!(file.targets[0].required_stars, vec!["bounties"]);
    }
}
