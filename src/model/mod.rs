pub mod claim;
pub mod config;
pub mod policy;

pub use claim::{
    ClaimAssessment, ClaimSession, LinkedPullRequest, PrRef, PullRequestState, RiskLevel,
    TriageAction,
};
pub use config::{Config, ConfigError, LedgerTarget, TriageTarget, default_targets};
pub use policy::{POLICIES, RiskPolicy};
