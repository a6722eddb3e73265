//! Named risk policies controlling signal sensitivity

use super::claim::RiskLevel;

/// Threshold bundle for the risk scorer. Policies differ only in how
/// sensitive the score-to-level mapping is; the signal set never changes.
#[derive(Debug, Clone, Copy)]
pub struct RiskPolicy {
    pub name: &'static str,
    pub medium_threshold: u32,
    pub high_threshold: u32,
    pub new_account_days: i64,
    pub young_account_days: i64,
    pub medium_velocity_claims: usize,
    pub high_velocity_claims: usize,
    pub medium_repo_spread: usize,
    pub high_repo_spread: usize,
    pub medium_similarity: f64,
    pub high_similarity: f64,
}

impl RiskPolicy {
    const fn named(name: &'static str, medium_threshold: u32, high_threshold: u32) -> Self {
        Self {
            name,
            medium_threshold,
            high_threshold,
            new_account_days: 7,
            young_account_days: 30,
            medium_velocity_claims: 2,
            high_velocity_claims: 4,
            medium_repo_spread: 2,
            high_repo_spread: 3,
            medium_similarity: 0.78,
            high_similarity: 0.88,
        }
    }

    /// Look up a policy by name. Unknown names are a configuration error
    /// handled by the caller.
    pub fn by_name(name: &str) -> Option<&'static RiskPolicy> {
        POLICIES.iter().find(|p| p.name == name)
    }

    pub fn level_for(&self, score: u32) -> RiskLevel {
        if score >= self.high_threshold {
            RiskLevel::High
        } else if score >= self.medium_threshold {
            RiskLevel::Medium
        } else {
            RiskLevel::Low
        }
    }
}

pub const POLICIES: &[RiskPolicy] = &[
    RiskPolicy::named("relaxed", 38, 68),
    RiskPolicy::named("balanced", 32, 60),
    RiskPolicy::named("strict", 25, 50),
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_by_name_resolves_known_policies() {
        for name in ["relaxed", "balanced", "strict"] {
            assert!(RiskPolicy::by_name(name).is_some(), "missing policy {name}");
        }
        assert!(RiskPolicy::by_name("paranoid").is_none());
    }

    #[test]
    fn test_level_thresholds_are_inclusive() {
        let policy = RiskPolicy::by_name("balanced").unwrap();
        assert_eq!(policy.level_for(31), RiskLevel::Low);
        assert_eq!(policy.level_for(32), RiskLevel::Medium);
        assert_eq!(policy.level_for(59), RiskLevel::Medium);
        assert_eq!(policy.level_for(60), RiskLevel::High);
        assert_eq!(policy.level_for(100), RiskLevel::High);
    }
}
