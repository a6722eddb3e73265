//! Action deriver: fixed-priority mapping from assessment state to one
//! recommended maintainer action

use crate::model::{ClaimAssessment, RiskLevel, TriageAction};

const DETAIL_BLOCKERS: &[&str] = &[
    "missing_wallet",
    "missing_bottube_username",
    "missing_proof_link",
    "missing_payout_target",
    "wallet_external_format",
];

fn needs_detail_request(blockers: &[String]) -> bool {
    blockers.iter().any(|blocker| {
        DETAIL_BLOCKERS.contains(&blocker.as_str()) || blocker.starts_with("missing_star:")
    })
}

/// Derive the recommended action for one assessed claim. Strictly ordered;
/// the first matching rule wins.
pub fn derive_action(assessment: &ClaimAssessment) -> (TriageAction, String) {
    if needs_detail_request(&assessment.blockers) {
        return (
            TriageAction::RequestDetails,
            "missing payout details or proof".to_string(),
        );
    }

    if let Some(silence) = assessment.silence_hours {
        if silence >= 72.0 {
            return (
                TriageAction::ReleaseClaim,
                format!("idle for {}h", silence.round() as i64),
            );
        }
    }

    if let Some(age) = assessment.claim_age_hours {
        if age >= 24.0 && assessment.primary_pr.is_none() {
            return (
                TriageAction::ReleaseClaim,
                format!("no linked PR after {}h", age.round() as i64),
            );
        }
    }

    if let Some(pr) = &assessment.primary_pr {
        if assessment.blockers.is_empty() && assessment.risk_level == RiskLevel::Low {
            if pr.is_draft() {
                let delay_hours =
                    (pr.created_at - assessment.created_at).num_seconds() as f64 / 3600.0;
                let delay_hours = delay_hours.max(0.0);
                if delay_hours <= 24.0 {
                    return (
                        TriageAction::Prioritize,
                        format!("draft PR linked in {}h", delay_hours.round() as i64),
                    );
                }
                return (TriageAction::Prioritize, "draft PR linked".to_string());
            }
            return (TriageAction::Prioritize, "linked PR active".to_string());
        }
        return (TriageAction::Watch, "linked PR needs review".to_string());
    }

    if assessment.risk_level != RiskLevel::Low {
        return (
            TriageAction::Watch,
            "risk signals need maintainer review".to_string(),
        );
    }

    (
        TriageAction::Watch,
        "claim active; waiting for PR or update".to_string(),
    )
}

/// Order assessments within one issue: action priority, risk descending,
/// eligible before blocked, then user handle.
pub fn sort_assessments(assessments: &mut [ClaimAssessment]) {
    assessments.sort_by(|a, b| {
        a.action
            .rank()
            .cmp(&b.action.rank())
            .then_with(|| b.risk_score.cmp(&a.risk_score))
            .then_with(|| a.is_eligible().cmp(&b.is_eligible()).reverse())
            .then_with(|| a.user.to_lowercase().cmp(&b.user.to_lowercase()))
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{LinkedPullRequest, PullRequestState};
    use chrono::{DateTime, Utc};

    fn at(ts: &str) -> DateTime<Utc> {
        ts.parse().unwrap()
    }

    fn assessment() -> ClaimAssessment {
        ClaimAssessment {
            claim_id: "https://example.com/c-1".into(),
            user: "builder".into(),
            issue_ref: "elyan/bounties#1".into(),
            comment_url: "https://example.com/c-1".into(),
            created_at: at("2026-02-28T00:00:00Z"),
            account_age_days: Some(400),
            wallet: Some("rtc_builder_01".into()),
            bottube_user: None,
            blockers: vec![],
            proof_links: vec![],
            body: "Claiming this bounty.".into(),
            latest_update_at: at("2026-02-28T00:00:00Z"),
            claim_age_hours: Some(2.0),
            silence_hours: Some(2.0),
            primary_pr: None,
            risk_score: 0,
            risk_level: RiskLevel::Low,
            risk_reasons: vec![],
            action: TriageAction::Watch,
            action_reason: String::new(),
        }
    }

    fn pr(draft: bool, created_at: &str) -> LinkedPullRequest {
        LinkedPullRequest {
            owner: "elyan".into(),
            repo: "bounties".into(),
            number: 7,
            url: "https://github.com/elyan/bounties/pull/7".into(),
            state: PullRequestState::Open,
            draft: Some(draft),
            created_at: at(created_at),
            updated_at: at(created_at),
            author: "builder".into(),
        }
    }

    #[test]
    fn test_missing_details_beat_everything_else() {
        let mut a = assessment();
        a.blockers = vec!["missing_wallet".into()];
        a.silence_hours = Some(200.0);
        let (action, reason) = derive_action(&a);
        assert_eq!(action, TriageAction::RequestDetails);
        assert_eq!(reason, "missing payout details or proof");
    }

    #[test]
    fn test_star_blocker_requests_details() {
        let mut a = assessment();
        a.blockers = vec!["missing_star:Rustchain".into()];
        assert_eq!(derive_action(&a).0, TriageAction::RequestDetails);
    }

    #[test]
    fn test_account_age_blocker_alone_does_not_request_details() {
        let mut a = assessment();
        a.blockers = vec!["account_age<30".into()];
        a.risk_level = RiskLevel::Low;
        let (action, _) = derive_action(&a);
        assert_ne!(action, TriageAction::RequestDetails);
    }

    #[test]
    fn test_long_silence_releases_claim() {
        let mut a = assessment();
        a.silence_hours = Some(80.4);
        let (action, reason) = derive_action(&a);
        assert_eq!(action, TriageAction::ReleaseClaim);
        assert_eq!(reason, "idle for 80h");
    }

    #[test]
    fn test_stale_claim_without_pr_releases_at_24h_boundary() {
        let mut a = assessment();
        a.claim_age_hours = Some(24.0);
        a.silence_hours = Some(24.0);
        let (action, reason) = derive_action(&a);
        assert_eq!(action, TriageAction::ReleaseClaim);
        assert_eq!(reason, "no linked PR after 24h");
    }

    #[test]
    fn test_fast_draft_pr_prioritizes_with_delay() {
        let mut a = assessment();
        a.claim_age_hours = Some(30.0);
        a.primary_pr = Some(pr(true, "2026-02-28T06:00:00Z"));
        let (action, reason) = derive_action(&a);
        assert_eq!(action, TriageAction::Prioritize);
        assert_eq!(reason, "draft PR linked in 6h");
    }

    #[test]
    fn test_slow_draft_pr_still_prioritizes() {
        let mut a = assessment();
        a.primary_pr = Some(pr(true, "2026-03-02T00:00:00Z"));
        let (_, reason) = derive_action(&a);
        assert_eq!(reason, "draft PR linked");
    }

    #[test]
    fn test_non_draft_pr_prioritizes() {
        let mut a = assessment();
        a.primary_pr = Some(pr(false, "2026-02-28T06:00:00Z"));
        let (action, reason) = derive_action(&a);
        assert_eq!(action, TriageAction::Prioritize);
        assert_eq!(reason, "linked PR active");
    }

    #[test]
    fn test_risky_claim_with_pr_is_watched() {
        let mut a = assessment();
        a.primary_pr = Some(pr(false, "2026-02-28T06:00:00Z"));
        a.risk_level = RiskLevel::Medium;
        let (action, reason) = derive_action(&a);
        assert_eq!(action, TriageAction::Watch);
        assert_eq!(reason, "linked PR needs review");
    }

    #[test]
    fn test_risky_claim_without_pr_is_watched() {
        let mut a = assessment();
        a.risk_level = RiskLevel::High;
        let (action, reason) = derive_action(&a);
        assert_eq!(action, TriageAction::Watch);
        assert_eq!(reason, "risk signals need maintainer review");
    }

    #[test]
    fn test_fresh_quiet_claim_is_watched() {
        let (action, reason) = derive_action(&assessment());
        assert_eq!(action, TriageAction::Watch);
        assert_eq!(reason, "claim active; waiting for PR or update");
    }

    #[test]
    fn test_sort_orders_by_action_then_score_then_eligibility_then_user() {
        let mut watched = assessment();
        watched.user = "zed".into();
        watched.action = TriageAction::Watch;
        watched.risk_score = 40;

        let mut blocked = assessment();
        blocked.user = "ana".into();
        blocked.action = TriageAction::Watch;
        blocked.risk_score = 40;
        blocked.blockers = vec!["account_age<30".into()];

        let mut prioritized = assessment();
        prioritized.user = "mid".into();
        prioritized.action = TriageAction::Prioritize;

        let mut rows = vec![blocked, watched, prioritized];
        sort_assessments(&mut rows);
        assert_eq!(rows[0].user, "mid");
        assert_eq!(rows[1].user, "zed");
        assert_eq!(rows[2].user, "ana");
    }
}
