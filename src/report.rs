//! Markdown report rendering and ledger publication

use crate::github::{BountyHost, FetchError};
use crate::model::{ClaimAssessment, Config, LedgerTarget, PullRequestState, RiskLevel};
use crate::service::TriageOutcome;

pub const MARKER_START: &str = "<!-- auto-triage-report:start -->";
pub const MARKER_END: &str = "<!-- auto-triage-report:end -->";

const SUSPICIOUS_LIMIT: usize = 10;

/// Render the full markdown report for one run.
pub fn build_report(outcome: &TriageOutcome, config: &Config) -> String {
    let mut lines: Vec<String> = Vec::new();
    let generated_at = outcome
        .generated_at
        .to_rfc3339_opts(chrono::SecondsFormat::Secs, true);
    lines.push(format!("### Auto-Triage Report ({generated_at})"));
    lines.push(format!("Window: last `{}`h", config.since_hours));
    lines.push(format!(
        "Session lookback: `{}`h",
        config.session_lookback_hours
    ));
    lines.push(format!("Risk policy: `{}`", config.risk_policy.name));
    lines.push(String::new());

    let all_rows = || outcome.results.iter().flat_map(|issue| issue.rows.iter());
    let count = |name: &str| {
        all_rows()
            .filter(|row| row.action.to_string() == name)
            .count()
    };
    lines.push(format!(
        "Maintainer actions: `prioritize`={}, `watch`={}, `request_details`={}, `release_claim`={}",
        count("prioritize"),
        count("watch"),
        count("request_details"),
        count("release_claim"),
    ));
    lines.push(String::new());

    let mut suspicious: Vec<&ClaimAssessment> = all_rows()
        .filter(|row| row.risk_level != RiskLevel::Low)
        .collect();
    suspicious.sort_by(|a, b| {
        b.risk_score
            .cmp(&a.risk_score)
            .then_with(|| a.user.to_lowercase().cmp(&b.user.to_lowercase()))
            .then_with(|| a.issue_ref.to_lowercase().cmp(&b.issue_ref.to_lowercase()))
    });
    lines.push("#### Suspicious Claims".to_string());
    if suspicious.is_empty() {
        lines.push("_No medium/high risk claims in this window._".to_string());
    } else {
        lines.push("| User | Issue | Action | Risk | Score | Reasons | PR | Comment |".to_string());
        lines.push("|---|---|---|---|---:|---|---|---|".to_string());
        for row in suspicious.into_iter().take(SUSPICIOUS_LIMIT) {
            lines.push(format!(
                "| @{} | {} | `{}` | `{}` | {} | {} | {} | [link]({}) |",
                row.user,
                row.issue_ref,
                row.action,
                row.risk_level,
                row.risk_score,
                row.risk_reasons.join(", "),
                format_pr_cell(row),
                row.comment_url,
            ));
        }
    }
    lines.push(String::new());

    for issue in &outcome.results {
        lines.push(format!("#### {}", issue.issue_ref));
        if issue.rows.is_empty() {
            lines.push("_No active claim sessions._".to_string());
            lines.push(String::new());
            continue;
        }
        lines.push(
            "| User | Action | Risk | Score | Status | Acct(d) | Claim(h) | Idle(h) | PR | Payout | Reasons | Blockers | Comment |"
                .to_string(),
        );
        lines.push("|---|---|---|---:|---|---:|---:|---:|---|---|---|---|---|".to_string());
        for row in &issue.rows {
            let age = row
                .account_age_days
                .map(|d| d.to_string())
                .unwrap_or_default();
            let reasons = row.risk_reasons.join(", ");
            let reasons = if reasons.is_empty() {
                row.action_reason.clone()
            } else {
                reasons
            };
            lines.push(format!(
                "| @{} | `{}` | `{}` | {} | `{}` | {} | {} | {} | {} | {} | {} | {} | [link]({}) |",
                row.user,
                row.action,
                row.risk_level,
                row.risk_score,
                row.status(),
                age,
                format_hours(row.claim_age_hours),
                format_hours(row.silence_hours),
                format_pr_cell(row),
                format_payout_target(row),
                reasons,
                row.blockers.join(", "),
                row.comment_url,
            ));
        }
        lines.push(String::new());
    }

    lines.join("\n").trim().to_string()
}

fn format_pr_cell(row: &ClaimAssessment) -> String {
    let Some(pr) = &row.primary_pr else {
        return String::new();
    };
    let state = if pr.state == PullRequestState::Open && pr.is_draft() {
        "draft".to_string()
    } else {
        pr.state.to_string()
    };
    format!("[{state} {}]({})", pr.short_ref(), pr.url)
}

fn format_payout_target(row: &ClaimAssessment) -> String {
    let mut parts = Vec::new();
    if let Some(wallet) = &row.wallet {
        parts.push(format!("`{wallet}`"));
    }
    if let Some(handle) = &row.bottube_user {
        parts.push(format!("`@{handle}`"));
    }
    parts.join(" / ")
}

fn format_hours(value: Option<f64>) -> String {
    value
        .map(|v| (v.round() as i64).to_string())
        .unwrap_or_default()
}

/// Replace the marked report block in a ledger body, or append one when no
/// markers exist yet.
pub fn splice_report(body: &str, report: &str) -> String {
    let block = format!("{MARKER_START}\n{report}\n{MARKER_END}");
    match (body.find(MARKER_START), body.find(MARKER_END)) {
        (Some(start), Some(end_start)) => {
            let end = end_start + MARKER_END.len();
            format!("{}{block}{}", &body[..start], &body[end..])
        }
        _ => format!("{body}\n\n{block}\n"),
    }
}

/// Publish the report into the configured ledger issue's body.
pub async fn publish_to_ledger(
    host: &dyn BountyHost,
    owner: &str,
    ledger: &LedgerTarget,
    report: &str,
) -> Result<(), FetchError> {
    let body = host.issue_body(owner, &ledger.repo, ledger.issue).await?;
    let updated = splice_report(&body, report);
    host.set_issue_body(owner, &ledger.repo, ledger.issue, &updated)
        .await?;
    tracing::info!(repo = %ledger.repo, issue = ledger.issue, "Updated ledger issue");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{LinkedPullRequest, RiskPolicy, TriageAction};
    use crate::service::IssueTriage;
    use chrono::{DateTime, Utc};
    use std::collections::HashSet;

    fn at(ts: &str) -> DateTime<Utc> {
        ts.parse().unwrap()
    }

    fn config() -> Config {
        Config {
            github_token: "token".into(),
            since_hours: 72,
            session_lookback_hours: 168,
            risk_policy: RiskPolicy::by_name("balanced").unwrap(),
            ignored_users: HashSet::new(),
            star_owner: "elyan".into(),
            targets: vec![],
            ledger: None,
        }
    }

    fn row(user: &str, action: TriageAction, score: u32, level: RiskLevel) -> ClaimAssessment {
        ClaimAssessment {
            claim_id: format!("https://example.com/{user}"),
            user: user.to_string(),
            issue_ref: "elyan/bounties#1".into(),
            comment_url: format!("https://example.com/{user}"),
            created_at: at("2026-02-28T00:00:00Z"),
            account_age_days: Some(120),
            wallet: Some(format!("rtc_{user}")),
            bottube_user: None,
            blockers: vec![],
            proof_links: vec![],
            body: "Claiming this bounty.".into(),
            latest_update_at: at("2026-02-28T00:00:00Z"),
            claim_age_hours: Some(5.4),
            silence_hours: Some(2.6),
            primary_pr: None,
            risk_score: score,
            risk_level: level,
            risk_reasons: if level == RiskLevel::Low {
                vec![]
            } else {
                vec!["WALLET_REUSE".into()]
            },
            action,
            action_reason: "claim active; waiting for PR or update".into(),
        }
    }

    fn outcome(rows: Vec<ClaimAssessment>) -> TriageOutcome {
        TriageOutcome {
            generated_at: at("2026-02-28T12:00:00Z"),
            results: vec![IssueTriage {
                issue_ref: "elyan/bounties#1".into(),
                rows,
            }],
        }
    }

    #[test]
    fn test_report_header_and_action_counts() {
        let report = build_report(
            &outcome(vec![
                row("builder", TriageAction::Prioritize, 0, RiskLevel::Low),
                row("drifter", TriageAction::Watch, 0, RiskLevel::Low),
            ]),
            &config(),
        );
        assert!(report.starts_with("### Auto-Triage Report (2026-02-28T12:00:00Z)"));
        assert!(report.contains("Window: last `72`h"));
        assert!(report.contains("Risk policy: `balanced`"));
        assert!(report.contains(
            "Maintainer actions: `prioritize`=1, `watch`=1, `request_details`=0, `release_claim`=0"
        ));
    }

    #[test]
    fn test_report_lists_suspicious_claims_or_placeholder() {
        let quiet = build_report(
            &outcome(vec![row("builder", TriageAction::Watch, 0, RiskLevel::Low)]),
            &config(),
        );
        assert!(quiet.contains("_No medium/high risk claims in this window._"));

        let flagged = build_report(
            &outcome(vec![row("sybil", TriageAction::Watch, 44, RiskLevel::Medium)]),
            &config(),
        );
        assert!(flagged.contains("| @sybil | elyan/bounties#1 | `watch` | `medium` | 44 |"));
    }

    #[test]
    fn test_report_rounds_hours_and_formats_payout() {
        let report = build_report(
            &outcome(vec![row("builder", TriageAction::Watch, 0, RiskLevel::Low)]),
            &config(),
        );
        assert!(report.contains("| 120 | 5 | 3 |"));
        assert!(report.contains("`rtc_builder`"));
    }

    #[test]
    fn test_report_empty_issue_placeholder() {
        let report = build_report(&outcome(vec![]), &config());
        assert!(report.contains("#### elyan/bounties#1"));
        assert!(report.contains("_No active claim sessions._"));
    }

    #[test]
    fn test_pr_cell_shows_draft_for_open_drafts() {
        let mut with_pr = row("builder", TriageAction::Prioritize, 0, RiskLevel::Low);
        with_pr.primary_pr = Some(LinkedPullRequest {
            owner: "elyan".into(),
            repo: "bounties".into(),
            number: 7,
            url: "https://github.com/elyan/bounties/pull/7".into(),
            state: PullRequestState::Open,
            draft: Some(true),
            created_at: at("2026-02-28T06:00:00Z"),
            updated_at: at("2026-02-28T06:00:00Z"),
            author: "builder".into(),
        });
        assert_eq!(
            format_pr_cell(&with_pr),
            "[draft elyan/bounties#7](https://github.com/elyan/bounties/pull/7)"
        );

        with_pr.primary_pr.as_mut().unwrap().draft = Some(false);
        assert!(format_pr_cell(&with_pr).starts_with("[open "));
    }

    #[test]
    fn test_splice_replaces_existing_block_in_place() {
        let body = format!(
            "Intro text\n\n{MARKER_START}\nold report\n{MARKER_END}\n\nFooter"
        );
        let updated = splice_report(&body, "new report");
        assert!(updated.contains("new report"));
        assert!(!updated.contains("old report"));
        assert!(updated.starts_with("Intro text"));
        assert!(updated.ends_with("Footer"));
    }

    #[test]
    fn test_splice_appends_when_markers_absent() {
        let updated = splice_report("Ledger body", "fresh report");
        assert!(updated.starts_with("Ledger body\n\n"));
        assert!(updated.contains(MARKER_START));
        assert!(updated.ends_with(&format!("{MARKER_END}\n")));
    }
}
