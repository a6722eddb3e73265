//! Triage orchestration: one full pass over every configured bounty issue

use std::collections::{BTreeSet, HashMap, HashSet};

use chrono::{DateTime, Duration, Utc};

use crate::github::{BountyHost, FetchError};
use crate::model::{ClaimAssessment, ClaimSession, Config, RiskLevel, TriageAction, TriageTarget};

use super::linked_pr::{self, PullRequestCache};
use super::risk::{self, RiskInput};
use super::{action, eligibility, session};

/// Everything one run produced, in target order.
#[derive(Debug, Clone)]
pub struct TriageOutcome {
    pub generated_at: DateTime<Utc>,
    pub results: Vec<IssueTriage>,
}

/// Assessments for one bounty issue, sorted for presentation.
#[derive(Debug, Clone)]
pub struct IssueTriage {
    pub issue_ref: String,
    pub rows: Vec<ClaimAssessment>,
}

pub struct TriageService<'a> {
    host: &'a dyn BountyHost,
    config: &'a Config,
}

impl<'a> TriageService<'a> {
    pub fn new(host: &'a dyn BountyHost, config: &'a Config) -> Self {
        Self { host, config }
    }

    /// Run triage over every configured target.
    ///
    /// Comment and star-list fetches are fatal: without them the batch
    /// signals would silently under-count. Timeline, account, and pull
    /// request lookups degrade to absent values.
    pub async fn run(&self, now: DateTime<Utc>) -> Result<TriageOutcome, FetchError> {
        let star_sets = self.fetch_star_sets().await?;
        let session_cutoff = now - Duration::hours(self.config.session_lookback_hours);

        let mut user_ages: HashMap<String, Option<i64>> = HashMap::new();
        let mut pr_cache = PullRequestCache::new();
        let mut results: Vec<IssueTriage> = Vec::new();

        for target in &self.config.targets {
            let issue_ref = target.issue_ref();
            tracing::info!(issue = %issue_ref, "Triaging bounty issue");

            let comments = self
                .host
                .issue_comments(&target.owner, &target.repo, target.issue)
                .await?;
            let sessions = session::collect_claim_sessions(
                &comments,
                &target.owner,
                &target.repo,
                &issue_ref,
                &self.config.ignored_users,
            );

            let timeline_refs = match self
                .host
                .cross_references(&target.owner, &target.repo, target.issue)
                .await
            {
                Ok(refs) => linked_pr::timeline_refs_by_user(&refs),
                Err(e) => {
                    tracing::warn!(issue = %issue_ref, error = %e, "Timeline fetch failed, continuing without cross-references");
                    HashMap::new()
                }
            };

            let mut rows: Vec<ClaimAssessment> = Vec::new();
            for claim in &sessions {
                if !user_ages.contains_key(&claim.user) {
                    let age = self.resolve_account_age(&claim.user, now).await;
                    user_ages.insert(claim.user.clone(), age);
                }
                let account_age_days = user_ages[&claim.user];

                let linked =
                    linked_pr::linked_prs_for_session(claim, &timeline_refs, self.host, &mut pr_cache)
                        .await;
                let primary_pr = linked_pr::select_primary(&linked);
                let last_activity = linked_pr::last_activity(claim, primary_pr.as_ref());
                if claim.created_at < session_cutoff && last_activity < session_cutoff {
                    continue;
                }

                let blockers =
                    eligibility::evaluate_blockers(target, claim, account_age_days, &star_sets);
                rows.push(assemble_row(
                    target,
                    claim,
                    account_age_days,
                    blockers,
                    primary_pr,
                    last_activity,
                    now,
                ));
            }

            results.push(IssueTriage { issue_ref, rows });
        }

        self.apply_risk_and_actions(&mut results);
        Ok(TriageOutcome {
            generated_at: now,
            results,
        })
    }

    /// Star lists for every repo any target requires, fetched once.
    async fn fetch_star_sets(&self) -> Result<HashMap<String, HashSet<String>>, FetchError> {
        let mut repos: BTreeSet<&str> = BTreeSet::new();
        for target in &self.config.targets {
            repos.extend(target.required_stars.iter().map(String::as_str));
        }

        let mut sets = HashMap::new();
        for repo in repos {
            let members = self.host.stargazers(&self.config.star_owner, repo).await?;
            tracing::info!(repo, stargazers = members.len(), "Fetched star list");
            sets.insert(repo.to_string(), members);
        }
        Ok(sets)
    }

    async fn resolve_account_age(&self, user: &str, now: DateTime<Utc>) -> Option<i64> {
        match self.host.account_summary(user).await {
            Ok(summary) => summary.created_at.map(|created| (now - created).num_days()),
            Err(e) => {
                tracing::warn!(user, error = %e, "Account lookup failed, age unknown");
                None
            }
        }
    }

    /// Batch risk pass over every row across every issue, then per-row
    /// action derivation and per-issue presentation ordering.
    fn apply_risk_and_actions(&self, results: &mut [IssueTriage]) {
        let inputs: Vec<RiskInput> = results
            .iter()
            .flat_map(|issue| issue.rows.iter())
            .map(|row| RiskInput {
                claim_id: row.claim_id.clone(),
                user: row.user.clone(),
                issue_ref: row.issue_ref.clone(),
                body: row.body.clone(),
                account_age_days: row.account_age_days,
                wallet: row.wallet.clone(),
                proof_links: row.proof_links.clone(),
            })
            .collect();
        if inputs.is_empty() {
            return;
        }

        let scored = risk::score_claims(&inputs, self.config.risk_policy);
        let by_claim: HashMap<&str, &risk::RiskResult> =
            scored.iter().map(|r| (r.claim_id.as_str(), r)).collect();

        for issue in results.iter_mut() {
            for row in issue.rows.iter_mut() {
                if let Some(result) = by_claim.get(row.claim_id.as_str()) {
                    row.risk_score = result.score;
                    row.risk_level = result.level;
                    row.risk_reasons = result.reasons.clone();
                }
                let (derived, reason) = action::derive_action(row);
                row.action = derived;
                row.action_reason = reason;
            }
            action::sort_assessments(&mut issue.rows);
        }
    }
}

fn assemble_row(
    target: &TriageTarget,
    claim: &ClaimSession,
    account_age_days: Option<i64>,
    blockers: Vec<String>,
    primary_pr: Option<crate::model::LinkedPullRequest>,
    last_activity: DateTime<Utc>,
    now: DateTime<Utc>,
) -> ClaimAssessment {
    let issue_ref = target.issue_ref();
    let claim_id = if claim.first_claim_url.is_empty() {
        format!("{issue_ref}:{}:{}", claim.user, claim.created_at.to_rfc3339())
    } else {
        claim.first_claim_url.clone()
    };
    let comment_url = if claim.latest_update_url.is_empty() {
        claim.first_claim_url.clone()
    } else {
        claim.latest_update_url.clone()
    };

    ClaimAssessment {
        claim_id,
        user: claim.user.clone(),
        issue_ref,
        comment_url,
        created_at: claim.created_at,
        account_age_days,
        wallet: claim.wallet.clone(),
        bottube_user: claim.bottube_user.clone(),
        blockers,
        proof_links: claim.proof_links.iter().cloned().collect(),
        body: claim.first_claim_body.clone(),
        latest_update_at: claim.latest_update_at,
        claim_age_hours: Some(hours_since(claim.created_at, now)),
        silence_hours: Some(hours_since(last_activity, now)),
        primary_pr,
        risk_score: 0,
        risk_level: RiskLevel::Low,
        risk_reasons: Vec::new(),
        action: TriageAction::Watch,
        action_reason: String::new(),
    }
}

fn hours_since(ts: DateTime<Utc>, now: DateTime<Utc>) -> f64 {
    ((now - ts).num_seconds() as f64 / 3600.0).max(0.0)
}
