//! Linked-PR resolver: candidate gathering, author filtering, primary selection

use std::cmp::Reverse;
use std::collections::{BTreeSet, HashMap};

use chrono::{DateTime, Utc};

use crate::github::{BountyHost, CrossReference, FetchError};
use crate::model::{ClaimSession, LinkedPullRequest, PrRef, PullRequestState};

/// Per-run read-through cache of pull request metadata.
///
/// Failed lookups cache as `None` so one inaccessible pull request is
/// fetched once and never blocks scoring of other claims.
#[derive(Default)]
pub struct PullRequestCache {
    entries: HashMap<PrRef, Option<LinkedPullRequest>>,
}

impl PullRequestCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn lookup(
        &mut self,
        host: &dyn BountyHost,
        pr: &PrRef,
    ) -> Option<LinkedPullRequest> {
        if let Some(cached) = self.entries.get(pr) {
            return cached.clone();
        }
        let fetched = match host.pull_request(pr).await {
            Ok(linked) => Some(linked),
            Err(FetchError::NotFound(_)) => {
                tracing::debug!(pr = %pr, "Linked pull request not found");
                None
            }
            Err(e) => {
                tracing::warn!(pr = %pr, error = %e, "Pull request lookup failed");
                None
            }
        };
        self.entries.insert(pr.clone(), fetched.clone());
        fetched
    }
}

/// Build the per-user candidate map from the issue's cross-reference
/// timeline. Keys are lower-cased author handles.
pub fn timeline_refs_by_user(refs: &[CrossReference]) -> HashMap<String, BTreeSet<PrRef>> {
    let mut by_user: HashMap<String, BTreeSet<PrRef>> = HashMap::new();
    for item in refs {
        by_user
            .entry(item.author.to_lowercase())
            .or_default()
            .insert(item.pr.clone());
    }
    by_user
}

/// Resolve every pull request attributable to the session's user.
///
/// Candidates come from comment-text references and the issue timeline;
/// requests opened by anyone else are discarded even when mentioned.
pub async fn linked_prs_for_session(
    session: &ClaimSession,
    timeline_refs: &HashMap<String, BTreeSet<PrRef>>,
    host: &dyn BountyHost,
    cache: &mut PullRequestCache,
) -> Vec<LinkedPullRequest> {
    let mut refs: BTreeSet<PrRef> = session.pr_refs.clone();
    if let Some(from_timeline) = timeline_refs.get(&session.user.to_lowercase()) {
        refs.extend(from_timeline.iter().cloned());
    }

    let mut linked = Vec::new();
    for pr_ref in refs {
        let Some(pr) = cache.lookup(host, &pr_ref).await else {
            continue;
        };
        if !pr.author.eq_ignore_ascii_case(&session.user) {
            continue;
        }
        linked.push(pr);
    }
    linked
}

fn state_rank(pr: &LinkedPullRequest) -> u8 {
    match (pr.state, pr.is_draft()) {
        (PullRequestState::Open, false) => 0,
        (PullRequestState::Open, true) => 1,
        _ => 2,
    }
}

/// Select the single primary pull request: open non-draft first, then open
/// draft, then anything else; most recently updated wins among ties.
pub fn select_primary(prs: &[LinkedPullRequest]) -> Option<LinkedPullRequest> {
    prs.iter()
        .min_by_key(|pr| (state_rank(pr), Reverse(pr.updated_at)))
        .cloned()
}

/// Most recent activity attributable to the session: its latest comment or
/// the primary pull request's created/updated timestamps.
pub fn last_activity(
    session: &ClaimSession,
    primary: Option<&LinkedPullRequest>,
) -> DateTime<Utc> {
    let mut latest = session.latest_update_at;
    if let Some(pr) = primary {
        latest = latest.max(pr.created_at).max(pr.updated_at);
    }
    latest
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pr(
        number: u64,
        state: PullRequestState,
        draft: bool,
        updated_at: &str,
    ) -> LinkedPullRequest {
        LinkedPullRequest {
            owner: "elyan".into(),
            repo: "bounties".into(),
            number,
            url: format!("https://github.com/elyan/bounties/pull/{number}"),
            state,
            draft: Some(draft),
            created_at: "2026-02-28T00:00:00Z".parse().unwrap(),
            updated_at: updated_at.parse().unwrap(),
            author: "builder".into(),
        }
    }

    #[test]
    fn test_primary_prefers_open_non_draft() {
        let prs = vec![
            pr(1, PullRequestState::Open, true, "2026-02-28T10:00:00Z"),
            pr(2, PullRequestState::Open, false, "2026-02-28T01:00:00Z"),
            pr(3, PullRequestState::Closed, false, "2026-02-28T12:00:00Z"),
        ];
        assert_eq!(select_primary(&prs).unwrap().number, 2);
    }

    #[test]
    fn test_primary_breaks_ties_by_most_recent_update() {
        let prs = vec![
            pr(1, PullRequestState::Open, false, "2026-02-28T01:00:00Z"),
            pr(2, PullRequestState::Open, false, "2026-02-28T09:00:00Z"),
        ];
        assert_eq!(select_primary(&prs).unwrap().number, 2);
    }

    #[test]
    fn test_primary_falls_back_to_draft_then_closed() {
        let prs = vec![
            pr(1, PullRequestState::Closed, false, "2026-02-28T09:00:00Z"),
            pr(2, PullRequestState::Open, true, "2026-02-28T01:00:00Z"),
        ];
        assert_eq!(select_primary(&prs).unwrap().number, 2);

        let only_closed = vec![
            pr(3, PullRequestState::Merged, false, "2026-02-28T02:00:00Z"),
            pr(4, PullRequestState::Closed, false, "2026-02-28T05:00:00Z"),
        ];
        assert_eq!(select_primary(&only_closed).unwrap().number, 4);
    }

    #[test]
    fn test_no_candidates_means_no_primary() {
        assert!(select_primary(&[]).is_none());
    }

    #[test]
    fn test_timeline_refs_group_by_lowercased_author() {
        let refs = vec![
            CrossReference {
                author: "Builder".into(),
                pr: PrRef {
                    owner: "elyan".into(),
                    repo: "bounties".into(),
                    number: 1,
                },
            },
            CrossReference {
                author: "builder".into(),
                pr: PrRef {
                    owner: "elyan".into(),
                    repo: "bounties".into(),
                    number: 2,
                },
            },
        ];
        let by_user = timeline_refs_by_user(&refs);
        assert_eq!(by_user.len(), 1);
        assert_eq!(by_user["builder"].len(), 2);
    }
}
