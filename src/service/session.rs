//! Claim session builder: folds an ordered comment stream into at most one
//! session per (user, issue)

use std::collections::{HashMap, HashSet};

use crate::github::IssueComment;
use crate::model::ClaimSession;

use super::extract;

/// Build claim sessions from all comments on one issue.
///
/// Comments are processed in ascending timestamp order. A session opens on
/// the first comment from a non-ignored user that passes the claim
/// classifier; every later comment from that user updates the session
/// whether or not it looks like a claim itself.
pub fn collect_claim_sessions(
    comments: &[IssueComment],
    owner: &str,
    repo: &str,
    issue_ref: &str,
    ignored_users: &HashSet<String>,
) -> Vec<ClaimSession> {
    let mut ordered: Vec<&IssueComment> = comments.iter().collect();
    ordered.sort_by_key(|c| c.created_at);

    let mut sessions: Vec<ClaimSession> = Vec::new();
    let mut index: HashMap<String, usize> = HashMap::new();

    for comment in ordered {
        let user = comment.user.trim();
        if user.is_empty() || ignored_users.contains(&user.to_lowercase()) {
            continue;
        }

        match index.get(user) {
            Some(&i) => apply_comment(&mut sessions[i], comment, owner, repo),
            None => {
                if !extract::looks_like_claim(&comment.body) {
                    continue;
                }
                let mut session = ClaimSession {
                    user: user.to_string(),
                    issue_ref: issue_ref.to_string(),
                    created_at: comment.created_at,
                    first_claim_url: comment.html_url.clone(),
                    first_claim_body: comment.body.clone(),
                    latest_update_at: comment.created_at,
                    latest_update_url: comment.html_url.clone(),
                    latest_update_body: comment.body.clone(),
                    wallet: None,
                    bottube_user: None,
                    proof_links: Default::default(),
                    pr_refs: Default::default(),
                };
                apply_comment(&mut session, comment, owner, repo);
                index.insert(user.to_string(), sessions.len());
                sessions.push(session);
            }
        }
    }

    sessions
}

/// Merge one comment into an existing session.
///
/// Extracted wallet/handle values overwrite only when present; proof links
/// and PR references accumulate; `latest_update_*` advances when the comment
/// is not older than the current latest (ties take the newer comment).
fn apply_comment(session: &mut ClaimSession, comment: &IssueComment, owner: &str, repo: &str) {
    if let Some(wallet) = extract::extract_wallet(&comment.body) {
        session.wallet = Some(wallet);
    }
    if let Some(bottube_user) = extract::extract_bottube_user(&comment.body) {
        session.bottube_user = Some(bottube_user);
    }
    session.proof_links.extend(extract::extract_links(&comment.body));
    session
        .pr_refs
        .extend(extract::extract_pr_refs(&comment.body, owner, repo));

    if session.latest_update_at <= comment.created_at {
        session.latest_update_at = comment.created_at;
        session.latest_update_url = comment.html_url.clone();
        session.latest_update_body = comment.body.clone();
    }
}
