//! Eligibility evaluation: declarative per-issue policy to blocker codes

use std::collections::{HashMap, HashSet};

use crate::model::{ClaimSession, TriageTarget};

use super::extract;

/// Apply one issue's eligibility policy to a session.
///
/// Returns blocker codes in evaluation order. An unknown account age never
/// produces a blocker; the lookup failure is not the claimant's fault.
pub fn evaluate_blockers(
    target: &TriageTarget,
    session: &ClaimSession,
    account_age_days: Option<i64>,
    star_sets: &HashMap<String, HashSet<String>>,
) -> Vec<String> {
    let mut blockers = Vec::new();

    if let Some(age_days) = account_age_days {
        if age_days < target.min_account_age_days {
            blockers.push(format!("account_age<{}", target.min_account_age_days));
        }
    }

    if target.require_payout_target {
        if session.wallet.is_none() && session.bottube_user.is_none() {
            blockers.push("missing_payout_target".to_string());
        }
    } else if target.require_wallet && session.wallet.is_none() {
        blockers.push("missing_wallet".to_string());
    }

    // Flagged but not fatal on its own: the wallet shape suggests an
    // external chain address rather than a local wallet name.
    if let Some(wallet) = &session.wallet {
        if extract::wallet_looks_external(wallet) {
            blockers.push("wallet_external_format".to_string());
        }
    }

    if target.require_bottube_username && session.bottube_user.is_none() {
        blockers.push("missing_bottube_username".to_string());
    }

    if target.require_proof_link && session.proof_links.is_empty() {
        blockers.push("missing_proof_link".to_string());
    }

    for star_repo in &target.required_stars {
        let is_member = star_sets
            .get(star_repo)
            .is_some_and(|members| members.contains(&session.user));
        if !is_member {
            blockers.push(format!("missing_star:{star_repo}"));
        }
    }

    blockers
}
