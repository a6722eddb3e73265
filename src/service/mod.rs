//! Triage pipeline: extraction, sessions, eligibility, risk, actions

pub mod action;
pub mod eligibility;
pub mod extract;
pub mod linked_pr;
pub mod risk;
pub mod session;
pub mod triage;

pub use triage::{IssueTriage, TriageOutcome, TriageService};
