//! External data source: comments, accounts, pull requests, star lists

mod client;

use std::collections::HashSet;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::model::{LinkedPullRequest, PrRef};

pub use client::GithubClient;

#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("failed to parse response: {0}")]
    Parse(String),

    #[error("rate limited")]
    RateLimited,

    #[error("not found: {0}")]
    NotFound(String),
}

/// One comment on a bounty issue. Immutable once fetched.
#[derive(Debug, Clone)]
pub struct IssueComment {
    pub user: String,
    pub created_at: DateTime<Utc>,
    pub body: String,
    pub html_url: String,
}

/// Account summary used for the account-age eligibility rule.
#[derive(Debug, Clone)]
pub struct AccountSummary {
    pub login: String,
    pub created_at: Option<DateTime<Utc>>,
}

/// A pull request that cross-referenced the bounty issue from its timeline,
/// with the author who opened it.
#[derive(Debug, Clone)]
pub struct CrossReference {
    pub author: String,
    pub pr: PrRef,
}

/// Read/write surface of the code-hosting platform needed by one triage run.
///
/// Every lookup is snapshot-style: callers cache results for the run and a
/// failed lookup degrades to an absent value rather than aborting triage.
#[async_trait]
pub trait BountyHost: Send + Sync {
    async fn issue_comments(
        &self,
        owner: &str,
        repo: &str,
        issue: u64,
    ) -> Result<Vec<IssueComment>, FetchError>;

    async fn account_summary(&self, login: &str) -> Result<AccountSummary, FetchError>;

    async fn pull_request(&self, pr: &PrRef) -> Result<LinkedPullRequest, FetchError>;

    async fn cross_references(
        &self,
        owner: &str,
        repo: &str,
        issue: u64,
    ) -> Result<Vec<CrossReference>, FetchError>;

    async fn stargazers(&self, owner: &str, repo: &str) -> Result<HashSet<String>, FetchError>;

    async fn issue_body(&self, owner: &str, repo: &str, issue: u64)
    -> Result<String, FetchError>;

    async fn set_issue_body(
        &self,
        owner: &str,
        repo: &str,
        issue: u64,
        body: &str,
    ) -> Result<(), FetchError>;
}
