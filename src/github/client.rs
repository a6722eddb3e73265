//! GitHub REST client backing the [`BountyHost`] trait

use std::collections::HashSet;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde::de::DeserializeOwned;

use crate::model::{LinkedPullRequest, PrRef, PullRequestState};

use super::{AccountSummary, BountyHost, CrossReference, FetchError, IssueComment};

const API_BASE: &str = "https://api.github.com";
const USER_AGENT: &str = "bounty-triage/0.1";
const ACCEPT: &str = "application/vnd.github+json";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
const PAGE_SIZE: usize = 100;

pub struct GithubClient {
    client: Client,
    token: String,
}

impl GithubClient {
    pub fn new(token: String) -> Self {
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .unwrap_or_default();
        Self { client, token }
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, FetchError> {
        let url = format!("{API_BASE}{path}");
        let response = self
            .client
            .get(&url)
            .header("Authorization", format!("Bearer {}", self.token))
            .header("User-Agent", USER_AGENT)
            .header("Accept", ACCEPT)
            .send()
            .await?;

        if response.status() == StatusCode::NOT_FOUND {
            return Err(FetchError::NotFound(path.to_string()));
        }

        if response.status() == StatusCode::FORBIDDEN
            || response.status() == StatusCode::UNAUTHORIZED
        {
            tracing::warn!(path = %path, status = %response.status(), "GitHub API rate limited");
            return Err(FetchError::RateLimited);
        }

        if !response.status().is_success() {
            return Err(FetchError::Parse(format!(
                "HTTP {}: {}",
                response.status(),
                path
            )));
        }

        let text = response.text().await?;
        serde_json::from_str(&text).map_err(|e| FetchError::Parse(e.to_string()))
    }

    async fn get_paginated<T: DeserializeOwned>(&self, path: &str) -> Result<Vec<T>, FetchError> {
        let mut out = Vec::new();
        let mut page = 1u32;
        loop {
            let sep = if path.contains('?') { '&' } else { '?' };
            let paged = format!("{path}{sep}per_page={PAGE_SIZE}&page={page}");
            let chunk: Vec<T> = self.get_json(&paged).await?;
            let len = chunk.len();
            out.extend(chunk);
            if len < PAGE_SIZE {
                break;
            }
            page += 1;
        }
        Ok(out)
    }

    async fn patch_json(&self, path: &str, body: &serde_json::Value) -> Result<(), FetchError> {
        let url = format!("{API_BASE}{path}");
        let response = self
            .client
            .patch(&url)
            .header("Authorization", format!("Bearer {}", self.token))
            .header("User-Agent", USER_AGENT)
            .header("Accept", ACCEPT)
            .json(body)
            .send()
            .await?;

        if response.status() == StatusCode::NOT_FOUND {
            return Err(FetchError::NotFound(path.to_string()));
        }
        if !response.status().is_success() {
            return Err(FetchError::Parse(format!(
                "HTTP {}: {}",
                response.status(),
                path
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Deserialize)]
struct RawUser {
    login: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawComment {
    user: Option<RawUser>,
    created_at: Option<String>,
    body: Option<String>,
    html_url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawAccount {
    login: Option<String>,
    created_at: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawPull {
    number: Option<u64>,
    html_url: Option<String>,
    state: Option<String>,
    draft: Option<bool>,
    created_at: Option<String>,
    updated_at: Option<String>,
    merged_at: Option<String>,
    user: Option<RawUser>,
}

#[derive(Debug, Deserialize)]
struct RawTimelineEvent {
    source: Option<RawTimelineSource>,
}

#[derive(Debug, Deserialize)]
struct RawTimelineSource {
    issue: Option<RawTimelineIssue>,
}

#[derive(Debug, Deserialize)]
struct RawTimelineIssue {
    pull_request: Option<serde_json::Value>,
    html_url: Option<String>,
    user: Option<RawUser>,
}

#[derive(Debug, Deserialize)]
struct RawIssue {
    body: Option<String>,
}

fn parse_datetime(value: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .ok()
        .map(|d| d.with_timezone(&Utc))
}

fn login_of(user: Option<RawUser>) -> String {
    user.and_then(|u| u.login)
        .map(|l| l.trim().to_string())
        .unwrap_or_default()
}

#[async_trait]
impl BountyHost for GithubClient {
    async fn issue_comments(
        &self,
        owner: &str,
        repo: &str,
        issue: u64,
    ) -> Result<Vec<IssueComment>, FetchError> {
        let raw: Vec<RawComment> = self
            .get_paginated(&format!("/repos/{owner}/{repo}/issues/{issue}/comments"))
            .await?;

        // Comments without an author or timestamp cannot open or update a
        // session; drop them at the boundary.
        let comments = raw
            .into_iter()
            .filter_map(|c| {
                let user = login_of(c.user);
                let created_at = c.created_at.as_deref().and_then(parse_datetime)?;
                if user.is_empty() {
                    return None;
                }
                Some(IssueComment {
                    user,
                    created_at,
                    body: c.body.unwrap_or_default(),
                    html_url: c.html_url.unwrap_or_default(),
                })
            })
            .collect();
        Ok(comments)
    }

    async fn account_summary(&self, login: &str) -> Result<AccountSummary, FetchError> {
        let raw: RawAccount = self.get_json(&format!("/users/{login}")).await?;
        Ok(AccountSummary {
            login: raw.login.unwrap_or_else(|| login.to_string()),
            created_at: raw.created_at.as_deref().and_then(parse_datetime),
        })
    }

    async fn pull_request(&self, pr: &PrRef) -> Result<LinkedPullRequest, FetchError> {
        let path = format!("/repos/{}/{}/pulls/{}", pr.owner, pr.repo, pr.number);
        let raw: RawPull = self.get_json(&path).await?;

        let created_at = raw
            .created_at
            .as_deref()
            .and_then(parse_datetime)
            .ok_or_else(|| FetchError::Parse(format!("missing created_at for {pr}")))?;
        let updated_at = raw
            .updated_at
            .as_deref()
            .and_then(parse_datetime)
            .unwrap_or(created_at);

        let state = if raw.merged_at.is_some() {
            PullRequestState::Merged
        } else if raw.state.as_deref() == Some("open") {
            PullRequestState::Open
        } else {
            PullRequestState::Closed
        };

        Ok(LinkedPullRequest {
            owner: pr.owner.clone(),
            repo: pr.repo.clone(),
            number: raw.number.unwrap_or(pr.number),
            url: raw.html_url.unwrap_or_else(|| {
                format!(
                    "https://github.com/{}/{}/pull/{}",
                    pr.owner, pr.repo, pr.number
                )
            }),
            state,
            draft: raw.draft,
            created_at,
            updated_at,
            author: login_of(raw.user),
        })
    }

    async fn cross_references(
        &self,
        owner: &str,
        repo: &str,
        issue: u64,
    ) -> Result<Vec<CrossReference>, FetchError> {
        let raw: Vec<RawTimelineEvent> = self
            .get_paginated(&format!("/repos/{owner}/{repo}/issues/{issue}/timeline"))
            .await?;

        let refs = raw
            .into_iter()
            .filter_map(|event| {
                let source = event.source?.issue?;
                source.pull_request.as_ref()?;
                let author = login_of(source.user);
                if author.is_empty() {
                    return None;
                }
                let pr = PrRef::from_pull_url(source.html_url.as_deref()?)?;
                Some(CrossReference { author, pr })
            })
            .collect();
        Ok(refs)
    }

    async fn stargazers(&self, owner: &str, repo: &str) -> Result<HashSet<String>, FetchError> {
        let raw: Vec<RawUser> = self
            .get_paginated(&format!("/repos/{owner}/{repo}/stargazers"))
            .await?;
        Ok(raw.into_iter().filter_map(|u| u.login).collect())
    }

    async fn issue_body(
        &self,
        owner: &str,
        repo: &str,
        issue: u64,
    ) -> Result<String, FetchError> {
        let raw: RawIssue = self
            .get_json(&format!("/repos/{owner}/{repo}/issues/{issue}"))
            .await?;
        Ok(raw.body.unwrap_or_default())
    }

    async fn set_issue_body(
        &self,
        owner: &str,
        repo: &str,
        issue: u64,
        body: &str,
    ) -> Result<(), FetchError> {
        self.patch_json(
            &format!("/repos/{owner}/{repo}/issues/{issue}"),
            &serde_json::json!({ "body": body }),
        )
        .await
    }
}
