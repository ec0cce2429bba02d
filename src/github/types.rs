use chrono::{DateTime, Utc};
use reqwest::header::HeaderMap;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::error::{GitHubError, Result};

/// GitHub's maximum page size.
pub const MAX_PER_PAGE: u8 = 100;

/// Whose repositories are listed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Owner {
    Organization(String),
    User(String),
    /// The user the token belongs to; lists repositories they own, private ones included.
    AuthenticatedUser(String),
}

impl Owner {
    pub fn login(&self) -> &str {
        match self {
            Owner::Organization(login) | Owner::User(login) | Owner::AuthenticatedUser(login) => {
                login
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub page: u32,
    pub per_page: u8,
}

impl PageRequest {
    pub fn new(page: u32) -> Self {
        Self {
            page,
            per_page: MAX_PER_PAGE,
        }
    }

    pub fn query(&self) -> Vec<(&'static str, String)> {
        vec![
            ("per_page", self.per_page.to_string()),
            ("page", self.page.to_string()),
        ]
    }
}

/// Rate limit state reported alongside a response.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RateLimit {
    pub remaining: Option<u32>,
    pub reset_at: Option<DateTime<Utc>>,
}

impl RateLimit {
    pub fn from_headers(headers: &HeaderMap) -> Self {
        let header = |name: &str| headers.get(name).and_then(|v| v.to_str().ok());

        Self {
            remaining: header("x-ratelimit-remaining").and_then(|v| v.parse().ok()),
            reset_at: header("x-ratelimit-reset")
                .and_then(|v| v.parse::<i64>().ok())
                .and_then(|epoch| DateTime::from_timestamp(epoch, 0)),
        }
    }

    pub fn is_exhausted(&self) -> bool {
        self.remaining == Some(0)
    }

    /// Time left until the window resets, zero when unknown or already past.
    pub fn until_reset(&self) -> Duration {
        self.reset_at
            .and_then(|reset| (reset - Utc::now()).to_std().ok())
            .unwrap_or(Duration::ZERO)
    }
}

/// One HTTP answer from the API.
///
/// Non-2xx answers are still `Response`s: `payload` is the default value and
/// `message` carries what the server said. Callers that don't special-case a
/// status use [`Response::error_for_status`].
#[derive(Debug, Clone)]
pub struct Response<T> {
    pub status: StatusCode,
    pub payload: T,
    pub next_page: Option<u32>,
    pub rate: RateLimit,
    pub message: Option<String>,
}

impl<T> Response<T> {
    pub fn ok(payload: T) -> Self {
        Self {
            status: StatusCode::OK,
            payload,
            next_page: None,
            rate: RateLimit::default(),
            message: None,
        }
    }

    pub fn error_for_status(self) -> Result<Self> {
        if self.status.is_success() {
            return Ok(self);
        }

        let message = self.message.unwrap_or_else(|| {
            self.status
                .canonical_reason()
                .unwrap_or("unexpected status")
                .to_string()
        });

        Err(GitHubError::Api {
            status: self.status,
            message,
        })
    }
}

impl<T: Default> Response<T> {
    pub fn with_status(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            payload: T::default(),
            next_page: None,
            rate: RateLimit::default(),
            message: Some(message.into()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    pub login: String,
    #[serde(default)]
    pub html_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Repository {
    pub name: String,
    pub owner: Account,
    #[serde(default)]
    pub default_branch: Option<String>,
    #[serde(default)]
    pub archived: bool,
    #[serde(default)]
    pub is_template: bool,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub html_url: Option<String>,
}

impl Repository {
    pub fn full_name(&self) -> String {
        format!("{}/{}", self.owner.login, self.name)
    }

    /// The configured default branch, `None` when missing or empty.
    pub fn default_branch(&self) -> Option<&str> {
        self.default_branch.as_deref().filter(|b| !b.is_empty())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitRef {
    pub sha: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tag {
    pub name: String,
    pub commit: CommitRef,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Branch {
    pub name: String,
    pub commit: CommitRef,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Signature {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub date: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitDetail {
    pub message: String,
    #[serde(default)]
    pub author: Option<Signature>,
    #[serde(default)]
    pub committer: Option<Signature>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Commit {
    pub sha: String,
    #[serde(default)]
    pub html_url: Option<String>,
    pub commit: CommitDetail,
    /// GitHub account linked to the author, absent for unknown emails.
    #[serde(default)]
    pub author: Option<Account>,
    #[serde(default)]
    pub committer: Option<Account>,
}

impl Commit {
    /// First line of the message.
    pub fn summary(&self) -> &str {
        self.commit.message.lines().next().unwrap_or_default()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrganizationSummary {
    pub login: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Organization {
    pub login: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub html_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub login: String,
    #[serde(default)]
    pub bio: Option<String>,
    #[serde(default)]
    pub html_url: Option<String>,
}

/// A release to create. Tag name and release name are both `version`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Release {
    pub repository: String,
    pub version: String,
    pub body: String,
    /// Commit the tag points at; the default branch head when absent.
    pub target: Option<String>,
    /// Also create a `refs/heads/<version>` branch at `target`.
    pub create_branch: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct PublishedRelease {
    pub html_url: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::header::HeaderValue;

    #[test]
    fn rate_limit_reads_headers() {
        let mut headers = HeaderMap::new();
        headers.insert("x-ratelimit-remaining", HeaderValue::from_static("0"));
        headers.insert("x-ratelimit-reset", HeaderValue::from_static("1700000000"));

        let rate = RateLimit::from_headers(&headers);
        assert!(rate.is_exhausted());
        assert_eq!(rate.reset_at.map(|r| r.timestamp()), Some(1_700_000_000));
        // A reset in the past means no wait.
        assert_eq!(rate.until_reset(), Duration::ZERO);
    }

    #[test]
    fn missing_rate_headers_are_not_exhaustion() {
        let rate = RateLimit::from_headers(&HeaderMap::new());
        assert!(!rate.is_exhausted());
        assert_eq!(rate.remaining, None);
    }

    #[test]
    fn error_for_status_keeps_server_message() {
        let response: Response<Vec<Tag>> = Response::with_status(StatusCode::FORBIDDEN, "Resource not accessible");
        let err = response.error_for_status().unwrap_err();
        assert_eq!(
            err.to_string(),
            "GitHub API responded 403 Forbidden: Resource not accessible"
        );
    }

    #[test]
    fn empty_default_branch_is_none() {
        let repo: Repository = serde_json::from_value(serde_json::json!({
            "name": "empty",
            "owner": { "login": "acme" },
            "default_branch": ""
        }))
        .unwrap();
        assert_eq!(repo.default_branch(), None);
        assert_eq!(repo.full_name(), "acme/empty");
        assert!(!repo.archived);
        assert!(!repo.is_template);
    }
}
