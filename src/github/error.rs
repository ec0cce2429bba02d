//! GitHub API error types.

use chrono::{DateTime, Utc};
use reqwest::StatusCode;
use thiserror::Error;

pub type Result<T, E = GitHubError> = std::result::Result<T, E>;

/// Errors that can occur when talking to GitHub.
#[derive(Debug, Error)]
pub enum GitHubError {
    #[error("missing GitHub token; pass --token, set GITHUB_TOKEN or add `token` to the [github] config section")]
    MissingToken,

    #[error("invalid GitHub token: {0}")]
    InvalidToken(#[from] reqwest::header::InvalidHeaderValue),

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("GitHub API error: {0}")]
    Octocrab(#[from] octocrab::Error),

    #[error("GitHub API responded {status}: {message}")]
    Api { status: StatusCode, message: String },

    #[error("rate limit exhausted until {reset_at}, which is past the deadline")]
    RateLimited { reset_at: DateTime<Utc> },

    #[error("deadline exceeded")]
    DeadlineExceeded,

    #[error("GitHub returned no body for {0}")]
    EmptyBody(String),

    #[error("background task failed: {0}")]
    Task(String),

    #[error("failed to {action} for {owner}/{repo}")]
    Repository {
        action: String,
        owner: String,
        repo: String,
        source: Box<GitHubError>,
    },

    #[error("failed to {action}")]
    Request {
        action: String,
        source: Box<GitHubError>,
    },
}

impl GitHubError {
    /// Attach the repository and the step that failed.
    pub fn for_repository(self, action: impl Into<String>, owner: &str, repo: &str) -> Self {
        GitHubError::Repository {
            action: action.into(),
            owner: owner.to_string(),
            repo: repo.to_string(),
            source: Box::new(self),
        }
    }

    pub fn during(self, action: impl Into<String>) -> Self {
        GitHubError::Request {
            action: action.into(),
            source: Box::new(self),
        }
    }

    /// The HTTP status behind this error, looking through context wrappers.
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            GitHubError::Api { status, .. } => Some(*status),
            GitHubError::Repository { source, .. } | GitHubError::Request { source, .. } => {
                source.status()
            }
            _ => None,
        }
    }
}
