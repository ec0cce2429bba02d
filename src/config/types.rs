use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::release::VersionChange;

#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub github: GithubConfig,
    pub scan: ScanConfig,
    pub release: ReleaseConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GithubConfig {
    /// `github.com` or a GitHub Enterprise hostname.
    pub host: String,
    /// Personal access token; `GITHUB_TOKEN` and `--token` take precedence.
    pub token: Option<String>,
}

impl Default for GithubConfig {
    fn default() -> Self {
        Self {
            host: "github.com".to_string(),
            token: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanConfig {
    /// Upper bound on a whole scan, rate limit waits included.
    pub timeout_secs: u64,
    /// Branch to look for unreleased commits on; empty means each default branch.
    pub branch: String,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 120,
            branch: String::new(),
        }
    }
}

impl ScanConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn branch(&self) -> Option<&str> {
        Some(self.branch.as_str()).filter(|b| !b.is_empty())
    }
}

#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReleaseConfig {
    pub change: VersionChange,
    /// Inline release notes template.
    pub template: Option<String>,
    /// Template file, used when `template` is not set.
    pub template_path: Option<PathBuf>,
    pub create_branch: bool,
}
