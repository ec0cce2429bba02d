use std::sync::Arc;

use tokio::task::JoinSet;
use tracing::{info, instrument, warn};

use crate::aggregator::ReleaseCandidate;
use crate::github::types::Release;
use crate::github::{GitHubError, RepositoryHost, Result};

/// A submitted release and what became of it.
#[derive(Debug)]
pub struct ReleaseResult {
    pub release: Release,
    /// URL of the created release.
    pub outcome: Result<String>,
}

impl ReleaseResult {
    pub fn is_success(&self) -> bool {
        self.outcome.is_ok()
    }
}

impl Release {
    /// A release of `candidate` pointing at its newest unreleased commit.
    pub fn from_candidate(
        candidate: &ReleaseCandidate,
        version: impl Into<String>,
        body: impl Into<String>,
        create_branch: bool,
    ) -> Self {
        Self {
            repository: candidate.repository.name.clone(),
            version: version.into(),
            body: body.into(),
            target: candidate.head().map(|commit| commit.sha.clone()),
            create_branch,
        }
    }
}

/// Create the release, then the version branch once the release exists.
async fn publish_one<H: RepositoryHost + ?Sized>(host: &H, owner: &str, release: &Release) -> Result<String> {
    let published = host
        .create_release(owner, release)
        .await
        .map_err(|e| e.for_repository(format!("create release {}", release.version), owner, &release.repository))?;

    if release.create_branch {
        if let Some(target) = &release.target {
            host.create_branch(owner, &release.repository, &release.version, target)
                .await
                .map_err(|e| e.for_repository(format!("create branch {}", release.version), owner, &release.repository))?;
        }
    }

    Ok(published.html_url)
}

/// Create every release concurrently. Results arrive in completion order and
/// one failure never affects the others. Every release gets a result, even
/// when its task dies.
#[instrument(skip_all, fields(%owner, releases = releases.len()))]
pub async fn publish_releases<H: RepositoryHost + 'static>(
    host: Arc<H>,
    owner: &str,
    releases: Vec<Release>,
) -> Vec<ReleaseResult> {
    let mut unfinished = releases.clone();
    let mut tasks = JoinSet::new();
    for release in releases {
        let host = Arc::clone(&host);
        let owner = owner.to_string();
        tasks.spawn(async move {
            let outcome = publish_one(host.as_ref(), &owner, &release).await;
            ReleaseResult { release, outcome }
        });
    }

    let mut results = Vec::with_capacity(tasks.len());
    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok(result) => {
                match &result.outcome {
                    Ok(url) => info!(repo = %result.release.repository, %url, "release created"),
                    Err(err) => warn!(repo = %result.release.repository, error = %err, "release failed"),
                }
                unfinished.retain(|release| release != &result.release);
                results.push(result);
            }
            Err(err) => warn!(error = %err, "release task failed"),
        }
    }

    results.extend(unfinished.into_iter().map(|release| {
        let outcome = Err(GitHubError::Task(format!(
            "release task for {} {} did not finish",
            release.repository, release.version
        )));
        ReleaseResult { release, outcome }
    }));

    results
}
