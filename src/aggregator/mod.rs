pub mod candidates;
pub mod classifier;
pub mod organizations;

use serde::Serialize;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::task::{JoinError, JoinSet};
use tokio::time::Instant;
use tracing::warn;

use crate::github::pagination::fetch_one;
use crate::github::types::{Branch, Commit, Owner, Repository, Tag};
use crate::github::{GitHubError, RepositoryHost, Result};

pub use candidates::CandidateScan;
pub use classifier::Classifier;
pub use organizations::{OrganizationEntry, OrganizationScan};

/// A repository with commits newer than its latest tag.
#[derive(Debug, Clone, Serialize)]
pub struct ReleaseCandidate {
    pub repository: Repository,
    /// Branch the commits were read from.
    pub branch: String,
    pub latest_tag: Option<Tag>,
    /// Unreleased commits, newest first.
    pub commits: Vec<Commit>,
    pub branches: Vec<Branch>,
    /// Progress total when this candidate was sent.
    pub total: usize,
}

impl ReleaseCandidate {
    pub fn previous_version(&self) -> Option<&str> {
        self.latest_tag.as_ref().map(|t| t.name.as_str())
    }

    /// Newest unreleased commit; what a new release should point at.
    pub fn head(&self) -> Option<&Commit> {
        self.commits.first()
    }
}

/// Running count of items a scan expects to emit.
///
/// Grows by a page's length when the page is listed and shrinks as items
/// turn out to have nothing to emit. Shared across tasks.
#[derive(Debug, Clone, Default)]
pub struct Progress(Arc<AtomicUsize>);

impl Progress {
    pub fn current(&self) -> usize {
        self.0.load(Ordering::Relaxed)
    }

    fn add(&self, count: usize) {
        self.0.fetch_add(count, Ordering::Relaxed);
    }

    fn remove_one(&self) {
        self.0.fetch_sub(1, Ordering::Relaxed);
    }
}

/// Entry point for organization-wide scans.
pub struct Aggregator<H> {
    host: Arc<H>,
    deadline: Option<Instant>,
}

impl<H> Clone for Aggregator<H> {
    fn clone(&self) -> Self {
        Self {
            host: Arc::clone(&self.host),
            deadline: self.deadline,
        }
    }
}

impl<H: RepositoryHost + 'static> Aggregator<H> {
    pub fn new(host: Arc<H>) -> Self {
        Self {
            host,
            deadline: None,
        }
    }

    /// Scans started from this aggregator stop at `deadline`, rate limit waits included.
    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(deadline);
        self
    }

    pub fn host(&self) -> &Arc<H> {
        &self.host
    }

    /// Whose repositories `name` refers to. With `user` set, `name` is a user
    /// account and is compared with the token's own login.
    pub async fn resolve_owner(&self, name: &str, user: bool) -> Result<Owner> {
        if !user {
            return Ok(Owner::Organization(name.to_string()));
        }

        let me = fetch_one(self.deadline, "the authenticated user", || self.host.current_user())
            .await
            .map_err(|e| e.during("get the authenticated user"))?;

        if me.login.eq_ignore_ascii_case(name) {
            Ok(Owner::AuthenticatedUser(me.login))
        } else {
            Ok(Owner::User(name.to_string()))
        }
    }
}

/// Outcome of one finished task; cancelled tasks don't count as failures.
fn settle(joined: std::result::Result<Result<()>, JoinError>) -> Result<()> {
    match joined {
        Ok(result) => result,
        Err(err) if err.is_cancelled() => Ok(()),
        Err(err) => Err(GitHubError::Task(err.to_string())),
    }
}

/// Collect results of tasks that already finished, failing on the first error.
fn settle_finished(tasks: &mut JoinSet<Result<()>>) -> Result<()> {
    while let Some(joined) = tasks.try_join_next() {
        settle(joined)?;
    }
    Ok(())
}

/// Wait for every task. The first failure, from the dispatcher or a task,
/// aborts the rest and is returned once the set is empty.
async fn join_all(tasks: &mut JoinSet<Result<()>>, dispatched: Result<()>) -> Result<()> {
    let mut first_error = dispatched.err();
    if first_error.is_some() {
        tasks.abort_all();
    }

    while let Some(joined) = tasks.join_next().await {
        if let Err(err) = settle(joined) {
            if first_error.is_none() {
                warn!(error = %err, "task failed, cancelling the rest of the scan");
                tasks.abort_all();
                first_error = Some(err);
            }
        }
    }

    match first_error {
        Some(err) => Err(err),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::github::mock::MockHost;

    #[test]
    fn progress_is_shared_between_clones() {
        let progress = Progress::default();
        let other = progress.clone();

        progress.add(3);
        other.remove_one();

        assert_eq!(progress.current(), 2);
        assert_eq!(other.current(), 2);
    }

    #[tokio::test]
    async fn resolves_owner_kinds() {
        let aggregator = Aggregator::new(Arc::new(MockHost::new().with_user("Octocat")));

        assert_eq!(
            aggregator.resolve_owner("acme", false).await.unwrap(),
            Owner::Organization("acme".to_string())
        );
        assert_eq!(
            aggregator.resolve_owner("octocat", true).await.unwrap(),
            Owner::AuthenticatedUser("Octocat".to_string())
        );
        assert_eq!(
            aggregator.resolve_owner("hubot", true).await.unwrap(),
            Owner::User("hubot".to_string())
        );
    }

    #[tokio::test]
    async fn resolving_a_user_needs_valid_credentials() {
        let aggregator = Aggregator::new(Arc::new(MockHost::new()));

        let err = aggregator.resolve_owner("octocat", true).await.unwrap_err();

        assert_eq!(err.to_string(), "failed to get the authenticated user");
    }

    #[tokio::test]
    async fn panicking_task_is_reported() {
        let mut tasks: JoinSet<Result<()>> = JoinSet::new();
        tasks.spawn(async { panic!("classifier bug") });

        let err = join_all(&mut tasks, Ok(())).await.unwrap_err();

        assert!(matches!(err, GitHubError::Task(_)), "{err}");
    }
}
