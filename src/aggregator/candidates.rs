//! Organization-wide release candidate scan.
//!
//! The driver walks the owner's repository pages and spawns one
//! classification task per repository as soon as its page arrives. Tasks
//! send their candidates through a capacity-1 channel, so a slow consumer
//! holds the whole scan back instead of letting results pile up.
//!
//! The first failure cancels every remaining task, and the channel closes
//! once the driver returns, whether it succeeded, failed or ran out of time.

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tokio::time::{timeout_at, Instant};
use tracing::{debug, info, instrument};

use super::classifier::Classifier;
use super::{join_all, settle_finished, Aggregator, Progress, ReleaseCandidate};
use crate::github::pagination::Pages;
use crate::github::types::{Owner, Repository};
use crate::github::{GitHubError, RepositoryHost, Result};

impl<H: RepositoryHost + 'static> Aggregator<H> {
    /// Start a scan of `owner`'s repositories.
    ///
    /// Nothing happens until [`CandidateScan::run`] is awaited; candidates
    /// arrive on the receiver while it runs.
    pub fn release_candidates(
        &self,
        owner: Owner,
        branch: Option<String>,
    ) -> (mpsc::Receiver<ReleaseCandidate>, CandidateScan<H>) {
        let (sender, receiver) = mpsc::channel(1);

        let scan = CandidateScan {
            host: Arc::clone(&self.host),
            owner,
            branch: branch.filter(|b| !b.is_empty()),
            deadline: self.deadline,
            sender,
            progress: Progress::default(),
        };

        (receiver, scan)
    }
}

pub struct CandidateScan<H> {
    host: Arc<H>,
    owner: Owner,
    branch: Option<String>,
    deadline: Option<Instant>,
    sender: mpsc::Sender<ReleaseCandidate>,
    progress: Progress,
}

impl<H: RepositoryHost + 'static> CandidateScan<H> {
    /// Handle on the expected candidate count. After `run` returns `Ok` it
    /// equals the number of candidates sent.
    pub fn progress(&self) -> Progress {
        self.progress.clone()
    }

    #[instrument(skip_all, fields(owner = %self.owner.login()))]
    pub async fn run(self) -> Result<()> {
        let deadline = self.deadline;
        match deadline {
            Some(deadline) => timeout_at(deadline, self.scan())
                .await
                .map_err(|_| GitHubError::DeadlineExceeded)?,
            None => self.scan().await,
        }
    }

    async fn scan(self) -> Result<()> {
        let mut tasks = JoinSet::new();

        let dispatched = self.dispatch(&mut tasks).await;
        join_all(&mut tasks, dispatched).await?;

        info!(candidates = self.progress.current(), "scan finished");
        Ok(())
    }

    async fn dispatch(&self, tasks: &mut JoinSet<Result<()>>) -> Result<()> {
        let host = self.host.as_ref();
        let owner = &self.owner;
        let mut pages = Pages::new(self.deadline, |page| host.list_repositories(owner, page));

        while let Some(repositories) = pages
            .next_page()
            .await
            .map_err(|e| e.during(format!("list repositories for {}", owner.login())))?
        {
            self.progress.add(repositories.len());
            debug!(
                repositories = repositories.len(),
                total = self.progress.current(),
                "dispatching page"
            );

            for repository in repositories {
                tasks.spawn(classify_and_send(
                    Arc::clone(&self.host),
                    owner.login().to_string(),
                    repository,
                    self.branch.clone(),
                    self.deadline,
                    self.progress.clone(),
                    self.sender.clone(),
                ));
            }

            settle_finished(tasks)?;
        }

        Ok(())
    }
}

async fn classify_and_send<H: RepositoryHost>(
    host: Arc<H>,
    owner: String,
    repository: Repository,
    branch: Option<String>,
    deadline: Option<Instant>,
    progress: Progress,
    sender: mpsc::Sender<ReleaseCandidate>,
) -> Result<()> {
    let classifier = Classifier::new(host.as_ref(), deadline);

    let Some(mut candidate) = classifier
        .classify(&owner, &repository, branch.as_deref())
        .await?
    else {
        progress.remove_one();
        return Ok(());
    };

    candidate.total = progress.current();
    if sender.send(candidate).await.is_err() {
        debug!(repo = %repository.full_name(), "receiver dropped, discarding candidate");
    }

    Ok(())
}
