use std::sync::Arc;

use serde::Serialize;
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tokio::time::{timeout_at, Instant};
use tracing::{debug, info, instrument};

use super::{join_all, settle_finished, Aggregator, Progress};
use crate::github::pagination::{fetch_one, Pages};
use crate::github::types::{Organization, User};
use crate::github::{GitHubError, RepositoryHost, Result};

/// An account whose repositories can be scanned.
#[derive(Debug, Clone, Serialize)]
pub struct OrganizationEntry {
    pub organization: Organization,
    /// The authenticated user's own account rather than an organization.
    pub personal: bool,
    pub total: usize,
}

impl From<User> for Organization {
    fn from(user: User) -> Self {
        Self {
            login: user.login,
            description: user.bio,
            html_url: user.html_url,
        }
    }
}

impl<H: RepositoryHost + 'static> Aggregator<H> {
    /// Start listing the authenticated user followed by every organization
    /// they belong to, with details.
    pub fn organizations(&self) -> (mpsc::Receiver<OrganizationEntry>, OrganizationScan<H>) {
        let (sender, receiver) = mpsc::channel(1);

        let scan = OrganizationScan {
            host: Arc::clone(&self.host),
            deadline: self.deadline,
            sender,
            progress: Progress::default(),
        };

        (receiver, scan)
    }
}

pub struct OrganizationScan<H> {
    host: Arc<H>,
    deadline: Option<Instant>,
    sender: mpsc::Sender<OrganizationEntry>,
    progress: Progress,
}

impl<H: RepositoryHost + 'static> OrganizationScan<H> {
    pub fn progress(&self) -> Progress {
        self.progress.clone()
    }

    #[instrument(skip_all)]
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
        let me = fetch_one(self.deadline, "the authenticated user", || self.host.current_user())
            .await
            .map_err(|e| e.during("get the authenticated user"))?;

        self.progress.add(1);
        let entry = OrganizationEntry {
            organization: me.into(),
            personal: true,
            total: self.progress.current(),
        };
        if self.sender.send(entry).await.is_err() {
            debug!("receiver dropped, discarding the user entry");
        }

        let mut tasks = JoinSet::new();
        let dispatched = self.dispatch(&mut tasks).await;
        join_all(&mut tasks, dispatched).await?;

        info!(organizations = self.progress.current() - 1, "organizations listed");
        Ok(())
    }

    async fn dispatch(&self, tasks: &mut JoinSet<Result<()>>) -> Result<()> {
        let host = self.host.as_ref();
        let mut pages = Pages::new(self.deadline, |page| host.list_organizations(page));

        while let Some(summaries) = pages
            .next_page()
            .await
            .map_err(|e| e.during("list organizations"))?
        {
            self.progress.add(summaries.len());

            for summary in summaries {
                tasks.spawn(describe_and_send(
                    Arc::clone(&self.host),
                    summary.login,
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

async fn describe_and_send<H: RepositoryHost>(
    host: Arc<H>,
    login: String,
    deadline: Option<Instant>,
    progress: Progress,
    sender: mpsc::Sender<OrganizationEntry>,
) -> Result<()> {
    let organization = fetch_one(deadline, "organization", || host.get_organization(&login))
        .await
        .map_err(|e| e.during(format!("get organization {}", login)))?;

    let entry = OrganizationEntry {
        organization,
        personal: false,
        total: progress.current(),
    };
    if sender.send(entry).await.is_err() {
        debug!(%login, "receiver dropped, discarding organization");
    }

    Ok(())
}
