use std::collections::hash_map::Entry;
use std::collections::HashMap;

use reqwest::StatusCode;
use tokio::time::Instant;
use tracing::{debug, instrument};

use super::ReleaseCandidate;
use crate::github::pagination::{fetch_all, Pages};
use crate::github::types::{Commit, Repository, Tag};
use crate::github::{GitHubError, RepositoryHost, Result};

/// Tags keyed by the commit they point at.
///
/// When several tags share a commit the lexicographically smallest name is kept,
/// so the result doesn't depend on the order GitHub lists tags in.
struct TagIndex(HashMap<String, Tag>);

impl TagIndex {
    fn new(tags: Vec<Tag>) -> Self {
        let mut by_sha: HashMap<String, Tag> = HashMap::with_capacity(tags.len());

        for tag in tags {
            match by_sha.entry(tag.commit.sha.clone()) {
                Entry::Occupied(mut existing) => {
                    if tag.name < existing.get().name {
                        existing.insert(tag);
                    }
                }
                Entry::Vacant(slot) => {
                    slot.insert(tag);
                }
            }
        }

        Self(by_sha)
    }

    fn get(&self, sha: &str) -> Option<&Tag> {
        self.0.get(sha)
    }
}

/// Commits newer than the most recent tag on a branch.
struct Unreleased {
    latest_tag: Option<Tag>,
    commits: Vec<Commit>,
}

/// Decides whether a single repository has something to release.
pub struct Classifier<'a, H: ?Sized> {
    host: &'a H,
    deadline: Option<Instant>,
}

impl<'a, H: RepositoryHost + ?Sized> Classifier<'a, H> {
    pub fn new(host: &'a H, deadline: Option<Instant>) -> Self {
        Self { host, deadline }
    }

    /// `Ok(None)` when the repository is a template, archived, has no default
    /// branch, or nothing was committed since its latest tag. An empty or
    /// unknown `branch` means the default branch.
    #[instrument(skip_all, fields(repo = %repository.full_name(), branch = ?branch))]
    pub async fn classify(
        &self,
        owner: &str,
        repository: &Repository,
        branch: Option<&str>,
    ) -> Result<Option<ReleaseCandidate>> {
        if repository.is_template {
            debug!("skipping template repository");
            return Ok(None);
        }

        if repository.archived {
            debug!("skipping archived repository");
            return Ok(None);
        }

        let Some(default_branch) = repository.default_branch() else {
            debug!("skipping repository without a default branch");
            return Ok(None);
        };

        let name = repository.name.as_str();
        let requested = branch.filter(|b| !b.is_empty());

        let tags = fetch_all(self.deadline, |page| self.host.list_tags(owner, name, page))
            .await
            .map_err(|e| e.for_repository("list tags", owner, name))?;
        let tags = TagIndex::new(tags);

        let (resolved, unreleased) = self
            .unreleased(owner, name, &tags, requested, default_branch)
            .await?;

        if unreleased.commits.is_empty() {
            debug!(latest_tag = ?unreleased.latest_tag.as_ref().map(|t| &t.name), "nothing new since latest tag");
            return Ok(None);
        }

        let branches = fetch_all(self.deadline, |page| self.host.list_branches(owner, name, page))
            .await
            .map_err(|e| e.for_repository("list branches", owner, name))?;

        let branch = resolved.unwrap_or(default_branch).to_string();
        debug!(%branch, commits = unreleased.commits.len(), "release candidate");

        Ok(Some(ReleaseCandidate {
            repository: repository.clone(),
            branch,
            latest_tag: unreleased.latest_tag,
            commits: unreleased.commits,
            branches,
            total: 0,
        }))
    }

    /// Walk the requested branch, or the default branch if it doesn't exist.
    /// Returns the branch that was walked, `None` meaning the default branch.
    async fn unreleased<'b>(
        &self,
        owner: &str,
        name: &str,
        tags: &TagIndex,
        requested: Option<&'b str>,
        default_branch: &str,
    ) -> Result<(Option<&'b str>, Unreleased)> {
        if let Some(branch) = requested {
            let walked = self
                .walk(owner, name, tags, Some(branch))
                .await
                .map_err(|e| e.for_repository(format!("list commits on {}", branch), owner, name))?;

            if let Some(unreleased) = walked {
                return Ok((Some(branch), unreleased));
            }
            debug!(branch, "branch not found, falling back to the default branch");
        }

        let walked = self
            .walk(owner, name, tags, None)
            .await
            .map_err(|e| e.for_repository(format!("list commits on {}", default_branch), owner, name))?;

        match walked {
            Some(unreleased) => Ok((None, unreleased)),
            None => Err(GitHubError::Api {
                status: StatusCode::NOT_FOUND,
                message: format!("default branch {} not found", default_branch),
            }
            .for_repository(format!("list commits on {}", default_branch), owner, name)),
        }
    }

    /// Newest-first walk that stops at the first tagged commit.
    /// `None` when GitHub doesn't know the branch.
    async fn walk(
        &self,
        owner: &str,
        name: &str,
        tags: &TagIndex,
        branch: Option<&str>,
    ) -> Result<Option<Unreleased>> {
        let mut pages = Pages::new(self.deadline, |page| {
            self.host.list_commits(owner, name, branch, page)
        });
        let mut commits = Vec::new();

        while let Some(response) = pages.next_response().await? {
            match response.status {
                StatusCode::NOT_FOUND => return Ok(None),
                // GitHub answers 409 for a repository without commits.
                StatusCode::CONFLICT => break,
                _ => {}
            }

            for commit in response.error_for_status()?.payload {
                if let Some(tag) = tags.get(&commit.sha) {
                    return Ok(Some(Unreleased {
                        latest_tag: Some(tag.clone()),
                        commits,
                    }));
                }
                commits.push(commit);
            }
        }

        Ok(Some(Unreleased {
            latest_tag: None,
            commits,
        }))
    }
}
