use async_trait::async_trait;

use super::error::Result;
use super::types::{
    Branch, Commit, Organization, OrganizationSummary, Owner, PageRequest, PublishedRelease,
    Release, Repository, Response, Tag, User,
};

/// The REST surface release discovery and publishing need.
///
/// Read calls return `Err` only for transport failures; every HTTP answer,
/// including 404 and 409, comes back as a [`Response`] so callers can decide
/// which statuses are recoverable. Implementations are shared across tasks.
#[async_trait]
pub trait RepositoryHost: Send + Sync {
    async fn list_repositories(
        &self,
        owner: &Owner,
        page: PageRequest,
    ) -> Result<Response<Vec<Repository>>>;

    async fn list_tags(&self, owner: &str, repo: &str, page: PageRequest)
        -> Result<Response<Vec<Tag>>>;

    /// Commits reachable from `branch` (the default branch when `None`), newest first.
    async fn list_commits(
        &self,
        owner: &str,
        repo: &str,
        branch: Option<&str>,
        page: PageRequest,
    ) -> Result<Response<Vec<Commit>>>;

    async fn list_branches(
        &self,
        owner: &str,
        repo: &str,
        page: PageRequest,
    ) -> Result<Response<Vec<Branch>>>;

    /// Organizations the authenticated user belongs to.
    async fn list_organizations(&self, page: PageRequest)
        -> Result<Response<Vec<OrganizationSummary>>>;

    async fn get_organization(&self, login: &str) -> Result<Response<Option<Organization>>>;

    async fn current_user(&self) -> Result<Response<Option<User>>>;

    async fn create_release(&self, owner: &str, release: &Release) -> Result<PublishedRelease>;

    async fn create_branch(&self, owner: &str, repo: &str, branch: &str, sha: &str) -> Result<()>;
}
