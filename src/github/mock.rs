//! In-memory [`RepositoryHost`] for tests.
//!
//! Serves repositories, tags, commit histories and organizations from memory,
//! paginated with a configurable page size, and can be told to fail an
//! endpoint, exhaust the rate limit once, or delay a repository.

use async_trait::async_trait;
use chrono::{Duration as ChronoDuration, Utc};
use reqwest::StatusCode;
use std::collections::{HashMap, HashSet};
use std::sync::Mutex;
use std::time::Duration;

use super::error::{GitHubError, Result};
use super::host::RepositoryHost;
use super::types::{
    Account, Branch, Commit, CommitDetail, CommitRef, Organization, OrganizationSummary, Owner,
    PageRequest, PublishedRelease, RateLimit, Release, Repository, Response, Signature, Tag, User,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Endpoint {
    Repositories,
    Tags,
    Commits,
    Branches,
    Organizations,
    Organization,
    User,
}

pub fn repository(owner: &str, name: &str, default_branch: &str) -> Repository {
    Repository {
        name: name.to_string(),
        owner: Account {
            login: owner.to_string(),
            html_url: Some(format!("https://github.com/{}", owner)),
        },
        default_branch: Some(default_branch.to_string()),
        archived: false,
        is_template: false,
        description: Some(format!("The {} repository", name)),
        html_url: Some(format!("https://github.com/{}/{}", owner, name)),
    }
}

pub fn commit(sha: &str, message: &str) -> Commit {
    let signature = Signature {
        name: Some("Octo Cat".to_string()),
        email: Some("octocat@example.com".to_string()),
        date: Some(Utc::now()),
    };

    Commit {
        sha: sha.to_string(),
        html_url: Some(format!("https://github.com/acme/repo/commit/{}", sha)),
        commit: CommitDetail {
            message: message.to_string(),
            author: Some(signature.clone()),
            committer: Some(signature),
        },
        author: Some(Account {
            login: "octocat".to_string(),
            html_url: Some("https://github.com/octocat".to_string()),
        }),
        committer: None,
    }
}

pub fn tag(name: &str, sha: &str) -> Tag {
    Tag {
        name: name.to_string(),
        commit: CommitRef { sha: sha.to_string() },
    }
}

#[derive(Default)]
pub struct MockHost {
    page_size: usize,
    repositories: HashMap<String, Vec<Repository>>,
    default_branches: HashMap<String, String>,
    tags: HashMap<String, Vec<Tag>>,
    histories: HashMap<(String, String), Vec<Commit>>,
    empty: HashSet<String>,
    failures: HashSet<(Endpoint, String)>,
    exhausted: Mutex<HashSet<(Endpoint, String, u32)>>,
    delays: HashMap<String, Duration>,
    user: Option<User>,
    organizations: Vec<Organization>,
    rejected_releases: HashSet<String>,
    panicking_releases: HashSet<String>,
    requests: Mutex<Vec<String>>,
    releases: Mutex<Vec<Release>>,
    created_branches: Mutex<Vec<(String, String, String)>>,
}

impl MockHost {
    pub fn new() -> Self {
        Self {
            page_size: 100,
            ..Default::default()
        }
    }

    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    pub fn with_repository(mut self, repository: Repository) -> Self {
        if let Some(branch) = repository.default_branch() {
            self.default_branches
                .insert(repository.name.clone(), branch.to_string());
        }
        self.repositories
            .entry(repository.owner.login.clone())
            .or_default()
            .push(repository);
        self
    }

    pub fn with_tags(mut self, repo: &str, tags: Vec<Tag>) -> Self {
        self.tags.insert(repo.to_string(), tags);
        self
    }

    /// History of `branch`, newest first; commit messages are derived from the SHAs.
    pub fn with_history(mut self, repo: &str, branch: &str, shas: &[&str]) -> Self {
        let commits = shas
            .iter()
            .map(|sha| commit(sha, &format!("feat: change {}", sha)))
            .collect();
        self.histories
            .insert((repo.to_string(), branch.to_string()), commits);
        self
    }

    pub fn with_commits(mut self, repo: &str, branch: &str, commits: Vec<Commit>) -> Self {
        self.histories
            .insert((repo.to_string(), branch.to_string()), commits);
        self
    }

    /// The repository has no commits at all; GitHub answers 409 Conflict.
    pub fn with_empty_repository(mut self, repo: &str) -> Self {
        self.empty.insert(repo.to_string());
        self
    }

    /// Every request to `endpoint` for `name` answers 502.
    pub fn failing(mut self, endpoint: Endpoint, name: &str) -> Self {
        self.failures.insert((endpoint, name.to_string()));
        self
    }

    /// The first request for `page` of `endpoint`/`name` reports an exhausted rate limit.
    pub fn rate_limited_once(self, endpoint: Endpoint, name: &str, page: u32) -> Self {
        self.exhausted
            .lock()
            .unwrap()
            .insert((endpoint, name.to_string(), page));
        self
    }

    /// Tag requests for `repo` take this long to answer.
    pub fn with_delay(mut self, repo: &str, delay: Duration) -> Self {
        self.delays.insert(repo.to_string(), delay);
        self
    }

    pub fn with_user(mut self, login: &str) -> Self {
        self.user = Some(User {
            login: login.to_string(),
            bio: Some("Ships things".to_string()),
            html_url: Some(format!("https://github.com/{}", login)),
        });
        self
    }

    pub fn with_organization(mut self, login: &str, description: &str) -> Self {
        self.organizations.push(Organization {
            login: login.to_string(),
            description: Some(description.to_string()),
            html_url: Some(format!("https://github.com/{}", login)),
        });
        self
    }

    /// Creating a release in `repo` fails with 422.
    pub fn rejecting_release(mut self, repo: &str) -> Self {
        self.rejected_releases.insert(repo.to_string());
        self
    }

    /// Creating a release in `repo` panics, as a bug in a host would.
    pub fn panicking_release(mut self, repo: &str) -> Self {
        self.panicking_releases.insert(repo.to_string());
        self
    }

    /// Requests served so far, as `endpoint:name:page` strings.
    pub fn requests(&self) -> Vec<String> {
        self.requests.lock().unwrap().clone()
    }

    pub fn releases(&self) -> Vec<Release> {
        self.releases.lock().unwrap().clone()
    }

    pub fn created_branches(&self) -> Vec<(String, String, String)> {
        self.created_branches.lock().unwrap().clone()
    }

    fn intercept<T: Default>(&self, endpoint: Endpoint, name: &str, page: u32) -> Option<Response<T>> {
        self.requests
            .lock()
            .unwrap()
            .push(format!("{:?}:{}:{}", endpoint, name, page));

        if self
            .exhausted
            .lock()
            .unwrap()
            .remove(&(endpoint, name.to_string(), page))
        {
            let mut response = Response::with_status(StatusCode::FORBIDDEN, "API rate limit exceeded");
            response.rate = RateLimit {
                remaining: Some(0),
                reset_at: Some(Utc::now() + ChronoDuration::seconds(60)),
            };
            return Some(response);
        }

        if self.failures.contains(&(endpoint, name.to_string())) {
            return Some(Response::with_status(StatusCode::BAD_GATEWAY, "Server Error"));
        }

        None
    }

    fn paginate<T: Clone>(&self, items: &[T], page: PageRequest) -> Response<Vec<T>> {
        let start = (page.page.max(1) as usize - 1) * self.page_size;
        let end = (start + self.page_size).min(items.len());

        let mut response = Response::ok(items.get(start..end).map(<[T]>::to_vec).unwrap_or_default());
        response.rate.remaining = Some(4999);
        if end < items.len() {
            response.next_page = Some(page.page + 1);
        }
        response
    }

    fn branches_of(&self, repo: &str) -> Vec<Branch> {
        let mut branches: Vec<Branch> = self
            .histories
            .iter()
            .filter(|((name, _), _)| name == repo)
            .map(|((_, branch), commits)| Branch {
                name: branch.clone(),
                commit: CommitRef {
                    sha: commits.first().map(|c| c.sha.clone()).unwrap_or_default(),
                },
            })
            .collect();
        branches.sort_by(|a, b| a.name.cmp(&b.name));
        branches
    }
}

#[async_trait]
impl RepositoryHost for MockHost {
    async fn list_repositories(
        &self,
        owner: &Owner,
        page: PageRequest,
    ) -> Result<Response<Vec<Repository>>> {
        if let Some(response) = self.intercept(Endpoint::Repositories, owner.login(), page.page) {
            return Ok(response);
        }

        match self.repositories.get(owner.login()) {
            Some(repositories) => Ok(self.paginate(repositories, page)),
            None => Ok(Response::with_status(StatusCode::NOT_FOUND, "Not Found")),
        }
    }

    async fn list_tags(&self, _owner: &str, repo: &str, page: PageRequest) -> Result<Response<Vec<Tag>>> {
        if let Some(delay) = self.delays.get(repo) {
            tokio::time::sleep(*delay).await;
        }
        if let Some(response) = self.intercept(Endpoint::Tags, repo, page.page) {
            return Ok(response);
        }

        let tags = self.tags.get(repo).cloned().unwrap_or_default();
        Ok(self.paginate(&tags, page))
    }

    async fn list_commits(
        &self,
        _owner: &str,
        repo: &str,
        branch: Option<&str>,
        page: PageRequest,
    ) -> Result<Response<Vec<Commit>>> {
        if let Some(response) = self.intercept(Endpoint::Commits, repo, page.page) {
            return Ok(response);
        }

        if self.empty.contains(repo) {
            return Ok(Response::with_status(StatusCode::CONFLICT, "Git Repository is empty."));
        }

        let branch = branch.or_else(|| self.default_branches.get(repo).map(String::as_str));
        let history = branch.and_then(|b| self.histories.get(&(repo.to_string(), b.to_string())));

        match history {
            Some(commits) => Ok(self.paginate(commits, page)),
            None => Ok(Response::with_status(StatusCode::NOT_FOUND, "Branch not found")),
        }
    }

    async fn list_branches(
        &self,
        _owner: &str,
        repo: &str,
        page: PageRequest,
    ) -> Result<Response<Vec<Branch>>> {
        if let Some(response) = self.intercept(Endpoint::Branches, repo, page.page) {
            return Ok(response);
        }

        Ok(self.paginate(&self.branches_of(repo), page))
    }

    async fn list_organizations(&self, page: PageRequest) -> Result<Response<Vec<OrganizationSummary>>> {
        if let Some(response) = self.intercept(Endpoint::Organizations, "", page.page) {
            return Ok(response);
        }

        let summaries: Vec<OrganizationSummary> = self
            .organizations
            .iter()
            .map(|org| OrganizationSummary {
                login: org.login.clone(),
            })
            .collect();
        Ok(self.paginate(&summaries, page))
    }

    async fn get_organization(&self, login: &str) -> Result<Response<Option<Organization>>> {
        if let Some(response) = self.intercept(Endpoint::Organization, login, 1) {
            return Ok(response);
        }

        match self.organizations.iter().find(|org| org.login == login) {
            Some(org) => Ok(Response::ok(Some(org.clone()))),
            None => Ok(Response::with_status(StatusCode::NOT_FOUND, "Not Found")),
        }
    }

    async fn current_user(&self) -> Result<Response<Option<User>>> {
        if let Some(response) = self.intercept(Endpoint::User, "", 1) {
            return Ok(response);
        }

        match &self.user {
            Some(user) => Ok(Response::ok(Some(user.clone()))),
            None => Ok(Response::with_status(StatusCode::UNAUTHORIZED, "Bad credentials")),
        }
    }

    async fn create_release(&self, owner: &str, release: &Release) -> Result<PublishedRelease> {
        if self.panicking_releases.contains(&release.repository) {
            panic!("release host crashed on {}", release.repository);
        }
        if self.rejected_releases.contains(&release.repository) {
            return Err(GitHubError::Api {
                status: StatusCode::UNPROCESSABLE_ENTITY,
                message: "Validation Failed".to_string(),
            });
        }

        self.releases.lock().unwrap().push(release.clone());
        Ok(PublishedRelease {
            html_url: format!(
                "https://github.com/{}/{}/releases/tag/{}",
                owner, release.repository, release.version
            ),
        })
    }

    async fn create_branch(&self, owner: &str, repo: &str, branch: &str, sha: &str) -> Result<()> {
        self.created_branches.lock().unwrap().push((
            format!("{}/{}", owner, repo),
            branch.to_string(),
            sha.to_string(),
        ));
        Ok(())
    }
}
