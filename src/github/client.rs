use async_trait::async_trait;
use octocrab::Octocrab;
use reqwest::header::{self, HeaderMap, HeaderValue};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::json;
use tracing::debug;

use super::error::{GitHubError, Result};
use super::host::RepositoryHost;
use super::types::{
    Branch, Commit, Organization, OrganizationSummary, Owner, PageRequest, PublishedRelease,
    RateLimit, Release, Repository, Response, Tag, User,
};

const PUBLIC_API_URL: &str = "https://api.github.com";

/// Body GitHub sends with error statuses.
#[derive(Deserialize)]
struct ErrorBody {
    message: String,
}

/// API root for a GitHub host; Enterprise servers live under `/api/v3`.
pub fn api_url_for_host(host: &str) -> String {
    match host.trim().trim_end_matches('/') {
        "" | "github.com" | "api.github.com" => PUBLIC_API_URL.to_string(),
        enterprise => format!("https://{}/api/v3", enterprise),
    }
}

/// Next page number from a `Link` header.
///
/// GitHub Link headers look like:
/// `<https://api.github.com/organizations/123/repos?per_page=100&page=2>; rel="next", <...&page=3>; rel="last"`
pub fn next_page_from_link(link_header: &str) -> Option<u32> {
    link_header.split(',').find_map(|part| {
        let mut url = None;
        let mut is_next = false;

        for segment in part.split(';').map(str::trim) {
            if let Some(inner) = segment.strip_prefix('<').and_then(|s| s.strip_suffix('>')) {
                url = Some(inner);
            } else if let Some(rel) = segment.strip_prefix("rel=") {
                is_next = rel.trim_matches('"') == "next";
            }
        }

        if !is_next {
            return None;
        }

        let (_, query) = url?.split_once('?')?;
        query
            .split('&')
            .find_map(|param| param.strip_prefix("page="))
            .and_then(|page| page.parse().ok())
    })
}

#[derive(Debug, Default)]
pub struct GitHubClientBuilder {
    api_url: Option<String>,
    token: Option<String>,
}

impl GitHubClientBuilder {
    /// `github.com` or a GitHub Enterprise hostname.
    pub fn host(mut self, host: &str) -> Self {
        self.api_url = Some(api_url_for_host(host));
        self
    }

    /// Explicit API root, e.g. a test server.
    pub fn api_url(mut self, url: impl Into<String>) -> Self {
        self.api_url = Some(url.into());
        self
    }

    pub fn token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    pub fn build(self) -> Result<GitHubClient> {
        let token = self
            .token
            .filter(|t| !t.trim().is_empty())
            .ok_or(GitHubError::MissingToken)?;
        let api_url = self
            .api_url
            .unwrap_or_else(|| PUBLIC_API_URL.to_string())
            .trim_end_matches('/')
            .to_string();

        let mut headers = HeaderMap::new();
        let mut authorization = HeaderValue::from_str(&format!("Bearer {}", token))?;
        authorization.set_sensitive(true);
        headers.insert(header::AUTHORIZATION, authorization);
        headers.insert(
            header::ACCEPT,
            HeaderValue::from_static("application/vnd.github+json"),
        );

        let http = reqwest::Client::builder()
            .user_agent(concat!("releaser/", env!("CARGO_PKG_VERSION")))
            .default_headers(headers)
            .build()?;

        let octocrab = Octocrab::builder()
            .personal_token(token)
            .base_uri(api_url.as_str())?
            .build()?;

        Ok(GitHubClient {
            http,
            octocrab,
            api_url,
        })
    }
}

/// GitHub REST client.
///
/// Reads go through reqwest so every response keeps its status, `Link`
/// cursor and rate limit headers. Writes go through octocrab.
pub struct GitHubClient {
    http: reqwest::Client,
    octocrab: Octocrab,
    api_url: String,
}

impl GitHubClient {
    pub fn builder() -> GitHubClientBuilder {
        GitHubClientBuilder::default()
    }

    async fn get<T>(&self, path: &str, query: &[(&str, String)]) -> Result<Response<T>>
    where
        T: DeserializeOwned + Default,
    {
        let url = format!("{}{}", self.api_url, path);
        let response = self.http.get(&url).query(query).send().await?;

        let status = response.status();
        let rate = RateLimit::from_headers(response.headers());
        let next_page = response
            .headers()
            .get(header::LINK)
            .and_then(|v| v.to_str().ok())
            .and_then(next_page_from_link);

        debug!(%url, %status, remaining = ?rate.remaining, "GitHub GET");

        if !status.is_success() {
            let message = response.json::<ErrorBody>().await.ok().map(|b| b.message);
            return Ok(Response {
                status,
                payload: T::default(),
                next_page: None,
                rate,
                message,
            });
        }

        Ok(Response {
            status,
            payload: response.json::<T>().await?,
            next_page,
            rate,
            message: None,
        })
    }
}

#[async_trait]
impl RepositoryHost for GitHubClient {
    async fn list_repositories(
        &self,
        owner: &Owner,
        page: PageRequest,
    ) -> Result<Response<Vec<Repository>>> {
        let mut query = page.query();
        query.push(("sort", "updated".to_string()));

        let path = match owner {
            Owner::Organization(org) => format!("/orgs/{}/repos", org),
            Owner::User(user) => {
                query.push(("type", "owner".to_string()));
                format!("/users/{}/repos", user)
            }
            Owner::AuthenticatedUser(_) => {
                query.push(("affiliation", "owner".to_string()));
                "/user/repos".to_string()
            }
        };

        self.get(&path, &query).await
    }

    async fn list_tags(&self, owner: &str, repo: &str, page: PageRequest) -> Result<Response<Vec<Tag>>> {
        self.get(&format!("/repos/{}/{}/tags", owner, repo), &page.query())
            .await
    }

    async fn list_commits(
        &self,
        owner: &str,
        repo: &str,
        branch: Option<&str>,
        page: PageRequest,
    ) -> Result<Response<Vec<Commit>>> {
        let mut query = page.query();
        if let Some(branch) = branch {
            query.push(("sha", branch.to_string()));
        }

        self.get(&format!("/repos/{}/{}/commits", owner, repo), &query)
            .await
    }

    async fn list_branches(
        &self,
        owner: &str,
        repo: &str,
        page: PageRequest,
    ) -> Result<Response<Vec<Branch>>> {
        self.get(&format!("/repos/{}/{}/branches", owner, repo), &page.query())
            .await
    }

    async fn list_organizations(&self, page: PageRequest) -> Result<Response<Vec<OrganizationSummary>>> {
        self.get("/user/orgs", &page.query()).await
    }

    async fn get_organization(&self, login: &str) -> Result<Response<Option<Organization>>> {
        self.get(&format!("/orgs/{}", login), &[]).await
    }

    async fn current_user(&self) -> Result<Response<Option<User>>> {
        self.get("/user", &[]).await
    }

    async fn create_release(&self, owner: &str, release: &Release) -> Result<PublishedRelease> {
        let route = format!("{}/repos/{}/{}/releases", self.api_url, owner, release.repository);
        let mut body = json!({
            "tag_name": release.version,
            "name": release.version,
            "body": release.body,
        });
        if let Some(target) = &release.target {
            body["target_commitish"] = json!(target);
        }

        let published: PublishedRelease = self.octocrab.post(route, Some(&body)).await?;
        Ok(published)
    }

    async fn create_branch(&self, owner: &str, repo: &str, branch: &str, sha: &str) -> Result<()> {
        let route = format!("{}/repos/{}/{}/git/refs", self.api_url, owner, repo);
        let body = json!({
            "ref": format!("refs/heads/{}", branch),
            "sha": sha,
        });

        let _created: serde_json::Value = self.octocrab.post(route, Some(&body)).await?;
        Ok(())
    }
}
