//! Page walking over GitHub collection endpoints.
//!
//! Every request goes through [`send_with_backoff`]: when a response reports
//! zero remaining requests the same request is reissued after the rate limit
//! window resets, so no page is skipped or fetched twice. Sleeps are bounded
//! by an optional deadline; a reset past the deadline fails with
//! [`GitHubError::RateLimited`] instead of sleeping through it.

use std::future::Future;

use chrono::Utc;
use tokio::time::Instant;
use tracing::{debug, warn};

use super::error::{GitHubError, Result};
use super::types::{PageRequest, RateLimit, Response};

/// Send `request`, retrying it after the rate limit resets if it was exhausted.
pub async fn send_with_backoff<T, F, Fut>(deadline: Option<Instant>, mut request: F) -> Result<Response<T>>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<Response<T>>>,
{
    loop {
        let response = request().await?;
        if !response.rate.is_exhausted() {
            return Ok(response);
        }

        wait_for_reset(&response.rate, deadline).await?;
    }
}

async fn wait_for_reset(rate: &RateLimit, deadline: Option<Instant>) -> Result<()> {
    let wait = rate.until_reset();

    if let Some(deadline) = deadline {
        if Instant::now() + wait > deadline {
            return Err(GitHubError::RateLimited {
                reset_at: rate.reset_at.unwrap_or_else(Utc::now),
            });
        }
    }

    warn!(wait_secs = wait.as_secs(), "GitHub rate limit exhausted, waiting for reset");
    tokio::time::sleep(wait).await;
    Ok(())
}

/// Cursor over a paginated endpoint, starting at page 1 with 100 items per page.
pub struct Pages<F> {
    request: F,
    next: Option<u32>,
    deadline: Option<Instant>,
}

impl<F> Pages<F> {
    pub fn new(deadline: Option<Instant>, request: F) -> Self {
        Self {
            request,
            next: Some(1),
            deadline,
        }
    }
}

impl<F, Fut, T> Pages<F>
where
    F: FnMut(PageRequest) -> Fut,
    Fut: Future<Output = Result<Response<Vec<T>>>>,
{
    /// The next raw response, whatever its status. `None` once the server
    /// stopped pointing at a next page.
    pub async fn next_response(&mut self) -> Result<Option<Response<Vec<T>>>> {
        let Some(page) = self.next else {
            return Ok(None);
        };

        let request = &mut self.request;
        let response = send_with_backoff(self.deadline, || request(PageRequest::new(page))).await?;

        self.next = response.next_page.filter(|next| *next != 0);
        debug!(page, items = response.payload.len(), next = ?self.next, "fetched page");

        Ok(Some(response))
    }

    /// Items of the next page; a non-2xx status is an error.
    ///
    /// An empty page is not the end: only the missing next-page pointer is.
    pub async fn next_page(&mut self) -> Result<Option<Vec<T>>> {
        match self.next_response().await? {
            Some(response) => Ok(Some(response.error_for_status()?.payload)),
            None => Ok(None),
        }
    }
}

/// Every item of every page, in page order.
pub async fn fetch_all<T, F, Fut>(deadline: Option<Instant>, request: F) -> Result<Vec<T>>
where
    F: FnMut(PageRequest) -> Fut,
    Fut: Future<Output = Result<Response<Vec<T>>>>,
{
    let mut pages = Pages::new(deadline, request);
    let mut items = Vec::new();

    while let Some(page) = pages.next_page().await? {
        items.extend(page);
    }

    Ok(items)
}

/// A single resource, with the same rate limit handling as pages.
pub async fn fetch_one<T, F, Fut>(deadline: Option<Instant>, what: &str, request: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<Response<Option<T>>>>,
{
    send_with_backoff(deadline, request)
        .await?
        .error_for_status()?
        .payload
        .ok_or_else(|| GitHubError::EmptyBody(what.to_string()))
}
