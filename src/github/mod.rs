pub mod client;
pub mod error;
pub mod host;
#[cfg(test)]
pub mod mock;
pub mod pagination;
pub mod types;

pub use client::GitHubClient;
pub use error::{GitHubError, Result};
pub use host::RepositoryHost;
pub use types::{Owner, Release, Repository};
