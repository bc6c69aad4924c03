//! Source-control connectors.
//!
//! A connector validates a repository reference, fetches its metadata and
//! pulls a given branch/commit into a fresh working directory.

mod github;

use async_trait::async_trait;
use thiserror::Error;

use crate::error::StageError;
use crate::model::PulledRepoInfo;

pub use github::{GithubConnector, lint_url};

/// Repository metadata gathered by [`Connector::metadata`].
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RepoMetadata {
    pub description: String,
    pub default_branch: String,
    pub branches: Vec<String>,
    pub tags: Vec<String>,
    pub releases: Vec<String>,
}

#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConnectorError {
    #[error("invalid url, check if the url is correct or if the repo is not private")]
    InvalidUrl,
    #[error("invalid url, missing repository name")]
    MissingRepoName,
    #[error("invalid url, missing username")]
    MissingUsername,
    #[error("unauthorized access")]
    Unauthorized,
    #[error("empty token")]
    EmptyToken,
    #[error("branch {0} not found")]
    BranchNotFound(String),
    #[error("commit {0} not found")]
    CommitNotFound(String),
    #[error("github api rate limit exceeded")]
    RateLimited,
    #[error("source control api: {0}")]
    Api(String),
    #[error("git: {0}")]
    Git(String),
    #[error("io: {0}")]
    Io(String),
}

impl ConnectorError {
    pub fn as_label(&self) -> &'static str {
        match self {
            ConnectorError::InvalidUrl => "connector_invalid_url",
            ConnectorError::MissingRepoName => "connector_missing_repo_name",
            ConnectorError::MissingUsername => "connector_missing_username",
            ConnectorError::Unauthorized => "connector_unauthorized",
            ConnectorError::EmptyToken => "connector_empty_token",
            ConnectorError::BranchNotFound(_) => "connector_branch_not_found",
            ConnectorError::CommitNotFound(_) => "connector_commit_not_found",
            ConnectorError::RateLimited => "connector_rate_limited",
            ConnectorError::Api(_) => "connector_api",
            ConnectorError::Git(_) => "connector_git",
            ConnectorError::Io(_) => "connector_io",
        }
    }

    /// True when the caller's input is at fault.
    pub fn is_user_fault(&self) -> bool {
        matches!(
            self,
            ConnectorError::InvalidUrl
                | ConnectorError::MissingRepoName
                | ConnectorError::MissingUsername
                | ConnectorError::Unauthorized
                | ConnectorError::EmptyToken
                | ConnectorError::BranchNotFound(_)
                | ConnectorError::CommitNotFound(_)
        )
    }
}

impl From<std::io::Error> for ConnectorError {
    fn from(e: std::io::Error) -> Self {
        ConnectorError::Io(e.to_string())
    }
}

impl From<reqwest::Error> for ConnectorError {
    fn from(e: reqwest::Error) -> Self {
        ConnectorError::Api(e.to_string())
    }
}

impl From<ConnectorError> for StageError {
    fn from(e: ConnectorError) -> Self {
        match e {
            ConnectorError::RateLimited => StageError::RateLimited(e.to_string()),
            e if e.is_user_fault() => StageError::Input(e.to_string()),
            e => StageError::Infrastructure(e.to_string()),
        }
    }
}

#[async_trait]
pub trait Connector: Send + Sync + 'static {
    /// Checks that `url` names an existing repository and returns its canonical URL.
    async fn validate_url(&self, url: &str, token: &str) -> Result<String, ConnectorError>;

    async fn metadata(&self, url: &str, token: &str) -> Result<RepoMetadata, ConnectorError>;

    /// Fetches `branch` (default branch when empty) at `commit` (head when empty
    /// or `latest`) into a new, never reused directory.
    async fn pull(
        &self,
        user_id: &str,
        branch: &str,
        url: &str,
        commit: &str,
        token: &str,
    ) -> Result<PulledRepoInfo, ConnectorError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classification() {
        assert_eq!(
            StageError::from(ConnectorError::RateLimited),
            StageError::RateLimited("github api rate limit exceeded".into())
        );
        assert!(matches!(
            StageError::from(ConnectorError::BranchNotFound("dev".into())),
            StageError::Input(ref m) if m == "branch dev not found"
        ));
        assert!(matches!(
            StageError::from(ConnectorError::Unauthorized),
            StageError::Input(_)
        ));
        assert!(matches!(
            StageError::from(ConnectorError::Api("502".into())),
            StageError::Infrastructure(_)
        ));
    }
}
