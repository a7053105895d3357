//! Hosting-provider content API clients.
//!
//! Only GitHub's contents endpoints are consumed: read a file's blob SHA and
//! content at a ref, and create or update a file with one commit per call.

pub mod github;
pub mod types;

pub use github::GitHubContentsClient;
pub use types::{PutOutcome, RemoteFile};

use crate::errors::{GitChangeEngineConfigError, GitChangeEngineResult};

/// Default REST base for github.com.
pub const DEFAULT_GITHUB_API: &str = "https://api.github.com";

/// Runtime configuration for the contents client.
#[derive(Debug, Clone)]
pub struct ProviderConfig {
    /// API base, e.g. "https://api.github.com".
    pub base_api: String,
    /// Access token (PAT or app token), sent as a bearer token.
    pub token: String,
    /// Target repository as `owner/repo`.
    pub repo: String,
    /// Branch updated by content pushes.
    pub branch: String,
}

impl ProviderConfig {
    /// Reads `GITHUB_TOKEN`, `GITHUB_REPO`, `GITHUB_API_BASE` and `GITHUB_BRANCH`.
    pub fn from_env() -> GitChangeEngineResult<Self> {
        let var = |name: &str| std::env::var(name).ok().filter(|v| !v.trim().is_empty());

        let token = var("GITHUB_TOKEN").ok_or(GitChangeEngineConfigError::MissingToken)?;
        let repo = var("GITHUB_REPO")
            .ok_or_else(|| GitChangeEngineConfigError::InvalidRepo(String::new()))?;
        let base_api = var("GITHUB_API_BASE").unwrap_or_else(|| DEFAULT_GITHUB_API.to_string());
        let branch = var("GITHUB_BRANCH").unwrap_or_else(|| "main".to_string());

        let cfg = Self {
            base_api,
            token,
            repo,
            branch,
        };
        cfg.validate()?;
        Ok(cfg)
    }

    /// Checks the base URL scheme and the `owner/repo` shape.
    pub fn validate(&self) -> GitChangeEngineResult<()> {
        if !(self.base_api.starts_with("http://") || self.base_api.starts_with("https://")) {
            return Err(GitChangeEngineConfigError::InvalidBaseUrl(self.base_api.clone()).into());
        }
        if self.token.trim().is_empty() {
            return Err(GitChangeEngineConfigError::MissingToken.into());
        }
        github::split_owner_repo(&self.repo)?;
        Ok(())
    }
}
