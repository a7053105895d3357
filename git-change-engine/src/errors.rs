//! Crate-wide error hierarchy for git-change-engine.

use project_code_store::{ConcatError, GitStoreError, PathError};
use serde::Serialize;
use thiserror::Error;

/// Convenient alias for crate-wide results.
pub type GitChangeEngineResult<T> = Result<T, GitChangeEngineError>;

/// Root error type for the git-change-engine crate.
#[derive(Debug, Error)]
pub enum GitChangeEngineError {
    /// Hosting-provider content API failure.
    #[error(transparent)]
    Provider(#[from] GitChangeEngineProviderError),

    /// The source tree could not be serialized.
    #[error(transparent)]
    Concat(#[from] ConcatError),

    /// Local clone/commit failure.
    #[error(transparent)]
    Store(#[from] GitStoreError),

    /// Configuration problems (bad/missing tokens, base URL, repo id).
    #[error(transparent)]
    Config(#[from] GitChangeEngineConfigError),

    /// Input validation errors.
    #[error("validation error: {0}")]
    Validation(String),
}

/// Provider-specific error used inside the provider layer.
#[derive(Debug, Error)]
pub enum GitChangeEngineProviderError {
    /// Unauthorized (HTTP 401).
    #[error("unauthorized")]
    Unauthorized,

    /// Forbidden (HTTP 403).
    #[error("forbidden")]
    Forbidden,

    /// Not found (HTTP 404).
    #[error("not found")]
    NotFound,

    /// Blob SHA did not match the branch head (HTTP 409).
    #[error("conflict: remote file changed since it was read")]
    Conflict,

    /// Rate limited (HTTP 429).
    #[error("rate limited")]
    RateLimited {
        /// Optional `Retry-After` hint in seconds when available.
        retry_after_secs: Option<u64>,
    },

    /// Gateway / server error (HTTP 5xx).
    #[error("server error: status {0}")]
    Server(u16),

    /// Other HTTP status (non-2xx) not covered by specific variants.
    #[error("http status error: status {0}")]
    HttpStatus(u16),

    /// Timeout at transport level.
    #[error("timeout")]
    Timeout,

    /// Network/transport failure without HTTP status (DNS/connect/reset).
    #[error("network error: {0}")]
    Network(String),

    /// Unexpected/invalid shape of provider response.
    #[error("invalid provider response: {0}")]
    InvalidResponse(String),
}

/// Configuration and setup errors.
#[derive(Debug, Error)]
pub enum GitChangeEngineConfigError {
    /// Missing required provider access token.
    #[error("missing provider token")]
    MissingToken,

    /// Invalid base API URL.
    #[error("invalid base api url: {0}")]
    InvalidBaseUrl(String),

    /// Repository id not in `owner/repo` form.
    #[error("invalid repository id '{0}', expected 'owner/repo'")]
    InvalidRepo(String),
}

/// Why a single file change could not be turned into new file content.
#[derive(Debug, Error)]
pub enum ApplyError {
    #[error(transparent)]
    Path(#[from] PathError),

    #[error("invalid patch: {0}")]
    InvalidPatch(String),

    #[error("patch does not apply: {0}")]
    PatchRejected(String),

    #[error("file is not valid UTF-8")]
    NotUtf8,

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// A reply record the parser could not turn into a change.
///
/// Records parsed before and after an issue are preserved.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ParseIssue {
    /// `diff --git` header without a usable path token.
    #[error("line {line}: malformed diff header `{header}`")]
    MalformedHeader { line: usize, header: String },

    /// Opening fence without a path label.
    #[error("line {line}: code block has no file path label")]
    MissingPath { line: usize },

    /// Opening fence never closed before end of reply.
    #[error("line {line}: code block for `{path}` is not terminated")]
    UnterminatedBlock { line: usize, path: String },
}

// ===== Conversions for `?` ergonomics at the crate root =====

impl From<reqwest::Error> for GitChangeEngineError {
    fn from(e: reqwest::Error) -> Self {
        GitChangeEngineError::Provider(GitChangeEngineProviderError::from(e))
    }
}

// ===== Mapping from reqwest::Error into GitChangeEngineProviderError =====

impl From<reqwest::Error> for GitChangeEngineProviderError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            return GitChangeEngineProviderError::Timeout;
        }

        if let Some(status) = e.status() {
            return GitChangeEngineProviderError::from_status(status.as_u16());
        }

        if e.is_decode() {
            return GitChangeEngineProviderError::InvalidResponse(e.to_string());
        }

        GitChangeEngineProviderError::Network(e.to_string())
    }
}

impl GitChangeEngineProviderError {
    /// Maps a non-2xx status code to its variant.
    pub fn from_status(code: u16) -> Self {
        match code {
            401 => GitChangeEngineProviderError::Unauthorized,
            403 => GitChangeEngineProviderError::Forbidden,
            404 => GitChangeEngineProviderError::NotFound,
            409 => GitChangeEngineProviderError::Conflict,
            429 => GitChangeEngineProviderError::RateLimited {
                retry_after_secs: None,
            },
            500..=599 => GitChangeEngineProviderError::Server(code),
            _ => GitChangeEngineProviderError::HttpStatus(code),
        }
    }
}
