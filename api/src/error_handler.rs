use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use git_change_engine::GitChangeEngineError;
use project_code_store::{ConcatError, GitStoreError};
use serde::Serialize;
use thiserror::Error;

use crate::core::app_state::ConfigError;

/// Public application error type.
#[derive(Debug, Error)]
pub enum AppError {
    // --- Boot / config ---
    #[error("missing required environment variable: {0}")]
    MissingEnv(&'static str),

    #[error(transparent)]
    Config(#[from] ConfigError),

    // --- IO / server ---
    #[error("failed to bind listener")]
    Bind(#[source] std::io::Error),

    #[error("server error")]
    Server(#[source] std::io::Error),

    // --- Request ---
    #[error("bad request: {0}")]
    BadRequest(String),

    #[error("repository not cloned yet")]
    NotCloned,

    /// Error from a lower layer mapped to a specific status and code.
    #[error("{message}")]
    Http {
        status: StatusCode,
        code: &'static str,
        message: String,
    },
}

impl AppError {
    fn status_code(&self) -> StatusCode {
        match self {
            AppError::MissingEnv(_) | AppError::Config(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::NotCloned => StatusCode::CONFLICT,
            AppError::Http { status, .. } => *status,
            AppError::Bind(_) | AppError::Server(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_code(&self) -> &'static str {
        match self {
            AppError::MissingEnv(_) => "MISSING_ENV",
            AppError::Config(_) => "CONFIG_ERROR",
            AppError::Bind(_) => "BIND_ERROR",
            AppError::Server(_) => "SERVER_ERROR",
            AppError::BadRequest(_) => "BAD_REQUEST",
            AppError::NotCloned => "REPO_NOT_CLONED",
            AppError::Http { code, .. } => code,
        }
    }
}

#[derive(Serialize)]
struct ErrorBody<'a> {
    error: &'a str,
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = ErrorBody {
            error: self.error_code(),
            message: self.to_string(),
        };
        (status, Json(body)).into_response()
    }
}

pub type AppResult<T> = Result<T, AppError>;

impl From<axum::extract::rejection::JsonRejection> for AppError {
    fn from(err: axum::extract::rejection::JsonRejection) -> Self {
        AppError::BadRequest(err.body_text())
    }
}

/// Clone failures mapped by message text, so `git2` stays out of this crate.
impl From<GitStoreError> for AppError {
    fn from(err: GitStoreError) -> Self {
        match err {
            GitStoreError::Io(e) => AppError::Http {
                status: StatusCode::INTERNAL_SERVER_ERROR,
                code: "IO_ERROR",
                message: format!("Filesystem error on the working copy: {e}"),
            },
            GitStoreError::Join(e) => AppError::Http {
                status: StatusCode::INTERNAL_SERVER_ERROR,
                code: "JOIN_ERROR",
                message: format!("Background task failed to complete: {e}"),
            },
            GitStoreError::Git(e) => {
                let msg = e.to_string();
                let lower = msg.to_lowercase();

                if lower.contains("auth")
                    || lower.contains("unauthorized")
                    || lower.contains("credentials")
                    || lower.contains("denied")
                {
                    AppError::Http {
                        status: StatusCode::UNAUTHORIZED,
                        code: "UNAUTHORIZED",
                        message: "The upstream repository rejected the configured credentials."
                            .into(),
                    }
                } else if lower.contains("not found")
                    || lower.contains("could not find")
                    || lower.contains("does not exist")
                {
                    AppError::Http {
                        status: StatusCode::NOT_FOUND,
                        code: "REPO_NOT_FOUND",
                        message: "Upstream repository not found or not accessible.".into(),
                    }
                } else if lower.contains("ssl") || lower.contains("tls") {
                    AppError::Http {
                        status: StatusCode::BAD_GATEWAY,
                        code: "TLS_ERROR",
                        message: "TLS error while talking to the upstream remote.".into(),
                    }
                } else if lower.contains("remote")
                    || lower.contains("network")
                    || lower.contains("eof")
                {
                    AppError::Http {
                        status: StatusCode::BAD_GATEWAY,
                        code: "GIT_REMOTE_ERROR",
                        message: "Remote or network failure while cloning.".into(),
                    }
                } else {
                    AppError::Http {
                        status: StatusCode::INTERNAL_SERVER_ERROR,
                        code: "GIT_ERROR",
                        message: format!("Git operation failed: {msg}"),
                    }
                }
            }
        }
    }
}

impl From<GitChangeEngineError> for AppError {
    fn from(err: GitChangeEngineError) -> Self {
        match err {
            GitChangeEngineError::Validation(msg) => AppError::BadRequest(msg),
            GitChangeEngineError::Concat(ConcatError::MissingRoot(_)) => AppError::NotCloned,
            GitChangeEngineError::Store(e) => e.into(),
            other => AppError::Http {
                status: StatusCode::INTERNAL_SERVER_ERROR,
                code: "SUBMISSION_FAILED",
                message: other.to_string(),
            },
        }
    }
}
