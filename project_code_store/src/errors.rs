use std::path::PathBuf;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, GitStoreError>;

/// Failures of clone/commit operations on the local working copy.
#[derive(Debug, Error)]
pub enum GitStoreError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("task join error: {0}")]
    Join(#[from] tokio::task::JoinError),

    #[error("git error: {0}")]
    Git(#[from] git2::Error),
}

/// A relative path that would escape (or cannot address) the source tree.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PathError {
    #[error("path is empty")]
    Empty,

    #[error("absolute paths are not allowed: {0}")]
    Absolute(String),

    #[error("parent-directory segments are not allowed: {0}")]
    ParentTraversal(String),

    #[error("git metadata is not part of the source tree: {0}")]
    GitMetadata(String),

    #[error("path crosses a symbolic link: {0}")]
    Symlink(String),
}

/// Failures while serializing the source tree.
#[derive(Debug, Error)]
pub enum ConcatError {
    #[error("source tree not found: {0}")]
    MissingRoot(PathBuf),

    #[error("task join error: {0}")]
    Join(#[from] tokio::task::JoinError),
}
