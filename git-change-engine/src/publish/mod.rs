//! Publishing a [`ChangeSet`]: local commit, local patch + push, or remote
//! content update.
//!
//! A publisher never fails as a whole; every file gets its own
//! [`FileOutcome`] and the report carries the resulting commit, if any.

mod local;
mod remote;

pub use local::LocalCommitPublisher;
pub use remote::{PatchPushPublisher, RemoteContentPublisher};

use std::str::FromStr;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::change_set::ChangeSet;
use crate::errors::ApplyError;

/// Which publishing path is active.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PublishMode {
    /// Write files in the clone and commit locally.
    Local,
    /// Apply to the clone, then push post-apply content through the API.
    Patch,
    /// Read, apply and write through the hosting provider's content API only.
    #[default]
    Remote,
}

impl FromStr for PublishMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "local" => Ok(PublishMode::Local),
            "patch" => Ok(PublishMode::Patch),
            "remote" | "github" => Ok(PublishMode::Remote),
            other => Err(format!("unknown publish mode `{other}`")),
        }
    }
}

/// What happened to one file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum FileStatus {
    /// Written into the local clone.
    Written,
    /// Committed on the remote branch.
    Pushed { commit_sha: String },
    /// Refused before touching anything (bad path, patch did not apply).
    Rejected { reason: String },
    /// I/O or provider failure.
    Failed { reason: String },
    /// Not attempted because an earlier provider call failed.
    Skipped { reason: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileOutcome {
    pub path: String,
    #[serde(flatten)]
    pub status: FileStatus,
}

impl FileOutcome {
    pub fn new(path: impl Into<String>, status: FileStatus) -> Self {
        Self {
            path: path.into(),
            status,
        }
    }

    /// Rejected for content/path reasons, failed for I/O.
    pub(crate) fn from_apply_error(path: &str, err: &ApplyError) -> Self {
        let reason = err.to_string();
        let status = match err {
            ApplyError::Io(_) => FileStatus::Failed { reason },
            _ => FileStatus::Rejected { reason },
        };
        Self::new(path, status)
    }
}

/// Per-file outcomes plus the commit produced, if any.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PublishReport {
    pub files: Vec<FileOutcome>,
    /// Local commit id or the last remote commit SHA.
    pub commit: Option<String>,
    /// Failure that is not tied to a single file (e.g. the local commit).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl PublishReport {
    /// Number of files that reached their destination.
    pub fn applied(&self) -> usize {
        self.files
            .iter()
            .filter(|f| matches!(f.status, FileStatus::Written | FileStatus::Pushed { .. }))
            .count()
    }
}

/// Destination of a change set.
#[async_trait]
pub trait Publisher: Send + Sync {
    fn mode(&self) -> PublishMode;

    async fn publish(&self, changes: &ChangeSet) -> PublishReport;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn outcome_serializes_flat() {
        let v = serde_json::to_value(FileOutcome::new(
            "a.txt",
            FileStatus::Pushed {
                commit_sha: "c1".into(),
            },
        ))
        .unwrap();
        assert_eq!(v["path"], "a.txt");
        assert_eq!(v["status"], "pushed");
        assert_eq!(v["commit_sha"], "c1");
    }

    #[test]
    fn mode_parses_aliases() {
        assert_eq!("GitHub".parse::<PublishMode>(), Ok(PublishMode::Remote));
        assert_eq!(" local ".parse::<PublishMode>(), Ok(PublishMode::Local));
        assert!("ftp".parse::<PublishMode>().is_err());
    }
}
