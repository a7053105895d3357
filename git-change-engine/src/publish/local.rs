use std::path::{Path, PathBuf};

use async_trait::async_trait;
use project_code_store::{CommitAuthor, commit_all_async, resolve_in_root, sanitize_relative};
use tracing::{debug, error, info, instrument};

use crate::apply::{apply_change, read_existing, write_file};
use crate::change_set::ChangeSet;
use crate::errors::ApplyError;
use crate::publish::{FileOutcome, FileStatus, PublishMode, PublishReport, Publisher};

/// Result of applying one change to the working copy.
#[derive(Debug)]
pub(crate) struct LocalApply {
    pub outcome: FileOutcome,
    /// Sanitized path and post-apply content when the file was written.
    pub written: Option<(String, String)>,
}

/// Applies every change under `root`, one outcome per entry.
pub(crate) fn apply_to_tree(root: &Path, changes: &ChangeSet) -> Vec<LocalApply> {
    changes
        .iter()
        .map(|(path, change)| {
            let result = sanitize_relative(path)
                .map_err(ApplyError::from)
                .and_then(|clean| {
                    let abs = resolve_in_root(root, &clean)?;
                    let base = read_existing(&abs)?;
                    let next = apply_change(&clean, base.as_deref(), change)?;
                    write_file(&abs, &next)?;
                    Ok((clean, next))
                });
            match result {
                Ok(written) => {
                    debug!(path, "file written");
                    LocalApply {
                        outcome: FileOutcome::new(path, FileStatus::Written),
                        written: Some(written),
                    }
                }
                Err(e) => LocalApply {
                    outcome: FileOutcome::from_apply_error(path, &e),
                    written: None,
                },
            }
        })
        .collect()
}

/// [`apply_to_tree`] on the blocking pool.
pub(crate) async fn apply_to_tree_async(root: PathBuf, changes: ChangeSet) -> Vec<LocalApply> {
    let paths: Vec<String> = changes.paths().map(str::to_string).collect();
    match tokio::task::spawn_blocking(move || apply_to_tree(&root, &changes)).await {
        Ok(applied) => applied,
        Err(e) => {
            error!(error = %e, "apply task failed");
            paths
                .into_iter()
                .map(|path| LocalApply {
                    outcome: FileOutcome::new(
                        path,
                        FileStatus::Failed {
                            reason: e.to_string(),
                        },
                    ),
                    written: None,
                })
                .collect()
        }
    }
}

/// Writes changes into the clone and records one local commit.
#[derive(Debug, Clone)]
pub struct LocalCommitPublisher {
    root: PathBuf,
    message: String,
    author: CommitAuthor,
}

impl LocalCommitPublisher {
    pub fn new(root: impl Into<PathBuf>, message: impl Into<String>, author: CommitAuthor) -> Self {
        Self {
            root: root.into(),
            message: message.into(),
            author,
        }
    }
}

#[async_trait]
impl Publisher for LocalCommitPublisher {
    fn mode(&self) -> PublishMode {
        PublishMode::Local
    }

    #[instrument(skip_all, fields(root = %self.root.display(), files = changes.len()))]
    async fn publish(&self, changes: &ChangeSet) -> PublishReport {
        let applied = apply_to_tree_async(self.root.clone(), changes.clone()).await;
        let mut report = PublishReport {
            files: applied.into_iter().map(|a| a.outcome).collect(),
            ..Default::default()
        };

        if report.applied() == 0 {
            debug!("nothing written, skipping commit");
            return report;
        }

        match commit_all_async(self.root.clone(), self.message.clone(), self.author.clone()).await
        {
            Ok(Some(oid)) => {
                info!(%oid, written = report.applied(), "changes committed locally");
                report.commit = Some(oid.to_string());
            }
            Ok(None) => debug!("written content matches HEAD, no commit"),
            Err(e) => {
                error!(error = %e, "local commit failed");
                report.error = Some(e.to_string());
            }
        }
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::change_set::Change;
    use git2::Repository;
    use project_code_store::commit_all;
    use std::fs;
    use tempfile::TempDir;

    fn repo() -> TempDir {
        let tmp = TempDir::new().unwrap();
        Repository::init(tmp.path()).unwrap();
        fs::write(tmp.path().join("a.txt"), "a\nb\nc\n").unwrap();
        commit_all(tmp.path(), "init", &CommitAuthor::default()).unwrap();
        tmp
    }

    #[tokio::test]
    async fn writes_and_commits_accepted_files() {
        let tmp = repo();
        let mut set = ChangeSet::new();
        set.insert("a.txt", Change::Patch("@@ -1,3 +1,3 @@\n a\n-b\n+B\n c\n".into()));
        set.insert("new/dir/b.txt", Change::Replace("bee".into()));
        set.insert("../escape.txt", Change::Replace("nope".into()));

        let publisher = LocalCommitPublisher::new(tmp.path(), "apply", CommitAuthor::default());
        let report = publisher.publish(&set).await;

        assert_eq!(report.files.len(), 3);
        assert_eq!(report.files[0].status, FileStatus::Written);
        assert_eq!(report.files[1].status, FileStatus::Written);
        assert!(matches!(report.files[2].status, FileStatus::Rejected { .. }));
        assert_eq!(report.applied(), 2);

        assert_eq!(fs::read_to_string(tmp.path().join("a.txt")).unwrap(), "a\nB\nc\n");
        assert_eq!(fs::read_to_string(tmp.path().join("new/dir/b.txt")).unwrap(), "bee");
        assert!(!tmp.path().parent().unwrap().join("escape.txt").exists());

        let repo = Repository::open(tmp.path()).unwrap();
        let head = repo.head().unwrap().peel_to_commit().unwrap();
        assert_eq!(report.commit, Some(head.id().to_string()));
        assert_eq!(head.message(), Some("apply"));
    }

    #[tokio::test]
    async fn rejected_patch_leaves_file_and_history_alone() {
        let tmp = repo();
        let mut set = ChangeSet::new();
        set.insert("a.txt", Change::Patch("@@ -1 +1 @@\n-zzz\n+yyy\n".into()));

        let publisher = LocalCommitPublisher::new(tmp.path(), "apply", CommitAuthor::default());
        let report = publisher.publish(&set).await;

        assert!(matches!(report.files[0].status, FileStatus::Rejected { .. }));
        assert_eq!(report.commit, None);
        assert_eq!(fs::read_to_string(tmp.path().join("a.txt")).unwrap(), "a\nb\nc\n");
    }

    #[cfg(unix)]
    #[test]
    fn symlinked_directory_cannot_redirect_writes() {
        let tmp = repo();
        let outside = TempDir::new().unwrap();
        std::os::unix::fs::symlink(outside.path(), tmp.path().join("link")).unwrap();

        let mut set = ChangeSet::new();
        set.insert("link/pwned.txt", Change::Replace("x".into()));
        let applied = apply_to_tree(tmp.path(), &set);

        assert!(matches!(applied[0].outcome.status, FileStatus::Rejected { .. }));
        assert!(applied[0].written.is_none());
        assert!(!outside.path().join("pwned.txt").exists());
    }

    #[tokio::test]
    async fn git_metadata_is_never_written() {
        let tmp = repo();
        let head_before = fs::read_to_string(tmp.path().join(".git/HEAD")).unwrap();
        let mut set = ChangeSet::new();
        set.insert(".git/HEAD", Change::Replace("garbage".into()));
        set.insert("a.txt", Change::Replace("fresh\n".into()));

        let publisher = LocalCommitPublisher::new(tmp.path(), "apply", CommitAuthor::default());
        let report = publisher.publish(&set).await;

        assert!(matches!(report.files[0].status, FileStatus::Rejected { .. }));
        assert_eq!(report.files[1].status, FileStatus::Written);
        assert_eq!(report.error, None);
        assert!(report.commit.is_some());
        assert_eq!(fs::read_to_string(tmp.path().join(".git/HEAD")).unwrap(), head_before);
    }

    #[tokio::test]
    async fn commit_failure_is_reported() {
        let tmp = TempDir::new().unwrap();
        let mut set = ChangeSet::new();
        set.insert("x.txt", Change::Replace("x".into()));

        let publisher = LocalCommitPublisher::new(tmp.path(), "m", CommitAuthor::default());
        let report = publisher.publish(&set).await;

        assert_eq!(report.files[0].status, FileStatus::Written);
        assert!(report.error.is_some());
        assert_eq!(report.commit, None);
    }
}
