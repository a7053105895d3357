use std::path::PathBuf;

use async_trait::async_trait;
use project_code_store::sanitize_relative;
use tracing::{info, instrument, warn};

use crate::apply::apply_change;
use crate::change_set::{Change, ChangeSet};
use crate::errors::{ApplyError, GitChangeEngineResult};
use crate::git_providers::{GitHubContentsClient, PutOutcome};
use crate::publish::local::apply_to_tree_async;
use crate::publish::{FileOutcome, FileStatus, PublishMode, PublishReport, Publisher};

/// Stops a batch after the first provider failure.
#[derive(Default)]
struct Batch {
    report: PublishReport,
    aborted: Option<String>,
}

impl Batch {
    fn skip_if_aborted(&mut self, path: &str) -> bool {
        match &self.aborted {
            Some(reason) => {
                let reason = format!("not attempted after provider error: {reason}");
                self.report
                    .files
                    .push(FileOutcome::new(path, FileStatus::Skipped { reason }));
                true
            }
            None => false,
        }
    }

    fn record_push(&mut self, path: &str, result: GitChangeEngineResult<PutOutcome>) {
        match result {
            Ok(out) => {
                info!(path, commit = %out.commit_sha, "content pushed");
                self.report.commit = Some(out.commit_sha.clone());
                self.report.files.push(FileOutcome::new(
                    path,
                    FileStatus::Pushed {
                        commit_sha: out.commit_sha,
                    },
                ));
            }
            Err(e) => self.abort(path, e.to_string()),
        }
    }

    fn abort(&mut self, path: &str, reason: String) {
        warn!(path, error = %reason, "provider call failed, aborting remaining files");
        self.report.files.push(FileOutcome::new(
            path,
            FileStatus::Failed {
                reason: reason.clone(),
            },
        ));
        self.aborted = Some(reason);
    }
}

/// Creates or updates `path` with `content`, looking up the current blob SHA first.
async fn push_content(
    client: &GitHubContentsClient,
    path: &str,
    content: &str,
    message: &str,
) -> GitChangeEngineResult<PutOutcome> {
    let sha = client
        .get_file(path, client.branch())
        .await?
        .map(|f| f.sha);
    client.put_file(path, content, message, sha.as_deref()).await
}

/// Applies changes to the clone, then pushes the post-apply content of every
/// written file through the contents API.
#[derive(Debug, Clone)]
pub struct PatchPushPublisher {
    root: PathBuf,
    client: GitHubContentsClient,
    message: String,
}

impl PatchPushPublisher {
    pub fn new(
        root: impl Into<PathBuf>,
        client: GitHubContentsClient,
        message: impl Into<String>,
    ) -> Self {
        Self {
            root: root.into(),
            client,
            message: message.into(),
        }
    }
}

#[async_trait]
impl Publisher for PatchPushPublisher {
    fn mode(&self) -> PublishMode {
        PublishMode::Patch
    }

    #[instrument(skip_all, fields(root = %self.root.display(), files = changes.len()))]
    async fn publish(&self, changes: &ChangeSet) -> PublishReport {
        let applied = apply_to_tree_async(self.root.clone(), changes.clone()).await;
        let mut batch = Batch::default();

        for item in applied {
            let Some((clean, content)) = item.written else {
                batch.report.files.push(item.outcome);
                continue;
            };
            let path = item.outcome.path.as_str();
            if batch.skip_if_aborted(path) {
                continue;
            }
            let result = push_content(&self.client, &clean, &content, &self.message).await;
            batch.record_push(path, result);
        }
        batch.report
    }
}

/// Reads, applies and writes each file through the contents API only.
#[derive(Debug, Clone)]
pub struct RemoteContentPublisher {
    client: GitHubContentsClient,
    message: String,
}

impl RemoteContentPublisher {
    pub fn new(client: GitHubContentsClient, message: impl Into<String>) -> Self {
        Self {
            client,
            message: message.into(),
        }
    }
}

#[async_trait]
impl Publisher for RemoteContentPublisher {
    fn mode(&self) -> PublishMode {
        PublishMode::Remote
    }

    #[instrument(skip_all, fields(branch = %self.client.branch(), files = changes.len()))]
    async fn publish(&self, changes: &ChangeSet) -> PublishReport {
        let mut batch = Batch::default();

        for (path, change) in changes.iter() {
            if batch.skip_if_aborted(path) {
                continue;
            }

            let clean = match sanitize_relative(path) {
                Ok(clean) => clean,
                Err(e) => {
                    let err = ApplyError::from(e);
                    batch.report.files.push(FileOutcome::from_apply_error(path, &err));
                    continue;
                }
            };

            let remote = match self.client.get_file(&clean, self.client.branch()).await {
                Ok(remote) => remote,
                Err(e) => {
                    batch.abort(path, e.to_string());
                    continue;
                }
            };

            let base = match (&remote, change) {
                (Some(file), Change::Patch(_)) if file.content.is_none() => {
                    batch
                        .report
                        .files
                        .push(FileOutcome::from_apply_error(path, &ApplyError::NotUtf8));
                    continue;
                }
                (Some(file), _) => file.content.as_deref(),
                (None, _) => None,
            };

            let next = match apply_change(&clean, base, change) {
                Ok(next) => next,
                Err(e) => {
                    batch.report.files.push(FileOutcome::from_apply_error(path, &e));
                    continue;
                }
            };

            let sha = remote.as_ref().map(|f| f.sha.as_str());
            let result = self
                .client
                .put_file(&clean, &next, &self.message, sha)
                .await;
            batch.record_push(path, result);
        }
        batch.report
    }
}
