//! From change request to published edits.
//!
//! [`SubmissionPipeline::submit`] concatenates the clone, builds the prompt,
//! asks the completion client, parses the reply into a [`ChangeSet`] and hands
//! it to the active [`Publisher`].

pub mod apply;
pub mod change_set;
pub mod errors;
pub mod git_providers;
pub mod parser;
pub mod pipeline;
pub mod prompt;
pub mod publish;

use std::{path::PathBuf, sync::Arc};

use project_code_store::CommitAuthor;
use tracing::info;

pub use change_set::{Change, ChangeSet};
pub use errors::{
    ApplyError, GitChangeEngineConfigError, GitChangeEngineError, GitChangeEngineProviderError,
    GitChangeEngineResult, ParseIssue,
};
pub use git_providers::{GitHubContentsClient, ProviderConfig};
pub use parser::{ParsedReply, ReplyGrammar, parse_reply};
pub use pipeline::{
    NO_CHANGES, NoChangesReason, SubmissionOutcome, SubmissionPipeline, SubmissionReport,
};
pub use prompt::build_prompt;
pub use publish::{
    FileOutcome, FileStatus, LocalCommitPublisher, PatchPushPublisher, PublishMode,
    PublishReport, Publisher, RemoteContentPublisher,
};

/// Builds the publisher for `mode`.
///
/// `provider` is required for the `patch` and `remote` modes.
pub fn build_publisher(
    mode: PublishMode,
    clone_dir: PathBuf,
    message: String,
    author: CommitAuthor,
    provider: Option<ProviderConfig>,
) -> GitChangeEngineResult<Arc<dyn Publisher>> {
    info!(?mode, clone_dir = %clone_dir.display(), "building publisher");

    let publisher: Arc<dyn Publisher> = match mode {
        PublishMode::Local => Arc::new(LocalCommitPublisher::new(clone_dir, message, author)),
        PublishMode::Patch => {
            let cfg = provider.ok_or(GitChangeEngineConfigError::MissingToken)?;
            let client = GitHubContentsClient::from_config(cfg)?;
            Arc::new(PatchPushPublisher::new(clone_dir, client, message))
        }
        PublishMode::Remote => {
            let cfg = provider.ok_or(GitChangeEngineConfigError::MissingToken)?;
            let client = GitHubContentsClient::from_config(cfg)?;
            Arc::new(RemoteContentPublisher::new(client, message))
        }
    };
    Ok(publisher)
}
