//! One change request end to end: concatenate, prompt, complete, parse, publish.

use std::{path::PathBuf, sync::Arc};

use ai_llm_service::{CompletionClient, CompletionError};
use project_code_store::{ConcatOptions, concatenate_async};
use serde::Serialize;
use tracing::{debug, info, instrument, warn};

use crate::errors::{GitChangeEngineError, GitChangeEngineResult, ParseIssue};
use crate::parser::{ReplyGrammar, parse_reply};
use crate::prompt::build_prompt;
use crate::publish::{PublishReport, Publisher};

/// Literal reply a model gives when nothing should change.
pub const NO_CHANGES: &str = "No changes";

/// Why a submission ended without publishing anything.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "cause", rename_all = "snake_case")]
pub enum NoChangesReason {
    /// The completion call failed; nothing was parsed.
    CompletionFailed { error: CompletionError },
    /// The model answered with the `No changes` marker.
    ModelDeclined,
    /// The reply contained no usable file records.
    NoEdits,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum SubmissionOutcome {
    Applied,
    NoChanges { reason: NoChangesReason },
}

/// Structured result of one submission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SubmissionReport {
    #[serde(flatten)]
    pub outcome: SubmissionOutcome,
    pub issues: Vec<ParseIssue>,
    #[serde(flatten)]
    pub publish: PublishReport,
}

impl SubmissionReport {
    fn no_changes(reason: NoChangesReason, issues: Vec<ParseIssue>) -> Self {
        Self {
            outcome: SubmissionOutcome::NoChanges { reason },
            issues,
            publish: PublishReport::default(),
        }
    }
}

/// Wires the completion client and the active publisher together.
#[derive(Clone)]
pub struct SubmissionPipeline {
    completion: Arc<dyn CompletionClient>,
    publisher: Arc<dyn Publisher>,
    source_root: PathBuf,
    concat: ConcatOptions,
    grammar: ReplyGrammar,
}

impl SubmissionPipeline {
    pub fn new(
        completion: Arc<dyn CompletionClient>,
        publisher: Arc<dyn Publisher>,
        source_root: impl Into<PathBuf>,
        concat: ConcatOptions,
        grammar: ReplyGrammar,
    ) -> Self {
        Self {
            completion,
            publisher,
            source_root: source_root.into(),
            concat,
            grammar,
        }
    }

    /// Runs one change request.
    ///
    /// Completion failures and replies without edits are not errors: they
    /// yield a `NoChanges` report and leave every file untouched. Errors are
    /// reserved for an empty instruction or an unreadable source tree.
    #[instrument(skip_all, fields(mode = ?self.publisher.mode(), grammar = ?self.grammar))]
    pub async fn submit(&self, instruction: &str) -> GitChangeEngineResult<SubmissionReport> {
        let instruction = instruction.trim();
        if instruction.is_empty() {
            return Err(GitChangeEngineError::Validation(
                "change request is empty".into(),
            ));
        }

        let source = concatenate_async(self.source_root.clone(), self.concat).await?;
        let prompt = build_prompt(instruction, &source, self.grammar);
        debug!(source_bytes = source.len(), prompt_bytes = prompt.len(), "prompt built");

        let reply = match self.completion.complete(&prompt).await {
            Ok(reply) => reply,
            Err(error) => {
                warn!(%error, "completion failed, reporting no changes");
                return Ok(SubmissionReport::no_changes(
                    NoChangesReason::CompletionFailed { error },
                    Vec::new(),
                ));
            }
        };

        if reply.trim() == NO_CHANGES {
            info!("model declined to change anything");
            return Ok(SubmissionReport::no_changes(
                NoChangesReason::ModelDeclined,
                Vec::new(),
            ));
        }

        let parsed = parse_reply(&reply, self.grammar);
        if parsed.changes.is_empty() {
            info!(issues = parsed.issues.len(), "reply carried no file edits");
            return Ok(SubmissionReport::no_changes(
                NoChangesReason::NoEdits,
                parsed.issues,
            ));
        }

        let publish = self.publisher.publish(&parsed.changes).await;
        info!(
            files = publish.files.len(),
            applied = publish.applied(),
            commit = ?publish.commit,
            "submission published"
        );

        Ok(SubmissionReport {
            outcome: SubmissionOutcome::Applied,
            issues: parsed.issues,
            publish,
        })
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use std::sync::Mutex;

    use ai_llm_service::{CompletionClient, CompletionError};
    use async_trait::async_trait;

    /// Completion stub returning a fixed result and recording prompts.
    pub struct ScriptedCompletion {
        pub reply: Result<String, CompletionError>,
        pub prompts: Mutex<Vec<String>>,
    }

    impl ScriptedCompletion {
        pub fn new(reply: Result<String, CompletionError>) -> Self {
            Self {
                reply,
                prompts: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl CompletionClient for ScriptedCompletion {
        async fn complete(&self, prompt: &str) -> Result<String, CompletionError> {
            self.prompts.lock().unwrap().push(prompt.to_string());
            self.reply.clone()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::testing::ScriptedCompletion;
    use super::*;
    use crate::publish::{FileStatus, LocalCommitPublisher};
    use git2::Repository;
    use project_code_store::{CommitAuthor, list_files};
    use std::fs;
    use tempfile::TempDir;

    fn pipeline(
        root: &std::path::Path,
        reply: Result<String, CompletionError>,
    ) -> (SubmissionPipeline, Arc<ScriptedCompletion>) {
        let completion = Arc::new(ScriptedCompletion::new(reply));
        let publisher = Arc::new(LocalCommitPublisher::new(
            root,
            "Automated update from change request",
            CommitAuthor::default(),
        ));
        let p = SubmissionPipeline::new(
            completion.clone(),
            publisher,
            root,
            ConcatOptions::default(),
            ReplyGrammar::Auto,
        );
        (p, completion)
    }

    fn empty_repo() -> TempDir {
        let tmp = TempDir::new().unwrap();
        Repository::init(tmp.path()).unwrap();
        tmp
    }

    #[tokio::test]
    async fn single_block_creates_file() {
        let tmp = empty_repo();
        let (p, completion) = pipeline(tmp.path(), Ok("```a.txt\nhello\n```".into()));

        let report = p.submit("add a greeting").await.unwrap();

        assert_eq!(report.outcome, SubmissionOutcome::Applied);
        assert_eq!(fs::read_to_string(tmp.path().join("a.txt")).unwrap(), "hello");
        assert!(report.publish.commit.is_some());
        assert!(completion.prompts.lock().unwrap()[0].contains("add a greeting"));
    }

    #[tokio::test]
    async fn two_blocks_write_both_files() {
        let tmp = empty_repo();
        fs::write(tmp.path().join("a.txt"), "old").unwrap();
        let reply = "Sure.\n```a.txt\nA\n```\n```b.txt\nB\n```\n";
        let (p, completion) = pipeline(tmp.path(), Ok(reply.into()));

        let report = p.submit("update").await.unwrap();

        assert_eq!(report.publish.files.len(), 2);
        assert!(report.publish.files.iter().all(|f| f.status == FileStatus::Written));
        assert_eq!(fs::read_to_string(tmp.path().join("a.txt")).unwrap(), "A");
        assert_eq!(fs::read_to_string(tmp.path().join("b.txt")).unwrap(), "B");
        assert!(completion.prompts.lock().unwrap()[0].contains("```a.txt\nold\n```"));
    }

    #[tokio::test]
    async fn completion_failure_touches_nothing() {
        let tmp = empty_repo();
        fs::write(tmp.path().join("keep.txt"), "same").unwrap();
        let err = CompletionError::Transport("connection refused".into());
        let (p, _) = pipeline(tmp.path(), Err(err.clone()));

        let report = p.submit("anything").await.unwrap();

        assert_eq!(
            report.outcome,
            SubmissionOutcome::NoChanges {
                reason: NoChangesReason::CompletionFailed { error: err }
            }
        );
        assert!(report.publish.files.is_empty());
        assert_eq!(list_files(tmp.path(), ConcatOptions::default()).unwrap(), vec!["keep.txt"]);
        assert_eq!(fs::read_to_string(tmp.path().join("keep.txt")).unwrap(), "same");
    }

    #[tokio::test]
    async fn declined_and_empty_replies_are_no_changes() {
        let tmp = empty_repo();
        let (p, _) = pipeline(tmp.path(), Ok(" No changes \n".into()));
        assert_eq!(
            p.submit("x").await.unwrap().outcome,
            SubmissionOutcome::NoChanges {
                reason: NoChangesReason::ModelDeclined
            }
        );

        let (p, _) = pipeline(tmp.path(), Ok("```\nunlabeled\n```".into()));
        let report = p.submit("x").await.unwrap();
        assert_eq!(
            report.outcome,
            SubmissionOutcome::NoChanges {
                reason: NoChangesReason::NoEdits
            }
        );
        assert_eq!(report.issues, vec![ParseIssue::MissingPath { line: 1 }]);
    }

    #[tokio::test]
    async fn blank_instruction_and_missing_tree_are_errors() {
        let tmp = empty_repo();
        let (p, _) = pipeline(tmp.path(), Ok(String::new()));
        assert!(matches!(
            p.submit("   ").await,
            Err(GitChangeEngineError::Validation(_))
        ));

        let (p, _) = pipeline(&tmp.path().join("missing"), Ok(String::new()));
        assert!(matches!(
            p.submit("go").await,
            Err(GitChangeEngineError::Concat(_))
        ));
    }

    #[test]
    fn report_serializes_flat() {
        let report = SubmissionReport::no_changes(NoChangesReason::ModelDeclined, Vec::new());
        let v = serde_json::to_value(&report).unwrap();
        assert_eq!(v["outcome"], "no_changes");
        assert_eq!(v["reason"]["cause"], "model_declined");
        assert_eq!(v["files"], serde_json::json!([]));
    }
}
