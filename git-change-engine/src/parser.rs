//! Scans a model reply for per-file edits.
//!
//! Two grammars are understood:
//!
//! * **Fenced**: a line starting with three backticks opens a block whose
//!   trimmed label is the file path; the next fence line closes it. Interior
//!   lines become the file's full content. Nested fences are not supported.
//! * **Diff**: a line starting with `diff --git` opens a patch record for the
//!   third token (minus its `a/` or `b/` prefix); every following line up to
//!   the next header or the end of the reply is the patch body.
//!
//! Both are two-state scanners (outside / inside a record) with an explicit
//! terminal flush. Problems are reported as [`ParseIssue`]s without dropping
//! records parsed around them.

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::change_set::{Change, ChangeSet};
use crate::errors::ParseIssue;

/// Opening/closing marker of a fenced block.
pub const FENCE: &str = "```";

/// Start marker of a unified-diff record.
pub const DIFF_HEADER: &str = "diff --git";

/// Which reply grammar to scan with.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReplyGrammar {
    /// `Diff` if a line starts with `diff --git` outside a file block,
    /// otherwise `Fenced`.
    #[default]
    Auto,
    Fenced,
    Diff,
}

impl ReplyGrammar {
    /// Resolves `Auto` against a concrete reply.
    ///
    /// Headers inside a block labeled with a path are file content. Headers
    /// inside an unlabeled or ```` ```diff ```` block still select `Diff`.
    pub fn resolve(self, reply: &str) -> ReplyGrammar {
        match self {
            ReplyGrammar::Auto => {
                let mut block: Option<&str> = None;
                for line in reply.split('\n') {
                    if let Some(label) = line.strip_prefix(FENCE) {
                        block = match block {
                            Some(_) => None,
                            None => Some(label.trim()),
                        };
                    } else if line.starts_with(DIFF_HEADER) && block.is_none_or(is_diff_label) {
                        return ReplyGrammar::Diff;
                    }
                }
                ReplyGrammar::Fenced
            }
            fixed => fixed,
        }
    }
}

fn is_diff_label(label: &str) -> bool {
    matches!(label, "" | "diff" | "patch" | "udiff")
}

impl std::str::FromStr for ReplyGrammar {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "auto" => Ok(ReplyGrammar::Auto),
            "fenced" | "blocks" => Ok(ReplyGrammar::Fenced),
            "diff" | "patch" => Ok(ReplyGrammar::Diff),
            other => Err(format!("unknown reply grammar `{other}`")),
        }
    }
}

/// Changes recovered from a reply plus any records that were skipped.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedReply {
    pub changes: ChangeSet,
    pub issues: Vec<ParseIssue>,
}

/// Parses `reply` with the given grammar (resolving `Auto` first).
pub fn parse_reply(reply: &str, grammar: ReplyGrammar) -> ParsedReply {
    let parsed = match grammar.resolve(reply) {
        ReplyGrammar::Diff => parse_diff_records(reply),
        _ => parse_fenced_blocks(reply),
    };

    for issue in &parsed.issues {
        warn!(%issue, "reply record skipped");
    }
    debug!(
        changes = parsed.changes.len(),
        issues = parsed.issues.len(),
        "reply parsed"
    );
    parsed
}

enum FenceState<'a> {
    Outside,
    Inside {
        path: Option<String>,
        opened_at: usize,
        lines: Vec<&'a str>,
    },
}

/// Fenced-block scanner. Lines are split on `\n` only, so `\r` survives
/// inside content.
pub fn parse_fenced_blocks(reply: &str) -> ParsedReply {
    let mut out = ParsedReply::default();
    let mut state = FenceState::Outside;

    for (idx, line) in reply.split('\n').enumerate() {
        let line_no = idx + 1;
        state = match state {
            FenceState::Outside => match line.strip_prefix(FENCE) {
                Some(label) => {
                    let label = label.trim();
                    FenceState::Inside {
                        path: (!label.is_empty()).then(|| label.to_string()),
                        opened_at: line_no,
                        lines: Vec::new(),
                    }
                }
                None => FenceState::Outside,
            },
            FenceState::Inside {
                path,
                opened_at,
                mut lines,
            } => {
                if line.starts_with(FENCE) {
                    match path {
                        Some(path) => {
                            out.changes.insert(path, Change::Replace(lines.join("\n")));
                        }
                        None => out.issues.push(ParseIssue::MissingPath { line: opened_at }),
                    }
                    FenceState::Outside
                } else {
                    lines.push(line);
                    FenceState::Inside {
                        path,
                        opened_at,
                        lines,
                    }
                }
            }
        };
    }

    if let FenceState::Inside {
        path, opened_at, ..
    } = state
    {
        out.issues.push(match path {
            Some(path) => ParseIssue::UnterminatedBlock {
                line: opened_at,
                path,
            },
            None => ParseIssue::MissingPath { line: opened_at },
        });
    }

    out
}

enum DiffState<'a> {
    Outside,
    Inside {
        /// `None` when the header was malformed; the body is then discarded.
        path: Option<String>,
        body: Vec<&'a str>,
    },
}

/// Unified-diff scanner.
pub fn parse_diff_records(reply: &str) -> ParsedReply {
    let mut out = ParsedReply::default();
    let mut state = DiffState::Outside;

    for (idx, line) in reply.split('\n').enumerate() {
        if line.starts_with(DIFF_HEADER) {
            flush_diff(&mut out, std::mem::replace(&mut state, DiffState::Outside));
            let path = header_path(line);
            if path.is_none() {
                out.issues.push(ParseIssue::MalformedHeader {
                    line: idx + 1,
                    header: line.trim_end().to_string(),
                });
            }
            state = DiffState::Inside {
                path,
                body: Vec::new(),
            };
        } else if let DiffState::Inside { body, .. } = &mut state {
            body.push(line);
        }
    }
    flush_diff(&mut out, state);

    out
}

fn flush_diff(out: &mut ParsedReply, state: DiffState<'_>) {
    if let DiffState::Inside {
        path: Some(path),
        body,
    } = state
    {
        out.changes.insert(path, Change::Patch(body.join("\n")));
    }
}

/// Third whitespace token of a `diff --git` header, minus `a/` or `b/`.
pub fn header_path(header: &str) -> Option<String> {
    let token = header.split_whitespace().nth(2)?;
    let path = token
        .strip_prefix("a/")
        .or_else(|| token.strip_prefix("b/"))
        .unwrap_or(token);
    (!path.is_empty()).then(|| path.to_string())
}
