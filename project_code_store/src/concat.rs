//! Source-tree walker and serializer.
//!
//! Every regular UTF-8 file under the root becomes one fenced block labeled
//! with its `/`-separated relative path. Output order is lexicographic by path.

use std::{
    fs,
    path::{Path, PathBuf},
};

use tracing::{debug, warn};
use walkdir::{DirEntry, WalkDir};

use crate::errors::ConcatError;

/// Fence used around every file block.
pub const FENCE: &str = "```";

/// One text file of the source tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceFile {
    /// Relative path with `/` separators.
    pub path: String,
    pub content: String,
}

/// Walk options.
#[derive(Debug, Clone, Copy, Default)]
pub struct ConcatOptions {
    /// Include dot-files and dot-directories (the `.git` directory is always skipped).
    pub include_hidden: bool,
}

/// Lists relative paths of all regular files, sorted.
pub fn list_files(root: &Path, opts: ConcatOptions) -> Result<Vec<String>, ConcatError> {
    let mut out: Vec<String> = walk(root, opts)?.into_iter().map(|(rel, _)| rel).collect();
    out.sort();
    Ok(out)
}

/// Reads every regular UTF-8 file under `root`.
///
/// Files that cannot be read or decoded are logged and skipped.
pub fn collect_source_tree(
    root: &Path,
    opts: ConcatOptions,
) -> Result<Vec<SourceFile>, ConcatError> {
    let mut files = Vec::new();
    for (rel, abs) in walk(root, opts)? {
        let bytes = match fs::read(&abs) {
            Ok(b) => b,
            Err(e) => {
                warn!(path = %rel, error = %e, "skipping unreadable file");
                continue;
            }
        };
        match String::from_utf8(bytes) {
            Ok(content) => files.push(SourceFile { path: rel, content }),
            Err(_) => warn!(path = %rel, "skipping non-UTF-8 file"),
        }
    }
    files.sort_by(|a, b| a.path.cmp(&b.path));
    debug!(root = %root.display(), files = files.len(), "source tree collected");
    Ok(files)
}

/// Serializes files as fenced blocks: ```` ```<path>\n<content>\n```\n\n ````.
pub fn render_source_document(files: &[SourceFile]) -> String {
    let capacity = files
        .iter()
        .map(|f| f.path.len() + f.content.len() + 12)
        .sum();
    let mut out = String::with_capacity(capacity);
    for f in files {
        out.push_str(FENCE);
        out.push_str(&f.path);
        out.push('\n');
        out.push_str(&f.content);
        out.push('\n');
        out.push_str(FENCE);
        out.push_str("\n\n");
    }
    out
}

/// Collects and renders the tree under `root` in one step.
pub fn concatenate(root: &Path, opts: ConcatOptions) -> Result<String, ConcatError> {
    Ok(render_source_document(&collect_source_tree(root, opts)?))
}

/// Async wrapper running [`concatenate`] on the blocking pool.
pub async fn concatenate_async(root: PathBuf, opts: ConcatOptions) -> Result<String, ConcatError> {
    tokio::task::spawn_blocking(move || concatenate(&root, opts)).await?
}

fn walk(root: &Path, opts: ConcatOptions) -> Result<Vec<(String, PathBuf)>, ConcatError> {
    if !root.is_dir() {
        return Err(ConcatError::MissingRoot(root.to_path_buf()));
    }

    let mut out = Vec::new();
    let walker = WalkDir::new(root)
        .min_depth(1)
        .into_iter()
        .filter_entry(|e| keep_entry(e, opts));

    for entry in walker {
        let entry = match entry {
            Ok(e) => e,
            Err(e) => {
                warn!(error = %e, "skipping entry during walk");
                continue;
            }
        };
        if !entry.file_type().is_file() {
            continue;
        }
        let Ok(rel) = entry.path().strip_prefix(root) else {
            continue;
        };
        let rel = rel
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/");
        out.push((rel, entry.path().to_path_buf()));
    }
    Ok(out)
}

fn keep_entry(entry: &DirEntry, opts: ConcatOptions) -> bool {
    !is_hidden_name(&entry.file_name().to_string_lossy(), opts)
}

fn is_hidden_name(name: &str, opts: ConcatOptions) -> bool {
    name.eq_ignore_ascii_case(".git") || (!opts.include_hidden && name.starts_with('.'))
}

/// Whether a `/`-separated relative path is part of the source tree as
/// [`list_files`] sees it. `.git` is never visible.
pub fn is_visible_path(rel: &str, opts: ConcatOptions) -> bool {
    rel.split('/')
        .filter(|seg| !seg.is_empty() && *seg != ".")
        .all(|seg| !is_hidden_name(seg, opts))
}
