//! Turns a [`Change`] plus the current file content into the new content.

use std::{fs, io, path::Path};

use tracing::debug;

use crate::change_set::Change;
use crate::errors::ApplyError;
use crate::parser::FENCE;

/// Computes the post-change content of `path`.
///
/// `base` is the current content, `None` when the file does not exist yet
/// (a patch is then applied against the empty file).
pub fn apply_change(path: &str, base: Option<&str>, change: &Change) -> Result<String, ApplyError> {
    match change {
        Change::Replace(text) => Ok(text.clone()),
        Change::Patch(body) => {
            let normalized = normalize_patch(path, body)?;
            let patch = diffy::Patch::from_str(&normalized)
                .map_err(|e| ApplyError::InvalidPatch(e.to_string()))?;
            let out = diffy::apply(base.unwrap_or(""), &patch)
                .map_err(|e| ApplyError::PatchRejected(e.to_string()))?;
            debug!(path, hunks = patch.hunks().len(), "patch applied");
            Ok(out)
        }
    }
}

/// Prepares a reply patch body for `diffy`.
///
/// Drops anything before the first `--- ` or `@@` line (`index`, mode lines),
/// synthesizes the `---`/`+++` pair when the body starts directly at a hunk,
/// cuts at the first fence line (the close of a ```` ```diff ```` wrapper),
/// strips trailing blank lines and guarantees a final newline.
pub fn normalize_patch(path: &str, body: &str) -> Result<String, ApplyError> {
    let lines: Vec<&str> = body.split('\n').collect();
    let Some(start) = lines
        .iter()
        .position(|l| l.starts_with("--- ") || l.starts_with("@@"))
    else {
        return Err(ApplyError::InvalidPatch(format!("no hunks for {path}")));
    };

    // Hunk lines start with ' ', '+', '-' or '\', never with a fence.
    let mut end = lines[start..]
        .iter()
        .position(|l| l.starts_with(FENCE))
        .map_or(lines.len(), |i| start + i);
    while end > start && lines[end - 1].trim().is_empty() {
        end -= 1;
    }

    let mut out = String::with_capacity(body.len() + 2 * path.len() + 16);
    if lines[start].starts_with("@@") {
        out.push_str(&format!("--- a/{path}\n+++ b/{path}\n"));
    }
    for line in &lines[start..end] {
        out.push_str(line);
        out.push('\n');
    }
    Ok(out)
}

/// Reads a file of the working copy; `Ok(None)` when it does not exist.
pub fn read_existing(abs: &Path) -> Result<Option<String>, ApplyError> {
    match fs::read(abs) {
        Ok(bytes) => String::from_utf8(bytes)
            .map(Some)
            .map_err(|_| ApplyError::NotUtf8),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// Writes `content` to `abs`, creating parent directories.
pub fn write_file(abs: &Path, content: &str) -> Result<(), ApplyError> {
    if let Some(parent) = abs.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(abs, content)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const BASE: &str = "a\nb\nc\n";

    #[test]
    fn replacement_ignores_base() {
        let got = apply_change("x", Some("old"), &Change::Replace("new".into())).unwrap();
        assert_eq!(got, "new");
    }

    #[test]
    fn patch_with_headers_applies() {
        let body = "--- a/f.txt\n+++ b/f.txt\n@@ -1,3 +1,3 @@\n a\n-b\n+B\n c\n";
        let got = apply_change("f.txt", Some(BASE), &Change::Patch(body.into())).unwrap();
        assert_eq!(got, "a\nB\nc\n");
    }

    #[test]
    fn bare_hunk_without_trailing_newline_applies() {
        let body = "index 111..222 100644\n@@ -1,3 +1,3 @@\n a\n-b\n+B\n c\n\n";
        let got = apply_change("f.txt", Some(BASE), &Change::Patch(body.into())).unwrap();
        assert_eq!(got, "a\nB\nc\n");
    }

    #[test]
    fn closing_fence_and_trailing_prose_are_cut() {
        let body = "--- a/f.txt\n+++ b/f.txt\n@@ -1,3 +1,3 @@\n a\n-b\n+B\n c\n```\n\nThat fixes it.\n";
        let got = apply_change("f.txt", Some(BASE), &Change::Patch(body.into())).unwrap();
        assert_eq!(got, "a\nB\nc\n");
    }

    #[test]
    fn fenced_diff_reply_applies() {
        let reply = "```diff\ndiff --git a/f.txt b/f.txt\n--- a/f.txt\n+++ b/f.txt\n@@ -1,3 +1,3 @@\n a\n-b\n+B\n c\n```";
        let parsed = crate::parser::parse_reply(reply, crate::parser::ReplyGrammar::Auto);
        let change = parsed.changes.get("f.txt").unwrap();
        assert_eq!(apply_change("f.txt", Some(BASE), change).unwrap(), "a\nB\nc\n");
    }

    #[test]
    fn added_fence_lines_stay_in_the_hunk() {
        let body = "@@ -1 +1,3 @@\n a\n+```rust\n+```\n";
        let got = apply_change("README.md", Some("a\n"), &Change::Patch(body.into())).unwrap();
        assert_eq!(got, "a\n```rust\n```\n");
    }

    #[test]
    fn patch_against_missing_file_creates_it() {
        let body = "--- /dev/null\n+++ b/new.txt\n@@ -0,0 +1,2 @@\n+x\n+y";
        let got = apply_change("new.txt", None, &Change::Patch(body.into())).unwrap();
        assert_eq!(got, "x\ny\n");
    }

    #[test]
    fn mismatched_context_is_rejected() {
        let body = "@@ -1,3 +1,3 @@\n a\n-b\n+B\n c\n";
        let err = apply_change("f.txt", Some("zzz\n"), &Change::Patch(body.into())).unwrap_err();
        assert!(matches!(err, ApplyError::PatchRejected(_)));
    }

    #[test]
    fn body_without_hunks_is_invalid() {
        let err = apply_change("f.txt", Some(BASE), &Change::Patch("just words".into()))
            .unwrap_err();
        assert!(matches!(err, ApplyError::InvalidPatch(_)));
    }

    #[test]
    fn normalize_synthesizes_file_header() {
        assert_eq!(
            normalize_patch("p.rs", "@@ -1 +1 @@\n-a\n+b\n\n\n").unwrap(),
            "--- a/p.rs\n+++ b/p.rs\n@@ -1 +1 @@\n-a\n+b\n"
        );
    }

    #[test]
    fn read_and_write_round_through_disk() {
        let tmp = TempDir::new().unwrap();
        let abs = tmp.path().join("deep/dir/file.txt");
        assert_eq!(read_existing(&abs).unwrap(), None);
        write_file(&abs, "content").unwrap();
        assert_eq!(read_existing(&abs).unwrap().as_deref(), Some("content"));

        fs::write(tmp.path().join("bin"), [0xff, 0xfe]).unwrap();
        assert!(matches!(
            read_existing(&tmp.path().join("bin")),
            Err(ApplyError::NotUtf8)
        ));
    }
}
