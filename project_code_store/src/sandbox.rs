//! Confines change paths to the source tree.

use std::{
    fs,
    path::{Component, Path, PathBuf},
};

use crate::errors::PathError;

/// Normalizes a repository-relative path to `a/b/c` form.
///
/// `.` segments and duplicate separators are dropped. Absolute paths, drive
/// prefixes, `..` segments and anything under `.git` are rejected.
pub fn sanitize_relative(raw: &str) -> Result<String, PathError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(PathError::Empty);
    }
    if trimmed.starts_with('/') || trimmed.starts_with('\\') {
        return Err(PathError::Absolute(trimmed.to_string()));
    }

    let mut parts = Vec::new();
    for component in Path::new(trimmed).components() {
        match component {
            Component::Normal(seg) => {
                let seg = seg.to_string_lossy();
                if seg.split('\\').any(|s| s == "..") {
                    return Err(PathError::ParentTraversal(trimmed.to_string()));
                }
                parts.push(seg.into_owned());
            }
            Component::CurDir => {}
            Component::ParentDir => {
                return Err(PathError::ParentTraversal(trimmed.to_string()));
            }
            Component::RootDir | Component::Prefix(_) => {
                return Err(PathError::Absolute(trimmed.to_string()));
            }
        }
    }

    let Some(first) = parts.first() else {
        return Err(PathError::Empty);
    };
    if first.eq_ignore_ascii_case(".git") {
        return Err(PathError::GitMetadata(trimmed.to_string()));
    }
    Ok(parts.join("/"))
}

/// Joins a sanitized relative path onto `root`.
///
/// Every existing segment below `root` is checked with `symlink_metadata`;
/// a link anywhere on the way (the file itself included) is rejected, so the
/// result cannot point outside the tree. Segments that do not exist yet are
/// created later as plain directories.
pub fn resolve_in_root(root: &Path, raw: &str) -> Result<PathBuf, PathError> {
    let rel = sanitize_relative(raw)?;
    let mut abs = root.to_path_buf();
    let mut on_disk = true;
    for seg in rel.split('/') {
        abs.push(seg);
        if !on_disk {
            continue;
        }
        match fs::symlink_metadata(&abs) {
            Ok(meta) if meta.file_type().is_symlink() => return Err(PathError::Symlink(rel.clone())),
            Ok(_) => {}
            Err(_) => on_disk = false,
        }
    }
    Ok(abs)
}
