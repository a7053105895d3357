//! Stage-everything-and-commit on the local working copy.

use std::path::{Path, PathBuf};

use git2::{Commit, ErrorCode, IndexAddOption, Oid, Repository, Signature};
use tracing::{debug, info, instrument};

use crate::errors::Result;

/// Identity used for local commits.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitAuthor {
    pub name: String,
    pub email: String,
}

impl Default for CommitAuthor {
    fn default() -> Self {
        Self {
            name: "self-deploy".into(),
            email: "self-deploy@localhost".into(),
        }
    }
}

/// Stages all changes (additions, modifications, deletions) and commits on `HEAD`.
///
/// Returns `Ok(None)` when the staged tree equals the current `HEAD` tree.
#[instrument(skip(author), fields(repo = %root.display()))]
pub fn commit_all(root: &Path, message: &str, author: &CommitAuthor) -> Result<Option<Oid>> {
    let repo = Repository::open(root)?;

    let mut index = repo.index()?;
    index.add_all(["*"], IndexAddOption::DEFAULT, None)?;
    index.update_all(["*"], None)?;
    index.write()?;

    let tree_id = index.write_tree()?;
    let tree = repo.find_tree(tree_id)?;

    let parent = head_commit(&repo)?;
    if let Some(p) = &parent {
        if p.tree_id() == tree_id {
            debug!("nothing to commit");
            return Ok(None);
        }
    }

    let sig = Signature::now(&author.name, &author.email)?;
    let parents: Vec<&Commit> = parent.iter().collect();
    let oid = repo.commit(Some("HEAD"), &sig, &sig, message, &tree, &parents)?;

    info!(%oid, "local commit created");
    Ok(Some(oid))
}

/// Async wrapper running [`commit_all`] on the blocking pool.
pub async fn commit_all_async(
    root: PathBuf,
    message: String,
    author: CommitAuthor,
) -> Result<Option<Oid>> {
    tokio::task::spawn_blocking(move || commit_all(&root, &message, &author)).await?
}

fn head_commit(repo: &Repository) -> Result<Option<Commit<'_>>> {
    match repo.head() {
        Ok(head) => Ok(Some(head.peel_to_commit()?)),
        Err(e) if e.code() == ErrorCode::UnbornBranch || e.code() == ErrorCode::NotFound => {
            Ok(None)
        }
        Err(e) => Err(e.into()),
    }
}
