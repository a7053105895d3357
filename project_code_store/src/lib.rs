//! Local working copy of the tracked repository, built on `git2` (libgit2).
//!
//! - [`reclone`]: destructive re-fetch (delete + clone) on the blocking pool.
//! - [`concat`]: walks the tree and serializes it as labeled fenced blocks.
//! - [`sandbox`]: keeps change paths inside the tree.
//! - [`commit`]: stages everything and commits locally.
//!
//! SSH auth uses an explicit key path or ssh-agent; HTTPS auth uses a token
//! (+ user, default `oauth2`).

use std::{
    fs,
    path::{Path, PathBuf},
};

use git2::{Cred, CredentialType, FetchOptions, RemoteCallbacks, build::RepoBuilder};
use tokio::task;
use tracing::{debug, error, info, instrument, warn};

pub mod commit;
pub mod concat;
pub mod errors;
pub mod sandbox;

pub use commit::{CommitAuthor, commit_all, commit_all_async};
pub use concat::{
    ConcatOptions, SourceFile, collect_source_tree, concatenate, concatenate_async,
    is_visible_path, list_files, render_source_document,
};
pub use errors::{ConcatError, GitStoreError, PathError, Result};
pub use sandbox::{resolve_in_root, sanitize_relative};

/// Credentials offered to libgit2 during clone.
#[derive(Debug, Clone, Default)]
pub struct GitCredentials {
    /// HTTPS token (`GIT_HTTP_TOKEN`).
    pub http_token: Option<String>,
    /// HTTPS user paired with the token (`GIT_HTTP_USER`, default `oauth2`).
    pub http_user: Option<String>,
    /// Private key for SSH remotes (`SSH_KEY_PATH`).
    pub ssh_key_path: Option<PathBuf>,
    pub ssh_passphrase: Option<String>,
}

impl GitCredentials {
    /// Reads credentials from the process environment.
    pub fn from_env() -> Self {
        let var = |name: &str| std::env::var(name).ok().filter(|v| !v.trim().is_empty());
        Self {
            http_token: var("GIT_HTTP_TOKEN"),
            http_user: var("GIT_HTTP_USER"),
            ssh_key_path: var("SSH_KEY_PATH").map(PathBuf::from),
            ssh_passphrase: var("SSH_KEY_PASSPHRASE"),
        }
    }
}

/// Deletes `target` (if present) and clones `url` into it.
///
/// Runs the blocking libgit2 work inside `spawn_blocking`.
#[instrument(skip(creds), fields(repo = %url, path = %target.display()))]
pub async fn reclone(url: String, target: PathBuf, creds: GitCredentials) -> Result<()> {
    task::spawn_blocking(move || clone_one_blocking(&url, &target, &creds)).await??;
    info!("re-clone finished");
    Ok(())
}

/// Blocking clone.
///
/// - Removes `target` if it exists, creates its parent.
/// - Configures libgit2 credential callbacks for SSH/HTTPS.
/// - Clones with `RepoBuilder`.
fn clone_one_blocking(url: &str, target: &Path, creds: &GitCredentials) -> Result<()> {
    if target.exists() {
        warn!(path = %target.display(), "removing existing clone");
        fs::remove_dir_all(target)?;
    }
    if let Some(parent) = target.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }

    let creds = creds.clone();
    let mut callbacks = RemoteCallbacks::new();
    callbacks.credentials(move |url_str, username_from_url, allowed| {
        let user = username_from_url.unwrap_or("git");

        if url_str.starts_with("http") && allowed.contains(CredentialType::USER_PASS_PLAINTEXT) {
            if let Some(token) = &creds.http_token {
                let http_user = creds.http_user.as_deref().unwrap_or("oauth2");
                return Cred::userpass_plaintext(http_user, token);
            }
        }

        if allowed.contains(CredentialType::SSH_KEY) {
            if let Some(key) = creds.ssh_key_path.as_deref().filter(|p| p.exists()) {
                return Cred::ssh_key(user, None, key, creds.ssh_passphrase.as_deref());
            }
            if let Ok(cred) = Cred::ssh_key_from_agent(user) {
                return Ok(cred);
            }
        }

        if allowed.contains(CredentialType::DEFAULT) {
            if let Ok(cred) = Cred::default() {
                return Ok(cred);
            }
        }

        if allowed.contains(CredentialType::USERNAME) {
            return Cred::username(user);
        }

        Err(git2::Error::from_str("no usable credentials"))
    });

    let mut fetch_opts = FetchOptions::new();
    fetch_opts.remote_callbacks(callbacks);

    let mut builder = RepoBuilder::new();
    builder.fetch_options(fetch_opts);

    debug!("begin clone");
    match builder.clone(url, target) {
        Ok(_) => {
            info!(path = %target.display(), "clone completed");
            Ok(())
        }
        Err(e) => {
            error!(error = %e, "clone failed");
            Err(e.into())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use git2::Repository;
    use tempfile::TempDir;

    fn upstream() -> TempDir {
        let tmp = TempDir::new().unwrap();
        Repository::init(tmp.path()).unwrap();
        fs::write(tmp.path().join("README.md"), "# upstream\n").unwrap();
        commit_all(tmp.path(), "init", &CommitAuthor::default()).unwrap();
        tmp
    }

    #[tokio::test]
    async fn reclone_replaces_existing_checkout() {
        let src = upstream();
        let work = TempDir::new().unwrap();
        let target = work.path().join("cloned_repo");
        let url = src.path().to_string_lossy().into_owned();

        reclone(url.clone(), target.clone(), GitCredentials::default())
            .await
            .unwrap();
        assert_eq!(
            fs::read_to_string(target.join("README.md")).unwrap(),
            "# upstream\n"
        );

        fs::write(target.join("stray.txt"), "local edit").unwrap();
        reclone(url, target.clone(), GitCredentials::default())
            .await
            .unwrap();
        assert!(!target.join("stray.txt").exists());
        assert!(target.join("README.md").exists());
    }

    #[tokio::test]
    async fn clone_of_missing_remote_fails() {
        let work = TempDir::new().unwrap();
        let missing = work.path().join("no-such-repo");
        let err = reclone(
            missing.to_string_lossy().into_owned(),
            work.path().join("out"),
            GitCredentials::default(),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, GitStoreError::Git(_)));
    }
}
