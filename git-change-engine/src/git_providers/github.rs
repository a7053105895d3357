//! GitHub contents client (REST v3).
//!
//! Endpoints used:
//!   * GET /repos/{owner}/{repo}/contents/{path}?ref={ref}
//!   * PUT /repos/{owner}/{repo}/contents/{path}

use std::time::Duration;

use base64::{Engine, engine::general_purpose::STANDARD};
use reqwest::{Client, Response, StatusCode, header};
use tracing::{debug, instrument, warn};

use crate::errors::{
    GitChangeEngineConfigError, GitChangeEngineError, GitChangeEngineProviderError,
    GitChangeEngineResult,
};
use crate::git_providers::ProviderConfig;
use crate::git_providers::types::*;

const ACCEPT_JSON: &str = "application/vnd.github+json";

/// GitHub HTTP client bound to one repository and branch.
#[derive(Debug, Clone)]
pub struct GitHubContentsClient {
    http: Client,
    base_api: String,
    token: String,
    owner: String,
    repo: String,
    branch: String,
}

impl GitHubContentsClient {
    /// Builds the client with a stable user agent and request timeout.
    pub fn from_config(cfg: ProviderConfig) -> GitChangeEngineResult<Self> {
        cfg.validate()?;
        let (owner, repo) = split_owner_repo(&cfg.repo)?;
        debug!(base_api = %cfg.base_api, %owner, %repo, branch = %cfg.branch, "creating GitHub contents client");

        let http = Client::builder()
            .user_agent("self-deploy/0.1")
            .timeout(Duration::from_secs(30))
            .build()?;

        Ok(Self {
            http,
            base_api: cfg.base_api.trim_end_matches('/').to_string(),
            token: cfg.token,
            owner,
            repo,
            branch: cfg.branch,
        })
    }

    /// Branch content pushes are committed to.
    pub fn branch(&self) -> &str {
        &self.branch
    }

    /// Fetches the blob SHA and decoded content of `path` at `git_ref`.
    ///
    /// Returns `Ok(None)` when the file does not exist (404).
    #[instrument(skip(self), fields(repo = %self.repo))]
    pub async fn get_file(
        &self,
        path: &str,
        git_ref: &str,
    ) -> GitChangeEngineResult<Option<RemoteFile>> {
        let url = self.contents_url(path);
        debug!(%url, "GitHub get_file");

        let resp = self
            .http
            .get(&url)
            .query(&[("ref", git_ref)])
            .bearer_auth(&self.token)
            .header(header::ACCEPT, ACCEPT_JSON)
            .send()
            .await?;

        if resp.status() == StatusCode::NOT_FOUND {
            debug!("file not present on remote");
            return Ok(None);
        }

        let entry: ContentsEntry = check_status(resp)?.json().await?;
        let content = match (entry.content.as_deref(), entry.encoding.as_deref()) {
            (Some(raw), Some("base64") | None) => decode_content(raw),
            (Some(_), Some(other)) => {
                warn!(encoding = other, "unsupported content encoding");
                None
            }
            (None, _) => None,
        };

        Ok(Some(RemoteFile {
            sha: entry.sha,
            content,
        }))
    }

    /// Creates or updates `path` on the configured branch with one commit.
    ///
    /// `sha` must be the current blob SHA for existing files and `None` for
    /// new ones.
    #[instrument(skip(self, content, message), fields(repo = %self.repo, bytes = content.len()))]
    pub async fn put_file(
        &self,
        path: &str,
        content: &str,
        message: &str,
        sha: Option<&str>,
    ) -> GitChangeEngineResult<PutOutcome> {
        let url = self.contents_url(path);
        let body = PutContentsRequest {
            message,
            content: STANDARD.encode(content.as_bytes()),
            branch: &self.branch,
            sha,
        };
        debug!(%url, update = sha.is_some(), "GitHub put_file");

        let resp = self
            .http
            .put(&url)
            .bearer_auth(&self.token)
            .header(header::ACCEPT, ACCEPT_JSON)
            .json(&body)
            .send()
            .await?;

        let parsed: PutContentsResponse = check_status(resp)?.json().await?;
        Ok(PutOutcome {
            content_sha: parsed.content.map(|c| c.sha),
            commit_sha: parsed.commit.sha,
        })
    }

    fn contents_url(&self, path: &str) -> String {
        let encoded = path
            .split('/')
            .map(|seg| urlencoding::encode(seg).into_owned())
            .collect::<Vec<_>>()
            .join("/");
        format!(
            "{}/repos/{}/{}/contents/{}",
            self.base_api, self.owner, self.repo, encoded
        )
    }
}

/// Maps non-2xx responses to provider errors, keeping `Retry-After` on 429.
fn check_status(resp: Response) -> Result<Response, GitChangeEngineProviderError> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    warn!(status = status.as_u16(), url = %resp.url(), "GitHub request failed");
    if status == StatusCode::TOO_MANY_REQUESTS {
        let retry_after_secs = resp
            .headers()
            .get(header::RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.trim().parse().ok());
        return Err(GitChangeEngineProviderError::RateLimited { retry_after_secs });
    }
    Err(GitChangeEngineProviderError::from_status(status.as_u16()))
}

/// Decodes the API's base64 payload, which is wrapped at 60 columns.
fn decode_content(raw: &str) -> Option<String> {
    let compact: String = raw.chars().filter(|c| !c.is_whitespace()).collect();
    let bytes = STANDARD.decode(compact).ok()?;
    String::from_utf8(bytes).ok()
}

/// Splits "owner/repo" into components or returns a config error.
pub(crate) fn split_owner_repo(project: &str) -> GitChangeEngineResult<(String, String)> {
    let mut parts = project.split('/');
    let owner = parts.next().unwrap_or("").trim();
    let repo = parts.next().unwrap_or("").trim();

    if owner.is_empty() || repo.is_empty() || parts.next().is_some() {
        return Err(GitChangeEngineError::Config(
            GitChangeEngineConfigError::InvalidRepo(project.to_string()),
        ));
    }

    Ok((owner.to_string(), repo.to_string()))
}


#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn get_file_decodes_wrapped_base64() {
        let long = "line of text that is long enough to wrap the base64 payload\n".repeat(3);
        let state = fake::with_files(&[("src/app.py", "abc123", long.as_str())]);
        let client = GitHubContentsClient::from_config(fake::start(state.clone()).await).unwrap();

        let file = client.get_file("src/app.py", "main").await.unwrap().unwrap();
        assert_eq!(file.sha, "abc123");
        assert_eq!(file.content.as_deref(), Some(long.as_str()));
        assert_eq!(state.lock().unwrap().seen_auth, vec!["Bearer test-token"]);
    }

    #[tokio::test]
    async fn missing_file_is_none() {
        let state = fake::with_files(&[]);
        let client = GitHubContentsClient::from_config(fake::start(state).await).unwrap();
        assert_eq!(client.get_file("nope.txt", "main").await.unwrap(), None);
    }

    #[tokio::test]
    async fn put_for_new_file_omits_sha() {
        let state = fake::with_files(&[]);
        let client = GitHubContentsClient::from_config(fake::start(state.clone()).await).unwrap();

        let out = client
            .put_file("docs/new file.md", "hi\n", "add doc", None)
            .await
            .unwrap();
        assert_eq!(out.commit_sha, "commit1");
        assert_eq!(out.content_sha.as_deref(), Some("blob1"));

        let repo = state.lock().unwrap();
        let (path, body) = &repo.puts[0];
        assert_eq!(path, "docs/new file.md");
        assert!(body.get("sha").is_none());
        assert_eq!(body["branch"], "main");
        assert_eq!(body["message"], "add doc");
        assert_eq!(body["content"], STANDARD.encode("hi\n"));
    }

    #[tokio::test]
    async fn put_for_existing_file_sends_sha() {
        let state = fake::with_files(&[("a.txt", "old-sha", "a")]);
        let client = GitHubContentsClient::from_config(fake::start(state.clone()).await).unwrap();

        client
            .put_file("a.txt", "b", "update", Some("old-sha"))
            .await
            .unwrap();
        assert_eq!(state.lock().unwrap().puts[0].1["sha"], "old-sha");
    }

    #[tokio::test]
    async fn failed_put_maps_status() {
        let state = fake::with_files(&[]);
        state.lock().unwrap().fail_puts_with = Some(409);
        let client = GitHubContentsClient::from_config(fake::start(state).await).unwrap();

        let err = client.put_file("a.txt", "b", "m", None).await.unwrap_err();
        assert!(matches!(
            err,
            GitChangeEngineError::Provider(GitChangeEngineProviderError::Conflict)
        ));
    }

    #[test]
    fn split_owner_repo_rejects_bad_ids() {
        assert!(split_owner_repo("a/b").is_ok());
        assert!(split_owner_repo("a").is_err());
        assert!(split_owner_repo("a/b/c").is_err());
        assert!(split_owner_repo("/b").is_err());
    }
}
