//! Wire types of the repository contents API.

use serde::{Deserialize, Serialize};

/// A file as currently stored on the remote branch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteFile {
    /// Blob SHA, required to update the file.
    pub sha: String,
    /// Decoded text content; `None` when the API omitted it or it is not UTF-8.
    pub content: Option<String>,
}

/// Result of a successful content update.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PutOutcome {
    /// New blob SHA of the file.
    pub content_sha: Option<String>,
    /// SHA of the commit created by the update.
    pub commit_sha: String,
}

/// `GET /repos/{owner}/{repo}/contents/{path}` response (subset).
#[derive(Debug, Deserialize)]
pub(crate) struct ContentsEntry {
    pub sha: String,
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub encoding: Option<String>,
}

/// `PUT /repos/{owner}/{repo}/contents/{path}` body.
///
/// `sha` is omitted for new files.
#[derive(Debug, Serialize)]
pub(crate) struct PutContentsRequest<'a> {
    pub message: &'a str,
    /// Base64 of the full new file content.
    pub content: String,
    pub branch: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sha: Option<&'a str>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct PutContentsResponse {
    #[serde(default)]
    pub content: Option<ShaOnly>,
    pub commit: ShaOnly,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ShaOnly {
    pub sha: String,
}
