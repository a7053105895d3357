use std::sync::Arc;

use axum::{
    body::Body,
    extract::State,
    http::{Request, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use project_code_store::is_visible_path;
use tracing::debug;

use crate::core::app_state::AppState;

/// Guards the raw file service nested under `/cloned_repo`.
///
/// Sees the path with the mount prefix stripped. `.git` is never served and
/// other dot-paths only with `INCLUDE_HIDDEN`, matching the listing. Files
/// are read under the workspace read lock.
pub async fn raw_file_guard(
    State(state): State<Arc<AppState>>,
    req: Request<Body>,
    next: Next,
) -> Response {
    // ServeDir percent-decodes, so `%2Egit` must be judged decoded.
    let path = req.uri().path();
    let visible = urlencoding::decode(path)
        .map(|decoded| is_visible_path(&decoded, state.config.concat))
        .unwrap_or(false);
    if !visible {
        debug!(path, "raw file request refused");
        return StatusCode::NOT_FOUND.into_response();
    }

    let _guard = state.workspace.read().await;
    next.run(req).await
}
