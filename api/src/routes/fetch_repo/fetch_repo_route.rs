use std::sync::Arc;

use axum::{extract::State, response::Redirect};
use tracing::{info, instrument};

use crate::{
    core::app_state::AppState,
    error_handler::{AppError, AppResult},
};

/// Deletes the working copy and clones `REPO_URL` again.
#[instrument(name = "fetch_repo_route", skip_all, fields(clone_dir = %state.config.clone_dir.display()))]
pub async fn fetch_repo_route(State(state): State<Arc<AppState>>) -> AppResult<Redirect> {
    let url = state
        .config
        .repo_url
        .clone()
        .ok_or(AppError::MissingEnv("REPO_URL"))?;

    let _guard = state.workspace.write().await;
    project_code_store::reclone(
        url,
        state.config.clone_dir.clone(),
        state.config.credentials.clone(),
    )
    .await?;

    info!("working copy refreshed");
    Ok(Redirect::to("/view_repo"))
}
