use std::sync::Arc;

use axum::{
    extract::{Form, Json, State, rejection::JsonRejection},
    response::{IntoResponse, Redirect, Response},
};
use git_change_engine::{GitChangeEngineResult, SubmissionOutcome, SubmissionReport};
use tracing::{error, info, instrument};

use crate::{
    core::{app_state::AppState, http::response_envelope::ApiResponse},
    error_handler::AppError,
    routes::submit::submit_request::SubmitRequest,
};

/// Runs one submission while holding the workspace lock.
async fn run_submission(
    state: &AppState,
    prompt: &str,
) -> GitChangeEngineResult<SubmissionReport> {
    let _guard = state.workspace.write().await;
    state.pipeline.submit(prompt).await
}

/// Form submission; always redirects home.
#[instrument(name = "submit_route", skip_all, fields(prompt_len = form.prompt.len()))]
pub async fn submit_route(
    State(state): State<Arc<AppState>>,
    Form(form): Form<SubmitRequest>,
) -> Redirect {
    match run_submission(&state, &form.prompt).await {
        Ok(report) => match &report.outcome {
            SubmissionOutcome::Applied => info!(
                files = report.publish.files.len(),
                applied = report.publish.applied(),
                "change request applied"
            ),
            SubmissionOutcome::NoChanges { reason } => info!(?reason, "no changes"),
        },
        Err(e) => error!(error = %e, "submission failed"),
    }
    Redirect::to("/")
}

/// JSON submission returning the structured report.
#[instrument(name = "api_submit_route", skip_all)]
pub async fn api_submit_route(
    State(state): State<Arc<AppState>>,
    body: Result<Json<SubmitRequest>, JsonRejection>,
) -> Response {
    let Json(req) = match body {
        Ok(b) => b,
        Err(rej) => return AppError::from(rej).into_response(),
    };

    if req.prompt.trim().is_empty() {
        return ApiResponse::invalid_prompt(
            "Field `prompt` must be a non-empty change request.",
            "Describe the change in plain language.",
        );
    }

    match run_submission(&state, &req.prompt).await {
        Ok(report) => ApiResponse::report(state.config.publish_mode, report),
        Err(err) => {
            error!(error = %err, "submission failed");
            AppError::from(err).into_response()
        }
    }
}
