use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use git_change_engine::{PublishMode, SubmissionReport};
use serde::Serialize;

/// Envelope of `POST /api/submit`.
///
/// `success` means the request ran to the end; a `no_changes` report is
/// still a success. Per-file rejections live inside `data`.
#[derive(Serialize)]
pub struct ApiResponse<T>
where
    T: Serialize,
{
    pub success: bool,

    /// Publishing path the service runs with.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mode: Option<PublishMode>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ApiError>,
}

#[derive(Serialize)]
pub struct ApiError {
    pub code: &'static str,
    pub message: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub details: Vec<ApiErrorDetail>,
}

/// Points at the offending request field.
#[derive(Serialize)]
pub struct ApiErrorDetail {
    pub path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hint: Option<String>,
}

impl ApiResponse<SubmissionReport> {
    /// 200 carrying the submission report.
    pub fn report(mode: PublishMode, report: SubmissionReport) -> Response {
        let body = Self {
            success: true,
            mode: Some(mode),
            data: Some(report),
            error: None,
        };
        (StatusCode::OK, Json(body)).into_response()
    }
}

impl ApiResponse<()> {
    /// 400 for a change request that cannot be submitted.
    pub fn invalid_prompt(message: impl Into<String>, hint: &str) -> Response {
        let body = Self {
            success: false,
            mode: None,
            data: None,
            error: Some(ApiError {
                code: "INVALID_PROMPT",
                message: message.into(),
                details: vec![ApiErrorDetail {
                    path: "prompt".to_string(),
                    hint: Some(hint.to_string()),
                }],
            }),
        };
        (StatusCode::BAD_REQUEST, Json(body)).into_response()
    }
}
