use serde::Deserialize;

/// Body of `POST /submit` (form) and `POST /api/submit` (JSON).
#[derive(Debug, Deserialize)]
pub struct SubmitRequest {
    /// Natural-language change request.
    pub prompt: String,
}
