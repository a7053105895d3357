use crate::config::llm_provider::LlmProvider;

/// Configuration for a completion model invocation.
///
/// The completion request itself carries no sampling controls unless they are
/// set here; the service ships with all of them unset.
///
/// # Examples
///
/// ```
/// use ai_llm_service::config::{llm_model_config::LlmModelConfig, llm_provider::LlmProvider};
///
/// let cfg = LlmModelConfig {
///     provider: LlmProvider::OpenAI,
///     model: "gpt-4o".to_string(),
///     endpoint: "https://api.openai.com".to_string(),
///     api_key: Some("sk-...".to_string()),
///     max_tokens: None,
///     temperature: None,
///     top_p: None,
///     timeout_secs: Some(120),
/// };
/// assert_eq!(cfg.model, "gpt-4o");
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct LlmModelConfig {
    /// The LLM provider/backend.
    pub provider: LlmProvider,

    /// Model identifier string (e.g., `"gpt-4o"`, `"qwen3:14b"`).
    pub model: String,

    /// Base URL of the provider API.
    pub endpoint: String,

    /// Optional API key for authentication (required by OpenAI).
    pub api_key: Option<String>,

    /// Maximum number of tokens to generate.
    pub max_tokens: Option<u32>,

    /// Sampling temperature.
    pub temperature: Option<f32>,

    /// Nucleus sampling parameter.
    pub top_p: Option<f32>,

    /// Optional request timeout (in seconds).
    pub timeout_secs: Option<u64>,
}
