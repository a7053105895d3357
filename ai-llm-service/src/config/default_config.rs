//! Completion model config loaded from environment variables.
//!
//! # Environment variables
//!
//! - `LLM_PROVIDER`     = `openai` (default) or `ollama`
//! - `LLM_MODEL`        = model id (default `gpt-4o` / `qwen3:14b`)
//! - `LLM_ENDPOINT`     = provider base URL (default per provider)
//! - `OPENAI_API_KEY`   = API key (mandatory for `openai`)
//! - `LLM_MAX_TOKENS`   = optional max tokens (u32)
//! - `LLM_TIMEOUT_SECS` = optional request timeout (default 120)

use crate::{
    config::{llm_model_config::LlmModelConfig, llm_provider::LlmProvider},
    error_handler::{
        AiLlmError, ConfigError, env_opt, env_opt_u32, env_opt_u64, must_env,
        validate_http_endpoint,
    },
};

const DEFAULT_TIMEOUT_SECS: u64 = 120;

/// Builds the completion model config from the process environment.
///
/// # Errors
/// - [`ConfigError::UnsupportedProvider`] for an unknown `LLM_PROVIDER`
/// - [`ConfigError::MissingVar`] if `OPENAI_API_KEY` is absent for OpenAI
/// - [`ConfigError::InvalidFormat`] if `LLM_ENDPOINT` is not http(s)
/// - [`ConfigError::InvalidNumber`] for bad numeric values
pub fn config_from_env() -> Result<LlmModelConfig, AiLlmError> {
    let provider = match env_opt("LLM_PROVIDER") {
        Some(raw) => raw.parse::<LlmProvider>()?,
        None => LlmProvider::OpenAI,
    };

    let model = env_opt("LLM_MODEL").unwrap_or_else(|| default_model(provider).to_string());
    if model.trim().is_empty() {
        return Err(ConfigError::EmptyModel.into());
    }

    let endpoint =
        env_opt("LLM_ENDPOINT").unwrap_or_else(|| provider.default_endpoint().to_string());
    validate_http_endpoint("LLM_ENDPOINT", &endpoint)?;

    let api_key = match provider {
        LlmProvider::OpenAI => Some(must_env("OPENAI_API_KEY")?),
        LlmProvider::Ollama => env_opt("OPENAI_API_KEY"),
    };

    Ok(LlmModelConfig {
        provider,
        model,
        endpoint,
        api_key,
        max_tokens: env_opt_u32("LLM_MAX_TOKENS")?,
        temperature: None,
        top_p: None,
        timeout_secs: Some(env_opt_u64("LLM_TIMEOUT_SECS")?.unwrap_or(DEFAULT_TIMEOUT_SECS)),
    })
}

fn default_model(provider: LlmProvider) -> &'static str {
    match provider {
        LlmProvider::OpenAI => "gpt-4o",
        LlmProvider::Ollama => "qwen3:14b",
    }
}
