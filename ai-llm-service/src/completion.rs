//! Single-shot completion with a tagged result.
//!
//! Callers talk to [`CompletionClient`], which returns either the model's reply
//! text or a [`CompletionError`] saying *why* there is none. The concrete
//! [`LlmCompletionClient`] dispatches to OpenAI or Ollama without retries.

use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;
use tracing::{info, warn};

use crate::{
    config::{llm_model_config::LlmModelConfig, llm_provider::LlmProvider},
    error_handler::{AiLlmError, ProviderErrorKind},
    services::{ollama_service::OllamaService, open_ai_service::OpenAiService},
};

/// Why a completion produced no usable reply.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum CompletionError {
    /// Network failure, timeout, or non-2xx status from the provider.
    #[error("completion transport failure: {0}")]
    Transport(String),

    /// The provider answered but the payload had an unexpected shape.
    #[error("malformed completion response: {0}")]
    MalformedResponse(String),

    /// The model answered with empty text.
    #[error("model returned an empty answer")]
    EmptyAnswer,
}

impl From<AiLlmError> for CompletionError {
    fn from(err: AiLlmError) -> Self {
        match &err {
            AiLlmError::Provider(p) => match p.kind {
                ProviderErrorKind::Decode(_) | ProviderErrorKind::EmptyChoices => {
                    CompletionError::MalformedResponse(err.to_string())
                }
                _ => CompletionError::Transport(err.to_string()),
            },
            _ => CompletionError::Transport(err.to_string()),
        }
    }
}

/// Sends one prompt and returns one reply.
#[async_trait]
pub trait CompletionClient: Send + Sync {
    async fn complete(&self, prompt: &str) -> Result<String, CompletionError>;
}

/// Provider-backed [`CompletionClient`] with enum dispatch.
#[derive(Debug)]
pub enum LlmCompletionClient {
    OpenAI(OpenAiService),
    Ollama(OllamaService),
}

impl LlmCompletionClient {
    /// Builds the provider client selected by `cfg.provider`.
    ///
    /// # Errors
    /// Propagates provider constructor validation errors.
    pub fn new(cfg: LlmModelConfig) -> Result<Self, AiLlmError> {
        Ok(match cfg.provider {
            LlmProvider::OpenAI => LlmCompletionClient::OpenAI(OpenAiService::new(cfg)?),
            LlmProvider::Ollama => LlmCompletionClient::Ollama(OllamaService::new(cfg)?),
        })
    }
}

#[async_trait]
impl CompletionClient for LlmCompletionClient {
    async fn complete(&self, prompt: &str) -> Result<String, CompletionError> {
        let raw = match self {
            LlmCompletionClient::OpenAI(svc) => svc.generate(prompt).await,
            LlmCompletionClient::Ollama(svc) => svc.generate(prompt).await,
        };

        let reply = match raw {
            Ok(text) => text,
            Err(err) => {
                let err = CompletionError::from(err);
                warn!(error = %err, "completion failed");
                return Err(err);
            }
        };

        if reply.trim().is_empty() {
            warn!("completion returned an empty answer");
            return Err(CompletionError::EmptyAnswer);
        }

        info!(reply_len = reply.len(), "completion received");
        Ok(reply)
    }
}
