//! Completion client for the self-deploy service.
//!
//! - [`config`]: model/provider configuration loaded from the environment
//! - [`services`]: thin HTTP clients per provider
//! - [`completion`]: the [`CompletionClient`] seam and its tagged result
//! - [`telemetry`]: tracing layers used by the binary

pub mod completion;
pub mod config;
pub mod error_handler;
pub mod services;
pub mod telemetry;

pub use completion::{CompletionClient, CompletionError, LlmCompletionClient};
pub use config::{
    default_config::config_from_env, llm_model_config::LlmModelConfig, llm_provider::LlmProvider,
};
pub use error_handler::AiLlmError;
