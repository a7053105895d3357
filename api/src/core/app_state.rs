use std::{path::PathBuf, str::FromStr, sync::Arc};

use ai_llm_service::{LlmCompletionClient, config_from_env};
use git_change_engine::{
    GitChangeEngineError, ProviderConfig, PublishMode, ReplyGrammar, SubmissionPipeline,
    build_publisher,
};
use project_code_store::{CommitAuthor, ConcatOptions, GitCredentials};
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::info;

/// Default commit message for local commits and content pushes.
pub const DEFAULT_COMMIT_MESSAGE: &str = "Automated update from change request";

/// Startup configuration problems.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid value for {var}: `{value}`")]
    InvalidValue { var: &'static str, value: String },

    #[error(transparent)]
    Llm(#[from] ai_llm_service::AiLlmError),

    #[error(transparent)]
    Engine(#[from] GitChangeEngineError),
}

/// Process configuration read once at startup.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    /// Upstream clone URL used by `/fetch_repo`.
    pub repo_url: Option<String>,
    /// Local working copy; also the root served under `/cloned_repo`.
    pub clone_dir: PathBuf,
    pub credentials: GitCredentials,
    pub concat: ConcatOptions,
    pub grammar: ReplyGrammar,
    pub publish_mode: PublishMode,
    pub commit_message: String,
    pub author: CommitAuthor,
    /// Present when `GITHUB_TOKEN` and `GITHUB_REPO` are set.
    pub provider: Option<ProviderConfig>,
}

impl AppConfig {
    /// Loads configuration from process environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut cfg = Self::from_lookup(|name| std::env::var(name).ok())?;
        cfg.credentials = GitCredentials::from_env();
        cfg.provider = match cfg.publish_mode {
            PublishMode::Local => None,
            PublishMode::Patch | PublishMode::Remote => Some(ProviderConfig::from_env()?),
        };
        Ok(cfg)
    }

    /// Parses every plain setting through `lookup`; credentials and the
    /// provider config are left empty.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        let port = parse_or(&get, "PORT", 5001u16)?;
        let publish_mode = parse_or(&get, "PUBLISH_MODE", PublishMode::Remote)?;
        let grammar = parse_or(&get, "REPLY_GRAMMAR", ReplyGrammar::Auto)?;
        let include_hidden = match get("INCLUDE_HIDDEN") {
            None => false,
            Some(v) => match v.trim().to_ascii_lowercase().as_str() {
                "1" | "true" | "yes" | "on" => true,
                "0" | "false" | "no" | "off" => false,
                _ => {
                    return Err(ConfigError::InvalidValue {
                        var: "INCLUDE_HIDDEN",
                        value: v,
                    });
                }
            },
        };

        let default_author = CommitAuthor::default();
        Ok(Self {
            host: get("API_HOST").unwrap_or_else(|| "0.0.0.0".into()),
            port,
            repo_url: get("REPO_URL"),
            clone_dir: PathBuf::from(get("CLONE_DIR").unwrap_or_else(|| "cloned_repo".into())),
            credentials: GitCredentials::default(),
            concat: ConcatOptions { include_hidden },
            grammar,
            publish_mode,
            commit_message: get("COMMIT_MESSAGE").unwrap_or_else(|| DEFAULT_COMMIT_MESSAGE.into()),
            author: CommitAuthor {
                name: get("GIT_AUTHOR_NAME").unwrap_or(default_author.name),
                email: get("GIT_AUTHOR_EMAIL").unwrap_or(default_author.email),
            },
            provider: None,
        })
    }

    /// `host:port` handed to the listener.
    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn parse_or<T: FromStr>(
    get: &impl Fn(&str) -> Option<String>,
    var: &'static str,
    default: T,
) -> Result<T, ConfigError> {
    match get(var) {
        None => Ok(default),
        Some(v) => v
            .trim()
            .parse()
            .map_err(|_| ConfigError::InvalidValue { var, value: v }),
    }
}

/// Shared state for all HTTP handlers.
pub struct AppState {
    pub config: AppConfig,
    pub pipeline: SubmissionPipeline,
    /// Write-held for the whole of every submission and re-fetch; readers of
    /// the clone (listing, raw files) take the read side.
    pub workspace: RwLock<()>,
}

impl AppState {
    pub fn new(config: AppConfig, pipeline: SubmissionPipeline) -> Arc<Self> {
        Arc::new(Self {
            config,
            pipeline,
            workspace: RwLock::new(()),
        })
    }

    /// Builds the completion client and publisher described by `config`.
    pub fn from_config(config: AppConfig) -> Result<Arc<Self>, ConfigError> {
        let llm = config_from_env()?;
        info!(provider = ?llm.provider, model = %llm.model, "completion client configured");
        let completion = Arc::new(LlmCompletionClient::new(llm)?);

        let publisher = build_publisher(
            config.publish_mode,
            config.clone_dir.clone(),
            config.commit_message.clone(),
            config.author.clone(),
            config.provider.clone(),
        )?;

        let pipeline = SubmissionPipeline::new(
            completion,
            publisher,
            config.clone_dir.clone(),
            config.concat,
            config.grammar,
        );
        Ok(Self::new(config, pipeline))
    }
}
