use std::{error::Error, path::PathBuf};

use ai_llm_service::telemetry::{env_filter, file_layer, stdout_layer};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    // A missing .env is fine; an unreadable or malformed one is not.
    if let Err(e) = dotenvy::dotenv() {
        if !e.not_found() {
            return Err(e.into());
        }
    }

    let log_path = PathBuf::from(
        std::env::var("LOG_FILE").unwrap_or_else(|_| "self_deploy.log".to_string()),
    );
    let mut file_error = None;

    tracing_subscriber::registry()
        .with(env_filter("info"))
        .with(stdout_layer())
        .with(file_layer(&log_path).map_err(|e| file_error = Some(e)).ok())
        .try_init()?;

    match file_error {
        None => info!(log_file = %log_path.display(), "logging initialized"),
        Some(error) => warn!(log_file = %log_path.display(), %error, "file logging disabled"),
    }

    api::start().await?;

    Ok(())
}
