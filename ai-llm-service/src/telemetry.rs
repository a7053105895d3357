//! Log layers shared by the service binary.
//!
//! Two formatting layers are composed on one registry: a compact stdout layer
//! (ANSI only on a terminal) and a plain layer appending to a log file.

use std::fs::{File, OpenOptions};
use std::io::{self, IsTerminal};
use std::path::Path;
use std::sync::Arc;

use tracing_subscriber::fmt::format::Writer;
use tracing_subscriber::fmt::time::FormatTime;
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::{EnvFilter, Layer, fmt};

/// RFC3339 UTC timer implemented via `chrono`.
/// Example output: `2025-09-12T10:20:30Z`
#[derive(Clone, Debug, Default)]
struct ChronoRfc3339Utc;

impl FormatTime for ChronoRfc3339Utc {
    fn format_time(&self, w: &mut Writer<'_>) -> std::fmt::Result {
        let now = chrono::Utc::now();
        let s = now.to_rfc3339_opts(chrono::SecondsFormat::Secs, true);
        w.write_str(&s)
    }
}

/// Compact stdout layer with RFC3339 timestamps and span-close durations.
pub fn stdout_layer<S>() -> impl Layer<S> + Send + Sync
where
    S: tracing::Subscriber + for<'a> LookupSpan<'a>,
{
    fmt::layer()
        .with_timer(ChronoRfc3339Utc)
        .with_target(true)
        .with_ansi(io::stdout().is_terminal())
        .with_span_events(fmt::format::FmtSpan::CLOSE)
        .compact()
}

/// Append-only file layer (no ANSI escapes).
///
/// # Errors
/// Returns the I/O error if the log file cannot be opened for appending.
pub fn file_layer<S>(path: &Path) -> io::Result<impl Layer<S> + Send + Sync>
where
    S: tracing::Subscriber + for<'a> LookupSpan<'a>,
{
    let file: File = OpenOptions::new().create(true).append(true).open(path)?;

    Ok(fmt::layer()
        .with_timer(ChronoRfc3339Utc)
        .with_target(true)
        .with_ansi(false)
        .with_writer(Arc::new(file)))
}

/// `EnvFilter` from `RUST_LOG`, or `default` when unset/invalid.
pub fn env_filter(default: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tracing_subscriber::Registry;
    use tracing_subscriber::layer::SubscriberExt;

    #[test]
    fn file_layer_appends_events() {
        let dir = std::env::temp_dir().join(format!("self-deploy-log-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("test.log");
        std::fs::write(&path, "existing\n").unwrap();

        let subscriber = Registry::default().with(file_layer(&path).unwrap());
        tracing::subscriber::with_default(subscriber, || {
            tracing::info!("hello from the file layer");
        });

        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.starts_with("existing\n"));
        assert!(text.contains("hello from the file layer"));
        std::fs::remove_dir_all(&dir).unwrap();
    }
}
