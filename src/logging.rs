//! Tracing setup.
//!
//! `serve` logs JSON lines to a daily-rotated file under `paths.logs_dir`
//! and a compact human format to stderr. One-shot subcommands log to stderr
//! only, and only warnings by default so their stdout stays machine-readable.
//! `RUST_LOG` overrides either default.

use std::path::Path;

use anyhow::Context;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

/// Rotated files are named `supportdesk.log.YYYY-MM-DD`.
const LOG_FILE_PREFIX: &str = "supportdesk.log";

const SERVER_FILTER: &str = "info,supportdesk=debug,tower_http=info,sqlx=warn";
const CLI_FILTER: &str = "warn";

/// Keeps the background file writer alive. Dropping it flushes the file.
pub struct LoggingGuard {
    _writer: WorkerGuard,
}

/// Install file and console logging for the long-running server.
///
/// # Errors
///
/// Returns an error if `logs_dir` cannot be created.
pub fn init_production(logs_dir: &Path) -> anyhow::Result<LoggingGuard> {
    std::fs::create_dir_all(logs_dir)
        .with_context(|| format!("failed to create logs directory {}", logs_dir.display()))?;

    let (file_writer, writer_guard) =
        tracing_appender::non_blocking(tracing_appender::rolling::daily(logs_dir, LOG_FILE_PREFIX));

    tracing_subscriber::registry()
        .with(filter_or(SERVER_FILTER))
        .with(
            fmt::layer()
                .json()
                .with_current_span(true)
                .with_writer(file_writer),
        )
        .with(fmt::layer().compact().with_target(false).with_writer(std::io::stderr))
        .init();

    Ok(LoggingGuard {
        _writer: writer_guard,
    })
}

/// Install stderr-only logging for `classify` and `seed`.
pub fn init_cli() {
    fmt()
        .with_env_filter(filter_or(CLI_FILTER))
        .with_writer(std::io::stderr)
        .init();
}

fn filter_or(default: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default))
}
