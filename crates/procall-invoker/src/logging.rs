//! Logging setup for hosts embedding the invoker
//!
//! Installs a `tracing` subscriber with an optional pretty console layer and
//! an optional daily-rolling JSON file layer. `RUST_LOG` takes precedence
//! over the configured default filter.

use std::path::PathBuf;

use anyhow::Context;
use serde::{Deserialize, Serialize};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{
    EnvFilter, Layer,
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
};

/// File name prefix of the rolling JSON log
pub const LOG_FILE_PREFIX: &str = "procall.log";

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Directory the JSON log files are written to
    pub log_dir: PathBuf,

    pub enable_json_logs: bool,

    pub enable_console_logs: bool,

    /// Include file/line information in console output
    pub include_location: bool,

    /// Emit span open/close events
    pub enable_spans: bool,

    /// Filter used when `RUST_LOG` is not set
    pub default_filter: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            log_dir: log_directory(),
            enable_json_logs: true,
            enable_console_logs: true,
            include_location: cfg!(debug_assertions),
            enable_spans: cfg!(debug_assertions),
            default_filter: "info,procall_invoker=debug,procall_connection=debug".to_string(),
        }
    }
}

impl LoggingConfig {
    /// JSON file logs only, info level
    pub fn production() -> Self {
        Self {
            enable_console_logs: false,
            include_location: false,
            enable_spans: false,
            default_filter: "warn,procall_invoker=info,procall_connection=info".to_string(),
            ..Self::default()
        }
    }

    /// Console only, nothing written to disk
    pub fn console_only() -> Self {
        Self {
            enable_json_logs: false,
            ..Self::default()
        }
    }
}

/// Keeps the background file writer alive; flushes pending lines on drop
#[must_use = "dropping the guard stops file logging"]
pub struct LoggingGuard {
    _file_writer: Option<WorkerGuard>,
}

/// Install the global subscriber described by `config`
///
/// Fails if a global subscriber is already installed or the log directory
/// cannot be created.
pub fn init(config: LoggingConfig) -> anyhow::Result<LoggingGuard> {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.default_filter));

    // NEW/CLOSE only; ENTER would repeat on every poll of an awaited future
    let span_events = if config.enable_spans {
        FmtSpan::NEW | FmtSpan::CLOSE
    } else {
        FmtSpan::NONE
    };

    let mut layers = Vec::new();
    let mut file_writer = None;

    if config.enable_console_logs {
        layers.push(
            fmt::layer()
                .with_target(true)
                .with_file(config.include_location)
                .with_line_number(config.include_location)
                .with_span_events(span_events.clone())
                .with_ansi(true)
                .pretty()
                .with_filter(env_filter.clone())
                .boxed(),
        );
    }

    if config.enable_json_logs {
        std::fs::create_dir_all(&config.log_dir)
            .with_context(|| format!("Failed to create log directory {:?}", config.log_dir))?;

        let file_appender = tracing_appender::rolling::daily(&config.log_dir, LOG_FILE_PREFIX);
        let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
        file_writer = Some(guard);

        layers.push(
            fmt::layer()
                .with_target(true)
                .with_thread_ids(true)
                .with_file(true)
                .with_line_number(true)
                .with_span_events(span_events)
                .with_ansi(false)
                .json()
                .with_current_span(true)
                .with_span_list(true)
                .with_writer(non_blocking)
                .with_filter(env_filter)
                .boxed(),
        );
    }

    tracing_subscriber::registry()
        .with(layers)
        .try_init()
        .context("A global tracing subscriber is already installed")?;

    tracing::info!(
        log_dir = %config.log_dir.display(),
        json_enabled = config.enable_json_logs,
        console_enabled = config.enable_console_logs,
        "Logging initialized"
    );

    Ok(LoggingGuard {
        _file_writer: file_writer,
    })
}

/// Initialize with the debug or release defaults
pub fn init_default() -> anyhow::Result<LoggingGuard> {
    if cfg!(debug_assertions) {
        init(LoggingConfig::default())
    } else {
        init(LoggingConfig::production())
    }
}

/// `<local data dir>/procall/logs`
pub fn log_directory() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("procall")
        .join("logs")
}
