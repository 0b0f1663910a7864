use std::fs;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use crate::config::LoggingConfig;
use crate::error::{ExtractError, Result};

/// Installs the global subscriber: console output plus a daily JSON log file.
///
/// `RUST_LOG` overrides the configured default filter. Keep the returned guard
/// alive for as long as file logging should be flushed.
pub fn init_logging(config: &LoggingConfig) -> Result<WorkerGuard> {
    fs::create_dir_all(&config.directory)?;

    let file_appender = tracing_appender::rolling::daily(&config.directory, &config.file_name);
    let (non_blocking_writer, guard) = tracing_appender::non_blocking(file_appender);

    let file_layer = fmt::layer().json().with_writer(non_blocking_writer);
    let console_layer = fmt::layer().with_writer(std::io::stdout);

    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(&config.default_filter).map_err(|e| {
            ExtractError::Config(format!(
                "invalid log filter '{}': {}",
                config.default_filter, e
            ))
        })?,
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(file_layer)
        .with(console_layer)
        .try_init()
        .map_err(|e| ExtractError::Config(format!("logging already initialized: {}", e)))?;

    Ok(guard)
}
