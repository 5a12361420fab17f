//! Tracing subscriber setup for the `rezehor` binary.
//!
//! Events go to stderr and to a rolling file under `<data_dir>/logs`. The
//! returned guard flushes the file writer on drop and must be held by `main`.

use crate::config::{Config, LogRotation};
use crate::{Error, Result};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

const LOG_FILE_PREFIX: &str = "rezehor";

pub fn init(config: &Config) -> Result<WorkerGuard> {
    let (file_writer, guard) = tracing_appender::non_blocking(file_appender(config)?);

    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => level_filter(&config.logging.level)?,
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(
            tracing_subscriber::fmt::layer()
                .with_ansi(false)
                .with_writer(file_writer),
        )
        .try_init()
        .map_err(|e| Error::Config(format!("Failed to install tracing subscriber: {}", e)))?;

    tracing::info!("Logger initialized");
    Ok(guard)
}

fn file_appender(config: &Config) -> Result<RollingFileAppender> {
    let mut builder = RollingFileAppender::builder()
        .rotation(rotation(config.logging.rotation))
        .filename_prefix(LOG_FILE_PREFIX)
        .filename_suffix("log");
    if config.logging.max_files > 0 {
        builder = builder.max_log_files(config.logging.max_files);
    }

    builder
        .build(config.log_dir())
        .map_err(|e| Error::Config(format!("Failed to open log file: {}", e)))
}

fn rotation(rotation: LogRotation) -> Rotation {
    match rotation {
        LogRotation::Minutely => Rotation::MINUTELY,
        LogRotation::Hourly => Rotation::HOURLY,
        LogRotation::Daily => Rotation::DAILY,
        LogRotation::Never => Rotation::NEVER,
    }
}

/// Filter admitting this crate's events at `level` and above.
fn level_filter(level: &str) -> Result<EnvFilter> {
    let level: tracing::Level = level
        .trim()
        .parse()
        .map_err(|_| Error::Config(format!("Invalid log level '{}'", level)))?;

    Ok(EnvFilter::new(format!(
        "{}={}",
        env!("CARGO_CRATE_NAME"),
        level
    )))
}
