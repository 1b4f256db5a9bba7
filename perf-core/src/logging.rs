//! ``src/logging.rs``
//! ============================================================================
//! # Logging: tracing subscriber setup
//!
//! Every diagnostic of the crate goes through `tracing` macros under the
//! `perf::*` targets. This module installs the global subscriber: an
//! [`EnvFilter`] seeded from the configured level (and `RUST_LOG`) feeding
//! either a human-readable stderr layer or a JSON-lines file layer.
//!
//! Both writers are non-blocking; keep the returned [`WorkerGuard`] alive
//! for as long as output should be flushed.

use std::{
    path::{Path, PathBuf},
    str::FromStr,
    sync::atomic::{AtomicBool, Ordering},
};

use compact_str::CompactString;
use serde::{Deserialize, Serialize};
use tokio::fs as TokioFs;
use tracing_appender::{
    non_blocking::WorkerGuard,
    rolling::{RollingFileAppender, Rotation},
};
use tracing_subscriber::{
    EnvFilter, filter::Directive, layer::SubscriberExt, util::SubscriberInitExt,
};

static INITIALIZED: AtomicBool = AtomicBool::new(false);

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct LoggerConfig {
    /// Default filter directive, e.g. `info` or `perf::gc=debug`.
    pub level: CompactString,

    /// JSON-lines output directory. `None` logs to stderr.
    pub log_dir: Option<PathBuf>,

    pub file_prefix: CompactString,

    pub rotation: LogRotation,

    pub max_log_files: usize,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogRotation {
    Never,
    #[default]
    Daily,
}

impl Default for LoggerConfig {
    fn default() -> Self {
        Self {
            level: CompactString::const_new("info"),
            log_dir: None,
            file_prefix: CompactString::const_new("perf"),
            rotation: LogRotation::Daily,
            max_log_files: 7,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum LoggingError {
    #[error("Logger already initialized")]
    AlreadyInitialized,

    #[error("Invalid log directory: {0}")]
    InvalidLogDirectory(String),

    #[error("Failed to create log directory: {0}")]
    DirectoryCreationFailed(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    ConfigError(String),
}

// Logger builder
pub struct LoggerBuilder {
    config: LoggerConfig,
}

impl LoggerBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self {
            config: LoggerConfig::default(),
        }
    }

    #[must_use]
    pub fn with_config(mut self, config: LoggerConfig) -> Self {
        self.config = config;
        self
    }

    #[must_use]
    pub fn with_level(mut self, level: &str) -> Self {
        self.config.level = CompactString::new(level);
        self
    }

    #[must_use]
    pub fn with_log_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.log_dir = Some(dir.into());
        self
    }

    pub async fn build(self) -> Result<WorkerGuard, LoggingError> {
        validate_config(&self.config)?;
        let filter = make_filter(&self.config.level)?;

        if INITIALIZED.swap(true, Ordering::AcqRel) {
            return Err(LoggingError::AlreadyInitialized);
        }

        let result = self.install(filter).await;
        if result.is_err() {
            INITIALIZED.store(false, Ordering::Release);
        }
        result
    }

    async fn install(self, filter: EnvFilter) -> Result<WorkerGuard, LoggingError> {
        let (file_layer, stderr_layer, guard) = match &self.config.log_dir {
            Some(dir) => {
                setup_log_directory(dir).await?;

                let rotation = match self.config.rotation {
                    LogRotation::Never => Rotation::NEVER,
                    LogRotation::Daily => Rotation::DAILY,
                };
                let appender = RollingFileAppender::builder()
                    .rotation(rotation)
                    .filename_prefix(self.config.file_prefix.as_str())
                    .filename_suffix("jsonl")
                    .max_log_files(self.config.max_log_files)
                    .build(dir)
                    .map_err(|e| LoggingError::ConfigError(e.to_string()))?;

                let (writer, guard) = tracing_appender::non_blocking(appender);
                let layer = tracing_subscriber::fmt::layer()
                    .json()
                    .with_current_span(false)
                    .with_writer(writer);
                (Some(layer), None, guard)
            }
            None => {
                let (writer, guard) = tracing_appender::non_blocking(std::io::stderr());
                let layer = tracing_subscriber::fmt::layer()
                    .with_target(true)
                    .with_writer(writer);
                (None, Some(layer), guard)
            }
        };

        tracing_subscriber::registry()
            .with(filter)
            .with(file_layer)
            .with(stderr_layer)
            .try_init()
            .map_err(|_| LoggingError::AlreadyInitialized)?;

        Ok(guard)
    }
}

impl Default for LoggerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

fn make_filter(level: &str) -> Result<EnvFilter, LoggingError> {
    let directive = Directive::from_str(level)
        .map_err(|e| LoggingError::ConfigError(format!("invalid log level {level:?}: {e}")))?;
    Ok(EnvFilter::from_default_env().add_directive(directive))
}

fn validate_config(config: &LoggerConfig) -> Result<(), LoggingError> {
    if config.file_prefix.is_empty() {
        return Err(LoggingError::ConfigError(
            "File prefix must not be empty".to_string(),
        ));
    }

    if let Some(dir) = &config.log_dir {
        validate_log_directory(dir)?;
    }
    Ok(())
}

fn validate_log_directory(path: &Path) -> Result<(), LoggingError> {
    if path.components().count() == 0 {
        return Err(LoggingError::InvalidLogDirectory("Empty path".to_string()));
    }

    for component in path.components() {
        if component == std::path::Component::ParentDir {
            return Err(LoggingError::InvalidLogDirectory(
                "Path contains parent directory references".to_string(),
            ));
        }
    }

    Ok(())
}

async fn setup_log_directory(log_dir: &Path) -> Result<(), LoggingError> {
    if !log_dir.exists() {
        TokioFs::create_dir_all(log_dir).await?;
    }
    Ok(())
}

pub async fn init_logging_with_config(config: LoggerConfig) -> Result<WorkerGuard, LoggingError> {
    LoggerBuilder::new().with_config(config).build().await
}
