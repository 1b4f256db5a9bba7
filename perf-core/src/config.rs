//! ``src/config.rs``
//! ============================================================================
//! # PerfConfig: instrumentation settings loader and saver
//!
//! Settings are TOML. Every section is optional and falls back to its
//! defaults, so an empty file is a valid configuration.
//!
//! ## Sections
//! - `[histogram]`: bounds of histograms created through the core
//! - `[event_loop]`: event-loop delay monitor
//! - `[gc]`: garbage-collection tracking
//! - `[logging]`: subscriber setup, see [`crate::logging`]
//!
//! ## Example
//! ```rust,ignore
//! let config = PerfConfig::load_from(&path).await?;
//! config.save_to(&path).await?;
//! ```

use std::{
    path::{Path, PathBuf},
    time::Duration,
};

use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use tokio::fs as TokioFs;
use tracing::info;

use crate::{
    error::{PerfError, PerfResult},
    histogram::HistogramOptions,
    logging::LoggerConfig,
};

/// Event-loop delay monitor settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EventLoopConfig {
    /// Whether hosts should run the delay monitor.
    pub enabled: bool,

    /// Sampling interval.
    #[serde(with = "humantime_serde")]
    pub resolution: Duration,

    pub histogram: HistogramOptions,
}

impl Default for EventLoopConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            resolution: Duration::from_millis(10),
            histogram: HistogramOptions::EVENT_LOOP_DELAY,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GcConfig {
    /// Install the collector hooks when the core is built.
    pub track_on_start: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PerfConfig {
    pub histogram: HistogramOptions,

    pub event_loop: EventLoopConfig,

    pub gc: GcConfig,

    pub logging: LoggerConfig,
}

impl PerfConfig {
    pub fn from_toml_str(text: &str) -> PerfResult<Self> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Load from `path`, or return defaults if the file does not exist.
    pub async fn load_from(path: &Path) -> PerfResult<Self> {
        if !path.exists() {
            info!(
                "No config file found at {}, using default configuration",
                path.display()
            );
            return Ok(Self::default());
        }

        info!("Loading config from {}", path.display());
        let text = TokioFs::read_to_string(path)
            .await
            .map_err(|source| PerfError::ConfigIo {
                path: path.to_path_buf(),
                source,
            })?;
        Self::from_toml_str(&text)
    }

    pub async fn save_to(&self, path: &Path) -> PerfResult<()> {
        info!("Saving config to {}", path.display());

        let io_err = |source| PerfError::ConfigIo {
            path: path.to_path_buf(),
            source,
        };
        if let Some(parent) = path.parent() {
            TokioFs::create_dir_all(parent).await.map_err(io_err)?;
        }

        let toml_str = toml::to_string_pretty(self)?;
        TokioFs::write(path, toml_str).await.map_err(io_err)?;
        Ok(())
    }

    /// `perf.toml` in the platform config directory, if one can be determined.
    pub fn default_path() -> Option<PathBuf> {
        ProjectDirs::from("org", "perf", "perf-core")
            .map(|dirs| dirs.config_dir().join("perf.toml"))
    }

    pub fn validate(&self) -> PerfResult<()> {
        self.histogram.validate()?;
        self.event_loop.histogram.validate()?;

        if self.event_loop.resolution.is_zero() {
            return Err(PerfError::invalid_argument(
                "event_loop.resolution",
                "must be positive",
            ));
        }
        if self.event_loop.resolution.as_millis() > i64::MAX as u128 {
            return Err(PerfError::invalid_argument(
                "event_loop.resolution",
                "too large",
            ));
        }
        Ok(())
    }

    /// Monitor interval in whole milliseconds, at least 1.
    pub fn event_loop_interval_ms(&self) -> i64 {
        (self.event_loop.resolution.as_millis() as i64).max(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_toml_is_default() {
        let config = PerfConfig::from_toml_str("").unwrap();
        assert_eq!(config, PerfConfig::default());
        assert_eq!(config.histogram.lowest, 1);
        assert_eq!(config.event_loop.histogram.lowest, 1_000);
    }

    #[test]
    fn test_partial_sections() {
        let config = PerfConfig::from_toml_str(
            r#"
            [event_loop]
            enabled = false
            resolution = "20ms"

            [gc]
            track_on_start = true

            [logging]
            level = "perf::gc=debug"
            "#,
        )
        .unwrap();

        assert!(!config.event_loop.enabled);
        assert_eq!(config.event_loop.resolution, Duration::from_millis(20));
        assert_eq!(config.event_loop_interval_ms(), 20);
        assert!(config.gc.track_on_start);
        assert_eq!(config.logging.level, "perf::gc=debug");
        assert_eq!(config.histogram, HistogramOptions::default());
    }

    #[test]
    fn test_invalid_values_rejected() {
        let err = PerfConfig::from_toml_str("[event_loop]\nresolution = \"0s\"\n").unwrap_err();
        assert!(matches!(err, PerfError::InvalidArgument { .. }));

        let err = PerfConfig::from_toml_str("[histogram]\nlowest = 0\n").unwrap_err();
        assert!(matches!(err, PerfError::InvalidArgument { .. }));

        let err = PerfConfig::from_toml_str("[gc]\ntrack_on_start = \"yes\"\n").unwrap_err();
        assert!(matches!(err, PerfError::Config(_)));
    }

    #[tokio::test]
    async fn test_save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("perf.toml");

        let mut config = PerfConfig::default();
        config.gc.track_on_start = true;
        config.event_loop.resolution = Duration::from_millis(50);
        config.save_to(&path).await.unwrap();

        let loaded = PerfConfig::load_from(&path).await.unwrap();
        assert_eq!(loaded, config);
    }

    #[tokio::test]
    async fn test_missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let loaded = PerfConfig::load_from(&dir.path().join("absent.toml"))
            .await
            .unwrap();
        assert_eq!(loaded, PerfConfig::default());
    }
}
