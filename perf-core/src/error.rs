//! src/error.rs
//! ============================================================================
//! # `PerfError`: Unified Error Type for the Instrumentation Core
//!
//! Only two failure classes ever reach a caller: a resource the core depends
//! on is missing (no timer runtime, no collector, no event-loop probe), or a
//! caller supplied a configuration the core cannot honour. Invalid
//! identifiers and mismatched GC signals are absorbed where they happen and
//! never surface here.

use std::{io, path::PathBuf};
use thiserror::Error;

/// Convenient alias carrying the unified error type.
pub type PerfResult<T> = Result<T, PerfError>;

/// Unified error type for all instrumentation operations.
#[derive(Debug, Error)]
pub enum PerfError {
    /// Argument rejected before any state was touched.
    #[error("Invalid argument: {field} - {message}")]
    InvalidArgument { field: String, message: String },

    /// A host resource (timer runtime, collector, event loop) is not available.
    #[error("Resource unavailable: {resource}")]
    Unavailable { resource: String },

    /// A saved region block could not be restored.
    #[error("Snapshot error: {reason}")]
    Snapshot { reason: String },

    /// TOML config parsing error.
    #[error("Config parse error: {0}")]
    Config(#[from] toml::de::Error),

    /// TOML config serialization error.
    #[error("Config serialize error: {0}")]
    ConfigSerialize(#[from] toml::ser::Error),

    /// Config file I/O error with path.
    #[error("Failed to access config file {path:?}: {source}")]
    ConfigIo {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Standard IO error, auto-converted from `io::Error`.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl PerfError {
    /// Create an invalid argument error
    pub fn invalid_argument<S1: Into<String>, S2: Into<String>>(field: S1, message: S2) -> Self {
        Self::InvalidArgument {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Create a resource unavailable error
    pub fn unavailable<S: Into<String>>(resource: S) -> Self {
        Self::Unavailable {
            resource: resource.into(),
        }
    }

    /// Create a snapshot restore error
    pub fn snapshot<S: Into<String>>(reason: S) -> Self {
        Self::Snapshot {
            reason: reason.into(),
        }
    }

    /// Whether the caller can reasonably retry once the host is ready.
    #[inline]
    #[must_use]
    pub const fn is_recoverable(&self) -> bool {
        matches!(self, Self::Unavailable { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = PerfError::invalid_argument("interval", "must be greater than zero");
        assert_eq!(
            err.to_string(),
            "Invalid argument: interval - must be greater than zero"
        );

        let err = PerfError::unavailable("event loop");
        assert_eq!(err.to_string(), "Resource unavailable: event loop");
    }

    #[test]
    fn test_recoverable_classification() {
        assert!(PerfError::unavailable("timer").is_recoverable());
        assert!(!PerfError::snapshot("truncated").is_recoverable());
        assert!(!PerfError::invalid_argument("x", "y").is_recoverable());
    }
}
