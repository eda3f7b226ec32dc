//! Error types for shared-memory telemetry ingestion.
//!
//! All errors implement `std::error::Error` and carry enough context to be
//! logged usefully from inside the polling loop.
//!
//! ## Error Categories
//!
//! - **Connection Errors**: the shared segment or data-valid event cannot be
//!   opened. Fatal at session startup.
//! - **Transient Read Errors**: `InvalidHeader`, `OutOfRange`, `NoBuffers` and
//!   `Disconnected`. The polling loop logs these and tries again on the next
//!   tick; a producer that restarts, pauses or disappears is a steady-state
//!   condition, not a crash.
//! - **Configuration Errors**: invalid or unreadable [`PollConfig`](crate::PollConfig).
//! - **Platform Errors**: live telemetry is Windows-only.
//!
//! ```rust
//! use pitlane::TelemetryError;
//!
//! let error = TelemetryError::Disconnected;
//! assert!(error.is_transient());
//!
//! let error = TelemetryError::connection_failed("iRacing not running");
//! assert!(!error.is_transient());
//! for suggestion in error.recovery_suggestions() {
//!     println!("  - {}", suggestion);
//! }
//! ```

use std::path::PathBuf;
use thiserror::Error;

#[cfg(windows)]
use windows_core as core;

/// Result type alias for telemetry operations.
pub type Result<T, E = TelemetryError> = std::result::Result<T, E>;

/// Main error type for telemetry operations.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum TelemetryError {
    #[error("Failed to connect to iRacing: {reason}")]
    Connection {
        reason: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    #[error("Invalid telemetry header: {details}")]
    InvalidHeader { details: String },

    #[error("Read of {length} bytes at offset {offset:#x} exceeds mapped size {size:#x}")]
    OutOfRange { offset: usize, length: usize, size: usize },

    #[error("Producer reports no data buffers (num_buffers = {num_buffers})")]
    NoBuffers { num_buffers: i32 },

    #[error("Producer disconnected (status flags are 0)")]
    Disconnected,

    #[error("Configuration error in {context}: {details}")]
    Config { context: String, details: String },

    #[error("Configuration file error: {path}")]
    File {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{feature} is only available on {required_platform}")]
    UnsupportedPlatform { feature: String, required_platform: String },

    #[error("Windows API error: {operation}")]
    #[cfg(windows)]
    WindowsApi {
        operation: String,
        #[source]
        source: core::Error,
    },
}

impl TelemetryError {
    /// Returns whether the polling loop should log this error and wait for the next tick.
    pub fn is_transient(&self) -> bool {
        match self {
            TelemetryError::InvalidHeader { .. } => true,
            TelemetryError::OutOfRange { .. } => true,
            TelemetryError::NoBuffers { .. } => true,
            TelemetryError::Disconnected => true,
            TelemetryError::Connection { .. } => false,
            TelemetryError::Config { .. } => false,
            TelemetryError::File { .. } => false,
            TelemetryError::UnsupportedPlatform { .. } => false,
            #[cfg(windows)]
            TelemetryError::WindowsApi { .. } => false,
        }
    }

    /// Returns suggested recovery actions for this error.
    pub fn recovery_suggestions(&self) -> Vec<&'static str> {
        match self {
            TelemetryError::Connection { .. } => vec![
                "Ensure iRacing is running",
                "Check Windows permissions for shared memory access",
                "Run the consumer in the same session as iRacing",
            ],
            TelemetryError::InvalidHeader { .. } => vec![
                "Wait for the producer to finish initialising",
                "Verify iRacing SDK version compatibility",
            ],
            TelemetryError::OutOfRange { .. } => vec![
                "Check the configured maximum segment size",
                "Wait for the producer to publish a consistent header",
            ],
            TelemetryError::NoBuffers { .. } => vec!["Wait for the producer to start a session"],
            TelemetryError::Disconnected => vec![
                "Join a session in iRacing",
                "Keep polling; the feed resumes when the producer reconnects",
            ],
            TelemetryError::Config { .. } => vec![
                "Check the configuration values",
                "Use PollConfig::default() as a starting point",
            ],
            TelemetryError::File { .. } => vec![
                "Check file exists and is readable",
                "Check file permissions",
            ],
            TelemetryError::UnsupportedPlatform { .. } => vec![
                "Run the live feed on Windows alongside iRacing",
                "Use in-memory segments for cross-platform testing",
            ],
            #[cfg(windows)]
            TelemetryError::WindowsApi { .. } => vec![
                "Check Windows API permissions",
                "Verify system resources availability",
            ],
        }
    }

    /// Helper constructor for connection errors.
    pub fn connection_failed(reason: impl Into<String>) -> Self {
        TelemetryError::Connection { reason: reason.into(), source: None }
    }

    /// Helper constructor for connection errors with source.
    pub fn connection_failed_with_source(
        reason: impl Into<String>,
        source: Box<dyn std::error::Error + Send + Sync>,
    ) -> Self {
        TelemetryError::Connection { reason: reason.into(), source: Some(source) }
    }

    /// Helper constructor for header decoding failures.
    pub fn invalid_header(details: impl Into<String>) -> Self {
        TelemetryError::InvalidHeader { details: details.into() }
    }

    /// Helper constructor for bounds violations.
    pub fn out_of_range(offset: usize, length: usize, size: usize) -> Self {
        TelemetryError::OutOfRange { offset, length, size }
    }

    /// Helper constructor for configuration errors.
    pub fn config_error(context: impl Into<String>, details: impl Into<String>) -> Self {
        TelemetryError::Config { context: context.into(), details: details.into() }
    }

    /// Helper constructor for configuration file errors.
    pub fn file_error(path: PathBuf, source: std::io::Error) -> Self {
        TelemetryError::File { path, source }
    }

    /// Helper constructor for Windows API errors.
    #[cfg(windows)]
    pub fn windows_api_error(operation: impl Into<String>, source: core::Error) -> Self {
        TelemetryError::WindowsApi { operation: operation.into(), source }
    }

    /// Helper constructor for unsupported platform errors.
    pub fn unsupported_platform(
        feature: impl Into<String>,
        required_platform: impl Into<String>,
    ) -> Self {
        TelemetryError::UnsupportedPlatform {
            feature: feature.into(),
            required_platform: required_platform.into(),
        }
    }
}

#[cfg(windows)]
impl From<core::Error> for TelemetryError {
    fn from(err: core::Error) -> Self {
        TelemetryError::WindowsApi {
            operation: "Unknown Windows operation".to_string(),
            source: err,
        }
    }
}
