//! Polling loop configuration.
//!
//! Built in code or loaded from YAML. Durations are written as whole
//! milliseconds; everything except the polling interval has a default.
//!
//! ```yaml
//! poll_interval_ms: 16
//! event_timeout_ms: 100
//! freshness: skip_stale
//! frame_capacity: 8
//! ```
//!
//! ```rust
//! use pitlane::{FreshnessPolicy, PollConfig};
//! use std::time::Duration;
//!
//! let config = PollConfig::new(Duration::from_millis(16))
//!     .with_freshness(FreshnessPolicy::AlwaysRead)
//!     .with_frame_capacity(32);
//! assert!(config.validate().is_ok());
//! ```

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::reader::DEFAULT_EVENT_TIMEOUT;
use crate::shm::{IRSDK_DATAVALIDEVENTNAME, IRSDK_MEMMAPFILENAME, IRSDK_MEMMAPFILESIZE};
use crate::types::FreshnessPolicy;
use crate::{Result, TelemetryError};

/// Default frame channel capacity.
pub const DEFAULT_FRAME_CAPACITY: usize = 8;

/// Settings for one polling session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PollConfig {
    /// Time between polls
    #[serde(rename = "poll_interval_ms", with = "millis")]
    pub poll_interval: Duration,

    /// Upper bound on each data-valid event wait
    #[serde(rename = "event_timeout_ms", with = "millis", default = "default_event_timeout")]
    pub event_timeout: Duration,

    #[serde(default)]
    pub freshness: FreshnessPolicy,

    /// Frames buffered between the loop and its consumer
    #[serde(default = "default_frame_capacity")]
    pub frame_capacity: usize,

    #[serde(default = "default_segment_name")]
    pub segment_name: String,

    #[serde(default = "default_event_name")]
    pub event_name: String,

    /// Bytes of the segment to map
    #[serde(default = "default_max_segment_size")]
    pub max_segment_size: usize,
}

impl PollConfig {
    pub fn new(poll_interval: Duration) -> Self {
        Self {
            poll_interval,
            event_timeout: DEFAULT_EVENT_TIMEOUT,
            freshness: FreshnessPolicy::default(),
            frame_capacity: DEFAULT_FRAME_CAPACITY,
            segment_name: default_segment_name(),
            event_name: default_event_name(),
            max_segment_size: IRSDK_MEMMAPFILESIZE,
        }
    }

    pub fn with_event_timeout(mut self, timeout: Duration) -> Self {
        self.event_timeout = timeout;
        self
    }

    pub fn with_freshness(mut self, freshness: FreshnessPolicy) -> Self {
        self.freshness = freshness;
        self
    }

    pub fn with_frame_capacity(mut self, capacity: usize) -> Self {
        self.frame_capacity = capacity;
        self
    }

    pub fn with_segment(mut self, name: impl Into<String>, max_size: usize) -> Self {
        self.segment_name = name.into();
        self.max_segment_size = max_size;
        self
    }

    pub fn with_event_name(mut self, name: impl Into<String>) -> Self {
        self.event_name = name.into();
        self
    }

    /// Parse and validate a YAML document.
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        let config: Self = serde_yaml_ng::from_str(yaml)
            .map_err(|e| TelemetryError::config_error("poll config", e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a YAML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|e| TelemetryError::file_error(path.to_path_buf(), e))?;
        Self::from_yaml_str(&text)
    }

    pub fn to_yaml_string(&self) -> Result<String> {
        serde_yaml_ng::to_string(self)
            .map_err(|e| TelemetryError::config_error("poll config", e.to_string()))
    }

    /// Reject settings the loop cannot run with.
    pub fn validate(&self) -> Result<()> {
        let invalid = |details: &str| Err(TelemetryError::config_error("poll config", details));

        if self.poll_interval.is_zero() {
            return invalid("poll_interval_ms must be greater than zero");
        }
        if self.event_timeout.is_zero() {
            return invalid("event_timeout_ms must be greater than zero");
        }
        if self.frame_capacity == 0 {
            return invalid("frame_capacity must be greater than zero");
        }
        if self.segment_name.is_empty() {
            return invalid("segment_name cannot be empty");
        }
        if self.event_name.is_empty() {
            return invalid("event_name cannot be empty");
        }
        Ok(())
    }
}

impl Default for PollConfig {
    /// Poll at roughly the producer's 60 Hz tick rate.
    fn default() -> Self {
        Self::new(Duration::from_millis(16))
    }
}

fn default_event_timeout() -> Duration {
    DEFAULT_EVENT_TIMEOUT
}

fn default_frame_capacity() -> usize {
    DEFAULT_FRAME_CAPACITY
}

fn default_segment_name() -> String {
    IRSDK_MEMMAPFILENAME.to_string()
}

fn default_event_name() -> String {
    IRSDK_DATAVALIDEVENTNAME.to_string()
}

fn default_max_segment_size() -> usize {
    IRSDK_MEMMAPFILESIZE
}

mod millis {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_millis().min(u64::MAX as u128) as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}
