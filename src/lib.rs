//! Live iRacing telemetry from the simulator's shared memory.
//!
//! pitlane maps the segment iRacing publishes, decodes its header and
//! variable directory, picks the freshest of the rotating data buffers and
//! copies it out without tearing, on a fixed polling cadence.
//!
//! # Features
//!
//! - **Event-gated reads**: each copy waits (bounded) on iRacing's
//!   data-valid event and is checked against the buffer's tick count
//! - **Backpressure**: frames are handed off over a bounded channel and are
//!   never dropped; a slow consumer delays the next poll
//! - **Cooperative stop**: a control message stops the loop within one
//!   polling interval and releases the mapping exactly once
//! - **Cross-platform core**: decoding and the polling loop run against any
//!   [`SharedSegment`]; only the live backend is Windows-specific
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use pitlane::{Pitlane, PollConfig};
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() -> pitlane::Result<()> {
//!     let mut feed = Pitlane::connect(PollConfig::new(Duration::from_millis(16))).await?;
//!
//!     while let Some(frame) = feed.frames.recv().await {
//!         let directory = feed.directory.borrow().clone();
//!         if let Some(rpm) = directory.slice("RPM", &frame.data) {
//!             println!("tick {} RPM bytes {:?}", frame.tick, rpm);
//!         }
//!     }
//!     Ok(())
//! }
//! ```

pub mod buffer;
pub mod config;
pub mod driver;
mod error;
pub mod reader;
pub mod schema;
pub mod shm;
#[cfg(any(test, feature = "benchmark"))]
pub mod test_utils;
pub mod types;
mod yaml_utils;

// Platform-specific modules
#[cfg(windows)]
pub mod windows;

// Core exports
pub use error::*;
pub use types::*;

pub use buffer::select_latest_buffer;
pub use config::PollConfig;
pub use driver::{ControlSignal, FeedChannels, LoopState, PollLoop, PollSummary, StopReason};
pub use reader::FrameReader;
pub use schema::{HEADER_SIZE, SessionInfo, TelemetryHeader, VarBuf, parse_header};
pub use shm::{DataEvent, SharedSegment, WaitResult};

#[cfg(windows)]
pub use self::windows::{DataValidEvent, MappedSegment};

/// Entry point for the live telemetry feed.
pub struct Pitlane;

impl Pitlane {
    /// Open iRacing's shared segment and data-valid event and start polling.
    ///
    /// The segment is opened first; if the event cannot be opened the
    /// segment is released before the error is returned.
    ///
    /// # Platform
    ///
    /// Only available on Windows where iRacing runs. On other platforms this
    /// returns [`TelemetryError::UnsupportedPlatform`]; use [`PollLoop`] with
    /// your own [`SharedSegment`] instead.
    ///
    /// # Errors
    ///
    /// - `config` fails [`PollConfig::validate`]
    /// - iRacing is not running, so the segment or event does not exist
    pub async fn connect(config: PollConfig) -> Result<FeedChannels> {
        #[cfg(windows)]
        {
            let poll_loop = PollLoop::connect_with(
                |config| MappedSegment::open(&config.segment_name, config.max_segment_size),
                |config| DataValidEvent::open(&config.event_name),
                config,
            )?;
            Ok(poll_loop.spawn())
        }

        #[cfg(not(windows))]
        {
            config.validate()?;
            Err(TelemetryError::unsupported_platform("Live iRacing telemetry", "Windows"))
        }
    }
}
