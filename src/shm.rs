//! Read-only access to the producer's shared segment and data-valid event.
//!
//! The polling loop only talks to these two traits. On Windows they are
//! implemented over Win32 file mappings and named events (see
//! [`crate::windows`]); tests and benchmarks use in-memory backends.
//!
//! Every read is a snapshot of memory the producer may be rewriting at the
//! same moment. Implementations copy bytes out and never hand out references
//! into the segment.

use std::time::Duration;

use crate::{Result, TelemetryError};

/// Well-known name of iRacing's telemetry file mapping.
pub const IRSDK_MEMMAPFILENAME: &str = "Local\\IRSDKMemMapFileName";

/// Well-known name of iRacing's data-valid event.
pub const IRSDK_DATAVALIDEVENTNAME: &str = "Local\\IRSDKDataValidEvent";

/// Size of the mapped view the consumer opens.
pub const IRSDK_MEMMAPFILESIZE: usize = 1164 * 1024;

/// A fixed-size, read-only view of the producer's shared segment.
pub trait SharedSegment: Send + Sync {
    /// Size of the mapped view in bytes.
    fn size(&self) -> usize;

    /// Copy `length` bytes starting at `offset` out of the segment.
    ///
    /// Fails with [`TelemetryError::OutOfRange`] when the range does not lie
    /// entirely within the mapped view. No memory is touched in that case.
    fn read_at(&self, offset: usize, length: usize) -> Result<Vec<u8>>;

    /// Release the mapping. Calling it more than once is a no-op.
    ///
    /// Failures are logged, never returned.
    fn close(&mut self);

    /// Read a little-endian `i32` at `offset`.
    fn read_i32_at(&self, offset: usize) -> Result<i32> {
        let bytes = self.read_at(offset, 4)?;
        Ok(i32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }
}

/// Outcome of a bounded wait on the data-valid event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitResult {
    Signaled,
    Timeout,
}

/// The producer's "write cycle complete" event.
///
/// Waiting on it narrows the window in which a copy can straddle a write; it
/// does not close it. A timeout only means freshness could not be confirmed.
#[async_trait::async_trait]
pub trait DataEvent: Send + Sync {
    /// Wait at most `timeout` for the producer to signal.
    async fn wait(&self, timeout: Duration) -> Result<WaitResult>;

    /// Release the event handle. Calling it more than once is a no-op.
    fn close(&mut self);
}

/// Validate `offset..offset + length` against a view of `size` bytes.
pub(crate) fn check_range(offset: usize, length: usize, size: usize) -> Result<()> {
    match offset.checked_add(length) {
        Some(end) if end <= size => Ok(()),
        _ => Err(TelemetryError::out_of_range(offset, length, size)),
    }
}

/// Convert a producer-supplied `i32` offset into a `usize`, rejecting negatives.
pub(crate) fn producer_offset(value: i32, length: usize, size: usize) -> Result<usize> {
    usize::try_from(value).map_err(|_| {
        // Negative offsets are reported against the start of the view.
        TelemetryError::out_of_range(0, length, size)
    })
}
