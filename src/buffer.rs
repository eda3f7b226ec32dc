//! Rotating buffer selection.
//!
//! The producer cycles through up to four data buffers and stamps each with
//! the tick it was written at. The freshest buffer is the one with the
//! highest tick count.

use crate::schema::header::{IRSDK_MAX_BUFS, TelemetryHeader};
use crate::{Result, TelemetryError};
use tracing::trace;

/// Index of the buffer with the highest tick count.
///
/// Only descriptors `0..num_buffers` are considered; on equal ticks the
/// lowest index wins. Fails with [`TelemetryError::NoBuffers`] when the
/// producer reports no buffers.
pub fn select_latest_buffer(header: &TelemetryHeader) -> Result<usize> {
    if header.num_buffers <= 0 {
        return Err(TelemetryError::NoBuffers { num_buffers: header.num_buffers });
    }

    let in_use = (header.num_buffers as usize).min(IRSDK_MAX_BUFS);
    let mut latest = 0;
    for index in 1..in_use {
        if header.buffers[index].tick_count > header.buffers[latest].tick_count {
            latest = index;
        }
    }

    trace!(latest, tick_count = header.buffers[latest].tick_count, "Selected buffer");
    Ok(latest)
}
