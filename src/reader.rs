//! Event-gated, tear-checked buffer copies.
//!
//! A copy is only trusted if the buffer's tick count is the same before and
//! after it. The producer may start rewriting the buffer at any point, so the
//! copy is attempted at most twice; if the tick keeps moving the last copy is
//! returned flagged [`ReadStatus::Torn`] rather than dropped.

use std::time::Duration;
use tracing::{debug, trace, warn};

use crate::schema::header::{IRSDK_MAX_BUFS, TelemetryHeader};
use crate::shm::{DataEvent, SharedSegment, WaitResult, producer_offset};
use crate::types::{Frame, FreshnessPolicy, FreshnessState, ReadStatus};
use crate::{Result, TelemetryError};

/// Copy attempts before a read is reported as torn.
pub const MAX_READ_ATTEMPTS: usize = 2;

/// Default bound on the data-valid event wait.
pub const DEFAULT_EVENT_TIMEOUT: Duration = Duration::from_millis(100);

/// Copies the selected data buffer out of the segment.
#[derive(Debug, Clone, Copy)]
pub struct FrameReader {
    policy: FreshnessPolicy,
    event_timeout: Duration,
}

impl FrameReader {
    pub fn new(policy: FreshnessPolicy, event_timeout: Duration) -> Self {
        Self { policy, event_timeout }
    }

    pub fn policy(&self) -> FreshnessPolicy {
        self.policy
    }

    /// Read buffer `index` described by `header`.
    ///
    /// Returns `Ok(None)` when the policy is [`FreshnessPolicy::SkipStale`]
    /// and the buffer's tick was already consumed. A producer with status 0
    /// resets `freshness` and fails with [`TelemetryError::Disconnected`].
    /// An `index` outside `0..num_buffers` fails with
    /// [`TelemetryError::InvalidHeader`] before anything is read.
    pub async fn read_frame<S, E>(
        &self,
        segment: &S,
        header: &TelemetryHeader,
        index: usize,
        event: &E,
        freshness: &mut FreshnessState,
    ) -> Result<Option<Frame>>
    where
        S: SharedSegment + ?Sized,
        E: DataEvent + ?Sized,
    {
        let num_buffers = header.num_buffers.max(0) as usize;
        if index >= num_buffers.min(IRSDK_MAX_BUFS) {
            return Err(TelemetryError::invalid_header(format!(
                "buffer index {index} outside 0..{num_buffers}"
            )));
        }

        match event.wait(self.event_timeout).await {
            Ok(WaitResult::Signaled) => trace!("Data-valid event signaled"),
            Ok(WaitResult::Timeout) => {
                let timeout_ms = self.event_timeout.as_millis() as u64;
                debug!(timeout_ms, "Event wait timed out, reading anyway")
            }
            Err(e) => warn!(error = %e, "Event wait failed, reading anyway"),
        }

        if !header.is_connected() {
            freshness.reset();
            return Err(TelemetryError::Disconnected);
        }

        let mut expected_tick = header.buffers[index].tick_count;
        if self.policy == FreshnessPolicy::SkipStale && !freshness.is_new(expected_tick) {
            trace!(tick = expected_tick, "Buffer already consumed, skipping");
            return Ok(None);
        }

        if let Some(last) = freshness.last_tick() {
            if expected_tick < last {
                debug!(last, tick = expected_tick, "Tick count went backwards, producer restarted");
            }
        }

        let length = header.buf_len as usize;
        let offset =
            producer_offset(header.buffers[index].buffer_offset, length, segment.size())?;
        let tick_offset = TelemetryHeader::tick_count_offset(index);

        let mut data = Vec::new();
        for attempt in 1..=MAX_READ_ATTEMPTS {
            data = segment.read_at(offset, length)?;
            let observed_tick = segment.read_i32_at(tick_offset)?;

            if observed_tick == expected_tick {
                freshness.advance(observed_tick);
                trace!(tick = observed_tick, index, bytes = length, attempt, "Copied buffer");
                return Ok(Some(Frame::new(
                    data,
                    observed_tick,
                    index,
                    header.session_info_update,
                    ReadStatus::Clean,
                )));
            }

            debug!(
                attempt,
                before = expected_tick,
                after = observed_tick,
                index,
                "Tick changed during copy"
            );
            expected_tick = observed_tick;
        }

        warn!(
            tick = expected_tick,
            index,
            attempts = MAX_READ_ATTEMPTS,
            "Buffer kept changing during copy, emitting possibly torn frame"
        );
        Ok(Some(Frame::new(
            data,
            expected_tick,
            index,
            header.session_info_update,
            ReadStatus::Torn,
        )))
    }
}

impl Default for FrameReader {
    fn default() -> Self {
        Self::new(FreshnessPolicy::default(), DEFAULT_EVENT_TIMEOUT)
    }
}
