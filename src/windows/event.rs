//! iRacing's data-valid event.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, trace, warn};
use windows::Win32::Foundation::{CloseHandle, HANDLE, WAIT_OBJECT_0, WAIT_TIMEOUT};
use windows::Win32::System::Threading::{
    OpenEventW, SYNCHRONIZATION_ACCESS_RIGHTS, WaitForSingleObject,
};
use windows::core::PCWSTR;

use super::wide_string;
use crate::shm::{DataEvent, WaitResult};
use crate::{Result, TelemetryError};

const SYNCHRONIZE: SYNCHRONIZATION_ACCESS_RIGHTS = SYNCHRONIZATION_ACCESS_RIGHTS(0x0010_0000);

/// Event handle closed when the last waiter lets go of it.
struct EventHandle(HANDLE);

impl Drop for EventHandle {
    fn drop(&mut self) {
        if let Err(e) = unsafe { CloseHandle(self.0) } {
            warn!(error = %e, "Failed to close data-valid event handle");
        }
    }
}

// SAFETY: event handles are kernel objects usable from any thread.
unsafe impl Send for EventHandle {}
unsafe impl Sync for EventHandle {}

/// Named event the producer signals after each write cycle.
pub struct DataValidEvent {
    handle: Option<Arc<EventHandle>>,
}

impl DataValidEvent {
    pub fn open(name: &str) -> Result<Self> {
        trace!(name, "Opening data-valid event");

        let wide_name = wide_string(name);
        let handle = unsafe {
            OpenEventW(SYNCHRONIZE, false, PCWSTR::from_raw(wide_name.as_ptr()))
                .map_err(|e| {
                    TelemetryError::connection_failed_with_source(
                        format!("data-valid event {name} is not available"),
                        Box::new(TelemetryError::windows_api_error("OpenEventW", e)),
                    )
                })?
        };

        debug!(name, "Opened data-valid event");
        Ok(Self { handle: Some(Arc::new(EventHandle(handle))) })
    }
}

#[async_trait::async_trait]
impl DataEvent for DataValidEvent {
    /// Blocks a `spawn_blocking` thread, not the runtime worker. If the
    /// caller stops awaiting, the blocking wait runs out its timeout and the
    /// handle stays open until it returns.
    async fn wait(&self, timeout: Duration) -> Result<WaitResult> {
        let handle = self
            .handle
            .clone()
            .ok_or_else(|| TelemetryError::connection_failed("data-valid event is closed"))?;
        let timeout_ms = timeout.as_millis().min(u32::MAX as u128) as u32;

        tokio::task::spawn_blocking(move || {
            let result = unsafe { WaitForSingleObject(handle.0, timeout_ms) };
            match result {
                WAIT_OBJECT_0 => Ok(WaitResult::Signaled),
                WAIT_TIMEOUT => Ok(WaitResult::Timeout),
                _ => {
                    let win_err = windows::core::Error::from_thread();
                    Err(TelemetryError::windows_api_error("WaitForSingleObject", win_err))
                }
            }
        })
        .await
        .map_err(|e| {
            TelemetryError::connection_failed_with_source("event wait task failed", Box::new(e))
        })?
    }

    fn close(&mut self) {
        if self.handle.take().is_some() {
            debug!("Released data-valid event");
        }
    }
}
