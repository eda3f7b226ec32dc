//! Read-only view of iRacing's named file mapping.

use std::ptr::NonNull;

use tracing::{debug, trace, warn};
use windows::Win32::Foundation::{CloseHandle, HANDLE};
use windows::Win32::System::Memory::{
    FILE_MAP_READ, MEMORY_MAPPED_VIEW_ADDRESS, MapViewOfFile, OpenFileMappingW, UnmapViewOfFile,
};
use windows::core::PCWSTR;

use super::wide_string;
use crate::shm::{SharedSegment, check_range};
use crate::{Result, TelemetryError};

struct View {
    mapping: HANDLE,
    base: NonNull<u8>,
}

/// The producer's telemetry segment, mapped read-only.
///
/// Reads are bounds-checked against the mapped size and copy bytes out.
/// The view is released by [`close`](SharedSegment::close) or on drop,
/// whichever comes first.
pub struct MappedSegment {
    view: Option<View>,
    size: usize,
}

impl MappedSegment {
    /// Open the named mapping and map `size` bytes of it.
    pub fn open(name: &str, size: usize) -> Result<Self> {
        trace!(name, size, "Opening shared memory mapping");

        let wide_name = wide_string(name);
        let mapping = unsafe {
            OpenFileMappingW(FILE_MAP_READ.0, false, PCWSTR::from_raw(wide_name.as_ptr()))
                .map_err(|e| {
                    TelemetryError::connection_failed_with_source(
                        format!("shared memory segment {name} is not available"),
                        Box::new(TelemetryError::windows_api_error("OpenFileMappingW", e)),
                    )
                })?
        };

        let address = unsafe { MapViewOfFile(mapping, FILE_MAP_READ, 0, 0, size) };
        let Some(base) = NonNull::new(address.Value as *mut u8) else {
            let win_err = windows::core::Error::from_thread();
            if let Err(e) = unsafe { CloseHandle(mapping) } {
                warn!(error = %e, "Failed to close mapping handle after MapViewOfFile failure");
            }
            return Err(TelemetryError::windows_api_error("MapViewOfFile", win_err));
        };

        debug!(name, size, "Mapped shared memory segment");
        Ok(Self { view: Some(View { mapping, base }), size })
    }

    fn base(&self) -> Result<NonNull<u8>> {
        self.view
            .as_ref()
            .map(|view| view.base)
            .ok_or_else(|| TelemetryError::connection_failed("shared memory segment is closed"))
    }
}

impl SharedSegment for MappedSegment {
    fn size(&self) -> usize {
        self.size
    }

    fn read_at(&self, offset: usize, length: usize) -> Result<Vec<u8>> {
        check_range(offset, length, self.size)?;
        let base = self.base()?;

        let mut bytes = vec![0u8; length];
        // SAFETY: offset..offset + length lies inside the mapped view, which
        // stays mapped until close() takes &mut self.
        unsafe {
            std::ptr::copy_nonoverlapping(base.as_ptr().add(offset), bytes.as_mut_ptr(), length);
        }
        Ok(bytes)
    }

    fn read_i32_at(&self, offset: usize) -> Result<i32> {
        check_range(offset, 4, self.size)?;
        let base = self.base()?;

        // SAFETY: bounds checked above; the producer rewrites this word
        // concurrently, so it is read volatile and unaligned.
        let value = unsafe { std::ptr::read_volatile(base.as_ptr().add(offset) as *const [u8; 4]) };
        Ok(i32::from_le_bytes(value))
    }

    fn close(&mut self) {
        let Some(view) = self.view.take() else {
            return;
        };

        let address = MEMORY_MAPPED_VIEW_ADDRESS { Value: view.base.as_ptr() as *mut _ };
        if let Err(e) = unsafe { UnmapViewOfFile(address) } {
            warn!(error = %e, "UnmapViewOfFile failed");
        }
        if let Err(e) = unsafe { CloseHandle(view.mapping) } {
            warn!(error = %e, "Failed to close mapping handle");
        }
        debug!("Released shared memory segment");
    }
}

impl Drop for MappedSegment {
    fn drop(&mut self) {
        self.close();
    }
}

// SAFETY: the view is read-only, reads copy out through &self, and it is
// only unmapped through &mut self.
unsafe impl Send for MappedSegment {}
unsafe impl Sync for MappedSegment {}
