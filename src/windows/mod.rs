//! Win32 backends for the shared segment and data-valid event.
//!
//! These are the only places the crate touches producer memory directly.
//! Everything above them works through [`SharedSegment`](crate::shm::SharedSegment)
//! and [`DataEvent`](crate::shm::DataEvent).
//!
//! ```rust,ignore
//! use pitlane::shm::{IRSDK_DATAVALIDEVENTNAME, IRSDK_MEMMAPFILENAME, IRSDK_MEMMAPFILESIZE};
//! use pitlane::windows::{DataValidEvent, MappedSegment};
//!
//! let segment = MappedSegment::open(IRSDK_MEMMAPFILENAME, IRSDK_MEMMAPFILESIZE)?;
//! let event = DataValidEvent::open(IRSDK_DATAVALIDEVENTNAME)?;
//! ```

mod event;
mod mapping;

pub use event::DataValidEvent;
pub use mapping::MappedSegment;

/// Convert string to null-terminated wide string for Windows APIs
fn wide_string(s: &str) -> Vec<u16> {
    use std::ffi::OsStr;
    use std::os::windows::ffi::OsStrExt;
    OsStr::new(s).encode_wide().chain(std::iter::once(0)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::header::parse_header;
    use crate::shm::{
        DataEvent, IRSDK_DATAVALIDEVENTNAME, IRSDK_MEMMAPFILENAME, IRSDK_MEMMAPFILESIZE,
        SharedSegment,
    };
    use crate::{HEADER_SIZE, TelemetryError};
    use std::time::Duration;

    #[test]
    fn wide_string_is_null_terminated() {
        let wide = wide_string("Local\\X");
        assert_eq!(wide.len(), 8);
        assert_eq!(wide.last(), Some(&0));
    }

    #[test]
    fn opening_missing_mapping_fails_cleanly() {
        let result = MappedSegment::open("Local\\PitlaneDoesNotExist", 4096);
        assert!(matches!(result, Err(TelemetryError::Connection { source: Some(_), .. })));
    }

    #[test]
    #[ignore = "iracing_required"]
    fn maps_live_segment_and_reads_header() {
        let mut segment = MappedSegment::open(IRSDK_MEMMAPFILENAME, IRSDK_MEMMAPFILESIZE)
            .expect("Failed to map iRacing shared memory");
        let header = parse_header(&segment.read_at(0, HEADER_SIZE).unwrap()).unwrap();

        assert!(header.tick_rate > 0);
        assert!(header.num_buffers >= 1);
        assert!(matches!(
            segment.read_at(IRSDK_MEMMAPFILESIZE - 2, 4),
            Err(TelemetryError::OutOfRange { .. })
        ));

        segment.close();
        segment.close();
        assert!(segment.read_at(0, 4).is_err());
    }

    #[tokio::test]
    #[ignore = "iracing_required"]
    async fn waits_on_live_event() {
        let mut event = DataValidEvent::open(IRSDK_DATAVALIDEVENTNAME)
            .expect("Failed to open data-valid event");
        let _ = event.wait(Duration::from_millis(100)).await.expect("wait failed");

        event.close();
        assert!(event.wait(Duration::from_millis(1)).await.is_err());
    }
}
