//! Frame types emitted by the polling loop

use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Consistency of a buffer copy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "tauri", derive(specta::Type))]
pub enum ReadStatus {
    /// The buffer's tick count was unchanged across the copy
    Clean,
    /// The tick count kept moving across both copy attempts; the bytes may
    /// mix two producer writes
    Torn,
}

/// One data buffer's payload at one tick.
///
/// The bytes are an owned copy; nothing in a frame points back into the
/// shared segment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// Buffer payload, `buf_len` bytes long
    pub data: Arc<[u8]>,

    /// Tick count observed for the buffer
    pub tick: i32,

    /// Which rotating buffer the bytes came from
    pub buffer_index: usize,

    /// Session info version current when the frame was read
    pub session_info_update: i32,

    /// Whether the copy is known to be consistent
    pub status: ReadStatus,
}

impl Frame {
    /// Create a new frame
    pub fn new(
        data: Vec<u8>,
        tick: i32,
        buffer_index: usize,
        session_info_update: i32,
        status: ReadStatus,
    ) -> Self {
        Self { data: data.into(), tick, buffer_index, session_info_update, status }
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn is_torn(&self) -> bool {
        self.status == ReadStatus::Torn
    }
}
