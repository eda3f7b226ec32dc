//! iRacing Header Decoding
//!
//! Decodes the `irsdk_header` structure at the start of the shared segment.
//! The layout is treated as a versioned wire format: every field is read
//! explicitly as a little-endian `i32` at a fixed offset, and the version is
//! checked before anything derived from the other fields is trusted.
//!
//! # Layout
//!
//! ```c
//! typedef struct irsdk_header
//! {
//!     int ver;                    // offset 0, api version (2)
//!     int status;                 // offset 4, bitfield, 0 = disconnected
//!     int tickRate;               // offset 8
//!     int sessionInfoUpdate;      // offset 12
//!     int sessionInfoLen;         // offset 16
//!     int sessionInfoOffset;      // offset 20
//!     int numVars;                // offset 24
//!     int varHeaderOffset;        // offset 28
//!     int numBuf;                 // offset 32
//!     int bufLen;                 // offset 36
//!     int pad1[2];                // offset 40
//!     irsdk_varBuf varBuf[4];     // offset 48, 16 bytes each
//! } irsdk_header;
//!
//! typedef struct irsdk_varBuf
//! {
//!     int tickCount;
//!     int bufOffset;
//!     int pad[2];
//! } irsdk_varBuf;
//! ```
//!
//! The header is re-read on every poll; [`TelemetryHeader`] is an immutable
//! snapshot of one read.

use crate::{Result, TelemetryError};
use tracing::trace;

/// The expected iRacing SDK version.
pub const IRSDK_VER: i32 = 2;

/// Maximum number of rotating data buffers.
pub const IRSDK_MAX_BUFS: usize = 4;

/// Status flag set while the simulator is publishing telemetry.
pub const IRSDK_STATUS_CONNECTED: i32 = 0x1;

/// Size of the encoded header, including buffer descriptors.
pub const HEADER_SIZE: usize = VAR_BUF_OFFSET + IRSDK_MAX_BUFS * VAR_BUF_SIZE;

/// Offset of the first buffer descriptor.
pub const VAR_BUF_OFFSET: usize = 48;

/// Size of one encoded buffer descriptor.
pub const VAR_BUF_SIZE: usize = 16;

/// Descriptor of one rotating data buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct VarBuf {
    /// Tick stamped by the producer when it finished writing this buffer
    pub tick_count: i32,
    /// Offset of the buffer from the start of the segment
    pub buffer_offset: i32,
}

/// Decoded `irsdk_header` snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TelemetryHeader {
    /// API version (always [`IRSDK_VER`] once parsed)
    pub version: i32,
    /// Status bitfield; 0 means the producer is disconnected
    pub status: i32,
    /// Ticks per second
    pub tick_rate: i32,
    /// Incremented whenever the session info string changes
    pub session_info_update: i32,
    /// Length in bytes of the session info string
    pub session_info_len: i32,
    /// Offset of the session info string
    pub session_info_offset: i32,
    /// Number of entries in the variable header table
    pub num_vars: i32,
    /// Offset of the variable header table
    pub var_header_offset: i32,
    /// Number of buffers in use, at most [`IRSDK_MAX_BUFS`]
    pub num_buffers: i32,
    /// Length in bytes of one data buffer
    pub buf_len: i32,
    /// Buffer descriptors; only `..num_buffers` are meaningful
    pub buffers: [VarBuf; IRSDK_MAX_BUFS],
}

impl TelemetryHeader {
    /// Returns true when the producer reports it is live.
    pub fn is_connected(&self) -> bool {
        self.status != 0
    }

    /// Check if session info has been updated since `last_update`.
    pub fn session_info_changed(&self, last_update: i32) -> bool {
        self.session_info_update != last_update
    }

    /// Segment offset of the `tick_count` field of buffer descriptor `index`.
    pub fn tick_count_offset(index: usize) -> usize {
        VAR_BUF_OFFSET + index * VAR_BUF_SIZE
    }
}

/// Decode a header from the first [`HEADER_SIZE`] bytes of `bytes`.
///
/// Fails with [`TelemetryError::InvalidHeader`] on a short buffer, an
/// unrecognised version, or counts and lengths that cannot describe a valid
/// layout.
pub fn parse_header(bytes: &[u8]) -> Result<TelemetryHeader> {
    if bytes.len() < HEADER_SIZE {
        return Err(TelemetryError::invalid_header(format!(
            "need {} header bytes, have {}",
            HEADER_SIZE,
            bytes.len()
        )));
    }

    let version = read_i32_le(bytes, 0);
    if version != IRSDK_VER {
        return Err(TelemetryError::invalid_header(format!(
            "unsupported SDK version {} (expected {})",
            version, IRSDK_VER
        )));
    }

    let mut buffers = [VarBuf::default(); IRSDK_MAX_BUFS];
    for (index, buffer) in buffers.iter_mut().enumerate() {
        let base = TelemetryHeader::tick_count_offset(index);
        buffer.tick_count = read_i32_le(bytes, base);
        buffer.buffer_offset = read_i32_le(bytes, base + 4);
    }

    let header = TelemetryHeader {
        version,
        status: read_i32_le(bytes, 4),
        tick_rate: read_i32_le(bytes, 8),
        session_info_update: read_i32_le(bytes, 12),
        session_info_len: read_i32_le(bytes, 16),
        session_info_offset: read_i32_le(bytes, 20),
        num_vars: read_i32_le(bytes, 24),
        var_header_offset: read_i32_le(bytes, 28),
        num_buffers: read_i32_le(bytes, 32),
        buf_len: read_i32_le(bytes, 36),
        buffers,
    };

    validate(&header)?;

    trace!(
        status = header.status,
        tick_rate = header.tick_rate,
        session_info_update = header.session_info_update,
        num_vars = header.num_vars,
        num_buffers = header.num_buffers,
        buf_len = header.buf_len,
        "Parsed telemetry header"
    );

    Ok(header)
}

fn validate(header: &TelemetryHeader) -> Result<()> {
    if header.num_buffers > IRSDK_MAX_BUFS as i32 {
        return Err(TelemetryError::invalid_header(format!(
            "num_buffers {} exceeds descriptor capacity {}",
            header.num_buffers, IRSDK_MAX_BUFS
        )));
    }

    let non_negative = [
        ("buf_len", header.buf_len),
        ("num_vars", header.num_vars),
        ("var_header_offset", header.var_header_offset),
        ("session_info_len", header.session_info_len),
        ("session_info_offset", header.session_info_offset),
    ];
    for (field, value) in non_negative {
        if value < 0 {
            return Err(TelemetryError::invalid_header(format!("negative {}: {}", field, value)));
        }
    }

    Ok(())
}

/// Caller guarantees `offset + 4 <= data.len()`.
fn read_i32_le(data: &[u8], offset: usize) -> i32 {
    i32::from_le_bytes([data[offset], data[offset + 1], data[offset + 2], data[offset + 3]])
}
