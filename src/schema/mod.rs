//! Header and Variable Directory Decoding
//!
//! This module decodes the self-describing part of the shared segment:
//! - [`header`] decodes iRacing's `irsdk_header` and its buffer descriptors
//! - [`variables`] builds a [`VariableDirectory`](crate::VariableDirectory)
//!   from the `irsdk_varHeader` table
//! - [`session_info`] reads the session YAML the header points at
//!
//! Decoding is plain little-endian field extraction with bounds checks, so it
//! runs on every platform. Only opening the live segment is Windows-specific.

pub mod header;
pub mod session_info;
pub mod variables;

pub use header::{
    HEADER_SIZE, IRSDK_MAX_BUFS, IRSDK_STATUS_CONNECTED, IRSDK_VER, TelemetryHeader, VarBuf,
    parse_header,
};
pub use session_info::{SessionInfo, read_session_info};
pub use variables::{VAR_HEADER_SIZE, decode_variable_header, parse_variable_directory};
