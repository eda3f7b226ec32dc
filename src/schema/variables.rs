//! iRacing Variable Directory Parsing
//!
//! Decodes the `irsdk_varHeader` table that describes every telemetry field
//! in a data buffer and builds a fresh [`VariableDirectory`] from it.
//!
//! # Layout
//!
//! ```c
//! typedef struct irsdk_varHeader
//! {
//!     int type;                     // offset 0, irsdk_VarType
//!     int offset;                   // offset 4, byte offset within a data buffer
//!     int count;                    // offset 8, number of elements
//!     bool countAsTime;             // offset 12
//!     char pad[3];
//!     char name[IRSDK_MAX_STRING];  // offset 16, 32 bytes
//!     char desc[IRSDK_MAX_DESC];    // offset 48, 64 bytes
//!     char unit[IRSDK_MAX_STRING];  // offset 112, 32 bytes
//! } irsdk_varHeader;
//! ```
//!
//! Each table entry is 144 bytes; entry `i` lives at
//! `var_header_offset + i * 144`.
//!
//! # Directory rules
//!
//! - Names are decoded from null-padded text and trimmed; entries whose name
//!   is empty after trimming are skipped.
//! - Duplicate names resolve last-write-wins in table order.
//! - Every call builds a new directory. Callers swap the `Arc` wholesale, so
//!   a reader holding the previous snapshot never sees a half-built one.

use crate::shm::{SharedSegment, producer_offset};
use crate::{Result, TelemetryHeader, VariableDirectory, VariableHeader};
use std::collections::HashMap;
use tracing::{debug, trace, warn};

/// Length of the name and unit fields.
pub const IRSDK_MAX_STRING: usize = 32;

/// Length of the description field.
pub const IRSDK_MAX_DESC: usize = 64;

/// Size of one encoded variable header.
pub const VAR_HEADER_SIZE: usize = 144;

const NAME_OFFSET: usize = 16;
const DESC_OFFSET: usize = NAME_OFFSET + IRSDK_MAX_STRING;
const UNIT_OFFSET: usize = DESC_OFFSET + IRSDK_MAX_DESC;

/// Decode one 144-byte variable header entry.
///
/// The caller guarantees `bytes.len() >= VAR_HEADER_SIZE`.
pub fn decode_variable_header(bytes: &[u8]) -> VariableHeader {
    let field = |offset: usize| {
        i32::from_le_bytes([bytes[offset], bytes[offset + 1], bytes[offset + 2], bytes[offset + 3]])
    };

    VariableHeader {
        type_tag: field(0),
        offset: field(4),
        count: field(8),
        count_as_time: bytes[12] != 0,
        name: padded_text(&bytes[NAME_OFFSET..NAME_OFFSET + IRSDK_MAX_STRING]),
        description: padded_text(&bytes[DESC_OFFSET..DESC_OFFSET + IRSDK_MAX_DESC]),
        unit: padded_text(&bytes[UNIT_OFFSET..UNIT_OFFSET + IRSDK_MAX_STRING]),
    }
}

/// Build a new directory from the variable header table described by `header`.
///
/// The whole table is copied out in one read, so a table that does not fit in
/// the segment fails with [`TelemetryError::OutOfRange`](crate::TelemetryError::OutOfRange)
/// before any entry is decoded.
pub fn parse_variable_directory<S>(
    segment: &S,
    header: &TelemetryHeader,
) -> Result<VariableDirectory>
where
    S: SharedSegment + ?Sized,
{
    let num_vars = header.num_vars.max(0) as usize;
    if num_vars == 0 {
        trace!("Variable header table is empty");
        return Ok(VariableDirectory::default());
    }

    let table_len = num_vars.saturating_mul(VAR_HEADER_SIZE);
    let table_offset = producer_offset(header.var_header_offset, table_len, segment.size())?;
    let table = segment.read_at(table_offset, table_len)?;

    let mut variables = HashMap::with_capacity(num_vars);
    let mut skipped = 0usize;

    for (index, entry) in table.chunks_exact(VAR_HEADER_SIZE).enumerate() {
        let variable = decode_variable_header(entry);

        if variable.name.is_empty() {
            skipped += 1;
            continue;
        }

        if let Some(previous) = variables.insert(variable.name.clone(), variable) {
            warn!(name = %previous.name, index, "Duplicate variable name, keeping later entry");
        }
    }

    debug!(
        declared = num_vars,
        parsed = variables.len(),
        skipped_unnamed = skipped,
        "Variable directory rebuilt"
    );

    Ok(VariableDirectory::new(variables))
}

/// Decode fixed-width, null-padded text.
///
/// Leading and trailing NUL padding is removed, the remainder is cut at the
/// first interior NUL, and surrounding whitespace is trimmed.
fn padded_text(bytes: &[u8]) -> String {
    let start = bytes.iter().position(|&b| b != 0).unwrap_or(bytes.len());
    let rest = &bytes[start..];
    let end = rest.iter().position(|&b| b == 0).unwrap_or(rest.len());
    String::from_utf8_lossy(&rest[..end]).trim().to_string()
}
