//! Session info string access.
//!
//! The header points at a YAML document describing the current session.
//! The producer bumps `session_info_update` whenever it rewrites it, so the
//! polling loop only re-reads the string when that counter moves.

use crate::shm::{SharedSegment, producer_offset};
use crate::{Result, TelemetryHeader, yaml_utils};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// One version of the producer's session info document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "tauri", derive(specta::Type))]
pub struct SessionInfo {
    /// Value of `session_info_update` when the document was read
    pub update: i32,
    /// Cleaned YAML text
    pub yaml: String,
}

/// Read the session info document described by `header`.
///
/// Returns `Ok(None)` when the producer has not published one (zero length,
/// or nothing but whitespace after cleaning).
pub fn read_session_info<S>(segment: &S, header: &TelemetryHeader) -> Result<Option<SessionInfo>>
where
    S: SharedSegment + ?Sized,
{
    if header.session_info_len <= 0 {
        return Ok(None);
    }

    let length = header.session_info_len as usize;
    let offset = producer_offset(header.session_info_offset, length, segment.size())?;
    let raw = segment.read_at(offset, length)?;

    let text = yaml_utils::decode_null_terminated_latin1(&raw);
    let Some(yaml) = yaml_utils::preprocess_iracing_yaml(&text) else {
        debug!(update = header.session_info_update, "Session info is blank");
        return Ok(None);
    };

    debug!(update = header.session_info_update, bytes = yaml.len(), "Read session info");
    Ok(Some(SessionInfo { update: header.session_info_update, yaml }))
}
