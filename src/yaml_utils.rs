//! YAML utilities for iRacing session info preprocessing
//!
//! iRacing publishes its session info as a null-terminated, Latin-1 encoded
//! YAML document that may contain stray control characters. This module
//! turns the raw bytes into a clean `String` without parsing it; structured
//! decoding is left to downstream consumers.

/// Decode a null-terminated Latin-1 byte string.
///
/// Bytes after the first NUL are ignored. Every byte maps to the Unicode
/// code point of the same value, so decoding never fails.
pub fn decode_null_terminated_latin1(bytes: &[u8]) -> String {
    let end = bytes.iter().position(|&b| b == 0).unwrap_or(bytes.len());
    bytes[..end].iter().map(|&b| char::from(b)).collect()
}

/// Remove control characters that break YAML parsers.
///
/// Newline, carriage return and tab are kept. Returns `None` when nothing but
/// whitespace remains.
pub fn preprocess_iracing_yaml(yaml: &str) -> Option<String> {
    let cleaned: String = yaml
        .chars()
        .filter(|ch| !matches!(ch, '\x00'..='\x08' | '\x0B'..='\x0C' | '\x0E'..='\x1F' | '\x7F'))
        .collect();

    if cleaned.trim().is_empty() { None } else { Some(cleaned) }
}
