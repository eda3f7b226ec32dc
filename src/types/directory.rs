//! Variable directory types

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use super::VariableType;

/// Metadata for one telemetry field, as declared in the variable header table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "tauri", derive(specta::Type))]
pub struct VariableHeader {
    /// Raw `irsdk_VarType` tag
    pub type_tag: i32,
    /// Byte offset within a data buffer
    pub offset: i32,
    /// Number of elements (1 for scalars)
    pub count: i32,
    /// Whether the elements form a time series
    pub count_as_time: bool,
    /// Variable name, trimmed of padding
    pub name: String,
    /// Human-readable description
    pub description: String,
    /// Units of measurement (e.g. "m/s", "revs/min")
    pub unit: String,
}

impl VariableHeader {
    /// Decoded type, if the tag is one the SDK defines.
    pub fn data_type(&self) -> Option<VariableType> {
        VariableType::from_tag(self.type_tag)
    }

    /// Bytes this variable occupies in a data buffer, when its type is known
    /// and its count is non-negative.
    pub fn byte_len(&self) -> Option<usize> {
        let count = usize::try_from(self.count).ok()?;
        Some(self.data_type()?.size() * count)
    }
}

/// Name → header lookup for one header read.
///
/// A directory is never mutated after construction; the polling loop builds a
/// new one on every read and swaps it in whole.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "tauri", derive(specta::Type))]
pub struct VariableDirectory {
    variables: HashMap<String, VariableHeader>,
}

impl VariableDirectory {
    pub(crate) fn new(variables: HashMap<String, VariableHeader>) -> Self {
        Self { variables }
    }

    /// Get a variable header by name.
    pub fn get(&self, name: &str) -> Option<&VariableHeader> {
        self.variables.get(name)
    }

    /// Check if a variable exists.
    pub fn contains(&self, name: &str) -> bool {
        self.variables.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.variables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.variables.is_empty()
    }

    /// Iterate over variable names in unspecified order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.variables.keys().map(String::as_str)
    }

    /// Iterate over all headers in unspecified order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &VariableHeader)> {
        self.variables.iter().map(|(name, header)| (name.as_str(), header))
    }

    /// Raw bytes of `name` within `frame`, if the variable is known and fits.
    pub fn slice<'a>(&self, name: &str, frame: &'a [u8]) -> Option<&'a [u8]> {
        let header = self.get(name)?;
        let start = usize::try_from(header.offset).ok()?;
        let end = start.checked_add(header.byte_len()?)?;
        frame.get(start..end)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn header(name: &str, type_tag: i32, offset: i32, count: i32) -> VariableHeader {
        VariableHeader {
            type_tag,
            offset,
            count,
            count_as_time: false,
            name: name.to_string(),
            description: String::new(),
            unit: String::new(),
        }
    }

    fn directory(entries: &[VariableHeader]) -> VariableDirectory {
        VariableDirectory::new(entries.iter().map(|h| (h.name.clone(), h.clone())).collect())
    }

    #[test]
    fn byte_len_accounts_for_type_and_count() {
        assert_eq!(header("RPM", 4, 0, 1).byte_len(), Some(4));
        assert_eq!(header("CarIdxLap", 2, 0, 64).byte_len(), Some(256));
        assert_eq!(header("SessionTime", 5, 0, 1).byte_len(), Some(8));
        assert_eq!(header("Mystery", 42, 0, 1).byte_len(), None);
        assert_eq!(header("Broken", 4, 0, -1).byte_len(), None);
    }

    #[test]
    fn slice_returns_variable_bytes() {
        let dir = directory(&[header("RPM", 4, 4, 1), header("Gear", 2, 8, 1)]);
        let frame: Vec<u8> = (0u8..16).collect();

        assert_eq!(dir.slice("RPM", &frame), Some(&frame[4..8]));
        assert_eq!(dir.slice("Gear", &frame), Some(&frame[8..12]));
        assert_eq!(dir.slice("Speed", &frame), None);
    }

    #[test]
    fn slice_refuses_variables_past_frame_end() {
        let dir = directory(&[header("Tail", 5, 12, 1)]);
        assert_eq!(dir.slice("Tail", &[0u8; 16]), None);
    }

    #[test]
    fn lookup_helpers_agree() {
        let dir = directory(&[header("RPM", 4, 0, 1)]);
        assert!(dir.contains("RPM"));
        assert!(!dir.contains("rpm"));
        assert_eq!(dir.len(), 1);
        assert!(!dir.is_empty());
        assert_eq!(dir.iter().map(|(name, _)| name).collect::<Vec<_>>(), vec!["RPM"]);
        assert!(VariableDirectory::default().is_empty());
    }
}
