//! Telemetry variable type definitions

use serde::{Deserialize, Serialize};

/// Telemetry data types published by the simulator.
/// Maps to iRacing SDK's irsdk_VarType enum.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "tauri", derive(specta::Type))]
pub enum VariableType {
    /// 8-bit character (irsdk_char)
    Char,
    /// Boolean stored in one byte (irsdk_bool)
    Bool,
    /// 32-bit signed integer (irsdk_int)
    Int32,
    /// 32-bit bitfield (irsdk_bitField)
    BitField,
    /// 32-bit floating point (irsdk_float)
    Float32,
    /// 64-bit floating point (irsdk_double)
    Float64,
}

impl VariableType {
    /// Map a raw `irsdk_VarType` tag. Unknown tags return `None`.
    pub const fn from_tag(tag: i32) -> Option<Self> {
        match tag {
            0 => Some(VariableType::Char),
            1 => Some(VariableType::Bool),
            2 => Some(VariableType::Int32),
            3 => Some(VariableType::BitField),
            4 => Some(VariableType::Float32),
            5 => Some(VariableType::Float64),
            _ => None,
        }
    }

    /// Returns the size in bytes of one element.
    /// Matches the irsdk_VarTypeBytes array from the iRacing SDK.
    pub const fn size(&self) -> usize {
        match self {
            VariableType::Char | VariableType::Bool => 1,
            VariableType::Int32 | VariableType::BitField | VariableType::Float32 => 4,
            VariableType::Float64 => 8,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_tags_map_to_sdk_types() {
        assert_eq!(VariableType::from_tag(0), Some(VariableType::Char));
        assert_eq!(VariableType::from_tag(1), Some(VariableType::Bool));
        assert_eq!(VariableType::from_tag(2), Some(VariableType::Int32));
        assert_eq!(VariableType::from_tag(3), Some(VariableType::BitField));
        assert_eq!(VariableType::from_tag(4), Some(VariableType::Float32));
        assert_eq!(VariableType::from_tag(5), Some(VariableType::Float64));
    }

    #[test]
    fn unknown_tags_are_not_guessed() {
        assert_eq!(VariableType::from_tag(-1), None);
        assert_eq!(VariableType::from_tag(6), None);
        assert_eq!(VariableType::from_tag(99), None);
    }

    #[test]
    fn sizes_match_irsdk_var_type_bytes() {
        assert_eq!(VariableType::Char.size(), 1);
        assert_eq!(VariableType::Bool.size(), 1);
        assert_eq!(VariableType::Int32.size(), 4);
        assert_eq!(VariableType::BitField.size(), 4);
        assert_eq!(VariableType::Float32.size(), 4);
        assert_eq!(VariableType::Float64.size(), 8);
    }
}
