//! Core types for telemetry data representation.
//!
//! - [`Frame`] is one buffer's payload at one tick, with a [`ReadStatus`]
//! - [`VariableDirectory`] maps variable names to [`VariableHeader`] metadata
//! - [`VariableType`] maps iRacing's `irsdk_VarType` tags to element sizes
//! - [`FreshnessState`] and [`FreshnessPolicy`] decide whether a tick is new
//!
//! ## Usage Example
//!
//! ```rust
//! use pitlane::types::{Frame, ReadStatus, VariableType};
//!
//! let frame = Frame::new(vec![0x00, 0xA0, 0x8C, 0x45], 12345, 1, 3, ReadStatus::Clean);
//! assert_eq!(frame.len(), 4);
//! assert!(!frame.is_torn());
//!
//! // 4500.0 as a little-endian f32
//! let rpm = f32::from_le_bytes(frame.data[..VariableType::Float32.size()].try_into().unwrap());
//! assert!((rpm - 4500.0).abs() < 1.0);
//! ```

mod directory;
mod frame;
mod freshness;
mod variable_type;

pub use directory::{VariableDirectory, VariableHeader};
pub use frame::{Frame, ReadStatus};
pub use freshness::{FreshnessPolicy, FreshnessState};
pub use variable_type::VariableType;
