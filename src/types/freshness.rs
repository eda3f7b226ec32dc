//! Per-session freshness tracking

use serde::{Deserialize, Serialize};

/// Last tick count successfully consumed in this session.
///
/// Starts out unknown and returns to unknown whenever the producer
/// disconnects. Ticks are stamped by the producer and only ever compared for
/// equality or order against the previous value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FreshnessState {
    last_tick: i32,
}

impl FreshnessState {
    /// Sentinel for "nothing consumed yet", matching the SDK's `INT_MAX`.
    pub const UNKNOWN: i32 = i32::MAX;

    pub const fn new() -> Self {
        Self { last_tick: Self::UNKNOWN }
    }

    /// Last consumed tick, or `None` while unknown.
    pub fn last_tick(&self) -> Option<i32> {
        (self.last_tick != Self::UNKNOWN).then_some(self.last_tick)
    }

    pub fn is_unknown(&self) -> bool {
        self.last_tick == Self::UNKNOWN
    }

    /// Forget the last tick. Called on producer disconnect.
    pub fn reset(&mut self) {
        self.last_tick = Self::UNKNOWN;
    }

    /// Record `tick` as consumed.
    pub fn advance(&mut self, tick: i32) {
        self.last_tick = tick;
    }

    /// Whether `tick` is data this session has not consumed yet.
    ///
    /// A tick lower than the last one means the producer restarted its
    /// counter, which is new data too.
    pub fn is_new(&self, tick: i32) -> bool {
        self.is_unknown() || tick != self.last_tick
    }
}

impl Default for FreshnessState {
    fn default() -> Self {
        Self::new()
    }
}

/// Whether a buffer whose tick has already been consumed is read again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[cfg_attr(feature = "tauri", derive(specta::Type))]
pub enum FreshnessPolicy {
    /// Copy the selected buffer on every tick, even if it was already emitted
    AlwaysRead,
    /// Emit nothing for a tick whose buffer was already consumed
    #[default]
    SkipStale,
}
