//! Scheduling priority
//!
//! Priorities live in `1..=10`. A higher value runs first. Out-of-range input
//! is clamped, never rejected.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Clamped scheduling priority
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(from = "i64", into = "u8")]
pub struct Priority(u8);

impl Priority {
    /// Lowest priority (runs last)
    pub const MIN: Priority = Priority(1);
    /// Highest priority (runs first)
    pub const MAX: Priority = Priority(10);
    /// Number of distinct priority levels
    pub const LEVELS: usize = 10;

    /// Creates a priority, clamping the value into `1..=10`
    pub fn clamped(value: i64) -> Self {
        Self(value.clamp(Self::MIN.0 as i64, Self::MAX.0 as i64) as u8)
    }

    /// Returns the numeric level
    pub fn level(&self) -> u8 {
        self.0
    }

    /// Zero-based bucket index (level 1 maps to 0)
    pub fn bucket(&self) -> usize {
        (self.0 - Self::MIN.0) as usize
    }
}

impl Default for Priority {
    fn default() -> Self {
        Self::MIN
    }
}

impl From<i64> for Priority {
    fn from(value: i64) -> Self {
        Self::clamped(value)
    }
}

impl From<Priority> for u8 {
    fn from(priority: Priority) -> Self {
        priority.0
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
