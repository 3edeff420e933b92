//! Unique identifiers for system entities

use serde::{Deserialize, Serialize};
use std::fmt;

/// Unique identifier for a simulated process
///
/// Identifiers are handed out sequentially by the process table, starting
/// at 1. They are never reused until the table is reset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ProcessId(u64);

impl ProcessId {
    /// First identifier issued by a fresh table
    pub const FIRST: ProcessId = ProcessId(1);

    /// Creates a process ID from its raw value
    pub const fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    /// Returns the raw value
    pub const fn as_raw(&self) -> u64 {
        self.0
    }

    /// Returns the identifier that follows this one
    pub const fn next(&self) -> Self {
        Self(self.0 + 1)
    }
}

impl Default for ProcessId {
    fn default() -> Self {
        Self::FIRST
    }
}

impl fmt::Display for ProcessId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Process({})", self.0)
    }
}
