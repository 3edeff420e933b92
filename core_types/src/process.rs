//! Process classification and lifecycle states

use serde::{Deserialize, Serialize};
use std::fmt;

/// Scheduling class of a process
///
/// Realtime processes always win over best-effort ones and run under a
/// bounded quantum. Best-effort processes run first-come, first-served
/// with no quantum.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProcessClass {
    /// Priority-ordered, quantum-bounded
    Realtime,
    /// FCFS, unbounded quantum
    #[serde(alias = "best_effort")]
    BestEffort,
}

impl ProcessClass {
    /// Checks if this is the realtime class
    pub fn is_realtime(&self) -> bool {
        matches!(self, ProcessClass::Realtime)
    }
}

impl fmt::Display for ProcessClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProcessClass::Realtime => write!(f, "realtime"),
            ProcessClass::BestEffort => write!(f, "besteffort"),
        }
    }
}

/// Static priority of a realtime process
///
/// Ordered so that `High < Low`; sorting ascending yields the most urgent
/// process first. Best-effort processes carry a priority but it is ignored.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    /// Priority 0
    High = 0,
    /// Priority 1
    #[default]
    Low = 1,
}

impl Priority {
    /// Returns the numeric level (0 = high, 1 = low)
    pub fn level(&self) -> u8 {
        *self as u8
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Priority::High => write!(f, "high (0)"),
            Priority::Low => write!(f, "low (1)"),
        }
    }
}

/// Lifecycle state of a process
///
/// Allowed transitions:
/// - New -> Ready (arrival)
/// - Ready -> Running (dispatch)
/// - Running -> Ready (quantum expiry or preemption)
/// - Running -> Blocked
/// - Blocked -> Ready (block timer elapsed)
/// - any -> Exit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProcessState {
    /// Created, arrival time not reached yet
    New,
    /// Waiting for the CPU
    Ready,
    /// Holding the CPU
    Running,
    /// Waiting for its block timer
    Blocked,
    /// Finished or killed
    Exit,
}

impl ProcessState {
    /// Checks if the process is in a terminal state
    pub fn is_terminal(&self) -> bool {
        matches!(self, ProcessState::Exit)
    }
}

impl fmt::Display for ProcessState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ProcessState::New => "new",
            ProcessState::Ready => "ready",
            ProcessState::Running => "running",
            ProcessState::Blocked => "blocked",
            ProcessState::Exit => "exit",
        };
        write!(f, "{}", name)
    }
}
