//! # Simulated Clock
//!
//! Deterministic discrete clock for the process table.
//!
//! ## Philosophy
//!
//! **Determinism enables thorough testing.**
//!
//! The clock only advances when explicitly told to do so. There is no
//! relation to wall-clock time: one tick is one full driver cycle.

/// Simulated clock with controllable time progression
///
/// # Examples
///
/// ```
/// use sim_kernel::clock::SimClock;
///
/// let mut clock = SimClock::new();
/// assert_eq!(clock.current_ticks(), 0);
///
/// clock.tick();
/// assert_eq!(clock.current_ticks(), 1);
///
/// clock.advance_ticks(4);
/// assert_eq!(clock.current_ticks(), 5);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SimClock {
    /// Current tick count
    ticks: u64,
}

impl SimClock {
    /// Creates a new clock starting at tick 0
    pub fn new() -> Self {
        Self { ticks: 0 }
    }

    /// Advances by one tick and returns the new tick count
    pub fn tick(&mut self) -> u64 {
        self.advance_ticks(1);
        self.ticks
    }

    /// Advances the clock by `delta` ticks
    ///
    /// Saturates at `u64::MAX`.
    pub fn advance_ticks(&mut self, delta: u64) {
        self.ticks = self.ticks.saturating_add(delta);
    }

    /// Returns the current tick count without advancing time
    pub fn current_ticks(&self) -> u64 {
        self.ticks
    }

    /// Rewinds the clock to tick 0
    pub fn reset(&mut self) {
        self.ticks = 0;
    }
}
