//! # SimKernel
//!
//! Process management for the scheduling simulator.
//!
//! The kernel owns three pieces:
//!
//! - [`ProcessTable`]: every process ever created plus the global clock
//! - [`Scheduler`]: picks which process runs and executes one instruction
//!   of it per call
//! - [`SimClock`]: the deterministic tick counter behind the table
//!
//! Time only moves when [`ProcessTable::advance_time`] is called. Nothing
//! here touches wall-clock time or threads, so a run is fully reproducible.

pub mod clock;
pub mod process;
pub mod process_table;
pub mod scheduler;

pub use clock::SimClock;
pub use process::{Process, ProcessError, ProcessSummary, UNBOUNDED_QUANTUM};
pub use process_table::ProcessTable;
pub use scheduler::{
    ExitReason, PreemptionReason, ScheduleEvent, Scheduler, SchedulerConfig, DEFAULT_QUANTUM,
};
