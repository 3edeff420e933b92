//! # Scheduling Simulator Driver
//!
//! Headless driver for the process scheduling simulator.
//!
//! ## Responsibilities
//!
//! The driver:
//! - Loads a JSON scenario describing the processes and scripted input
//! - Installs the conventional syscall handler on every process
//! - Runs the tick loop (input → advance → schedule → execute)
//! - Collects program output, logs and a final per-process report
//!
//! ## Non-Responsibilities
//!
//! The driver does NOT:
//! - Make scheduling decisions (the kernel's scheduler does)
//! - Read interactive input (all input is scripted)
//! - Use wall-clock time

pub mod config;
pub mod handler;
pub mod rotation;
pub mod runtime;

pub use config::{BlockTicks, ProcessConfig, SimulationConfig};
pub use handler::{DriverSyscalls, SYSCALL_EXIT, SYSCALL_PRINT, SYSCALL_READ};
pub use rotation::BlockRotation;
pub use runtime::{
    OutputLine, Simulation, SimulationError, SimulationReport, StopReason, TickReport,
};
