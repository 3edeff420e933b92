//! # Core Types
//!
//! This crate defines the fundamental types shared by the scheduler simulator.
//!
//! ## Philosophy
//!
//! - **Explicit over implicit**: Process classes and states are closed enums,
//!   never strings compared at runtime.
//! - **Type safety first**: A priority cannot be confused with an arrival time.
//!
//! ## Key Types
//!
//! - [`ProcessId`]: Sequential identifier for simulated processes
//! - [`ProcessClass`]: Realtime or best-effort scheduling class
//! - [`Priority`]: Static realtime priority (0 = high, 1 = low)
//! - [`ProcessState`]: Lifecycle state of a simulated process

pub mod ids;
pub mod process;

pub use ids::ProcessId;
pub use process::{Priority, ProcessClass, ProcessState};
