//! System call capability.
//!
//! A [`SyscallHandler`] is registered per CPU and receives every `SYSCALL n`
//! the program executes. The handler sees the CPU through a [`CpuHandle`]:
//! it may read or write the accumulator, inspect the data store, mark the
//! CPU as waiting for input, and queue [`SyscallEffect`]s.
//!
//! Effects are how a program asks its owner to block or terminate it. The
//! CPU never changes its own lifecycle; whoever owns the process drains
//! the effects after the step and applies them.

use std::collections::BTreeMap;

/// Request queued by a syscall handler
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyscallEffect {
    /// Terminate the calling process
    Exit,
    /// Block the calling process for the given number of ticks
    Block { ticks: u64 },
    /// Emit a line of program output
    Output(String),
}

/// View of the CPU handed to a syscall handler
pub struct CpuHandle<'a> {
    pub(crate) accumulator: &'a mut i32,
    pub(crate) program_counter: usize,
    pub(crate) data: &'a BTreeMap<String, i32>,
    pub(crate) waiting_for_input: &'a mut bool,
    pub(crate) effects: &'a mut Vec<SyscallEffect>,
}

impl CpuHandle<'_> {
    /// Returns the accumulator
    pub fn accumulator(&self) -> i32 {
        *self.accumulator
    }

    /// Overwrites the accumulator
    pub fn set_accumulator(&mut self, value: i32) {
        *self.accumulator = value;
    }

    /// Returns the address of the executing instruction
    pub fn program_counter(&self) -> usize {
        self.program_counter
    }

    /// Reads a data-store entry
    pub fn variable(&self, name: &str) -> Option<i32> {
        self.data.get(name).copied()
    }

    /// Returns true if the CPU is waiting for input
    pub fn is_waiting_for_input(&self) -> bool {
        *self.waiting_for_input
    }

    /// Suspends stepping until input is supplied
    pub fn set_waiting_for_input(&mut self, waiting: bool) {
        *self.waiting_for_input = waiting;
    }

    /// Asks the owner to terminate this process
    pub fn request_exit(&mut self) {
        self.effects.push(SyscallEffect::Exit);
    }

    /// Asks the owner to block this process
    pub fn request_block(&mut self, ticks: u64) {
        self.effects.push(SyscallEffect::Block { ticks });
    }

    /// Emits a line of output
    pub fn emit(&mut self, text: impl Into<String>) {
        self.effects.push(SyscallEffect::Output(text.into()));
    }
}

/// Syscall capability
pub trait SyscallHandler {
    /// Handles syscall `code`
    fn handle(&mut self, code: i32, cpu: &mut CpuHandle<'_>);
}

impl<F> SyscallHandler for F
where
    F: FnMut(i32, &mut CpuHandle<'_>),
{
    fn handle(&mut self, code: i32, cpu: &mut CpuHandle<'_>) {
        self(code, cpu)
    }
}
