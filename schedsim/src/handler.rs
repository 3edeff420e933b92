//! Conventional syscall handler.
//!
//! | Code | Meaning |
//! |------|---------|
//! | -1   | input sentinel notification: print `Ola` |
//! | 0    | terminate the calling process |
//! | 1    | print the accumulator, then block for a rotated duration |
//! | 2    | wait for input |
//!
//! Any other code is ignored.

use crate::rotation::BlockRotation;
use vcpu::{CpuHandle, SyscallHandler, SENTINEL_SYSCALL};

pub const SYSCALL_EXIT: i32 = 0;
pub const SYSCALL_PRINT: i32 = 1;
pub const SYSCALL_READ: i32 = 2;

/// Text emitted when the input sentinel is delivered
pub const SENTINEL_GREETING: &str = "Ola";

/// Syscall handler installed on every simulated process
#[derive(Debug, Clone, Default)]
pub struct DriverSyscalls {
    rotation: BlockRotation,
}

impl DriverSyscalls {
    pub fn new(rotation: BlockRotation) -> Self {
        Self { rotation }
    }
}

impl SyscallHandler for DriverSyscalls {
    fn handle(&mut self, code: i32, cpu: &mut CpuHandle<'_>) {
        match code {
            SENTINEL_SYSCALL => cpu.emit(SENTINEL_GREETING),
            SYSCALL_EXIT => cpu.request_exit(),
            SYSCALL_PRINT => {
                let value = cpu.accumulator();
                cpu.emit(value.to_string());
                cpu.request_block(self.rotation.next_duration());
            }
            SYSCALL_READ => cpu.set_waiting_for_input(true),
            _ => {}
        }
    }
}
