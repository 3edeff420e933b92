//! # Virtual CPU
//!
//! A single-accumulator toy CPU that runs small assembly programs one
//! instruction at a time.
//!
//! ## Philosophy
//!
//! - **Decode once**: Program text is decoded into a closed [`Instruction`]
//!   type when it is loaded. Execution is a single typed match, never a
//!   string comparison per step.
//! - **Fail at the instruction**: Parsing only rejects malformed data
//!   literals. Bad opcodes, operands and labels surface as [`CpuError`]
//!   from the step that executes them.
//! - **No hidden I/O**: System calls go through an injected
//!   [`SyscallHandler`]. The CPU assigns no meaning to syscall codes.
//!
//! ## Program format
//!
//! ```text
//! .data
//! x 10
//! .enddata
//! .code
//! loop: SUB #1
//!       BRPOS loop
//!       SYSCALL 0
//! .endcode
//! ```

pub mod cpu;
pub mod error;
pub mod program;
pub mod syscall;

pub use cpu::{CpuSnapshot, VirtualCpu};
pub use error::{CpuError, ParseError};
pub use program::{Instruction, Operand, Program};
pub use syscall::{CpuHandle, SyscallEffect, SyscallHandler};

/// Input text that additionally raises the reserved sentinel syscall
pub const INPUT_SENTINEL: &str = "0101";

/// Syscall code delivered to the handler when [`INPUT_SENTINEL`] is supplied
pub const SENTINEL_SYSCALL: i32 = -1;
