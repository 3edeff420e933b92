//! CPU and parser error types

use thiserror::Error;

/// Errors raised while loading program text
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ParseError {
    /// A data line whose value is not a 32-bit integer
    #[error("Invalid integer literal '{text}' on line {line}")]
    InvalidLiteral { line: usize, text: String },
}

/// Errors raised by a single instruction step
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CpuError {
    /// Direct operand names a variable that was never stored
    #[error("Undefined variable: {0}")]
    UndefinedVariable(String),

    /// DIV with a zero divisor
    #[error("Division by zero")]
    DivisionByZero,

    /// Operand kind not allowed here (e.g. STORE to an immediate)
    #[error("Invalid operand: {0}")]
    InvalidOperand(String),

    /// Branch target was never declared
    #[error("Undefined label: {0}")]
    UndefinedLabel(String),

    /// Opcode outside the instruction set
    #[error("Unknown instruction: {0}")]
    UnknownInstruction(String),

    /// Instruction written without its operand
    #[error("Missing operand for {0}")]
    MissingOperand(String),

    /// Immediate or syscall code that is not an integer
    #[error("Invalid integer literal: {0}")]
    InvalidLiteral(String),

    /// Supplied input that is not an integer
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}
