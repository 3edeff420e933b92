//! Accumulator machine.

use crate::error::{CpuError, ParseError};
use crate::program::{Instruction, Operand, Program};
use crate::syscall::{CpuHandle, SyscallEffect, SyscallHandler};
use crate::{INPUT_SENTINEL, SENTINEL_SYSCALL};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Saved CPU registers and flags
///
/// Used by the owning process to suspend and resume execution. The
/// program itself is not part of the snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CpuSnapshot {
    pub accumulator: i32,
    pub program_counter: usize,
    pub data: BTreeMap<String, i32>,
    pub running: bool,
    pub blocked: bool,
    pub block_time: u64,
    pub waiting_for_input: bool,
}

/// Virtual CPU
///
/// Holds one loaded program plus the accumulator, program counter and data
/// store. Arithmetic wraps on overflow.
pub struct VirtualCpu {
    accumulator: i32,
    program_counter: usize,
    program: Program,
    data: BTreeMap<String, i32>,
    running: bool,
    blocked: bool,
    block_time: u64,
    waiting_for_input: bool,
    handler: Option<Box<dyn SyscallHandler>>,
    effects: Vec<SyscallEffect>,
}

impl VirtualCpu {
    /// Creates a CPU with `program` loaded and running
    pub fn new(program: Program) -> Self {
        let data = program.initial_data().clone();
        Self {
            accumulator: 0,
            program_counter: 0,
            program,
            data,
            running: true,
            blocked: false,
            block_time: 0,
            waiting_for_input: false,
            handler: None,
            effects: Vec::new(),
        }
    }

    /// Parses `source` and loads it
    pub fn from_source(source: &str) -> Result<Self, ParseError> {
        Ok(Self::new(Program::parse(source)?))
    }

    /// Registers the syscall handler, replacing any previous one
    pub fn set_syscall_handler(&mut self, handler: Box<dyn SyscallHandler>) {
        self.handler = Some(handler);
    }

    /// Executes one instruction
    ///
    /// Returns `Ok(false)` without effect while stopped, blocked or waiting
    /// for input. Returns `Ok(false)` and stops the CPU once the program
    /// counter runs past the last instruction. On error the accumulator,
    /// data store and program counter are left untouched.
    pub fn step(&mut self) -> Result<bool, CpuError> {
        if !self.running || self.blocked || self.waiting_for_input {
            return Ok(false);
        }

        let Some(instruction) = self.program.instruction(self.program_counter) else {
            self.running = false;
            return Ok(false);
        };

        match instruction {
            Instruction::Add(op) => {
                let value = resolve(&self.data, op)?;
                self.accumulator = self.accumulator.wrapping_add(value);
                self.program_counter += 1;
            }
            Instruction::Sub(op) => {
                let value = resolve(&self.data, op)?;
                self.accumulator = self.accumulator.wrapping_sub(value);
                self.program_counter += 1;
            }
            Instruction::Mult(op) => {
                let value = resolve(&self.data, op)?;
                self.accumulator = self.accumulator.wrapping_mul(value);
                self.program_counter += 1;
            }
            Instruction::Div(op) => {
                let divisor = resolve(&self.data, op)?;
                if divisor == 0 {
                    return Err(CpuError::DivisionByZero);
                }
                self.accumulator = self.accumulator.wrapping_div(divisor);
                self.program_counter += 1;
            }
            Instruction::Load(op) => {
                self.accumulator = resolve(&self.data, op)?;
                self.program_counter += 1;
            }
            Instruction::Store(op) => {
                match op {
                    Operand::Direct(name) => {
                        self.data.insert(name.clone(), self.accumulator);
                    }
                    Operand::Immediate(_) | Operand::Malformed(_) => {
                        return Err(CpuError::InvalidOperand(op.to_string()));
                    }
                    Operand::Missing => {
                        return Err(CpuError::MissingOperand("STORE".to_string()));
                    }
                }
                self.program_counter += 1;
            }
            Instruction::BrAny(label) => {
                self.program_counter = jump_target(&self.program, "BRANY", label)?;
            }
            Instruction::BrPos(label) => {
                let taken = self.accumulator > 0;
                self.program_counter =
                    branch(&self.program, self.program_counter, taken, "BRPOS", label)?;
            }
            Instruction::BrZero(label) => {
                let taken = self.accumulator == 0;
                self.program_counter =
                    branch(&self.program, self.program_counter, taken, "BRZERO", label)?;
            }
            Instruction::BrNeg(label) => {
                let taken = self.accumulator < 0;
                self.program_counter =
                    branch(&self.program, self.program_counter, taken, "BRNEG", label)?;
            }
            Instruction::Syscall(op) => {
                let code = syscall_code(op)?;
                if let Some(handler) = self.handler.as_mut() {
                    let mut handle = CpuHandle {
                        accumulator: &mut self.accumulator,
                        program_counter: self.program_counter,
                        data: &self.data,
                        waiting_for_input: &mut self.waiting_for_input,
                        effects: &mut self.effects,
                    };
                    handler.handle(code, &mut handle);
                }
                self.program_counter += 1;
            }
            Instruction::Unknown(opcode) => {
                return Err(CpuError::UnknownInstruction(opcode.clone()));
            }
        }

        Ok(true)
    }

    /// Delivers input to a CPU waiting for it
    ///
    /// Returns `Ok(false)` if the CPU was not waiting. The text must be an
    /// integer; it replaces the accumulator and clears the waiting flag.
    /// Supplying [`INPUT_SENTINEL`] additionally invokes the handler with
    /// [`SENTINEL_SYSCALL`].
    pub fn supply_input(&mut self, text: &str) -> Result<bool, CpuError> {
        if !self.waiting_for_input {
            return Ok(false);
        }

        let text = text.trim();
        self.accumulator = text
            .parse()
            .map_err(|_| CpuError::InvalidInput(text.to_string()))?;
        self.waiting_for_input = false;

        if text == INPUT_SENTINEL {
            if let Some(handler) = self.handler.as_mut() {
                let mut handle = CpuHandle {
                    accumulator: &mut self.accumulator,
                    program_counter: self.program_counter,
                    data: &self.data,
                    waiting_for_input: &mut self.waiting_for_input,
                    effects: &mut self.effects,
                };
                handler.handle(SENTINEL_SYSCALL, &mut handle);
            }
        }

        Ok(true)
    }

    /// Removes and returns the effects queued by syscalls
    pub fn take_effects(&mut self) -> Vec<SyscallEffect> {
        std::mem::take(&mut self.effects)
    }

    /// Resolves a data-store name
    pub fn variable(&self, name: &str) -> Result<i32, CpuError> {
        resolve(&self.data, &Operand::Direct(name.to_string()))
    }

    pub fn accumulator(&self) -> i32 {
        self.accumulator
    }

    pub fn set_accumulator(&mut self, value: i32) {
        self.accumulator = value;
    }

    pub fn program_counter(&self) -> usize {
        self.program_counter
    }

    pub fn set_program_counter(&mut self, pc: usize) {
        self.program_counter = pc;
    }

    pub fn program(&self) -> &Program {
        &self.program
    }

    /// Returns the instruction the program counter points at
    pub fn current_instruction(&self) -> Option<&Instruction> {
        self.program.instruction(self.program_counter)
    }

    /// Returns true once the program counter is past the last instruction
    pub fn is_halted(&self) -> bool {
        self.program_counter >= self.program.len()
    }

    pub fn data(&self) -> &BTreeMap<String, i32> {
        &self.data
    }

    pub fn set_data(&mut self, data: BTreeMap<String, i32>) {
        self.data = data;
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn set_running(&mut self, running: bool) {
        self.running = running;
    }

    pub fn is_blocked(&self) -> bool {
        self.blocked
    }

    pub fn set_blocked(&mut self, blocked: bool) {
        self.blocked = blocked;
    }

    pub fn block_time(&self) -> u64 {
        self.block_time
    }

    pub fn set_block_time(&mut self, ticks: u64) {
        self.block_time = ticks;
    }

    pub fn is_waiting_for_input(&self) -> bool {
        self.waiting_for_input
    }

    pub fn set_waiting_for_input(&mut self, waiting: bool) {
        self.waiting_for_input = waiting;
    }

    /// Captures registers, data store and flags
    pub fn snapshot(&self) -> CpuSnapshot {
        CpuSnapshot {
            accumulator: self.accumulator,
            program_counter: self.program_counter,
            data: self.data.clone(),
            running: self.running,
            blocked: self.blocked,
            block_time: self.block_time,
            waiting_for_input: self.waiting_for_input,
        }
    }

    /// Restores a snapshot taken with [`VirtualCpu::snapshot`]
    pub fn restore(&mut self, snapshot: CpuSnapshot) {
        self.accumulator = snapshot.accumulator;
        self.program_counter = snapshot.program_counter;
        self.data = snapshot.data;
        self.running = snapshot.running;
        self.blocked = snapshot.blocked;
        self.block_time = snapshot.block_time;
        self.waiting_for_input = snapshot.waiting_for_input;
    }
}

impl fmt::Debug for VirtualCpu {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VirtualCpu")
            .field("accumulator", &self.accumulator)
            .field("program_counter", &self.program_counter)
            .field("instructions", &self.program.len())
            .field("data", &self.data)
            .field("running", &self.running)
            .field("blocked", &self.blocked)
            .field("waiting_for_input", &self.waiting_for_input)
            .field("has_handler", &self.handler.is_some())
            .finish()
    }
}

fn resolve(data: &BTreeMap<String, i32>, operand: &Operand) -> Result<i32, CpuError> {
    match operand {
        Operand::Immediate(value) => Ok(*value),
        Operand::Direct(name) => data
            .get(name)
            .copied()
            .ok_or_else(|| CpuError::UndefinedVariable(name.clone())),
        Operand::Malformed(text) => Err(CpuError::InvalidLiteral(text.clone())),
        Operand::Missing => Err(CpuError::MissingOperand("operand".to_string())),
    }
}

fn jump_target(
    program: &Program,
    mnemonic: &str,
    label: &Option<String>,
) -> Result<usize, CpuError> {
    let label = label
        .as_deref()
        .ok_or_else(|| CpuError::MissingOperand(mnemonic.to_string()))?;
    program
        .label(label)
        .ok_or_else(|| CpuError::UndefinedLabel(label.to_string()))
}

fn branch(
    program: &Program,
    pc: usize,
    taken: bool,
    mnemonic: &str,
    label: &Option<String>,
) -> Result<usize, CpuError> {
    if taken {
        jump_target(program, mnemonic, label)
    } else {
        Ok(pc + 1)
    }
}

fn syscall_code(operand: &Operand) -> Result<i32, CpuError> {
    match operand {
        Operand::Immediate(code) => Ok(*code),
        Operand::Malformed(text) | Operand::Direct(text) => {
            Err(CpuError::InvalidLiteral(text.clone()))
        }
        Operand::Missing => Err(CpuError::MissingOperand("SYSCALL".to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cpu(code: &str) -> VirtualCpu {
        VirtualCpu::from_source(&format!(".code\n{}\n.endcode", code)).unwrap()
    }

    fn run_to_halt(cpu: &mut VirtualCpu) -> usize {
        let mut steps = 0;
        while cpu.step().unwrap() {
            steps += 1;
        }
        steps
    }

    #[test]
    fn test_arithmetic() {
        let mut cpu = cpu("LOAD #7\nADD #5\nSUB #2\nMULT #3\nDIV #4");
        run_to_halt(&mut cpu);
        assert_eq!(cpu.accumulator(), 7);
        assert!(!cpu.is_running());
    }

    #[test]
    fn test_div_truncates_toward_zero() {
        let mut cpu = cpu("LOAD #-7\nDIV #2");
        run_to_halt(&mut cpu);
        assert_eq!(cpu.accumulator(), -3);
    }

    #[test]
    fn test_div_by_zero_leaves_state() {
        let mut cpu = cpu("LOAD #9\nDIV #0");
        assert!(cpu.step().unwrap());

        assert_eq!(cpu.step(), Err(CpuError::DivisionByZero));
        assert_eq!(cpu.accumulator(), 9);
        assert_eq!(cpu.program_counter(), 1);
    }

    #[test]
    fn test_store_then_resolve() {
        let mut cpu = cpu("LOAD #4\nSTORE x\nLOAD #11\nSTORE x");
        run_to_halt(&mut cpu);
        assert_eq!(cpu.variable("x"), Ok(11));
        assert_eq!(
            cpu.variable("y"),
            Err(CpuError::UndefinedVariable("y".to_string()))
        );
    }

    #[test]
    fn test_store_immediate_is_invalid() {
        let mut cpu = cpu("STORE #3");
        assert_eq!(
            cpu.step(),
            Err(CpuError::InvalidOperand("#3".to_string()))
        );
    }

    #[test]
    fn test_store_without_operand_fails_when_executed() {
        let mut cpu = cpu("LOAD #1\nSTORE");
        assert!(cpu.step().unwrap());
        assert_eq!(
            cpu.step(),
            Err(CpuError::MissingOperand("STORE".to_string()))
        );
        assert!(cpu.data().is_empty());
    }

    #[test]
    fn test_undefined_variable() {
        let mut cpu = cpu("ADD nope");
        assert_eq!(
            cpu.step(),
            Err(CpuError::UndefinedVariable("nope".to_string()))
        );
    }

    #[test]
    fn test_malformed_immediate_fails_at_execution() {
        let mut cpu = cpu("LOAD #1\nADD #x1");
        assert!(cpu.step().unwrap());
        assert_eq!(
            cpu.step(),
            Err(CpuError::InvalidLiteral("#x1".to_string()))
        );
    }

    #[test]
    fn test_countdown_loop() {
        let mut cpu = VirtualCpu::from_source(
            ".data\nn 3\n.enddata\n.code\nLOAD n\nloop: SUB #1\nBRPOS loop\n.endcode",
        )
        .unwrap();
        let steps = run_to_halt(&mut cpu);
        assert_eq!(cpu.accumulator(), 0);
        assert_eq!(steps, 7);
    }

    #[test]
    fn test_conditional_branches() {
        let mut cpu = cpu("LOAD #0\nBRZERO z\nLOAD #100\nz: SUB #1\nBRNEG n\nLOAD #200\nn: ADD #0");
        run_to_halt(&mut cpu);
        assert_eq!(cpu.accumulator(), -1);
    }

    #[test]
    fn test_branch_not_taken_ignores_undefined_label() {
        let mut cpu = cpu("LOAD #1\nBRNEG nowhere\nADD #1");
        run_to_halt(&mut cpu);
        assert_eq!(cpu.accumulator(), 2);
    }

    #[test]
    fn test_undefined_label() {
        let mut cpu = cpu("BRANY nowhere");
        assert_eq!(
            cpu.step(),
            Err(CpuError::UndefinedLabel("nowhere".to_string()))
        );
    }

    #[test]
    fn test_unknown_instruction() {
        let mut cpu = cpu("NOP");
        assert_eq!(
            cpu.step(),
            Err(CpuError::UnknownInstruction("NOP".to_string()))
        );
    }

    #[test]
    fn test_step_respects_flags() {
        let mut cpu = cpu("LOAD #1");

        cpu.set_blocked(true);
        assert_eq!(cpu.step(), Ok(false));
        cpu.set_blocked(false);

        cpu.set_waiting_for_input(true);
        assert_eq!(cpu.step(), Ok(false));
        cpu.set_waiting_for_input(false);

        cpu.set_running(false);
        assert_eq!(cpu.step(), Ok(false));
        assert_eq!(cpu.accumulator(), 0);
    }

    #[test]
    fn test_step_past_end_stops_cpu() {
        let mut cpu = cpu("LOAD #1");
        assert_eq!(cpu.step(), Ok(true));
        assert!(cpu.is_running());
        assert!(cpu.is_halted());
        assert_eq!(cpu.step(), Ok(false));
        assert!(!cpu.is_running());
    }

    #[test]
    fn test_syscall_without_handler_is_noop() {
        let mut cpu = cpu("SYSCALL 1\nLOAD #3");
        run_to_halt(&mut cpu);
        assert_eq!(cpu.accumulator(), 3);
        assert!(cpu.take_effects().is_empty());
    }

    #[test]
    fn test_syscall_handler_receives_code() {
        let mut cpu = cpu("LOAD #42\nSYSCALL 1\nSYSCALL 0");
        cpu.set_syscall_handler(Box::new(|code: i32, cpu: &mut CpuHandle<'_>| match code {
            0 => cpu.request_exit(),
            1 => {
                let value = cpu.accumulator();
                cpu.emit(value.to_string());
                cpu.request_block(3);
            }
            _ => {}
        }));

        run_to_halt(&mut cpu);
        assert_eq!(
            cpu.take_effects(),
            vec![
                SyscallEffect::Output("42".to_string()),
                SyscallEffect::Block { ticks: 3 },
                SyscallEffect::Exit,
            ]
        );
        assert_eq!(cpu.program_counter(), 3);
    }

    #[test]
    fn test_supply_input() {
        let mut cpu = cpu("SYSCALL 2\nADD #1");
        cpu.set_syscall_handler(Box::new(|code: i32, cpu: &mut CpuHandle<'_>| {
            if code == 2 {
                cpu.set_waiting_for_input(true);
            }
        }));

        assert_eq!(cpu.supply_input("5"), Ok(false));
        assert!(cpu.step().unwrap());
        assert!(cpu.is_waiting_for_input());
        assert_eq!(cpu.step(), Ok(false));

        assert_eq!(
            cpu.supply_input("five"),
            Err(CpuError::InvalidInput("five".to_string()))
        );
        assert!(cpu.is_waiting_for_input());

        assert_eq!(cpu.supply_input(" 41 "), Ok(true));
        assert!(!cpu.is_waiting_for_input());
        assert!(cpu.step().unwrap());
        assert_eq!(cpu.accumulator(), 42);
    }

    #[test]
    fn test_input_sentinel_notifies_handler() {
        let mut cpu = cpu("SYSCALL 2");
        cpu.set_syscall_handler(Box::new(|code: i32, cpu: &mut CpuHandle<'_>| match code {
            2 => cpu.set_waiting_for_input(true),
            SENTINEL_SYSCALL => cpu.emit("Ola"),
            _ => {}
        }));

        cpu.step().unwrap();
        assert_eq!(cpu.supply_input(INPUT_SENTINEL), Ok(true));
        assert_eq!(cpu.accumulator(), 101);
        assert_eq!(
            cpu.take_effects(),
            vec![SyscallEffect::Output("Ola".to_string())]
        );
    }

    #[test]
    fn test_snapshot_restore() {
        let mut cpu = cpu("LOAD #8\nSTORE v\nADD #1");
        cpu.step().unwrap();
        cpu.step().unwrap();
        let saved = cpu.snapshot();

        cpu.step().unwrap();
        assert_eq!(cpu.accumulator(), 9);

        cpu.restore(saved.clone());
        assert_eq!(cpu.accumulator(), 8);
        assert_eq!(cpu.program_counter(), 2);
        assert_eq!(cpu.snapshot(), saved);
    }

    #[test]
    fn test_wrapping_arithmetic() {
        let mut cpu = cpu("LOAD #2147483647\nADD #1");
        run_to_halt(&mut cpu);
        assert_eq!(cpu.accumulator(), i32::MIN);
    }
}
