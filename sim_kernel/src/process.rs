//! Process control block.

use core_types::{Priority, ProcessClass, ProcessId, ProcessState};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use vcpu::{CpuSnapshot, ParseError, VirtualCpu};

/// Quantum assigned to a dispatched best-effort process
pub const UNBOUNDED_QUANTUM: i64 = i64::MAX;

/// Errors raised while creating a process
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ProcessError {
    #[error("Program load failed: {0}")]
    Parse(#[from] ParseError),
}

/// A simulated process
///
/// Owns its [`VirtualCpu`]. The lifecycle fields are only mutated by the
/// process table and the scheduler; callers get read access plus the CPU.
pub struct Process {
    id: ProcessId,
    name: String,
    source: String,
    arrival_time: u64,
    class: ProcessClass,
    priority: Priority,
    state: ProcessState,
    cpu: VirtualCpu,
    block_end_time: u64,
    quantum_left: i64,
    execution_time: u64,
    waiting_time: u64,
}

impl Process {
    /// Loads `source` into a fresh CPU and creates the process in `New`
    pub fn new(
        id: ProcessId,
        name: impl Into<String>,
        source: impl Into<String>,
        arrival_time: u64,
        class: ProcessClass,
        priority: Priority,
    ) -> Result<Self, ProcessError> {
        let source = source.into();
        let cpu = VirtualCpu::from_source(&source)?;

        Ok(Self {
            id,
            name: name.into(),
            source,
            arrival_time,
            class,
            priority,
            state: ProcessState::New,
            cpu,
            block_end_time: 0,
            quantum_left: 0,
            execution_time: 0,
            waiting_time: 0,
        })
    }

    pub fn id(&self) -> ProcessId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the program text the process was created from
    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn arrival_time(&self) -> u64 {
        self.arrival_time
    }

    pub fn class(&self) -> ProcessClass {
        self.class
    }

    pub fn priority(&self) -> Priority {
        self.priority
    }

    pub fn state(&self) -> ProcessState {
        self.state
    }

    pub fn cpu(&self) -> &VirtualCpu {
        &self.cpu
    }

    pub fn cpu_mut(&mut self) -> &mut VirtualCpu {
        &mut self.cpu
    }

    /// Tick at which a blocked process becomes ready again
    pub fn block_end_time(&self) -> u64 {
        self.block_end_time
    }

    /// Remaining ticks of the current dispatch; may go negative in
    /// principle but saturates rather than wrapping
    pub fn quantum_left(&self) -> i64 {
        self.quantum_left
    }

    /// Ticks spent in `Running`
    pub fn execution_time(&self) -> u64 {
        self.execution_time
    }

    /// Ticks spent in `Ready`
    pub fn waiting_time(&self) -> u64 {
        self.waiting_time
    }

    pub(crate) fn set_state(&mut self, state: ProcessState) {
        self.state = state;
    }

    pub(crate) fn set_block_end_time(&mut self, tick: u64) {
        self.block_end_time = tick;
    }

    pub(crate) fn set_quantum_left(&mut self, quantum: i64) {
        self.quantum_left = quantum;
    }

    /// Charges one tick of execution against the running process
    pub(crate) fn charge_running_tick(&mut self) {
        self.execution_time += 1;
        self.quantum_left = self.quantum_left.saturating_sub(1);
    }

    pub(crate) fn charge_waiting_tick(&mut self) {
        self.waiting_time += 1;
    }

    /// Captures the CPU registers and flags
    pub fn save_state(&self) -> CpuSnapshot {
        self.cpu.snapshot()
    }

    /// Restores CPU registers and flags captured by [`Process::save_state`]
    pub fn restore_state(&mut self, snapshot: CpuSnapshot) {
        self.cpu.restore(snapshot);
    }

    /// Returns a serializable view of the process
    pub fn summary(&self) -> ProcessSummary {
        ProcessSummary {
            id: self.id,
            name: self.name.clone(),
            class: self.class,
            priority: self.priority,
            state: self.state,
            arrival_time: self.arrival_time,
            execution_time: self.execution_time,
            waiting_time: self.waiting_time,
            quantum_left: self.quantum_left,
            block_end_time: self.block_end_time,
            accumulator: self.cpu.accumulator(),
            program_counter: self.cpu.program_counter(),
        }
    }
}

impl std::fmt::Debug for Process {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Process")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("class", &self.class)
            .field("priority", &self.priority)
            .field("state", &self.state)
            .field("arrival_time", &self.arrival_time)
            .field("quantum_left", &self.quantum_left)
            .field("cpu", &self.cpu)
            .finish()
    }
}

/// Point-in-time process report
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessSummary {
    pub id: ProcessId,
    pub name: String,
    pub class: ProcessClass,
    pub priority: Priority,
    pub state: ProcessState,
    pub arrival_time: u64,
    pub execution_time: u64,
    pub waiting_time: u64,
    pub quantum_left: i64,
    pub block_end_time: u64,
    pub accumulator: i32,
    pub program_counter: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    const COUNTER: &str = ".data\nx 7\n.enddata\n.code\nLOAD x\nADD #1\n.endcode\n";

    fn sample() -> Process {
        Process::new(
            ProcessId::FIRST,
            "counter",
            COUNTER,
            3,
            ProcessClass::Realtime,
            Priority::High,
        )
        .unwrap()
    }

    #[test]
    fn test_new_process_starts_in_new() {
        let process = sample();
        assert_eq!(process.state(), ProcessState::New);
        assert_eq!(process.arrival_time(), 3);
        assert_eq!(process.execution_time(), 0);
        assert_eq!(process.waiting_time(), 0);
        assert_eq!(process.cpu().variable("x"), Ok(7));
    }

    #[test]
    fn test_invalid_data_literal_rejects_process() {
        let result = Process::new(
            ProcessId::FIRST,
            "bad",
            ".data\nx seven\n.enddata",
            0,
            ProcessClass::BestEffort,
            Priority::Low,
        );
        assert!(matches!(result, Err(ProcessError::Parse(_))));
    }

    #[test]
    fn test_charge_running_tick_saturates() {
        let mut process = sample();
        process.set_quantum_left(i64::MIN);
        process.charge_running_tick();
        assert_eq!(process.quantum_left(), i64::MIN);
        assert_eq!(process.execution_time(), 1);
    }

    #[test]
    fn test_save_and_restore_state() {
        let mut process = sample();
        process.cpu_mut().step().unwrap();
        let saved = process.save_state();

        process.cpu_mut().step().unwrap();
        assert_eq!(process.cpu().accumulator(), 8);

        process.restore_state(saved);
        assert_eq!(process.cpu().accumulator(), 7);
        assert_eq!(process.cpu().program_counter(), 1);
    }

    #[test]
    fn test_summary_serializes() {
        let summary = sample().summary();
        let json = serde_json::to_value(&summary).unwrap();
        assert_eq!(json["name"], "counter");
        assert_eq!(json["class"], "realtime");
        assert_eq!(json["state"], "new");
    }
}
