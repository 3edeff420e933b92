//! Scheduling Test Utilities
//!
//! Shared helpers for the cross-crate scheduling tests.
//!
//! ## Test Philosophy
//!
//! - **One tick at a time**: tests drive the same advance/schedule/execute
//!   cycle the real driver uses
//! - **Deterministic**: no randomness and no wall-clock time, so every
//!   assertion can name an exact tick
//! - **Observe through public state**: process states, counters and the
//!   scheduler's audit log

use core_types::{Priority, ProcessClass, ProcessId, ProcessState};
use sim_kernel::{ProcessTable, ScheduleEvent, Scheduler};
use vcpu::CpuHandle;

/// Program that never blocks and never ends
pub const SPIN: &str = ".code\nloop: ADD #1\n      BRANY loop\n.endcode\n";

/// Table plus scheduler driven in lockstep
#[derive(Debug, Default)]
pub struct Harness {
    pub table: ProcessTable,
    pub scheduler: Scheduler,
}

impl Harness {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a harness whose realtime quantum is `quantum`
    pub fn with_quantum(quantum: i64) -> Self {
        let mut harness = Self::new();
        harness.scheduler.set_quantum(quantum);
        harness
    }

    /// Creates a process running `source`
    pub fn spawn(
        &mut self,
        source: &str,
        arrival: u64,
        class: ProcessClass,
        priority: Priority,
    ) -> ProcessId {
        self.table
            .create_process(format!("p{}", self.table.len() + 1), source, arrival, class, priority)
            .expect("test program must load")
    }

    /// Creates a process running [`SPIN`]
    pub fn spawn_spinner(&mut self, arrival: u64, class: ProcessClass, priority: Priority) -> ProcessId {
        self.spawn(SPIN, arrival, class, priority)
    }

    /// Installs a handler that terminates on `SYSCALL 0` and waits on `SYSCALL 2`
    pub fn install_basic_syscalls(&mut self, id: ProcessId) {
        self.table.set_syscall_handler(
            id,
            Box::new(|code: i32, cpu: &mut CpuHandle<'_>| match code {
                0 => cpu.request_exit(),
                2 => cpu.set_waiting_for_input(true),
                _ => {}
            }),
        );
    }

    /// Runs one driver tick and returns the scheduled process
    pub fn tick(&mut self) -> Option<ProcessId> {
        self.table.advance_time();
        let selected = self.scheduler.schedule(&mut self.table);
        self.scheduler.execute_current_process(&mut self.table);
        selected
    }

    /// Runs `ticks` driver ticks and returns the schedule
    pub fn run(&mut self, ticks: usize) -> Vec<Option<ProcessId>> {
        (0..ticks).map(|_| self.tick()).collect()
    }

    pub fn state(&self, id: ProcessId) -> ProcessState {
        self.table
            .process(id)
            .map(|p| p.state())
            .expect("process must exist")
    }

    /// Returns the number of processes in `Running`
    pub fn running_count(&self) -> usize {
        self.table.processes_in(ProcessState::Running).count()
    }

    /// Returns how many times `id` was dispatched
    pub fn dispatch_count(&self, id: ProcessId) -> usize {
        self.scheduler
            .audit_log()
            .iter()
            .filter(|event| {
                matches!(event, ScheduleEvent::ProcessSelected { process_id, .. } if *process_id == id)
            })
            .count()
    }
}
