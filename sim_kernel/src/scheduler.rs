//! # Two-Class Scheduler
//!
//! Decides which process runs and executes it one instruction at a time.
//!
//! ## Policy
//!
//! - **Realtime before best-effort**: a ready realtime process always wins
//!   over best-effort work, and its arrival preempts a running best-effort
//!   process in the same scheduling call.
//! - **Realtime is quantum-limited**: a realtime process runs for
//!   `quantum` ticks, then goes back to `Ready`. Among ready realtime
//!   processes the lowest priority value wins, ties broken by earliest
//!   arrival and then creation order.
//! - **Best-effort is run-to-block**: a best-effort process has no quantum
//!   and keeps the CPU until it blocks, exits or is preempted by realtime
//!   work. Ready best-effort processes are served by earliest arrival.
//!
//! ## Determinism
//!
//! The scheduler holds no clock of its own. Same table contents and same
//! call sequence yield the same schedule and the same audit log.

use crate::process::UNBOUNDED_QUANTUM;
use crate::process_table::ProcessTable;
use core_types::{ProcessId, ProcessState};
use serde::{Deserialize, Serialize};
use services_logger::{LogEntry, LogLevel, Logger};

/// Realtime quantum used when none is configured
pub const DEFAULT_QUANTUM: u32 = 2;

/// Scheduler configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Ticks a realtime process may run per dispatch
    pub quantum: u32,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            quantum: DEFAULT_QUANTUM,
        }
    }
}

/// Scheduling event recorded in the audit log
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ScheduleEvent {
    /// Process was dispatched
    ProcessSelected {
        process_id: ProcessId,
        timestamp_ticks: u64,
    },
    /// Process was sent back to `Ready`
    ProcessPreempted {
        process_id: ProcessId,
        reason: PreemptionReason,
        timestamp_ticks: u64,
    },
    /// Process left the CPU for good
    ProcessExited {
        process_id: ProcessId,
        reason: ExitReason,
        timestamp_ticks: u64,
    },
    /// Process produced output through a syscall
    ProcessOutput {
        process_id: ProcessId,
        text: String,
        timestamp_ticks: u64,
    },
}

/// Reason for preemption
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PreemptionReason {
    /// Realtime quantum ran out
    QuantumExpired,
    /// A realtime process became ready while best-effort work was running
    RealtimeArrival,
}

/// Reason for process exit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExitReason {
    /// Exit requested by the program
    Normal,
    /// Instruction fault
    Failed,
    /// Terminated from outside the program
    Terminated,
}

/// Realtime/best-effort scheduler
///
/// Holds a non-owning reference (the id) to the currently selected
/// process. All process state lives in the [`ProcessTable`] passed to
/// each call.
#[derive(Debug, Default)]
pub struct Scheduler {
    config: SchedulerConfig,
    current: Option<ProcessId>,
    audit_log: Vec<ScheduleEvent>,
    logger: Logger,
}

impl Scheduler {
    /// Creates a scheduler with the default quantum
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a scheduler with a custom configuration
    pub fn with_config(config: SchedulerConfig) -> Self {
        let mut scheduler = Self::default();
        scheduler.set_quantum(i64::from(config.quantum));
        scheduler
    }

    /// Sets the realtime quantum, clamped to at least 1
    ///
    /// Applies to the next dispatch; a process already running keeps the
    /// quantum it was given.
    pub fn set_quantum(&mut self, quantum: i64) {
        let clamped = quantum.clamp(1, i64::from(u32::MAX));
        self.config.quantum = u32::try_from(clamped).unwrap_or(u32::MAX);
    }

    pub fn quantum(&self) -> u32 {
        self.config.quantum
    }

    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    /// Returns the currently selected process
    pub fn current_process(&self) -> Option<ProcessId> {
        self.current
    }

    /// Picks the process that should run now
    ///
    /// 1. A running realtime process with no quantum left goes back to
    ///    `Ready`. A running process waiting for input keeps the CPU.
    /// 2. With nothing selected, dispatch the best ready realtime process,
    ///    else the earliest-arrived ready best-effort process.
    /// 3. If the selection is best-effort and realtime work is ready, send
    ///    it back to `Ready` and choose again.
    pub fn schedule(&mut self, table: &mut ProcessTable) -> Option<ProcessId> {
        loop {
            let now = table.current_time();

            if let Some((id, realtime, quantum_left, waiting)) = table.running().map(|p| {
                (
                    p.id(),
                    p.class().is_realtime(),
                    p.quantum_left(),
                    p.cpu().is_waiting_for_input(),
                )
            }) {
                if realtime && quantum_left <= 0 {
                    self.preempt(table, id, PreemptionReason::QuantumExpired, now);
                } else if waiting {
                    self.current = Some(id);
                    return self.current;
                } else {
                    self.current = Some(id);
                }
            }

            // A selection that blocked or exited since the last call is stale
            if let Some(id) = self.current {
                match table.process(id).map(|p| p.state()) {
                    Some(ProcessState::Running) => {}
                    Some(ProcessState::Exit) => {
                        self.current = None;
                        self.record_exit(id, ExitReason::Terminated, now);
                    }
                    _ => self.current = None,
                }
            }

            if self.current.is_none() {
                if let Some(id) = Self::pick_next(table) {
                    self.dispatch(table, id, now);
                }
            }

            let id = self.current?;
            let best_effort = table
                .process(id)
                .is_some_and(|p| !p.class().is_realtime());
            if best_effort && table.ready().any(|p| p.class().is_realtime()) {
                self.preempt(table, id, PreemptionReason::RealtimeArrival, now);
                continue;
            }

            return self.current;
        }
    }

    /// Executes one instruction of the selected process
    ///
    /// Returns true if an instruction ran. An instruction fault terminates
    /// the offending process and returns false; other processes are not
    /// affected. Syscall effects are applied before returning.
    pub fn execute_current_process(&mut self, table: &mut ProcessTable) -> bool {
        let Some(id) = self.current else {
            return false;
        };
        let now = table.current_time();
        let Some(process) = table.process_mut(id) else {
            self.current = None;
            return false;
        };
        if process.state() != ProcessState::Running {
            return false;
        }

        let pc = process.cpu().program_counter();
        let instruction = process
            .cpu()
            .current_instruction()
            .map(ToString::to_string)
            .unwrap_or_default();

        let result = process.cpu_mut().step();
        match result {
            Ok(executed) => {
                for text in table.apply_syscall_effects(id) {
                    self.audit_log.push(ScheduleEvent::ProcessOutput {
                        process_id: id,
                        text,
                        timestamp_ticks: now,
                    });
                }
                if table
                    .process(id)
                    .is_some_and(|p| p.state() == ProcessState::Exit)
                {
                    self.current = None;
                    self.record_exit(id, ExitReason::Normal, now);
                }
                executed
            }
            Err(err) => {
                self.logger.log(
                    LogEntry::new(LogLevel::Error, err.to_string())
                        .with_source(id)
                        .at_tick(now)
                        .with_field("pc", pc)
                        .with_field("instruction", instruction),
                );
                self.terminate_process(table, id, ExitReason::Failed);
                false
            }
        }
    }

    /// Returns the audit log
    pub fn audit_log(&self) -> &[ScheduleEvent] {
        &self.audit_log
    }

    /// Clears the audit log
    pub fn clear_audit_log(&mut self) {
        self.audit_log.clear();
    }

    /// Removes and returns the audit log
    pub fn drain_audit_log(&mut self) -> Vec<ScheduleEvent> {
        std::mem::take(&mut self.audit_log)
    }

    pub fn logger(&self) -> &Logger {
        &self.logger
    }

    pub fn logger_mut(&mut self) -> &mut Logger {
        &mut self.logger
    }

    /// Terminates process `id` and records its exit
    ///
    /// Returns false if `id` is unknown.
    pub fn terminate_process(
        &mut self,
        table: &mut ProcessTable,
        id: ProcessId,
        reason: ExitReason,
    ) -> bool {
        if !table.terminate_process(id) {
            return false;
        }
        if self.current == Some(id) {
            self.current = None;
        }
        self.record_exit(id, reason, table.current_time());
        true
    }

    fn record_exit(&mut self, id: ProcessId, reason: ExitReason, now: u64) {
        self.audit_log.push(ScheduleEvent::ProcessExited {
            process_id: id,
            reason,
            timestamp_ticks: now,
        });
    }

    fn pick_next(table: &ProcessTable) -> Option<ProcessId> {
        let realtime = table
            .ready()
            .filter(|p| p.class().is_realtime())
            .min_by_key(|p| (p.priority(), p.arrival_time(), p.id()));
        if let Some(process) = realtime {
            return Some(process.id());
        }

        table
            .ready()
            .filter(|p| !p.class().is_realtime())
            .min_by_key(|p| (p.arrival_time(), p.id()))
            .map(|p| p.id())
    }

    fn dispatch(&mut self, table: &mut ProcessTable, id: ProcessId, now: u64) {
        let quantum = i64::from(self.config.quantum);
        let Some(process) = table.process_mut(id) else {
            return;
        };

        process.set_state(ProcessState::Running);
        let granted = if process.class().is_realtime() {
            quantum
        } else {
            UNBOUNDED_QUANTUM
        };
        process.set_quantum_left(granted);

        self.current = Some(id);
        self.audit_log.push(ScheduleEvent::ProcessSelected {
            process_id: id,
            timestamp_ticks: now,
        });
        self.logger.log(
            LogEntry::new(LogLevel::Debug, "process dispatched")
                .with_source(id)
                .at_tick(now)
                .with_field("quantum", granted),
        );
    }

    fn preempt(
        &mut self,
        table: &mut ProcessTable,
        id: ProcessId,
        reason: PreemptionReason,
        now: u64,
    ) {
        if let Some(process) = table.process_mut(id) {
            process.set_state(ProcessState::Ready);
        }
        if self.current == Some(id) {
            self.current = None;
        }

        self.audit_log.push(ScheduleEvent::ProcessPreempted {
            process_id: id,
            reason,
            timestamp_ticks: now,
        });
        self.logger.log(
            LogEntry::new(LogLevel::Info, "process preempted")
                .with_source(id)
                .at_tick(now)
                .with_field("reason", format!("{:?}", reason)),
        );
    }
}
