//! # Process Table
//!
//! Registry of every process plus the global clock.
//!
//! Processes are never removed: an exited process stays in the table in
//! `Exit` so reports can still read its counters. Identifiers are handed
//! out sequentially starting at 1 and are never reused.

use crate::clock::SimClock;
use crate::process::{Process, ProcessError, ProcessSummary};
use core_types::{Priority, ProcessClass, ProcessId, ProcessState};
use services_logger::{LogEntry, LogLevel, Logger};
use vcpu::{CpuError, SyscallEffect, SyscallHandler};

/// Process registry and global clock
#[derive(Debug, Default)]
pub struct ProcessTable {
    processes: Vec<Process>,
    next_id: ProcessId,
    clock: SimClock,
    logger: Logger,
}

impl ProcessTable {
    /// Creates an empty table at tick 0
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a process from program text
    ///
    /// The process starts in `New` and is admitted by [`advance_time`]
    /// once the clock reaches `arrival_time`. Only data literals are
    /// validated here; code errors surface when the instruction executes.
    ///
    /// [`advance_time`]: ProcessTable::advance_time
    pub fn create_process(
        &mut self,
        name: impl Into<String>,
        source: impl Into<String>,
        arrival_time: u64,
        class: ProcessClass,
        priority: Priority,
    ) -> Result<ProcessId, ProcessError> {
        let id = self.next_id;
        let process = Process::new(id, name, source, arrival_time, class, priority)?;
        self.next_id = id.next();

        self.logger.log(
            LogEntry::new(LogLevel::Info, "process created")
                .with_source(id)
                .at_tick(self.current_time())
                .with_field("name", process.name())
                .with_field("class", process.class())
                .with_field("priority", process.priority().level())
                .with_field("arrival", arrival_time),
        );
        self.processes.push(process);
        Ok(id)
    }

    /// Advances the clock by one tick and updates every process
    ///
    /// In order: admit `New` processes whose arrival time has come, wake
    /// `Blocked` processes whose block has ended, charge a waiting tick to
    /// every `Ready` process, then charge an execution tick to the running
    /// process.
    pub fn advance_time(&mut self) {
        let now = self.clock.tick();

        for process in self.processes.iter_mut() {
            if process.state() == ProcessState::New && process.arrival_time() <= now {
                process.set_state(ProcessState::Ready);
                self.logger.log(
                    LogEntry::new(LogLevel::Info, "process admitted")
                        .with_source(process.id())
                        .at_tick(now),
                );
            }
        }

        for process in self.processes.iter_mut() {
            if process.state() == ProcessState::Blocked && process.block_end_time() <= now {
                process.set_state(ProcessState::Ready);
                process.cpu_mut().set_blocked(false);
                self.logger.log(
                    LogEntry::new(LogLevel::Info, "process woke up")
                        .with_source(process.id())
                        .at_tick(now),
                );
            }
        }

        for process in self.processes.iter_mut() {
            if process.state() == ProcessState::Ready {
                process.charge_waiting_tick();
            }
        }

        if let Some(process) = self.running_mut() {
            process.charge_running_tick();
        }
    }

    /// Blocks the running process `id` for `duration` ticks
    ///
    /// Returns false, changing nothing, if `id` is unknown or not running.
    pub fn block_process(&mut self, id: ProcessId, duration: u64) -> bool {
        let now = self.current_time();
        let Some(process) = self.process_mut(id) else {
            return false;
        };
        if process.state() != ProcessState::Running {
            return false;
        }

        process.set_state(ProcessState::Blocked);
        process.set_block_end_time(now.saturating_add(duration));
        process.cpu_mut().set_blocked(true);
        process.cpu_mut().set_block_time(duration);

        self.logger.log(
            LogEntry::new(LogLevel::Info, "process blocked")
                .with_source(id)
                .at_tick(now)
                .with_field("ticks", duration),
        );
        true
    }

    /// Moves process `id` to `Exit` from any state and stops its CPU
    ///
    /// Returns false if `id` is unknown.
    pub fn terminate_process(&mut self, id: ProcessId) -> bool {
        let now = self.current_time();
        let Some(process) = self.process_mut(id) else {
            return false;
        };

        process.set_state(ProcessState::Exit);
        process.cpu_mut().set_running(false);

        self.logger.log(
            LogEntry::new(LogLevel::Info, "process terminated")
                .with_source(id)
                .at_tick(now),
        );
        true
    }

    /// Applies the effects queued by process `id`'s syscalls
    ///
    /// `Exit` terminates the process and `Block` blocks it. Output lines
    /// are returned in emission order.
    pub fn apply_syscall_effects(&mut self, id: ProcessId) -> Vec<String> {
        let effects = match self.process_mut(id) {
            Some(process) => process.cpu_mut().take_effects(),
            None => return Vec::new(),
        };

        let mut output = Vec::new();
        for effect in effects {
            match effect {
                SyscallEffect::Exit => {
                    self.terminate_process(id);
                }
                SyscallEffect::Block { ticks } => {
                    self.block_process(id, ticks);
                }
                SyscallEffect::Output(text) => output.push(text),
            }
        }
        output
    }

    /// Registers the syscall handler for process `id`
    pub fn set_syscall_handler(&mut self, id: ProcessId, handler: Box<dyn SyscallHandler>) -> bool {
        match self.process_mut(id) {
            Some(process) => {
                process.cpu_mut().set_syscall_handler(handler);
                true
            }
            None => false,
        }
    }

    /// Delivers input to process `id`
    ///
    /// Returns `Ok(false)` if the process is unknown or not waiting. Effects
    /// raised by the input sentinel stay queued for
    /// [`apply_syscall_effects`](ProcessTable::apply_syscall_effects).
    pub fn supply_input(&mut self, id: ProcessId, text: &str) -> Result<bool, CpuError> {
        let now = self.current_time();
        let Some(process) = self.process_mut(id) else {
            return Ok(false);
        };

        let accepted = process.cpu_mut().supply_input(text)?;
        if accepted {
            self.logger.log(
                LogEntry::new(LogLevel::Debug, "input delivered")
                    .with_source(id)
                    .at_tick(now)
                    .with_field("value", text.trim()),
            );
        }
        Ok(accepted)
    }

    pub fn process(&self, id: ProcessId) -> Option<&Process> {
        self.processes.iter().find(|p| p.id() == id)
    }

    pub fn process_mut(&mut self, id: ProcessId) -> Option<&mut Process> {
        self.processes.iter_mut().find(|p| p.id() == id)
    }

    /// Returns every process in creation order
    pub fn processes(&self) -> &[Process] {
        &self.processes
    }

    /// Returns the processes currently in `state`, in creation order
    pub fn processes_in(&self, state: ProcessState) -> impl Iterator<Item = &Process> {
        self.processes.iter().filter(move |p| p.state() == state)
    }

    pub fn ready(&self) -> impl Iterator<Item = &Process> {
        self.processes_in(ProcessState::Ready)
    }

    pub fn blocked(&self) -> impl Iterator<Item = &Process> {
        self.processes_in(ProcessState::Blocked)
    }

    pub fn finished(&self) -> impl Iterator<Item = &Process> {
        self.processes_in(ProcessState::Exit)
    }

    /// Returns the first process in `Running`
    pub fn running(&self) -> Option<&Process> {
        self.processes_in(ProcessState::Running).next()
    }

    pub fn running_mut(&mut self) -> Option<&mut Process> {
        self.processes
            .iter_mut()
            .find(|p| p.state() == ProcessState::Running)
    }

    /// Returns the id the next created process will get
    pub fn next_process_id(&self) -> ProcessId {
        self.next_id
    }

    /// Returns the global clock
    pub fn current_time(&self) -> u64 {
        self.clock.current_ticks()
    }

    pub fn len(&self) -> usize {
        self.processes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.processes.is_empty()
    }

    /// Returns true once every process has exited
    pub fn is_idle(&self) -> bool {
        self.processes.iter().all(|p| p.state().is_terminal())
    }

    pub fn summaries(&self) -> Vec<ProcessSummary> {
        self.processes.iter().map(Process::summary).collect()
    }

    pub fn logger(&self) -> &Logger {
        &self.logger
    }

    pub fn logger_mut(&mut self) -> &mut Logger {
        &mut self.logger
    }

    /// Removes every process and rewinds the clock and id counter
    pub fn reset(&mut self) {
        self.processes.clear();
        self.next_id = ProcessId::FIRST;
        self.clock.reset();
        self.logger.clear();
    }
}
