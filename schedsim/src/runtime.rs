//! # Simulation Runtime
//!
//! The tick loop that ties the kernel pieces together.

use crate::config::SimulationConfig;
use crate::handler::DriverSyscalls;
use crate::rotation::BlockRotation;
use core_types::ProcessId;
use serde::{Deserialize, Serialize};
use services_logger::{LogEntry, LogLevel, Logger};
use sim_kernel::{
    ExitReason, ProcessError, ProcessSummary, ProcessTable, ScheduleEvent, Scheduler,
};
use std::collections::VecDeque;
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// Simulation error types
#[derive(Debug, Error)]
pub enum SimulationError {
    #[error("Failed to read {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid scenario: {0}")]
    Config(#[from] serde_json::Error),

    #[error("Process '{name}' has no program")]
    MissingProgram { name: String },

    #[error("Failed to create process '{name}': {source}")]
    Process {
        name: String,
        #[source]
        source: ProcessError,
    },
}

/// Why the simulation stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    /// Every process reached `Exit`
    AllExited,
    /// `max_ticks` was reached
    TickLimit,
    /// A process is waiting for input and no scripted input is left
    InputExhausted,
}

impl fmt::Display for StopReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            StopReason::AllExited => "all processes exited",
            StopReason::TickLimit => "tick limit reached",
            StopReason::InputExhausted => "waiting for input, none left",
        };
        f.write_str(text)
    }
}

/// A line of program output
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputLine {
    pub tick: u64,
    pub process_id: ProcessId,
    pub text: String,
}

impl fmt::Display for OutputLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{:>4}] {}: {}", self.tick, self.process_id, self.text)
    }
}

/// What happened during one tick
#[derive(Debug, Clone, Default)]
pub struct TickReport {
    pub tick: u64,
    pub selected: Option<ProcessId>,
    pub output: Vec<OutputLine>,
    pub events: Vec<ScheduleEvent>,
    pub logs: Vec<LogEntry>,
}

/// Final state of a finished run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SimulationReport {
    pub stop_reason: StopReason,
    pub ticks: u64,
    pub processes: Vec<ProcessSummary>,
    pub output: Vec<OutputLine>,
}

impl fmt::Display for SimulationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "Simulation stopped after {} ticks: {}",
            self.ticks, self.stop_reason
        )?;
        writeln!(
            f,
            "{:>4}  {:<12} {:<10} {:<8} {:<8} {:>7} {:>5} {:>5} {:>6}",
            "PID", "NAME", "CLASS", "PRIO", "STATE", "ARRIVAL", "EXEC", "WAIT", "ACC"
        )?;
        for p in &self.processes {
            writeln!(
                f,
                "{:>4}  {:<12} {:<10} {:<8} {:<8} {:>7} {:>5} {:>5} {:>6}",
                p.id.as_raw(),
                p.name,
                p.class.to_string(),
                p.priority.level(),
                p.state.to_string(),
                p.arrival_time,
                p.execution_time,
                p.waiting_time,
                p.accumulator
            )?;
        }
        Ok(())
    }
}

/// Simulation driver
pub struct Simulation {
    config: SimulationConfig,
    table: ProcessTable,
    scheduler: Scheduler,
    inputs: VecDeque<String>,
    input_rotation: BlockRotation,
    logger: Logger,
    output: Vec<OutputLine>,
}

impl Simulation {
    /// Creates every configured process and installs the driver's handler
    pub fn new(config: SimulationConfig) -> Result<Self, SimulationError> {
        let mut table = ProcessTable::new();
        table.logger_mut().set_min_level(config.log_level);

        let mut scheduler = Scheduler::new();
        scheduler.set_quantum(i64::from(config.quantum));
        scheduler.logger_mut().set_min_level(config.log_level);

        for (index, process) in config.processes.iter().enumerate() {
            let source = process.program_source()?;
            let id = table
                .create_process(
                    process.name.clone(),
                    source,
                    process.arrival_time,
                    process.class,
                    process.priority,
                )
                .map_err(|source| SimulationError::Process {
                    name: process.name.clone(),
                    source,
                })?;

            // Offset each process so they do not all block in lockstep
            let rotation = BlockRotation::with_offset(config.block_ticks, index as u64);
            table.set_syscall_handler(id, Box::new(DriverSyscalls::new(rotation)));
        }

        Ok(Self {
            inputs: config.inputs.iter().cloned().collect(),
            input_rotation: BlockRotation::new(config.block_ticks),
            logger: Logger::with_level(config.log_level),
            output: Vec::new(),
            config,
            table,
            scheduler,
        })
    }

    pub fn config(&self) -> &SimulationConfig {
        &self.config
    }

    pub fn table(&self) -> &ProcessTable {
        &self.table
    }

    pub fn scheduler(&self) -> &Scheduler {
        &self.scheduler
    }

    /// Overrides the realtime quantum for subsequent dispatches
    pub fn set_quantum(&mut self, quantum: i64) {
        self.scheduler.set_quantum(quantum);
    }

    /// Overrides the tick limit
    pub fn set_max_ticks(&mut self, max_ticks: u64) {
        self.config.max_ticks = max_ticks;
    }

    /// Returns the current tick
    pub fn current_tick(&self) -> u64 {
        self.table.current_time()
    }

    /// Returns the program output produced so far
    pub fn output(&self) -> &[OutputLine] {
        &self.output
    }

    /// Returns the input lines not yet delivered
    pub fn pending_inputs(&self) -> usize {
        self.inputs.len()
    }

    /// Returns why the run should stop, if it should
    pub fn stop_reason(&self) -> Option<StopReason> {
        if self.table.is_idle() {
            return Some(StopReason::AllExited);
        }
        if self.inputs.is_empty() && self.waiting_process().is_some() {
            return Some(StopReason::InputExhausted);
        }
        if self.table.current_time() >= self.config.max_ticks {
            return Some(StopReason::TickLimit);
        }
        None
    }

    /// Runs one tick
    pub fn step(&mut self) -> TickReport {
        let input_output = self.deliver_input();

        self.table.advance_time();
        let tick = self.table.current_time();
        let selected = self.scheduler.schedule(&mut self.table);
        self.scheduler.execute_current_process(&mut self.table);
        self.finalize_halted(tick);

        let mut report = TickReport {
            tick,
            selected,
            ..TickReport::default()
        };
        for event in self.scheduler.drain_audit_log() {
            if let ScheduleEvent::ProcessOutput {
                process_id, text, ..
            } = &event
            {
                report.output.push(OutputLine {
                    tick,
                    process_id: *process_id,
                    text: text.clone(),
                });
            }
            report.events.push(event);
        }
        let mut output: Vec<OutputLine> = input_output
            .into_iter()
            .map(|(process_id, text)| OutputLine {
                tick,
                process_id,
                text,
            })
            .collect();
        output.append(&mut report.output);
        report.output = output;
        report.logs.extend(self.logger.drain());
        report.logs.extend(self.table.logger_mut().drain());
        report.logs.extend(self.scheduler.logger_mut().drain());

        self.output.extend(report.output.iter().cloned());
        report
    }

    /// Runs until a stop condition holds, calling `on_tick` after each tick
    pub fn run_with(&mut self, mut on_tick: impl FnMut(&TickReport)) -> SimulationReport {
        let stop_reason = loop {
            if let Some(reason) = self.stop_reason() {
                break reason;
            }
            let report = self.step();
            on_tick(&report);
        };

        SimulationReport {
            stop_reason,
            ticks: self.table.current_time(),
            processes: self.table.summaries(),
            output: self.output.clone(),
        }
    }

    /// Runs until a stop condition holds
    pub fn run(&mut self) -> SimulationReport {
        self.run_with(|_| {})
    }

    fn waiting_process(&self) -> Option<ProcessId> {
        self.table
            .processes()
            .iter()
            .find(|p| !p.state().is_terminal() && p.cpu().is_waiting_for_input())
            .map(|p| p.id())
    }

    /// Hands the next scripted input to the waiting process, then blocks it
    ///
    /// Returns the output produced by the input sentinel, if any.
    fn deliver_input(&mut self) -> Vec<(ProcessId, String)> {
        let Some(id) = self.waiting_process() else {
            return Vec::new();
        };
        let Some(text) = self.inputs.pop_front() else {
            return Vec::new();
        };
        let now = self.table.current_time();

        match self.table.supply_input(id, &text) {
            Ok(true) => {
                let output = self.table.apply_syscall_effects(id);
                let ticks = self.input_rotation.next_duration();
                self.table.block_process(id, ticks);
                output.into_iter().map(|text| (id, text)).collect()
            }
            Ok(false) => Vec::new(),
            Err(err) => {
                self.logger.log(
                    LogEntry::new(LogLevel::Warn, "input rejected")
                        .with_source(id)
                        .at_tick(now)
                        .with_field("error", err),
                );
                Vec::new()
            }
        }
    }

    /// Terminates a running process whose program counter ran off the end
    ///
    /// A process waiting for input is left alone until the input arrives.
    fn finalize_halted(&mut self, tick: u64) {
        let Some(id) = self
            .table
            .running()
            .filter(|p| p.cpu().is_halted() && !p.cpu().is_waiting_for_input())
            .map(|p| p.id())
        else {
            return;
        };

        self.logger.log(
            LogEntry::new(LogLevel::Info, "program finished")
                .with_source(id)
                .at_tick(tick),
        );
        self.scheduler
            .terminate_process(&mut self.table, id, ExitReason::Normal);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{BlockTicks, ProcessConfig};
    use core_types::{Priority, ProcessClass, ProcessState};

    fn process(name: &str, class: ProcessClass, arrival: u64, program: &str) -> ProcessConfig {
        ProcessConfig {
            name: name.to_string(),
            arrival_time: arrival,
            class,
            priority: Priority::High,
            program: Some(program.to_string()),
            program_path: None,
        }
    }

    fn simulation(processes: Vec<ProcessConfig>, inputs: &[&str]) -> Simulation {
        Simulation::new(SimulationConfig {
            inputs: inputs.iter().map(|s| s.to_string()).collect(),
            processes,
            ..SimulationConfig::default()
        })
        .unwrap()
    }

    #[test]
    fn test_empty_scenario_stops_immediately() {
        let mut sim = simulation(Vec::new(), &[]);
        let report = sim.run();
        assert_eq!(report.stop_reason, StopReason::AllExited);
        assert_eq!(report.ticks, 0);
    }

    #[test]
    fn test_program_runs_to_exit() {
        let mut sim = simulation(
            vec![process(
                "sum",
                ProcessClass::BestEffort,
                0,
                ".data\nx 5\n.enddata\n.code\nLOAD x\nADD x\nSYSCALL 0\n.endcode",
            )],
            &[],
        );

        let report = sim.run();
        assert_eq!(report.stop_reason, StopReason::AllExited);
        assert_eq!(report.ticks, 3);
        assert_eq!(report.processes[0].accumulator, 10);
        assert_eq!(report.processes[0].state, ProcessState::Exit);
    }

    #[test]
    fn test_halted_program_is_finalized() {
        let mut sim = simulation(
            vec![process("short", ProcessClass::Realtime, 0, ".code\nLOAD #3\n.endcode")],
            &[],
        );

        let first = sim.step();
        assert_eq!(first.selected, Some(ProcessId::FIRST));
        assert!(sim.table().is_idle());
        assert!(first
            .logs
            .iter()
            .any(|entry| entry.message == "program finished"));
        assert!(first.events.contains(&ScheduleEvent::ProcessExited {
            process_id: ProcessId::FIRST,
            reason: ExitReason::Normal,
            timestamp_ticks: 1,
        }));
    }

    #[test]
    fn test_print_blocks_process() {
        let mut sim = simulation(
            vec![process(
                "printer",
                ProcessClass::BestEffort,
                0,
                ".code\nLOAD #8\nSYSCALL 1\nSYSCALL 0\n.endcode",
            )],
            &[],
        );

        sim.step();
        let second = sim.step();
        assert_eq!(second.output.len(), 1);
        assert_eq!(second.output[0].text, "8");
        assert_eq!(
            sim.table().process(ProcessId::FIRST).unwrap().state(),
            ProcessState::Blocked
        );
        assert_eq!(
            sim.table().process(ProcessId::FIRST).unwrap().block_end_time(),
            5
        );
    }

    #[test]
    fn test_input_delivered_then_blocked() {
        let mut sim = simulation(
            vec![process(
                "reader",
                ProcessClass::BestEffort,
                0,
                ".code\nSYSCALL 2\nADD #1\nSYSCALL 0\n.endcode",
            )],
            &["41"],
        );

        sim.step();
        assert!(sim
            .table()
            .process(ProcessId::FIRST)
            .unwrap()
            .cpu()
            .is_waiting_for_input());

        sim.step();
        let process = sim.table().process(ProcessId::FIRST).unwrap();
        assert_eq!(process.state(), ProcessState::Blocked);
        assert_eq!(process.cpu().accumulator(), 41);
        assert_eq!(sim.pending_inputs(), 0);

        let report = sim.run();
        assert_eq!(report.stop_reason, StopReason::AllExited);
        assert_eq!(report.processes[0].accumulator, 42);
    }

    #[test]
    fn test_sentinel_input_greets() {
        let mut sim = simulation(
            vec![process(
                "reader",
                ProcessClass::BestEffort,
                0,
                ".code\nSYSCALL 2\nSYSCALL 0\n.endcode",
            )],
            &["0101"],
        );

        sim.step();
        let second = sim.step();
        assert_eq!(second.output.len(), 1);
        assert_eq!(second.output[0].text, "Ola");
        assert_eq!(second.output[0].process_id, ProcessId::FIRST);
    }

    #[test]
    fn test_stops_when_input_runs_out() {
        let mut sim = simulation(
            vec![process("reader", ProcessClass::BestEffort, 0, ".code\nSYSCALL 2\n.endcode")],
            &[],
        );

        let report = sim.run();
        assert_eq!(report.stop_reason, StopReason::InputExhausted);
        assert_eq!(report.ticks, 1);
    }

    #[test]
    fn test_rejected_input_is_logged() {
        let mut sim = simulation(
            vec![process("reader", ProcessClass::BestEffort, 0, ".code\nSYSCALL 2\n.endcode")],
            &["seven"],
        );

        sim.step();
        let second = sim.step();
        assert!(second
            .logs
            .iter()
            .any(|entry| entry.level == LogLevel::Warn && entry.message == "input rejected"));
        assert_eq!(sim.stop_reason(), Some(StopReason::InputExhausted));
    }

    #[test]
    fn test_tick_limit() {
        let mut sim = simulation(
            vec![process("spin", ProcessClass::BestEffort, 0, ".code\nl: BRANY l\n.endcode")],
            &[],
        );
        sim.set_max_ticks(25);

        let report = sim.run();
        assert_eq!(report.stop_reason, StopReason::TickLimit);
        assert_eq!(report.ticks, 25);
        assert_eq!(report.processes[0].execution_time, 24);
    }

    #[test]
    fn test_fault_does_not_stop_others() {
        let mut sim = simulation(
            vec![
                process("bad", ProcessClass::Realtime, 0, ".code\nDIV #0\n.endcode"),
                process("good", ProcessClass::BestEffort, 0, ".code\nLOAD #2\nSYSCALL 0\n.endcode"),
            ],
            &[],
        );

        let report = sim.run();
        assert_eq!(report.stop_reason, StopReason::AllExited);
        assert_eq!(report.processes[0].state, ProcessState::Exit);
        assert_eq!(report.processes[1].accumulator, 2);
    }

    #[test]
    fn test_process_creation_error_names_process() {
        let result = Simulation::new(SimulationConfig {
            processes: vec![process("broken", ProcessClass::Realtime, 0, ".data\nx y\n.enddata")],
            ..SimulationConfig::default()
        });
        assert!(matches!(
            result,
            Err(SimulationError::Process { name, .. }) if name == "broken"
        ));
    }

    #[test]
    fn test_block_rotation_comes_from_config() {
        let mut sim = Simulation::new(SimulationConfig {
            block_ticks: BlockTicks { min: 1, max: 1 },
            processes: vec![process(
                "printer",
                ProcessClass::BestEffort,
                0,
                ".code\nSYSCALL 1\nSYSCALL 0\n.endcode",
            )],
            ..SimulationConfig::default()
        })
        .unwrap();

        sim.step();
        assert_eq!(
            sim.table().process(ProcessId::FIRST).unwrap().block_end_time(),
            2
        );
    }

    #[test]
    fn test_report_display() {
        let mut sim = simulation(
            vec![process("done", ProcessClass::Realtime, 0, ".code\nSYSCALL 0\n.endcode")],
            &[],
        );
        let text = sim.run().to_string();
        assert!(text.starts_with("Simulation stopped after 1 ticks: all processes exited"));
        assert!(text.contains("done"));
        assert!(text.contains("realtime"));
    }
}
