//! Scenario configuration.
//!
//! A scenario is a JSON document:
//!
//! ```json
//! {
//!   "quantum": 2,
//!   "max_ticks": 200,
//!   "log_level": "info",
//!   "block_ticks": { "min": 3, "max": 5 },
//!   "inputs": ["7", "0101"],
//!   "processes": [
//!     { "name": "rt", "arrival_time": 1, "class": "realtime", "priority": "high",
//!       "program": ".code\nLOAD #1\nSYSCALL 0\n.endcode" },
//!     { "name": "be", "class": "besteffort", "program_path": "programs/be.asm" }
//!   ]
//! }
//! ```
//!
//! Only `processes` is required. `program_path` is resolved against the
//! directory holding the scenario file.

use crate::runtime::SimulationError;
use core_types::{Priority, ProcessClass};
use serde::{Deserialize, Serialize};
use services_logger::LogLevel;
use sim_kernel::DEFAULT_QUANTUM;
use std::fs;
use std::path::{Path, PathBuf};

/// Default tick limit
pub const DEFAULT_MAX_TICKS: u64 = 1000;

/// Inclusive range of block durations used by the driver
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockTicks {
    pub min: u64,
    pub max: u64,
}

impl Default for BlockTicks {
    fn default() -> Self {
        Self { min: 3, max: 5 }
    }
}

/// One process entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessConfig {
    pub name: String,
    #[serde(default)]
    pub arrival_time: u64,
    pub class: ProcessClass,
    #[serde(default)]
    pub priority: Priority,
    /// Inline program text
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub program: Option<String>,
    /// Program file, relative to the scenario file
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub program_path: Option<PathBuf>,
}

impl ProcessConfig {
    /// Returns the program text
    ///
    /// Fails if neither `program` nor `program_path` has been resolved.
    pub fn program_source(&self) -> Result<&str, SimulationError> {
        self.program
            .as_deref()
            .ok_or_else(|| SimulationError::MissingProgram {
                name: self.name.clone(),
            })
    }
}

/// Simulation scenario
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SimulationConfig {
    #[serde(default = "default_quantum")]
    pub quantum: u32,
    #[serde(default = "default_max_ticks")]
    pub max_ticks: u64,
    #[serde(default)]
    pub log_level: LogLevel,
    #[serde(default)]
    pub block_ticks: BlockTicks,
    /// Input lines handed out, in order, to processes waiting for input
    #[serde(default)]
    pub inputs: Vec<String>,
    pub processes: Vec<ProcessConfig>,
}

fn default_quantum() -> u32 {
    DEFAULT_QUANTUM
}

fn default_max_ticks() -> u64 {
    DEFAULT_MAX_TICKS
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            quantum: DEFAULT_QUANTUM,
            max_ticks: DEFAULT_MAX_TICKS,
            log_level: LogLevel::default(),
            block_ticks: BlockTicks::default(),
            inputs: Vec::new(),
            processes: Vec::new(),
        }
    }
}

impl SimulationConfig {
    /// Parses a scenario from JSON text
    ///
    /// `program_path` entries are left unresolved; see [`load`].
    ///
    /// [`load`]: SimulationConfig::load
    pub fn from_json(text: &str) -> Result<Self, SimulationError> {
        Ok(serde_json::from_str(text)?)
    }

    /// Loads a scenario file and reads every referenced program file
    pub fn load(path: impl AsRef<Path>) -> Result<Self, SimulationError> {
        let path = path.as_ref();
        let text = read_file(path)?;
        let mut config = Self::from_json(&text)?;
        let base = path.parent().unwrap_or_else(|| Path::new(""));
        config.resolve_programs(base)?;
        Ok(config)
    }

    /// Reads `program_path` files for entries with no inline program
    pub fn resolve_programs(&mut self, base: &Path) -> Result<(), SimulationError> {
        for process in &mut self.processes {
            if process.program.is_some() {
                continue;
            }
            if let Some(relative) = &process.program_path {
                process.program = Some(read_file(&base.join(relative))?);
            }
        }
        Ok(())
    }
}

fn read_file(path: &Path) -> Result<String, SimulationError> {
    fs::read_to_string(path).map_err(|source| SimulationError::Io {
        path: path.to_path_buf(),
        source,
    })
}
