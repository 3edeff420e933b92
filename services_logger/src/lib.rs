//! # Logger Service
//!
//! This crate implements structured logging for the simulator.
//!
//! ## Philosophy
//!
//! Logging is explicit and structured, not text-based or printf-style.
//! Components never write to the console themselves: they append
//! [`LogEntry`] values to an owned [`Logger`], and whoever drives the
//! simulation drains the buffer and decides how to present it.

use core_types::ProcessId;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Log level
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    /// Debug information
    Debug,
    /// Informational messages
    #[default]
    Info,
    /// Warnings
    Warn,
    /// Errors
    Error,
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            LogLevel::Debug => "DEBUG",
            LogLevel::Info => "INFO",
            LogLevel::Warn => "WARN",
            LogLevel::Error => "ERROR",
        };
        f.pad(name)
    }
}

/// A structured log entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogEntry {
    /// Log level
    pub level: LogLevel,
    /// Source process (if known)
    pub source: Option<ProcessId>,
    /// Simulation tick at which the entry was recorded
    pub tick: u64,
    /// Log message
    pub message: String,
    /// Structured fields
    pub fields: Vec<(String, String)>,
}

impl LogEntry {
    /// Creates a new log entry
    pub fn new(level: LogLevel, message: impl Into<String>) -> Self {
        Self {
            level,
            source: None,
            tick: 0,
            message: message.into(),
            fields: Vec::new(),
        }
    }

    /// Sets the source process
    pub fn with_source(mut self, source: ProcessId) -> Self {
        self.source = Some(source);
        self
    }

    /// Sets the tick
    pub fn at_tick(mut self, tick: u64) -> Self {
        self.tick = tick;
        self
    }

    /// Adds a field to the log entry
    pub fn with_field(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        self.fields.push((key.into(), value.to_string()));
        self
    }
}

impl fmt::Display for LogEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{:>4}] {:<5}", self.tick, self.level)?;
        if let Some(source) = self.source {
            write!(f, " {}", source)?;
        }
        write!(f, " {}", self.message)?;
        for (key, value) in &self.fields {
            write!(f, " {}={}", key, value)?;
        }
        Ok(())
    }
}

/// Buffering logger
///
/// Entries below `min_level` are discarded on arrival.
#[derive(Debug, Clone, Default)]
pub struct Logger {
    min_level: LogLevel,
    entries: Vec<LogEntry>,
}

impl Logger {
    /// Creates a logger that keeps `Info` and above
    pub fn new() -> Self {
        Self::with_level(LogLevel::Info)
    }

    /// Creates a logger with a custom minimum level
    pub fn with_level(min_level: LogLevel) -> Self {
        Self {
            min_level,
            entries: Vec::new(),
        }
    }

    /// Returns the minimum level kept by this logger
    pub fn min_level(&self) -> LogLevel {
        self.min_level
    }

    /// Changes the minimum level for subsequent entries
    pub fn set_min_level(&mut self, level: LogLevel) {
        self.min_level = level;
    }

    /// Records an entry if its level passes the filter
    pub fn log(&mut self, entry: LogEntry) {
        if entry.level >= self.min_level {
            self.entries.push(entry);
        }
    }

    /// Returns buffered entries
    pub fn entries(&self) -> &[LogEntry] {
        &self.entries
    }

    /// Removes and returns all buffered entries
    pub fn drain(&mut self) -> Vec<LogEntry> {
        std::mem::take(&mut self.entries)
    }

    /// Discards all buffered entries
    pub fn clear(&mut self) {
        self.entries.clear();
    }
}
