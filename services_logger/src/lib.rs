//! # Logger Service
//!
//! This crate implements structured logging for the simulated kernel.
//!
//! ## Philosophy
//!
//! - Logging is explicit and structured, not text-based or printf-style.
//! - There is no global logger: a [`LogSink`] handle is passed to whoever
//!   needs one.
//! - Sinks decide presentation; entries only carry data.

use core_types::Pid;
use serde::Serialize;
use std::fmt;
use std::io::Write;
use std::sync::{Arc, Mutex, PoisonError};

/// Log level
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub enum LogLevel {
    /// Debug information
    Debug,
    /// Informational messages
    Info,
    /// Warnings
    Warn,
    /// Errors
    Error,
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            LogLevel::Debug => "DEBUG",
            LogLevel::Info => "INFO",
            LogLevel::Warn => "WARN",
            LogLevel::Error => "ERROR",
        };
        f.write_str(label)
    }
}

/// Kernel subsystem that produced an entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum LogComponent {
    Kernel,
    Scheduler,
    Dispatcher,
    Memory,
    Process,
    Io,
}

impl fmt::Display for LogComponent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            LogComponent::Kernel => "kernel",
            LogComponent::Scheduler => "scheduler",
            LogComponent::Dispatcher => "dispatcher",
            LogComponent::Memory => "memory",
            LogComponent::Process => "process",
            LogComponent::Io => "io",
        };
        f.write_str(label)
    }
}

/// A structured log entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LogEntry {
    /// Log level
    pub level: LogLevel,
    /// Subsystem that emitted the entry
    pub component: LogComponent,
    /// Process the entry is about (if any)
    pub source: Option<Pid>,
    /// Log message
    pub message: String,
    /// Structured fields
    pub fields: Vec<(String, String)>,
}

impl LogEntry {
    /// Creates a new log entry
    pub fn new(level: LogLevel, component: LogComponent, message: impl Into<String>) -> Self {
        Self {
            level,
            component,
            source: None,
            message: message.into(),
            fields: Vec::new(),
        }
    }

    /// Sets the source process
    pub fn with_source(mut self, source: Pid) -> Self {
        self.source = Some(source);
        self
    }

    /// Adds a field to the log entry
    pub fn with_field(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        self.fields.push((key.into(), value.to_string()));
        self
    }

    /// Looks up a field by key
    pub fn field(&self, key: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }
}

impl fmt::Display for LogEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{:<5}] {}: ", self.level, self.component)?;
        if let Some(pid) = self.source {
            write!(f, "{} ", pid)?;
        }
        f.write_str(&self.message)?;
        for (key, value) in &self.fields {
            write!(f, " {}={}", key, value)?;
        }
        Ok(())
    }
}

/// Destination for log entries
pub trait LogSink {
    /// Records one entry
    fn log(&mut self, entry: LogEntry);
}

/// Discards everything
#[derive(Debug, Default, Clone, Copy)]
pub struct NullLog;

impl LogSink for NullLog {
    fn log(&mut self, _entry: LogEntry) {}
}

/// In-memory sink
///
/// Clones share the same buffer, so a test can keep one handle while the
/// kernel owns another.
#[derive(Debug, Default, Clone)]
pub struct MemoryLog {
    entries: Arc<Mutex<Vec<LogEntry>>>,
}

impl MemoryLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a copy of every entry recorded so far
    pub fn entries(&self) -> Vec<LogEntry> {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Whether an entry with this exact message was recorded
    pub fn contains(&self, message: &str) -> bool {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .any(|entry| entry.message == message)
    }

    /// Number of entries at or above `level`
    pub fn count_at_least(&self, level: LogLevel) -> usize {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|entry| entry.level >= level)
            .count()
    }
}

impl LogSink for MemoryLog {
    fn log(&mut self, entry: LogEntry) {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(entry);
    }
}

/// Human-readable lines on stderr
#[derive(Debug, Clone, Copy)]
pub struct ConsoleLog {
    min_level: LogLevel,
}

impl ConsoleLog {
    /// Creates a console sink that drops entries below `min_level`
    pub fn new(min_level: LogLevel) -> Self {
        Self { min_level }
    }
}

impl Default for ConsoleLog {
    fn default() -> Self {
        Self::new(LogLevel::Info)
    }
}

impl LogSink for ConsoleLog {
    fn log(&mut self, entry: LogEntry) {
        if entry.level >= self.min_level {
            eprintln!("{}", entry);
        }
    }
}

/// One JSON object per line
pub struct JsonLinesLog<W: Write> {
    writer: W,
}

impl<W: Write> JsonLinesLog<W> {
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    /// Returns the underlying writer
    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl<W: Write> LogSink for JsonLinesLog<W> {
    fn log(&mut self, entry: LogEntry) {
        // A sink has nowhere to report its own failures.
        if serde_json::to_writer(&mut self.writer, &entry).is_ok() {
            let _ = self.writer.write_all(b"\n");
        }
    }
}
