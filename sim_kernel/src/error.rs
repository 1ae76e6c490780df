//! Kernel error types

use core_types::{CoreId, Pid};
use thiserror::Error;

/// Errors surfaced by the simulated kernel
///
/// Illegal state transitions and memory exhaustion are not errors; they are
/// reported through `Option`/outcome values at the call site.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum KernelError {
    /// Core identifier outside the configured range
    #[error("Invalid core: {core} (kernel has {core_count} core(s))")]
    InvalidCore { core: CoreId, core_count: usize },

    /// Configuration values that cannot drive a simulation
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Configuration document could not be parsed
    #[error("Failed to parse configuration: {0}")]
    ConfigParse(String),

    /// No process with this pid exists
    #[error("Unknown process: {0}")]
    UnknownProcess(Pid),

    /// History log could not be opened or written
    #[error("History log error: {0}")]
    HistoryLog(String),
}
