//! # Core Types
//!
//! This crate defines the fundamental types shared by the simulated kernel,
//! its logging service and the host runtime.
//!
//! ## Philosophy
//!
//! - **Explicit over implicit**: a pid is never a bare integer, a priority is
//!   never out of range.
//! - **One lifecycle**: the nine-state process model is the only state model.
//! - **Transitions are data**: legality lives in a single table, not in
//!   scattered `if` chains.
//!
//! ## Key Types
//!
//! - [`Pid`]: Process identifier, assigned once and never reused
//! - [`CoreId`]: Execution unit identifier
//! - [`RunId`]: Identifier of one simulation run
//! - [`Priority`]: Clamped scheduling priority (higher runs first)
//! - [`ProcessState`] / [`ProcessEvent`]: The lifecycle and its transition table

pub mod ids;
pub mod priority;
pub mod process_state;

pub use ids::{CoreId, Pid, RunId};
pub use priority::Priority;
pub use process_state::{ProcessEvent, ProcessState};
