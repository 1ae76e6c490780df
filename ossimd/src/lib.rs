//! # OS Simulator Host Runtime
//!
//! This crate provides the host runtime for the simulated kernel.
//!
//! ## Philosophy
//!
//! - **The kernel owns the simulation**: the host only feeds it and watches
//! - **Two loops, one monitor**: scheduling and monitoring run on separate
//!   threads against the same `Arc<Kernel>`
//! - **Configuration is data**: kernel settings and workloads load from JSON
//! - **Deterministic by default**: no pacing delay unless asked for
//!
//! ## Responsibilities
//!
//! The host runtime:
//! - Builds the kernel from a configuration and a scenario
//! - Runs the scheduling loop until every process has finished
//! - Prints periodic statistics while the loop runs
//! - Writes the history log and prints the final report
//!
//! ## Non-Responsibilities
//!
//! The host does NOT:
//! - Make scheduling or memory decisions
//! - Inject interrupts or system calls into running processes

pub mod report;
pub mod runtime;
pub mod scenario;

pub use report::{render_monitor_line, render_report};
pub use runtime::{HostError, HostRuntime, HostRuntimeConfig, RunSummary};
pub use scenario::{Scenario, ScenarioError};
