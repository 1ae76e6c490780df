//! # Scenario Loader
//!
//! A scenario is the workload the host creates before the first cycle.
//!
//! ## Format
//!
//! ```json
//! {
//!   "processes": [
//!     { "name": "VSCode", "burst_time": 8, "priority": 7 },
//!     { "name": "Chrome", "burst_time": 10, "priority": 5 }
//!   ]
//! }
//! ```
//!
//! Priorities outside 1..=10 are clamped by the kernel.

use serde::{Deserialize, Serialize};
use sim_kernel::ProcessDescriptor;
use std::fs;
use std::path::Path;
use thiserror::Error;

/// Scenario error types
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ScenarioError {
    #[error("Failed to read scenario {path}: {message}")]
    Read { path: String, message: String },

    #[error("Invalid scenario: {0}")]
    Parse(String),

    #[error("Empty scenario")]
    EmptyScenario,

    #[error("Process {0} has no work (burst_time is 0)")]
    ZeroBurst(String),
}

/// Processes to create, in creation order
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Scenario {
    pub processes: Vec<ProcessDescriptor>,
}

impl Scenario {
    /// Parses and checks a JSON scenario
    pub fn from_json(json: &str) -> Result<Self, ScenarioError> {
        let scenario: Scenario =
            serde_json::from_str(json).map_err(|e| ScenarioError::Parse(e.to_string()))?;
        scenario.validate()?;
        Ok(scenario)
    }

    /// Reads a JSON scenario file
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ScenarioError> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|e| ScenarioError::Read {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        Self::from_json(&text)
    }

    /// The five-process demo workload
    pub fn standard() -> Self {
        Self {
            processes: vec![
                ProcessDescriptor::new("VSCode", 8, 7),
                ProcessDescriptor::new("Chrome", 10, 5),
                ProcessDescriptor::new("Terminal", 4, 4),
                ProcessDescriptor::new("Spotify", 6, 2),
                ProcessDescriptor::new("Calculator", 2, 1),
            ],
        }
    }

    pub fn validate(&self) -> Result<(), ScenarioError> {
        if self.processes.is_empty() {
            return Err(ScenarioError::EmptyScenario);
        }
        if let Some(process) = self.processes.iter().find(|p| p.burst_time == 0) {
            return Err(ScenarioError::ZeroBurst(process.name.clone()));
        }
        Ok(())
    }

    /// Total units of work
    pub fn total_burst(&self) -> u64 {
        self.processes.iter().map(|p| p.burst_time).sum()
    }

    pub fn len(&self) -> usize {
        self.processes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.processes.is_empty()
    }
}

impl Default for Scenario {
    fn default() -> Self {
        Self::standard()
    }
}
