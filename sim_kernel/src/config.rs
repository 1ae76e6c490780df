//! # Kernel Configuration
//!
//! Every tunable of the simulation in one serde-loadable struct.
//!
//! Missing JSON fields fall back to their defaults, so `{}` is a valid
//! configuration document.

use crate::error::KernelError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

/// Scheduling policy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SchedulerKind {
    /// Ten fixed priority buckets, higher value first
    Priority,
    /// Single FIFO queue
    #[serde(alias = "round-robin")]
    RoundRobin,
}

impl fmt::Display for SchedulerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SchedulerKind::Priority => f.write_str("priority"),
            SchedulerKind::RoundRobin => f.write_str("round-robin"),
        }
    }
}

impl FromStr for SchedulerKind {
    type Err = KernelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "priority" => Ok(SchedulerKind::Priority),
            "round-robin" | "round_robin" | "rr" => Ok(SchedulerKind::RoundRobin),
            other => Err(KernelError::InvalidConfig(format!(
                "unknown scheduler '{}'",
                other
            ))),
        }
    }
}

/// What admission does when every memory slot is taken
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SwapPolicy {
    /// The newcomer goes straight to swap
    SwapNewcomer,
    /// The least-recently-used resident process is evicted for the newcomer
    EvictLru,
}

/// Kernel configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct KernelConfig {
    /// Units of execution granted per dispatch
    pub time_quantum: u64,
    /// Resident-set size in slots
    pub memory_slots: usize,
    /// Swap capacity in slots (`None` = unbounded)
    pub swap_slots: Option<usize>,
    /// Execution units available to the stepping mode
    pub core_count: usize,
    /// Active scheduling policy
    pub scheduler: SchedulerKind,
    /// Admission behavior on full memory
    pub swap_policy: SwapPolicy,
    /// Simulated hardware cost of one context switch
    pub context_switch_cost_micros: u64,
    /// Kernel reaps its own zombie children immediately
    pub auto_reap: bool,
    /// Cycles between history snapshots (0 disables them)
    pub snapshot_every: u64,
}

impl Default for KernelConfig {
    fn default() -> Self {
        Self {
            time_quantum: 2,
            memory_slots: 3,
            swap_slots: None,
            core_count: 1,
            scheduler: SchedulerKind::RoundRobin,
            swap_policy: SwapPolicy::SwapNewcomer,
            context_switch_cost_micros: 1000,
            auto_reap: true,
            snapshot_every: 1,
        }
    }
}

impl KernelConfig {
    /// Creates the default configuration
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses and validates a JSON configuration document
    pub fn from_json(json: &str) -> Result<Self, KernelError> {
        let config: KernelConfig =
            serde_json::from_str(json).map_err(|e| KernelError::ConfigParse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Rejects values the kernel cannot run with
    pub fn validate(&self) -> Result<(), KernelError> {
        if self.time_quantum == 0 {
            return Err(KernelError::InvalidConfig(
                "time_quantum must be at least 1".to_string(),
            ));
        }
        if self.memory_slots == 0 {
            return Err(KernelError::InvalidConfig(
                "memory_slots must be at least 1".to_string(),
            ));
        }
        if self.core_count == 0 {
            return Err(KernelError::InvalidConfig(
                "core_count must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    pub fn with_scheduler(mut self, scheduler: SchedulerKind) -> Self {
        self.scheduler = scheduler;
        self
    }

    pub fn with_time_quantum(mut self, quantum: u64) -> Self {
        self.time_quantum = quantum;
        self
    }

    pub fn with_memory_slots(mut self, slots: usize) -> Self {
        self.memory_slots = slots;
        self
    }

    pub fn with_swap_slots(mut self, slots: Option<usize>) -> Self {
        self.swap_slots = slots;
        self
    }

    pub fn with_core_count(mut self, cores: usize) -> Self {
        self.core_count = cores;
        self
    }

    pub fn with_swap_policy(mut self, policy: SwapPolicy) -> Self {
        self.swap_policy = policy;
        self
    }

    /// Sets the simulated context-switch cost
    pub fn with_context_switch_cost(mut self, cost: Duration) -> Self {
        self.context_switch_cost_micros = cost.as_micros() as u64;
        self
    }

    pub fn with_auto_reap(mut self, auto_reap: bool) -> Self {
        self.auto_reap = auto_reap;
        self
    }

    pub fn with_snapshot_every(mut self, cycles: u64) -> Self {
        self.snapshot_every = cycles;
        self
    }

    /// Context-switch cost as a duration
    pub fn context_switch_cost(&self) -> Duration {
        Duration::from_micros(self.context_switch_cost_micros)
    }
}
