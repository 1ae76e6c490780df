//! Scenario Test Utilities
//!
//! This crate provides shared utilities for cross-crate scenario tests.
//!
//! ## Test Philosophy
//!
//! - **Observable behavior only**: assertions go through the public kernel API
//! - **Deterministic time**: no pacing delay, zero context-switch cost
//! - **Every transition is legal**: recorded event streams are replayed against
//!   the transition table

use core_types::{Pid, ProcessEvent, ProcessState};
use sim_kernel::test_utils::{collect_transitions, test_config, test_kernel};
use sim_kernel::{CycleOutcome, Kernel, KernelConfig, TransitionEvent};
use std::sync::{Arc, Mutex};

pub use sim_kernel::test_utils::run_to_completion;

/// A kernel plus every transition it emits
pub struct Recorded {
    pub kernel: Kernel,
    pub events: Arc<Mutex<Vec<TransitionEvent>>>,
}

impl Recorded {
    /// Copy of the events so far
    pub fn events(&self) -> Vec<TransitionEvent> {
        self.events.lock().map(|e| e.clone()).unwrap_or_default()
    }

    /// Events of one process
    pub fn events_of(&self, pid: Pid) -> Vec<TransitionEvent> {
        self.events().into_iter().filter(|e| e.pid == pid).collect()
    }
}

/// Kernel with the default test settings, recording transitions
pub fn recorded_kernel() -> Recorded {
    recorded_kernel_with(test_config())
}

/// Kernel with `config`, recording transitions
pub fn recorded_kernel_with(config: KernelConfig) -> Recorded {
    let kernel = test_kernel(config);
    let events = collect_transitions(&kernel);
    Recorded { kernel, events }
}

/// Pids in the order they were run by whole-quantum cycles
pub fn execution_order(outcomes: &[CycleOutcome]) -> Vec<Pid> {
    outcomes
        .iter()
        .filter_map(|outcome| match outcome {
            CycleOutcome::Preempted { pid, .. } | CycleOutcome::Terminated { pid, .. } => {
                Some(*pid)
            }
            CycleOutcome::Deferred { .. } | CycleOutcome::Idle | CycleOutcome::Busy => None,
        })
        .collect()
}

/// Whether some event of the table maps `from` to `to`
pub fn is_legal(from: ProcessState, to: ProcessState) -> bool {
    ProcessEvent::ALL
        .iter()
        .any(|event| from.next(*event) == Some(to))
}

/// First recorded transition that the table does not allow
pub fn first_illegal(events: &[TransitionEvent]) -> Option<&TransitionEvent> {
    events.iter().find(|e| !is_legal(e.from, e.to))
}

/// Events whose `from` does not match the previous `to` of the same pid
pub fn broken_chains(events: &[TransitionEvent]) -> Vec<&TransitionEvent> {
    let mut last: std::collections::HashMap<Pid, ProcessState> = Default::default();
    let mut broken = Vec::new();
    for event in events {
        let expected = last.get(&event.pid).copied().unwrap_or(ProcessState::Created);
        if event.from != expected {
            broken.push(event);
        }
        last.insert(event.pid, event.to);
    }
    broken
}
