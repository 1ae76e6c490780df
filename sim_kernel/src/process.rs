//! # Process and Process Control Block
//!
//! A [`Process`] is the workload: name, priority, burst and remaining time,
//! timestamps and lifecycle state. A [`Pcb`] owns exactly one process and
//! adds the kernel-side bookkeeping around it.
//!
//! ## Philosophy
//!
//! - State only changes through [`Pcb::apply`], which consults the transition
//!   table in `core_types`.
//! - Context, memory pointer and I/O status are placeholders; nothing here
//!   touches real hardware.

use core_types::{Pid, Priority, ProcessEvent, ProcessState};
use serde::Serialize;

/// One simulated workload
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Process {
    pid: Pid,
    name: String,
    priority: Priority,
    burst_time: u64,
    remaining_time: u64,
    arrival: u64,
    completion: Option<u64>,
    state: ProcessState,
}

impl Process {
    /// Creates a process in state CREATED with `remaining_time == burst_time`
    pub fn new(
        pid: Pid,
        name: impl Into<String>,
        burst_time: u64,
        priority: Priority,
        arrival: u64,
    ) -> Self {
        Self {
            pid,
            name: name.into(),
            priority,
            burst_time,
            remaining_time: burst_time,
            arrival,
            completion: None,
            state: ProcessState::Created,
        }
    }

    pub fn pid(&self) -> Pid {
        self.pid
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn priority(&self) -> Priority {
        self.priority
    }

    pub fn burst_time(&self) -> u64 {
        self.burst_time
    }

    pub fn remaining_time(&self) -> u64 {
        self.remaining_time
    }

    /// Simulation time at creation
    pub fn arrival(&self) -> u64 {
        self.arrival
    }

    /// Simulation time at termination
    pub fn completion(&self) -> Option<u64> {
        self.completion
    }

    pub fn state(&self) -> ProcessState {
        self.state
    }

    /// Runs for at most `slice` units
    ///
    /// Returns `min(slice, remaining_time)` and subtracts it.
    pub fn execute(&mut self, slice: u64) -> u64 {
        let executed = slice.min(self.remaining_time);
        self.remaining_time -= executed;
        executed
    }

    /// True once no work is left
    pub fn is_completed(&self) -> bool {
        self.remaining_time == 0
    }

    /// Records the completion timestamp
    ///
    /// Only the first call has an effect; returns whether it did.
    pub fn mark_completed(&mut self, at: u64) -> bool {
        if self.completion.is_some() {
            return false;
        }
        self.completion = Some(at);
        true
    }

    /// Completion minus arrival
    pub fn turnaround(&self) -> Option<u64> {
        self.completion
            .map(|completion| completion.saturating_sub(self.arrival))
    }

    /// Turnaround minus burst
    pub fn waiting(&self) -> Option<u64> {
        self.turnaround()
            .map(|turnaround| turnaround.saturating_sub(self.burst_time))
    }

    pub(crate) fn set_priority(&mut self, priority: Priority) {
        self.priority = priority;
    }
}

/// Who a process is and who created it
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Identifier {
    pub pid: Pid,
    pub parent: Pid,
}

/// Saved execution context (placeholder registers)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ContextData {
    pub program_counter: u64,
    pub stack_pointer: u64,
    pub registers: [u64; 16],
}

/// CPU accounting
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Accounting {
    /// Units executed so far
    pub cpu_time: u64,
    /// Simulation time of the last dispatch
    pub last_scheduled: Option<u64>,
}

/// I/O bookkeeping
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct IoStatus {
    pub open_handles: Vec<u32>,
    pub waiting_device: Option<String>,
}

/// Base/limit of the memory slot held by a resident process
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemoryPointer {
    pub base: usize,
    pub limit: usize,
}

/// A legal state change that was applied
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
    pub pid: Pid,
    pub from: ProcessState,
    pub to: ProcessState,
    pub reason: &'static str,
}

/// A transition as observed from outside the kernel
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TransitionEvent {
    /// Kernel tick (one per transition)
    pub tick: u64,
    pub pid: Pid,
    pub name: String,
    pub from: ProcessState,
    pub to: ProcessState,
    pub reason: String,
}

/// Process control block
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pcb {
    pub identifier: Identifier,
    pub context: ContextData,
    /// Scheduling priority; may briefly differ from the process's own
    /// priority while a priority change is applied
    pub priority: Priority,
    pub accounting: Accounting,
    pub io: IoStatus,
    pub memory: Option<MemoryPointer>,
    process: Process,
}

impl Pcb {
    /// Wraps a freshly created process
    pub fn new(process: Process, parent: Pid) -> Self {
        Self {
            identifier: Identifier {
                pid: process.pid(),
                parent,
            },
            context: ContextData::default(),
            priority: process.priority(),
            accounting: Accounting::default(),
            io: IoStatus::default(),
            memory: None,
            process,
        }
    }

    pub fn pid(&self) -> Pid {
        self.identifier.pid
    }

    pub fn parent(&self) -> Pid {
        self.identifier.parent
    }

    pub fn state(&self) -> ProcessState {
        self.process.state
    }

    pub fn process(&self) -> &Process {
        &self.process
    }

    pub fn process_mut(&mut self) -> &mut Process {
        &mut self.process
    }

    pub fn is_completed(&self) -> bool {
        self.process.is_completed()
    }

    /// Applies `event` if the transition table allows it
    pub fn apply(&mut self, event: ProcessEvent, reason: &'static str) -> Option<Transition> {
        let from = self.process.state;
        let to = from.next(event)?;
        self.process.state = to;
        Some(Transition {
            pid: self.pid(),
            from,
            to,
            reason,
        })
    }

    /// Sets the state without consulting the table
    ///
    /// Only process termination bookkeeping uses this. Returns `None` when
    /// the state is already `to`.
    pub(crate) fn force_state(
        &mut self,
        to: ProcessState,
        reason: &'static str,
    ) -> Option<Transition> {
        let from = self.process.state;
        if from == to {
            return None;
        }
        self.process.state = to;
        Some(Transition {
            pid: self.pid(),
            from,
            to,
            reason,
        })
    }

    /// Moves both the PCB and the process to a new priority
    pub(crate) fn set_priority(&mut self, priority: Priority) {
        self.priority = priority;
        self.process.set_priority(priority);
    }
}
