//! # Kernel Statistics
//!
//! Counters the monitoring loop reads while the scheduling loop runs.
//!
//! [`KernelStats`] is a set of atomics republished by the kernel after every
//! locked operation. Reads never take the kernel lock and may be one
//! operation stale.

use crate::process::Process;
use core_types::{Pid, Priority, ProcessState};
use serde::Serialize;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::Duration;

/// One process as seen from outside
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProcessSummary {
    pub pid: Pid,
    pub name: String,
    pub priority: Priority,
    pub state: ProcessState,
    pub burst_time: u64,
    pub remaining_time: u64,
    pub arrival: u64,
    pub completion: Option<u64>,
    pub turnaround: Option<u64>,
    pub waiting: Option<u64>,
}

impl From<&Process> for ProcessSummary {
    fn from(process: &Process) -> Self {
        Self {
            pid: process.pid(),
            name: process.name().to_string(),
            priority: process.priority(),
            state: process.state(),
            burst_time: process.burst_time(),
            remaining_time: process.remaining_time(),
            arrival: process.arrival(),
            completion: process.completion(),
            turnaround: process.turnaround(),
            waiting: process.waiting(),
        }
    }
}

/// Point-in-time copy of every counter
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StatsSnapshot {
    /// Simulation time in units
    pub simulation_time: u64,
    /// Cycles that ran a process
    pub cycles: u64,
    /// Transitions emitted
    pub ticks: u64,
    pub context_switches: u64,
    pub average_dispatch_time: Duration,
    pub preemptions: u64,
    pub memory_usage: usize,
    pub memory_capacity: usize,
    pub swap_usage: usize,
    pub ready_queue_len: usize,
    pub process_count: usize,
    pub completed: usize,
}

/// Lock-free published counters
#[derive(Debug, Default)]
pub struct KernelStats {
    simulation_time: AtomicU64,
    cycles: AtomicU64,
    ticks: AtomicU64,
    context_switches: AtomicU64,
    average_dispatch_nanos: AtomicU64,
    preemptions: AtomicU64,
    memory_usage: AtomicUsize,
    memory_capacity: AtomicUsize,
    swap_usage: AtomicUsize,
    ready_queue_len: AtomicUsize,
    process_count: AtomicUsize,
    completed: AtomicUsize,
}

impl KernelStats {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores a fresh snapshot
    pub fn publish(&self, snapshot: &StatsSnapshot) {
        let relaxed = Ordering::Relaxed;
        self.simulation_time.store(snapshot.simulation_time, relaxed);
        self.cycles.store(snapshot.cycles, relaxed);
        self.ticks.store(snapshot.ticks, relaxed);
        self.context_switches.store(snapshot.context_switches, relaxed);
        self.average_dispatch_nanos
            .store(snapshot.average_dispatch_time.as_nanos() as u64, relaxed);
        self.preemptions.store(snapshot.preemptions, relaxed);
        self.memory_usage.store(snapshot.memory_usage, relaxed);
        self.memory_capacity.store(snapshot.memory_capacity, relaxed);
        self.swap_usage.store(snapshot.swap_usage, relaxed);
        self.ready_queue_len.store(snapshot.ready_queue_len, relaxed);
        self.process_count.store(snapshot.process_count, relaxed);
        self.completed.store(snapshot.completed, relaxed);
    }

    pub fn simulation_time(&self) -> u64 {
        self.simulation_time.load(Ordering::Relaxed)
    }

    pub fn cycles(&self) -> u64 {
        self.cycles.load(Ordering::Relaxed)
    }

    pub fn ticks(&self) -> u64 {
        self.ticks.load(Ordering::Relaxed)
    }

    pub fn context_switches(&self) -> u64 {
        self.context_switches.load(Ordering::Relaxed)
    }

    pub fn average_dispatch_time(&self) -> Duration {
        Duration::from_nanos(self.average_dispatch_nanos.load(Ordering::Relaxed))
    }

    pub fn preemptions(&self) -> u64 {
        self.preemptions.load(Ordering::Relaxed)
    }

    pub fn memory_usage(&self) -> usize {
        self.memory_usage.load(Ordering::Relaxed)
    }

    pub fn memory_capacity(&self) -> usize {
        self.memory_capacity.load(Ordering::Relaxed)
    }

    pub fn swap_usage(&self) -> usize {
        self.swap_usage.load(Ordering::Relaxed)
    }

    pub fn ready_queue_len(&self) -> usize {
        self.ready_queue_len.load(Ordering::Relaxed)
    }

    pub fn process_count(&self) -> usize {
        self.process_count.load(Ordering::Relaxed)
    }

    pub fn completed(&self) -> usize {
        self.completed.load(Ordering::Relaxed)
    }

    /// Reads every counter
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            simulation_time: self.simulation_time(),
            cycles: self.cycles(),
            ticks: self.ticks(),
            context_switches: self.context_switches(),
            average_dispatch_time: self.average_dispatch_time(),
            preemptions: self.preemptions(),
            memory_usage: self.memory_usage(),
            memory_capacity: self.memory_capacity(),
            swap_usage: self.swap_usage(),
            ready_queue_len: self.ready_queue_len(),
            process_count: self.process_count(),
            completed: self.completed(),
        }
    }
}
