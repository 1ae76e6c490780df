//! # Schedulers
//!
//! Two interchangeable ready-queue policies behind the [`Scheduler`] trait.
//!
//! ## Philosophy
//!
//! - **Determinism first**: same insertions, same selections. No randomness.
//! - **Queues hold pids**: PCBs stay in the process table; a scheduler only
//!   orders identifiers.
//! - **One queue per pid**: a pid is queued at most once and never while
//!   running.
//!
//! ## Policies
//!
//! - [`PriorityScheduler`]: ten FIFO buckets; the highest numeric priority
//!   runs first. No aging, so a steady stream of high-priority work starves
//!   the lower buckets.
//! - [`RoundRobinScheduler`]: one FIFO queue, no priorities.

use crate::config::SchedulerKind;
use crate::process::Pcb;
use core_types::{Pid, Priority, ProcessState};
use std::collections::{HashMap, VecDeque};

/// Ready-queue policy
pub trait Scheduler: Send {
    /// Queues a newly admitted process
    ///
    /// Returns `false` if the process is already queued or not eligible.
    fn add_process(&mut self, pcb: &Pcb) -> bool;

    /// Removes and returns the next pid to run
    fn select_next(&mut self) -> Option<Pid>;

    /// Re-queues a preempted process
    ///
    /// Refuses completed, terminal, running and already-queued processes.
    fn requeue(&mut self, pcb: &Pcb) -> bool;

    /// Drops a pid from the ready structure
    fn remove(&mut self, pid: Pid) -> bool;

    /// Moves a queued pid to another priority
    ///
    /// Returns `false` if the pid is not queued. Policies without priorities
    /// keep the queue order unchanged.
    fn change_priority(&mut self, pid: Pid, priority: Priority) -> bool;

    /// Empties the scheduler, returning pids in selection order
    fn drain(&mut self) -> Vec<Pid> {
        let mut drained = Vec::with_capacity(self.size());
        while let Some(pid) = self.select_next() {
            drained.push(pid);
        }
        drained
    }

    /// Queued pids in selection order, without removing them
    fn queued(&self) -> Vec<Pid>;

    fn contains(&self, pid: Pid) -> bool;

    fn is_empty(&self) -> bool {
        self.size() == 0
    }

    fn size(&self) -> usize;

    /// Units granted per dispatch
    fn time_quantum(&self) -> u64;

    fn name(&self) -> &'static str;

    fn kind(&self) -> SchedulerKind;
}

/// Builds the scheduler for a policy
pub fn create_scheduler(kind: SchedulerKind, time_quantum: u64) -> Box<dyn Scheduler> {
    match kind {
        SchedulerKind::Priority => Box::new(PriorityScheduler::new(time_quantum)),
        SchedulerKind::RoundRobin => Box::new(RoundRobinScheduler::new(time_quantum)),
    }
}

fn is_queueable(pcb: &Pcb) -> bool {
    !pcb.is_completed()
        && matches!(
            pcb.state(),
            ProcessState::Created
                | ProcessState::ReadyMemory
                | ProcessState::ReadySwapped
                | ProcessState::Preempted
        )
}

/// Run queue
///
/// A FIFO queue using VecDeque for deterministic ordering.
/// Pids are enqueued at the back and dequeued from the front.
#[derive(Debug, Clone, Default)]
struct RunQueue {
    queue: VecDeque<Pid>,
}

impl RunQueue {
    fn enqueue(&mut self, pid: Pid) {
        self.queue.push_back(pid);
    }

    fn dequeue(&mut self) -> Option<Pid> {
        self.queue.pop_front()
    }

    fn remove(&mut self, pid: Pid) -> bool {
        let before = self.queue.len();
        self.queue.retain(|&p| p != pid);
        self.queue.len() != before
    }

    fn len(&self) -> usize {
        self.queue.len()
    }

    fn iter(&self) -> impl Iterator<Item = Pid> + '_ {
        self.queue.iter().copied()
    }
}

/// Priority scheduler
///
/// Buckets are indexed by level 1..=10 and scanned from 10 down to 1.
#[derive(Debug, Clone)]
pub struct PriorityScheduler {
    buckets: Vec<RunQueue>,
    queued: HashMap<Pid, Priority>,
    time_quantum: u64,
}

impl PriorityScheduler {
    pub fn new(time_quantum: u64) -> Self {
        Self {
            buckets: vec![RunQueue::default(); Priority::LEVELS],
            queued: HashMap::new(),
            time_quantum,
        }
    }

    fn enqueue(&mut self, pid: Pid, priority: Priority) {
        self.buckets[priority.bucket()].enqueue(pid);
        self.queued.insert(pid, priority);
    }
}

impl Scheduler for PriorityScheduler {
    fn add_process(&mut self, pcb: &Pcb) -> bool {
        if self.queued.contains_key(&pcb.pid()) || !is_queueable(pcb) {
            return false;
        }
        self.enqueue(pcb.pid(), pcb.priority);
        true
    }

    fn select_next(&mut self) -> Option<Pid> {
        let pid = self
            .buckets
            .iter_mut()
            .rev()
            .find_map(|bucket| bucket.dequeue())?;
        self.queued.remove(&pid);
        Some(pid)
    }

    fn requeue(&mut self, pcb: &Pcb) -> bool {
        self.add_process(pcb)
    }

    fn remove(&mut self, pid: Pid) -> bool {
        match self.queued.remove(&pid) {
            Some(priority) => self.buckets[priority.bucket()].remove(pid),
            None => false,
        }
    }

    fn change_priority(&mut self, pid: Pid, priority: Priority) -> bool {
        let Some(old) = self.queued.get(&pid).copied() else {
            return false;
        };
        self.buckets[old.bucket()].remove(pid);
        self.enqueue(pid, priority);
        true
    }

    fn queued(&self) -> Vec<Pid> {
        self.buckets
            .iter()
            .rev()
            .flat_map(|bucket| bucket.iter())
            .collect()
    }

    fn contains(&self, pid: Pid) -> bool {
        self.queued.contains_key(&pid)
    }

    fn size(&self) -> usize {
        self.queued.len()
    }

    fn time_quantum(&self) -> u64 {
        self.time_quantum
    }

    fn name(&self) -> &'static str {
        "Priority"
    }

    fn kind(&self) -> SchedulerKind {
        SchedulerKind::Priority
    }
}

/// Round-robin scheduler
#[derive(Debug, Clone)]
pub struct RoundRobinScheduler {
    run_queue: RunQueue,
    time_quantum: u64,
}

impl RoundRobinScheduler {
    pub fn new(time_quantum: u64) -> Self {
        Self {
            run_queue: RunQueue::default(),
            time_quantum,
        }
    }
}

impl Scheduler for RoundRobinScheduler {
    fn add_process(&mut self, pcb: &Pcb) -> bool {
        if self.contains(pcb.pid()) || !is_queueable(pcb) {
            return false;
        }
        self.run_queue.enqueue(pcb.pid());
        true
    }

    fn select_next(&mut self) -> Option<Pid> {
        self.run_queue.dequeue()
    }

    fn requeue(&mut self, pcb: &Pcb) -> bool {
        self.add_process(pcb)
    }

    fn remove(&mut self, pid: Pid) -> bool {
        self.run_queue.remove(pid)
    }

    fn change_priority(&mut self, pid: Pid, _priority: Priority) -> bool {
        self.contains(pid)
    }

    fn queued(&self) -> Vec<Pid> {
        self.run_queue.iter().collect()
    }

    fn contains(&self, pid: Pid) -> bool {
        self.run_queue.iter().any(|p| p == pid)
    }

    fn size(&self) -> usize {
        self.run_queue.len()
    }

    fn time_quantum(&self) -> u64 {
        self.time_quantum
    }

    fn name(&self) -> &'static str {
        "Round Robin"
    }

    fn kind(&self) -> SchedulerKind {
        SchedulerKind::RoundRobin
    }
}
