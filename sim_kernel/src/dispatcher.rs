//! # Dispatcher
//!
//! Simulates the cost and bookkeeping of a context switch.
//!
//! The dispatcher owns a saved context per pid and a live pid per core. Each
//! [`Dispatcher::dispatch`] call sleeps for the configured switch cost and
//! counts exactly one context switch.

use crate::error::KernelError;
use crate::process::{ContextData, Pcb, Transition};
use core_types::{CoreId, Pid, ProcessEvent};
use std::collections::HashMap;
use std::thread;
use std::time::{Duration, Instant};

/// What one dispatch did
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatchRecord {
    pub core: CoreId,
    pub next: Pid,
    pub previous: Option<Pid>,
    /// Preemption of `previous` (if any), then the dispatch of `next`
    pub transitions: Vec<Transition>,
    pub elapsed: Duration,
}

/// Context-switch simulator
#[derive(Debug)]
pub struct Dispatcher {
    contexts: HashMap<Pid, ContextData>,
    current: Vec<Option<Pid>>,
    switch_cost: Duration,
    context_switches: u64,
    total_dispatch_time: Duration,
}

impl Dispatcher {
    /// Creates a dispatcher for `core_count` execution units
    pub fn new(core_count: usize, switch_cost: Duration) -> Self {
        Self {
            contexts: HashMap::new(),
            current: vec![None; core_count],
            switch_cost,
            context_switches: 0,
            total_dispatch_time: Duration::ZERO,
        }
    }

    /// Creates an empty saved context for the pid
    pub fn register_process(&mut self, pcb: &Pcb) {
        self.contexts.entry(pcb.pid()).or_default();
    }

    /// Drops the pid's saved context and any core it occupies
    pub fn unregister_process(&mut self, pid: Pid) {
        self.contexts.remove(&pid);
        self.release_pid(pid);
    }

    /// Stores the PCB's live context
    pub fn save_context(&mut self, pcb: &Pcb) {
        self.contexts.insert(pcb.pid(), pcb.context);
    }

    /// Saved context for a pid
    pub fn saved_context(&self, pid: Pid) -> Option<&ContextData> {
        self.contexts.get(&pid)
    }

    fn check_core(&self, core: CoreId) -> Result<usize, KernelError> {
        if core.0 < self.current.len() {
            Ok(core.0)
        } else {
            Err(KernelError::InvalidCore {
                core,
                core_count: self.current.len(),
            })
        }
    }

    /// Switches `core` from `previous` to `next`
    ///
    /// A running `previous` has its context saved and is preempted. `next`
    /// gets its saved context back and moves READY_MEMORY → KERNEL_RUNNING.
    /// The switch counter grows by one even when `next` is not in a
    /// dispatchable state.
    pub fn dispatch(
        &mut self,
        core: CoreId,
        next: &mut Pcb,
        previous: Option<&mut Pcb>,
    ) -> Result<DispatchRecord, KernelError> {
        let index = self.check_core(core)?;
        let started = Instant::now();
        let mut transitions = Vec::new();
        let mut previous_pid = None;

        if let Some(previous) = previous {
            previous_pid = Some(previous.pid());
            if previous.state().is_running() {
                self.save_context(previous);
                transitions.extend(
                    previous.apply(ProcessEvent::Preempt, "preempted by dispatcher"),
                );
            }
        }

        if !self.switch_cost.is_zero() {
            thread::sleep(self.switch_cost);
        }

        if let Some(context) = self.contexts.get(&next.pid()) {
            next.context = *context;
        }
        transitions.extend(next.apply(ProcessEvent::Dispatch, "dispatch - context switch"));
        self.current[index] = Some(next.pid());

        let elapsed = started.elapsed();
        self.context_switches += 1;
        self.total_dispatch_time += elapsed;

        Ok(DispatchRecord {
            core,
            next: next.pid(),
            previous: previous_pid,
            transitions,
            elapsed,
        })
    }

    /// Pid live on a core
    pub fn current(&self, core: CoreId) -> Result<Option<Pid>, KernelError> {
        let index = self.check_core(core)?;
        Ok(self.current[index])
    }

    /// Clears every core the pid is on
    pub fn release_pid(&mut self, pid: Pid) {
        for slot in self.current.iter_mut() {
            if *slot == Some(pid) {
                *slot = None;
            }
        }
    }

    /// Monotonic context-switch counter
    pub fn context_switch_count(&self) -> u64 {
        self.context_switches
    }

    /// Wall time spent per switch on average
    pub fn average_dispatch_time(&self) -> Duration {
        if self.context_switches == 0 {
            return Duration::ZERO;
        }
        let nanos = self.total_dispatch_time.as_nanos() / u128::from(self.context_switches);
        Duration::from_nanos(nanos as u64)
    }

    pub fn core_count(&self) -> usize {
        self.current.len()
    }
}
