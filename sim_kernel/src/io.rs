//! # I/O Subsystem
//!
//! Blocks processes on simulated devices and wakes them on completion.
//! There are no drivers: a request is a record in a table until someone
//! calls [`IoSubsystem::io_complete`].

use crate::memory::MemoryManager;
use crate::process::{Pcb, Transition};
use crate::process_manager::ProcessManager;
use core_types::{Pid, ProcessEvent, ProcessState};
use serde::Serialize;
use std::collections::{HashMap, VecDeque};

/// An outstanding device request
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IoRequest {
    pub pid: Pid,
    pub device: String,
    pub operation: String,
    /// Simulation time the request was issued
    pub issued_at: u64,
}

/// Wait list plus pending-request table
#[derive(Debug, Default)]
pub struct IoSubsystem {
    wait_list: VecDeque<Pid>,
    pending: HashMap<Pid, IoRequest>,
    completed: u64,
}

impl IoSubsystem {
    pub fn new() -> Self {
        Self::default()
    }

    /// KERNEL_RUNNING → SLEEP waiting on `device`
    pub fn block_for_io(
        &mut self,
        pcb: &mut Pcb,
        device: &str,
        operation: &str,
        now: u64,
    ) -> Option<Transition> {
        let transition = pcb.apply(ProcessEvent::Sleep, "waiting for i/o")?;
        let pid = pcb.pid();
        pcb.io.waiting_device = Some(device.to_string());
        self.wait_list.push_back(pid);
        self.pending.insert(
            pid,
            IoRequest {
                pid,
                device: device.to_string(),
                operation: operation.to_string(),
                issued_at: now,
            },
        );
        Some(transition)
    }

    /// Device finished: SLEEP → READY_MEMORY or SLEEP_SWAPPED → READY_SWAPPED
    pub fn io_complete(&mut self, pcb: &mut Pcb) -> Option<Transition> {
        let transition = pcb.apply(ProcessEvent::Wakeup, "i/o complete")?;
        pcb.io.waiting_device = None;
        self.forget(pcb.pid());
        self.completed += 1;
        Some(transition)
    }

    /// Swaps every resident sleeper out to make room
    pub fn swap_out_sleeping(
        &self,
        processes: &mut ProcessManager,
        memory: &mut MemoryManager,
    ) -> Vec<Transition> {
        let mut transitions = Vec::new();
        for pid in &self.wait_list {
            let Some(pcb) = processes.get_mut(*pid) else {
                continue;
            };
            if pcb.state() == ProcessState::Sleep {
                transitions.extend(memory.swap_out(pcb, "sleeping process swapped out").transition);
            }
        }
        transitions
    }

    /// Drops any request for the pid
    pub fn forget(&mut self, pid: Pid) {
        self.wait_list.retain(|&p| p != pid);
        self.pending.remove(&pid);
    }

    pub fn pending(&self, pid: Pid) -> Option<&IoRequest> {
        self.pending.get(&pid)
    }

    pub fn waiting_count(&self) -> usize {
        self.wait_list.len()
    }

    pub fn is_waiting(&self, pid: Pid) -> bool {
        self.pending.contains_key(&pid)
    }

    /// Requests completed so far
    pub fn completed_count(&self) -> u64 {
        self.completed
    }
}
