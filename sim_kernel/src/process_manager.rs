//! Process manager: fork, admission, exit and reaping.

use crate::config::SwapPolicy;
use crate::memory::MemoryManager;
use crate::process::{Pcb, Process, Transition};
use core_types::{Pid, Priority, ProcessEvent, ProcessState};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// What to fork
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessDescriptor {
    pub name: String,
    pub burst_time: u64,
    /// Raw priority; clamped into 1..=10 at fork
    pub priority: i64,
}

impl ProcessDescriptor {
    pub fn new(name: impl Into<String>, burst_time: u64, priority: i64) -> Self {
        Self {
            name: name.into(),
            burst_time,
            priority,
        }
    }
}

/// Where admission put a process
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum AdmitOutcome {
    /// CREATED → READY_MEMORY
    Resident,
    /// CREATED → READY_SWAPPED
    Swapped,
    /// Neither memory nor swap had room; still CREATED
    Exhausted,
    /// Not in CREATED (or unknown pid); nothing happened
    Rejected,
}

impl AdmitOutcome {
    /// True when the process left CREATED
    pub fn is_admitted(self) -> bool {
        matches!(self, AdmitOutcome::Resident | AdmitOutcome::Swapped)
    }
}

/// Result of [`ProcessManager::admit`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Admission {
    pub outcome: AdmitOutcome,
    /// Eviction of a victim (if any), then the admission itself
    pub transitions: Vec<Transition>,
    pub evicted: Option<Pid>,
}

impl Admission {
    fn rejected() -> Self {
        Self {
            outcome: AdmitOutcome::Rejected,
            transitions: Vec::new(),
            evicted: None,
        }
    }
}

/// Process table
#[derive(Debug)]
pub struct ProcessManager {
    table: BTreeMap<Pid, Pcb>,
    next_pid: u32,
}

impl ProcessManager {
    pub fn new() -> Self {
        Self {
            table: BTreeMap::new(),
            next_pid: 1,
        }
    }

    /// Creates a PCB in state CREATED and returns its pid
    ///
    /// Pids are sequential and never reused.
    pub fn fork(&mut self, descriptor: &ProcessDescriptor, parent: Pid, arrival: u64) -> Pid {
        let pid = Pid(self.next_pid);
        self.next_pid += 1;

        let process = Process::new(
            pid,
            descriptor.name.clone(),
            descriptor.burst_time,
            Priority::clamped(descriptor.priority),
            arrival,
        );
        self.table.insert(pid, Pcb::new(process, parent));
        pid
    }

    /// Moves a CREATED process into memory or swap
    ///
    /// With [`SwapPolicy::EvictLru`] a full memory first evicts the least
    /// recently used evictable resident process; if none can be evicted the
    /// newcomer goes to swap like [`SwapPolicy::SwapNewcomer`].
    pub fn admit(&mut self, pid: Pid, memory: &mut MemoryManager, policy: SwapPolicy) -> Admission {
        match self.table.get(&pid) {
            Some(pcb) if pcb.state() == ProcessState::Created => {}
            _ => return Admission::rejected(),
        }

        let mut transitions = Vec::new();
        let mut evicted = None;

        if !memory.has_available_memory() && policy == SwapPolicy::EvictLru {
            let table = &self.table;
            let victim = memory.lru_victim(|candidate| {
                candidate != pid
                    && table
                        .get(&candidate)
                        .map(|pcb| pcb.state().is_evictable())
                        .unwrap_or(false)
            });
            if let Some(victim) = victim {
                if let Some(victim_pcb) = self.table.get_mut(&victim) {
                    let result = memory.swap_out(victim_pcb, "evicted (least recently used)");
                    if result.moved {
                        transitions.extend(result.transition);
                        evicted = Some(victim);
                    }
                }
            }
        }

        let Some(pcb) = self.table.get_mut(&pid) else {
            return Admission::rejected();
        };

        let outcome = if memory.allocate_memory(pcb) {
            transitions.extend(pcb.apply(ProcessEvent::Admit, "admitted to memory"));
            AdmitOutcome::Resident
        } else if memory.swap_out(pcb, "admitted to swap").moved {
            transitions.extend(pcb.apply(ProcessEvent::AdmitSwapped, "admitted to swap (memory full)"));
            AdmitOutcome::Swapped
        } else {
            AdmitOutcome::Exhausted
        };

        Admission {
            outcome,
            transitions,
            evicted,
        }
    }

    /// Forces the process to ZOMBIE
    pub fn exit(&mut self, pid: Pid) -> Option<Transition> {
        self.table
            .get_mut(&pid)?
            .force_state(ProcessState::Zombie, "process exited")
    }

    /// Reaps a zombie child
    ///
    /// Removes the PCB and releases its memory. Returns the destroyed PCB, or
    /// `None` if the child does not exist or is not a zombie. Never blocks.
    pub fn wait(&mut self, _parent: Pid, child: Pid, memory: &mut MemoryManager) -> Option<Pcb> {
        if self.table.get(&child)?.state() != ProcessState::Zombie {
            return None;
        }
        memory.free_memory(child);
        self.table.remove(&child)
    }

    pub fn get(&self, pid: Pid) -> Option<&Pcb> {
        self.table.get(&pid)
    }

    pub fn get_mut(&mut self, pid: Pid) -> Option<&mut Pcb> {
        self.table.get_mut(&pid)
    }

    pub fn contains(&self, pid: Pid) -> bool {
        self.table.contains_key(&pid)
    }

    /// PCBs in pid order
    pub fn iter(&self) -> impl Iterator<Item = &Pcb> {
        self.table.values()
    }

    pub fn children_of(&self, parent: Pid) -> Vec<Pid> {
        self.table
            .values()
            .filter(|pcb| pcb.parent() == parent)
            .map(Pcb::pid)
            .collect()
    }

    pub fn len(&self) -> usize {
        self.table.len()
    }

    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }
}

impl Default for ProcessManager {
    fn default() -> Self {
        Self::new()
    }
}
