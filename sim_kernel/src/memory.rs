//! # Memory Manager and Swap Space
//!
//! Every process costs one fixed-size slot. The manager tracks which pids
//! hold a slot, which live in swap, and the order in which resident pids were
//! last touched.
//!
//! ## Invariants
//!
//! - A pid is never both resident and swapped.
//! - Allocation is all-or-nothing.
//! - The LRU queue holds exactly the resident pids, oldest first.

use crate::process::{MemoryPointer, Pcb, Transition};
use core_types::{Pid, ProcessEvent, ProcessState};
use std::collections::{BTreeMap, BTreeSet, VecDeque};

/// Size of one memory slot in simulated units
pub const SLOT_SIZE: usize = 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Allocation {
    slot: usize,
}

/// Outcome of a swap operation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SwapResult {
    /// The pid changed sides (resident ↔ swap)
    pub moved: bool,
    /// State change applied alongside the move
    pub transition: Option<Transition>,
}

/// Pids evicted to secondary storage, in eviction order
#[derive(Debug, Clone, Default)]
pub struct SwapSpace {
    entries: VecDeque<Pid>,
    capacity: Option<usize>,
}

impl SwapSpace {
    /// Creates a swap space (`None` = unbounded)
    pub fn new(capacity: Option<usize>) -> Self {
        Self {
            entries: VecDeque::new(),
            capacity,
        }
    }

    pub fn contains(&self, pid: Pid) -> bool {
        self.entries.contains(&pid)
    }

    /// Adds a pid; fails if it is already present or swap is full
    pub fn insert(&mut self, pid: Pid) -> bool {
        if self.contains(pid) || self.is_full() {
            return false;
        }
        self.entries.push_back(pid);
        true
    }

    pub fn remove(&mut self, pid: Pid) -> bool {
        let before = self.entries.len();
        self.entries.retain(|&p| p != pid);
        self.entries.len() != before
    }

    pub fn is_full(&self) -> bool {
        self.capacity
            .map(|capacity| self.entries.len() >= capacity)
            .unwrap_or(false)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> Option<usize> {
        self.capacity
    }

    pub fn iter(&self) -> impl Iterator<Item = Pid> + '_ {
        self.entries.iter().copied()
    }
}

/// Resident-set manager
#[derive(Debug, Clone)]
pub struct MemoryManager {
    total_slots: usize,
    allocations: BTreeMap<Pid, Allocation>,
    free_slots: BTreeSet<usize>,
    swap: SwapSpace,
    lru: VecDeque<Pid>,
}

impl MemoryManager {
    /// Creates a manager with `total_slots` resident slots
    pub fn new(total_slots: usize, swap_capacity: Option<usize>) -> Self {
        Self {
            total_slots,
            allocations: BTreeMap::new(),
            free_slots: (0..total_slots).collect(),
            swap: SwapSpace::new(swap_capacity),
            lru: VecDeque::new(),
        }
    }

    /// Whether one more slot can be allocated
    pub fn has_available_memory(&self) -> bool {
        !self.free_slots.is_empty()
    }

    /// Gives the PCB a resident slot
    ///
    /// Returns `true` if the pid is resident afterwards. Swapped pids must
    /// come back through [`MemoryManager::swap_in`].
    pub fn allocate_memory(&mut self, pcb: &mut Pcb) -> bool {
        let pid = pcb.pid();
        if self.allocations.contains_key(&pid) {
            return true;
        }
        if self.swap.contains(pid) {
            return false;
        }
        let Some(slot) = self.free_slots.pop_first() else {
            return false;
        };

        self.allocations.insert(
            pid,
            Allocation { slot },
        );
        pcb.memory = Some(MemoryPointer {
            base: slot * SLOT_SIZE,
            limit: SLOT_SIZE,
        });
        self.touch(pid);
        true
    }

    /// Moves a pid into swap
    ///
    /// Accepts CREATED (admission straight to swap, no state change),
    /// READY_MEMORY and SLEEP. Anything else, or a full swap space, is a
    /// no-op.
    pub fn swap_out(&mut self, pcb: &mut Pcb, reason: &'static str) -> SwapResult {
        let pid = pcb.pid();
        let state = pcb.state();
        if state != ProcessState::Created && !state.is_evictable() {
            return SwapResult::default();
        }
        if !self.swap.insert(pid) {
            return SwapResult::default();
        }

        self.release(pid);
        pcb.memory = None;
        SwapResult {
            moved: true,
            transition: pcb.apply(ProcessEvent::SwapOut, reason),
        }
    }

    /// Brings a swapped pid back into memory
    ///
    /// Requires a free slot and the pid to be in swap.
    pub fn swap_in(&mut self, pcb: &mut Pcb, reason: &'static str) -> SwapResult {
        let pid = pcb.pid();
        if !self.swap.contains(pid) || !self.has_available_memory() {
            return SwapResult::default();
        }

        self.swap.remove(pid);
        if !self.allocate_memory(pcb) {
            // Unreachable with a free slot; keep the pid in swap regardless.
            self.swap.insert(pid);
            return SwapResult::default();
        }
        SwapResult {
            moved: true,
            transition: pcb.apply(ProcessEvent::SwapIn, reason),
        }
    }

    /// Marks a resident pid as most recently used
    pub fn touch(&mut self, pid: Pid) {
        if !self.allocations.contains_key(&pid) {
            return;
        }
        self.lru.retain(|&p| p != pid);
        self.lru.push_back(pid);
    }

    /// Oldest resident pid accepted by `eligible`
    pub fn lru_victim<F>(&self, mut eligible: F) -> Option<Pid>
    where
        F: FnMut(Pid) -> bool,
    {
        self.lru.iter().copied().find(|&pid| eligible(pid))
    }

    /// Forgets the pid entirely (resident slot and swap entry)
    pub fn free_memory(&mut self, pid: Pid) {
        self.release(pid);
        self.swap.remove(pid);
    }

    fn release(&mut self, pid: Pid) {
        if let Some(allocation) = self.allocations.remove(&pid) {
            self.free_slots.insert(allocation.slot);
        }
        self.lru.retain(|&p| p != pid);
    }

    /// Slots in use
    pub fn memory_usage(&self) -> usize {
        self.allocations.len()
    }

    /// Pids in swap
    pub fn swap_usage(&self) -> usize {
        self.swap.len()
    }

    pub fn available(&self) -> usize {
        self.free_slots.len()
    }

    pub fn total(&self) -> usize {
        self.total_slots
    }

    pub fn is_resident(&self, pid: Pid) -> bool {
        self.allocations.contains_key(&pid)
    }

    pub fn is_swapped(&self, pid: Pid) -> bool {
        self.swap.contains(pid)
    }

    /// Resident pids, least recently used first
    pub fn lru_order(&self) -> Vec<Pid> {
        self.lru.iter().copied().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::process::Process;
    use core_types::Priority;

    fn pcb(pid: u32) -> Pcb {
        Pcb::new(
            Process::new(Pid(pid), format!("p{}", pid), 4, Priority::MIN, 0),
            Pid::KERNEL,
        )
    }

    fn ready(pid: u32, memory: &mut MemoryManager) -> Pcb {
        let mut pcb = pcb(pid);
        assert!(memory.allocate_memory(&mut pcb));
        pcb.apply(ProcessEvent::Admit, "admit").unwrap();
        pcb
    }

    fn assert_disjoint(memory: &MemoryManager) {
        for pid in memory.lru_order() {
            assert!(!memory.is_swapped(pid), "{} is resident and swapped", pid);
        }
    }

    #[test]
    fn test_allocate_until_full() {
        let mut memory = MemoryManager::new(2, None);
        let mut a = pcb(1);
        let mut b = pcb(2);
        let mut c = pcb(3);

        assert!(memory.allocate_memory(&mut a));
        assert!(memory.allocate_memory(&mut b));
        assert!(!memory.has_available_memory());
        assert!(!memory.allocate_memory(&mut c));
        assert!(c.memory.is_none());
        assert_eq!(memory.memory_usage(), 2);
        assert_eq!(a.memory.unwrap().base, 0);
        assert_eq!(b.memory.unwrap().base, SLOT_SIZE);
    }

    #[test]
    fn test_allocate_twice_is_idempotent() {
        let mut memory = MemoryManager::new(2, None);
        let mut a = pcb(1);
        assert!(memory.allocate_memory(&mut a));
        assert!(memory.allocate_memory(&mut a));
        assert_eq!(memory.memory_usage(), 1);
    }

    #[test]
    fn test_swap_out_ready_process() {
        let mut memory = MemoryManager::new(2, None);
        let mut a = ready(1, &mut memory);

        let result = memory.swap_out(&mut a, "evicted");
        assert!(result.moved);
        assert_eq!(result.transition.unwrap().to, ProcessState::ReadySwapped);
        assert!(memory.is_swapped(Pid(1)));
        assert!(!memory.is_resident(Pid(1)));
        assert_eq!(memory.available(), 2);
        assert!(a.memory.is_none());
        assert_disjoint(&memory);
    }

    #[test]
    fn test_swap_out_created_moves_without_transition() {
        let mut memory = MemoryManager::new(1, None);
        let mut a = pcb(1);
        let result = memory.swap_out(&mut a, "admit to swap");
        assert!(result.moved);
        assert!(result.transition.is_none());
        assert_eq!(a.state(), ProcessState::Created);
        assert_eq!(memory.swap_usage(), 1);
    }

    #[test]
    fn test_swap_out_running_is_noop() {
        let mut memory = MemoryManager::new(1, None);
        let mut a = ready(1, &mut memory);
        a.apply(ProcessEvent::Dispatch, "dispatch").unwrap();

        let result = memory.swap_out(&mut a, "evicted");
        assert_eq!(result, SwapResult::default());
        assert!(memory.is_resident(Pid(1)));
    }

    #[test]
    fn test_swap_out_sleeping_process() {
        let mut memory = MemoryManager::new(1, None);
        let mut a = ready(1, &mut memory);
        a.apply(ProcessEvent::Dispatch, "dispatch").unwrap();
        a.apply(ProcessEvent::Sleep, "io").unwrap();

        let result = memory.swap_out(&mut a, "evicted");
        assert_eq!(result.transition.unwrap().to, ProcessState::SleepSwapped);

        let result = memory.swap_in(&mut a, "reloaded");
        assert_eq!(result.transition.unwrap().to, ProcessState::Sleep);
    }

    #[test]
    fn test_swap_in_requires_free_slot() {
        let mut memory = MemoryManager::new(1, None);
        let mut a = ready(1, &mut memory);
        memory.swap_out(&mut a, "evicted");
        let _b = ready(2, &mut memory);

        let result = memory.swap_in(&mut a, "reloaded");
        assert!(!result.moved);
        assert!(memory.is_swapped(Pid(1)));
        assert_eq!(a.state(), ProcessState::ReadySwapped);
        assert_disjoint(&memory);
    }

    #[test]
    fn test_swap_in_requires_swapped_pid() {
        let mut memory = MemoryManager::new(2, None);
        let mut a = pcb(1);
        assert!(!memory.swap_in(&mut a, "reloaded").moved);
    }

    #[test]
    fn test_bounded_swap_space() {
        let mut memory = MemoryManager::new(1, Some(1));
        let mut a = pcb(1);
        let mut b = pcb(2);
        assert!(memory.swap_out(&mut a, "swap").moved);
        assert!(!memory.swap_out(&mut b, "swap").moved);
        assert_eq!(memory.swap_usage(), 1);
        assert!(!memory.is_swapped(Pid(2)));
    }

    #[test]
    fn test_lru_order_and_touch() {
        let mut memory = MemoryManager::new(3, None);
        let _a = ready(1, &mut memory);
        let _b = ready(2, &mut memory);
        let _c = ready(3, &mut memory);
        assert_eq!(memory.lru_order(), vec![Pid(1), Pid(2), Pid(3)]);

        memory.touch(Pid(1));
        assert_eq!(memory.lru_order(), vec![Pid(2), Pid(3), Pid(1)]);
        assert_eq!(memory.lru_victim(|_| true), Some(Pid(2)));
        assert_eq!(memory.lru_victim(|pid| pid != Pid(2)), Some(Pid(3)));
    }

    #[test]
    fn test_touch_ignores_non_resident() {
        let mut memory = MemoryManager::new(1, None);
        memory.touch(Pid(9));
        assert!(memory.lru_order().is_empty());
    }

    #[test]
    fn test_free_memory_clears_everything() {
        let mut memory = MemoryManager::new(2, None);
        let mut a = ready(1, &mut memory);
        let _b = ready(2, &mut memory);
        memory.swap_out(&mut a, "evicted");

        memory.free_memory(Pid(1));
        memory.free_memory(Pid(2));
        assert_eq!(memory.memory_usage(), 0);
        assert_eq!(memory.swap_usage(), 0);
        assert_eq!(memory.available(), 2);
        assert!(memory.lru_order().is_empty());
    }

    #[test]
    fn test_freed_slot_is_reused() {
        let mut memory = MemoryManager::new(2, None);
        let _a = ready(1, &mut memory);
        let _b = ready(2, &mut memory);
        memory.free_memory(Pid(1));

        let c = ready(3, &mut memory);
        assert_eq!(c.memory.unwrap().base, 0);
    }
}
