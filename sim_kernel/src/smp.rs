//! Per-core execution slots for the stepping mode.
//!
//! Each core holds at most one process, a remaining quantum budget and its
//! own tick counter. The kernel advances one core by one unit at a time.

use crate::error::KernelError;
use core_types::{CoreId, Pid};
use serde::Serialize;

/// What one step did on a core
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum CoreAction {
    /// Nothing to run
    None,
    /// A process was switched onto the core
    Dispatched,
    /// The running process executed one unit
    Executed,
    /// The quantum ran out; the process was requeued
    Preempted,
    /// The process finished
    Terminated,
}

/// Result of [`crate::Kernel::step_core`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CoreStepResult {
    pub core: CoreId,
    pub action: CoreAction,
    pub pid: Option<Pid>,
    /// Units executed in this step (0 or 1)
    pub executed: u64,
    /// Work left for `pid` after the step
    pub remaining: u64,
}

impl CoreStepResult {
    pub(crate) fn idle(core: CoreId) -> Self {
        Self {
            core,
            action: CoreAction::None,
            pid: None,
            executed: 0,
            remaining: 0,
        }
    }
}

#[derive(Debug, Clone, Default)]
struct CoreState {
    current: Option<Pid>,
    quantum_left: u64,
    ticks: u64,
}

/// Execution slots, one per core
#[derive(Debug, Clone)]
pub struct CoreSlots {
    cores: Vec<CoreState>,
}

impl CoreSlots {
    pub fn new(core_count: usize) -> Self {
        Self {
            cores: vec![CoreState::default(); core_count],
        }
    }

    /// Validates a core id
    pub fn check(&self, core: CoreId) -> Result<usize, KernelError> {
        if core.0 < self.cores.len() {
            Ok(core.0)
        } else {
            Err(KernelError::InvalidCore {
                core,
                core_count: self.cores.len(),
            })
        }
    }

    /// Process held by a core
    pub fn current(&self, core: CoreId) -> Result<Option<Pid>, KernelError> {
        Ok(self.cores[self.check(core)?].current)
    }

    /// Quantum budget left on a core
    pub fn quantum_left(&self, core: CoreId) -> Result<u64, KernelError> {
        Ok(self.cores[self.check(core)?].quantum_left)
    }

    /// Puts a process on a core with a fresh quantum
    pub fn assign(&mut self, core: CoreId, pid: Pid, quantum: u64) -> Result<(), KernelError> {
        let index = self.check(core)?;
        self.cores[index].current = Some(pid);
        self.cores[index].quantum_left = quantum;
        Ok(())
    }

    /// Consumes `units` of the core's quantum and ticks, returning what is left
    pub fn consume(&mut self, core: CoreId, units: u64) -> Result<u64, KernelError> {
        let index = self.check(core)?;
        let state = &mut self.cores[index];
        state.quantum_left = state.quantum_left.saturating_sub(units);
        state.ticks = state.ticks.saturating_add(units);
        Ok(state.quantum_left)
    }

    /// Clears whichever core holds `pid`
    pub fn release_pid(&mut self, pid: Pid) -> Option<CoreId> {
        let index = self.cores.iter().position(|c| c.current == Some(pid))?;
        self.cores[index].current = None;
        self.cores[index].quantum_left = 0;
        Some(CoreId(index))
    }

    /// Units executed on a core
    pub fn ticks(&self, core: CoreId) -> Result<u64, KernelError> {
        Ok(self.cores[self.check(core)?].ticks)
    }

    pub fn all_idle(&self) -> bool {
        self.cores.iter().all(|c| c.current.is_none())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_core_slots_start_idle() {
        let slots = CoreSlots::new(2);
        assert!(slots.all_idle());
        assert_eq!(slots.current(CoreId(1)).unwrap(), None);
        assert_eq!(slots.quantum_left(CoreId(1)).unwrap(), 0);
    }

    #[test]
    fn test_invalid_core() {
        let slots = CoreSlots::new(2);
        assert_eq!(
            slots.current(CoreId(5)),
            Err(KernelError::InvalidCore {
                core: CoreId(5),
                core_count: 2
            })
        );
    }

    #[test]
    fn test_assign_consume_release() {
        let mut slots = CoreSlots::new(2);
        slots.assign(CoreId(1), Pid(3), 2).unwrap();
        assert_eq!(slots.current(CoreId(1)).unwrap(), Some(Pid(3)));
        assert_eq!(slots.quantum_left(CoreId(1)).unwrap(), 2);
        assert!(!slots.all_idle());

        assert_eq!(slots.consume(CoreId(1), 1).unwrap(), 1);
        assert_eq!(slots.consume(CoreId(1), 1).unwrap(), 0);
        assert_eq!(slots.ticks(CoreId(1)).unwrap(), 2);
        assert_eq!(slots.ticks(CoreId(0)).unwrap(), 0);

        assert_eq!(slots.release_pid(Pid(3)), Some(CoreId(1)));
        assert_eq!(slots.quantum_left(CoreId(1)).unwrap(), 0);
        assert!(slots.all_idle());
    }

    #[test]
    fn test_release_pid() {
        let mut slots = CoreSlots::new(3);
        slots.assign(CoreId(2), Pid(1), 4).unwrap();
        assert_eq!(slots.release_pid(Pid(1)), Some(CoreId(2)));
        assert_eq!(slots.release_pid(Pid(1)), None);
    }
}
