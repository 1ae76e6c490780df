//! # Interrupt Handling
//!
//! Turns hardware events into lifecycle transitions. Only a timer interrupt
//! takes the CPU away; every other kind leaves the process in kernel mode.

use crate::process::{Pcb, Transition};
use crate::scheduler::Scheduler;
use core_types::{ProcessEvent, ProcessState};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Interrupt source
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum InterruptKind {
    Timer,
    IoComplete,
    PageFault,
    Hardware,
}

impl InterruptKind {
    /// Decodes an interrupt number
    pub fn from_number(number: u32) -> Option<Self> {
        match number {
            0 => Some(InterruptKind::Timer),
            1 => Some(InterruptKind::IoComplete),
            2 => Some(InterruptKind::PageFault),
            3 => Some(InterruptKind::Hardware),
            _ => None,
        }
    }

    pub fn number(self) -> u32 {
        match self {
            InterruptKind::Timer => 0,
            InterruptKind::IoComplete => 1,
            InterruptKind::PageFault => 2,
            InterruptKind::Hardware => 3,
        }
    }

    fn trap_reason(self) -> &'static str {
        match self {
            InterruptKind::Timer => "timer interrupt",
            InterruptKind::IoComplete => "i/o completion interrupt",
            InterruptKind::PageFault => "page fault",
            InterruptKind::Hardware => "hardware interrupt",
        }
    }
}

impl fmt::Display for InterruptKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.trap_reason())
    }
}

/// Interrupt handler
#[derive(Debug, Default)]
pub struct InterruptHandler {
    handled: HashMap<InterruptKind, u64>,
}

impl InterruptHandler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Handles an interrupt raised while `pcb` is in user mode
    ///
    /// USER_RUNNING → KERNEL_RUNNING for every kind. A timer interrupt then
    /// continues → PREEMPTED → READY_MEMORY and requeues the pid. Any other
    /// source state is left untouched.
    pub fn handle_interrupt(
        &mut self,
        pcb: &mut Pcb,
        kind: InterruptKind,
        scheduler: &mut dyn Scheduler,
    ) -> Vec<Transition> {
        let Some(trap) = pcb.apply(ProcessEvent::Trap, kind.trap_reason()) else {
            return Vec::new();
        };
        *self.handled.entry(kind).or_insert(0) += 1;

        let mut transitions = vec![trap];
        if kind == InterruptKind::Timer {
            transitions.extend(pcb.apply(ProcessEvent::Preempt, "preempted by scheduler"));
            transitions.extend(pcb.apply(ProcessEvent::Requeue, "requeued to ready queue"));
            scheduler.requeue(pcb);
        }
        transitions
    }

    /// Quantum exhaustion is a timer interrupt
    pub fn time_quantum_expired(
        &mut self,
        pcb: &mut Pcb,
        scheduler: &mut dyn Scheduler,
    ) -> Vec<Transition> {
        self.handle_interrupt(pcb, InterruptKind::Timer, scheduler)
    }

    /// Leaves interrupt handling
    ///
    /// KERNEL_RUNNING → USER_RUNNING, or ZOMBIE → KERNEL_RUNNING for the
    /// bookkeeping pass after an exit.
    pub fn interrupt_return(&mut self, pcb: &mut Pcb) -> Option<Transition> {
        let reason = if pcb.state().is_terminal() {
            "exit bookkeeping"
        } else {
            "return to user mode"
        };
        pcb.apply(ProcessEvent::InterruptReturn, reason)
    }

    /// Takes the CPU from the running process for a higher-priority arrival
    ///
    /// USER_RUNNING → PREEMPTED → READY_MEMORY, then requeued.
    pub fn preempt_for_higher_priority(
        &mut self,
        pcb: &mut Pcb,
        scheduler: &mut dyn Scheduler,
    ) -> Vec<Transition> {
        if pcb.state() != ProcessState::UserRunning {
            return Vec::new();
        }
        let mut transitions = Vec::new();
        transitions.extend(pcb.apply(ProcessEvent::Preempt, "higher priority arrival"));
        transitions.extend(pcb.apply(ProcessEvent::Requeue, "requeued to ready queue"));
        scheduler.requeue(pcb);
        transitions
    }

    /// Interrupts handled of one kind
    pub fn handled(&self, kind: InterruptKind) -> u64 {
        self.handled.get(&kind).copied().unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::process::Process;
    use crate::scheduler::RoundRobinScheduler;
    use core_types::{Pid, Priority, ProcessState};

    fn user_running() -> Pcb {
        let mut pcb = Pcb::new(
            Process::new(Pid(1), "p1", 4, Priority::MIN, 0),
            Pid::KERNEL,
        );
        pcb.apply(ProcessEvent::Admit, "admit").unwrap();
        pcb.apply(ProcessEvent::Dispatch, "dispatch").unwrap();
        pcb.apply(ProcessEvent::InterruptReturn, "return").unwrap();
        pcb
    }

    #[test]
    fn test_interrupt_numbers() {
        for kind in [
            InterruptKind::Timer,
            InterruptKind::IoComplete,
            InterruptKind::PageFault,
            InterruptKind::Hardware,
        ] {
            assert_eq!(InterruptKind::from_number(kind.number()), Some(kind));
        }
        assert_eq!(InterruptKind::from_number(4), None);
    }

    #[test]
    fn test_timer_preempts_and_requeues() {
        let mut handler = InterruptHandler::new();
        let mut scheduler = RoundRobinScheduler::new(2);
        let mut pcb = user_running();

        let transitions = handler.handle_interrupt(&mut pcb, InterruptKind::Timer, &mut scheduler);
        let states: Vec<_> = transitions.iter().map(|t| t.to).collect();
        assert_eq!(
            states,
            vec![
                ProcessState::KernelRunning,
                ProcessState::Preempted,
                ProcessState::ReadyMemory
            ]
        );
        assert_eq!(transitions[0].reason, "timer interrupt");
        assert!(scheduler.contains(Pid(1)));
        assert_eq!(handler.handled(InterruptKind::Timer), 1);
    }

    #[test]
    fn test_non_timer_stays_in_kernel() {
        let mut handler = InterruptHandler::new();
        let mut scheduler = RoundRobinScheduler::new(2);
        let mut pcb = user_running();

        let transitions =
            handler.handle_interrupt(&mut pcb, InterruptKind::PageFault, &mut scheduler);
        assert_eq!(transitions.len(), 1);
        assert_eq!(pcb.state(), ProcessState::KernelRunning);
        assert!(scheduler.is_empty());

        assert!(handler.interrupt_return(&mut pcb).is_some());
        assert_eq!(pcb.state(), ProcessState::UserRunning);
    }

    #[test]
    fn test_interrupt_from_wrong_state_is_noop() {
        let mut handler = InterruptHandler::new();
        let mut scheduler = RoundRobinScheduler::new(2);
        let mut pcb = Pcb::new(
            Process::new(Pid(1), "p1", 4, Priority::MIN, 0),
            Pid::KERNEL,
        );

        assert!(handler
            .handle_interrupt(&mut pcb, InterruptKind::Timer, &mut scheduler)
            .is_empty());
        assert_eq!(pcb.state(), ProcessState::Created);
        assert_eq!(handler.handled(InterruptKind::Timer), 0);
    }

    #[test]
    fn test_interrupt_return_from_zombie() {
        let mut handler = InterruptHandler::new();
        let mut pcb = user_running();
        pcb.apply(ProcessEvent::Trap, "exit").unwrap();
        pcb.apply(ProcessEvent::Exit, "exit").unwrap();

        let transition = handler.interrupt_return(&mut pcb).unwrap();
        assert_eq!(transition.from, ProcessState::Zombie);
        assert_eq!(transition.to, ProcessState::KernelRunning);
        assert_eq!(transition.reason, "exit bookkeeping");
    }

    #[test]
    fn test_preempt_for_higher_priority_only_user_running() {
        let mut handler = InterruptHandler::new();
        let mut scheduler = RoundRobinScheduler::new(2);
        let mut pcb = user_running();

        let transitions = handler.preempt_for_higher_priority(&mut pcb, &mut scheduler);
        assert_eq!(transitions.len(), 2);
        assert_eq!(pcb.state(), ProcessState::ReadyMemory);
        assert!(scheduler.contains(Pid(1)));

        assert!(handler
            .preempt_for_higher_priority(&mut pcb, &mut scheduler)
            .is_empty());
    }
}
