//! # Process Lifecycle
//!
//! The nine-state process model and its transition table.
//!
//! ## Philosophy
//!
//! - Every transition is keyed by `(state, event)`.
//! - An illegal pair yields `None`; callers treat it as a no-op.
//! - No other code decides legality.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle state of a simulated process
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ProcessState {
    /// Forked, not yet admitted
    Created,
    /// Ready to run, resident in memory
    ReadyMemory,
    /// Ready to run, evicted to swap
    ReadySwapped,
    /// Waiting on I/O, resident
    Sleep,
    /// Waiting on I/O, evicted to swap
    SleepSwapped,
    /// Executing in kernel mode
    KernelRunning,
    /// Executing in user mode
    UserRunning,
    /// Taken off the CPU, about to be requeued
    Preempted,
    /// Exited, waiting to be reaped
    Zombie,
}

/// Event driving a lifecycle transition
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ProcessEvent {
    /// Admission with a resident slot
    Admit,
    /// Admission straight into swap
    AdmitSwapped,
    /// Context switch onto a CPU
    Dispatch,
    /// Return to user mode
    ReturnToUser,
    /// Trap into the kernel (interrupt or system call)
    Trap,
    /// Removal from the CPU
    Preempt,
    /// Return to the ready queue
    Requeue,
    /// Process exit
    Exit,
    /// Block waiting on a device
    Sleep,
    /// Device completion
    Wakeup,
    /// Eviction to swap
    SwapOut,
    /// Reload from swap
    SwapIn,
    /// Return from interrupt handling
    InterruptReturn,
}

impl ProcessEvent {
    /// All events
    pub const ALL: [ProcessEvent; 13] = [
        ProcessEvent::Admit,
        ProcessEvent::AdmitSwapped,
        ProcessEvent::Dispatch,
        ProcessEvent::ReturnToUser,
        ProcessEvent::Trap,
        ProcessEvent::Preempt,
        ProcessEvent::Requeue,
        ProcessEvent::Exit,
        ProcessEvent::Sleep,
        ProcessEvent::Wakeup,
        ProcessEvent::SwapOut,
        ProcessEvent::SwapIn,
        ProcessEvent::InterruptReturn,
    ];
}

impl ProcessState {
    /// All states, in lifecycle order
    pub const ALL: [ProcessState; 9] = [
        ProcessState::Created,
        ProcessState::ReadyMemory,
        ProcessState::ReadySwapped,
        ProcessState::Sleep,
        ProcessState::SleepSwapped,
        ProcessState::KernelRunning,
        ProcessState::UserRunning,
        ProcessState::Preempted,
        ProcessState::Zombie,
    ];

    /// Looks up the transition table
    ///
    /// Returns the target state, or `None` when `event` is not legal from
    /// this state.
    pub fn next(self, event: ProcessEvent) -> Option<ProcessState> {
        use ProcessEvent as E;
        use ProcessState as S;

        match (self, event) {
            (S::Created, E::Admit) => Some(S::ReadyMemory),
            (S::Created, E::AdmitSwapped) => Some(S::ReadySwapped),
            (S::ReadyMemory, E::Dispatch) => Some(S::KernelRunning),
            (S::KernelRunning | S::Preempted, E::ReturnToUser) => Some(S::UserRunning),
            (S::UserRunning, E::Trap) => Some(S::KernelRunning),
            (S::UserRunning | S::KernelRunning, E::Preempt) => Some(S::Preempted),
            (S::Preempted | S::KernelRunning, E::Requeue) => Some(S::ReadyMemory),
            (S::KernelRunning, E::Exit) => Some(S::Zombie),
            (S::KernelRunning, E::Sleep) => Some(S::Sleep),
            (S::Sleep, E::Wakeup) => Some(S::ReadyMemory),
            (S::SleepSwapped, E::Wakeup) => Some(S::ReadySwapped),
            (S::ReadyMemory, E::SwapOut) => Some(S::ReadySwapped),
            (S::Sleep, E::SwapOut) => Some(S::SleepSwapped),
            (S::ReadySwapped, E::SwapIn) => Some(S::ReadyMemory),
            (S::SleepSwapped, E::SwapIn) => Some(S::Sleep),
            (S::KernelRunning, E::InterruptReturn) => Some(S::UserRunning),
            (S::Zombie, E::InterruptReturn) => Some(S::KernelRunning),
            _ => None,
        }
    }

    /// Whether `event` is legal from this state
    pub fn allows(self, event: ProcessEvent) -> bool {
        self.next(event).is_some()
    }

    /// On a CPU (kernel or user mode)
    pub fn is_running(self) -> bool {
        matches!(self, ProcessState::KernelRunning | ProcessState::UserRunning)
    }

    /// Ready or sleeping in memory
    pub fn is_resident(self) -> bool {
        matches!(self, ProcessState::ReadyMemory | ProcessState::Sleep)
    }

    /// Ready or sleeping in swap
    pub fn is_swapped(self) -> bool {
        matches!(self, ProcessState::ReadySwapped | ProcessState::SleepSwapped)
    }

    /// Exited
    pub fn is_terminal(self) -> bool {
        matches!(self, ProcessState::Zombie)
    }

    /// Can be chosen as a swap victim
    pub fn is_evictable(self) -> bool {
        self.allows(ProcessEvent::SwapOut)
    }

    /// Upper-case name used in logs
    pub fn as_str(self) -> &'static str {
        match self {
            ProcessState::Created => "CREATED",
            ProcessState::ReadyMemory => "READY_MEMORY",
            ProcessState::ReadySwapped => "READY_SWAPPED",
            ProcessState::Sleep => "SLEEP",
            ProcessState::SleepSwapped => "SLEEP_SWAPPED",
            ProcessState::KernelRunning => "KERNEL_RUNNING",
            ProcessState::UserRunning => "USER_RUNNING",
            ProcessState::Preempted => "PREEMPTED",
            ProcessState::Zombie => "ZOMBIE",
        }
    }
}

impl fmt::Display for ProcessState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
