//! # System Calls
//!
//! Every system call traps USER_RUNNING → KERNEL_RUNNING. `exit` then
//! terminates the process; `open`/`close` maintain its handle list. The
//! remaining calls only trap; fork and wait are served by the process
//! manager through the kernel surface.

use crate::process::{Pcb, Transition};
use core_types::ProcessEvent;
use serde::{Deserialize, Serialize};

/// System call numbers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Syscall {
    Read,
    Write,
    Open,
    Close,
    Fork,
    Exit,
    Wait,
}

impl Syscall {
    pub fn from_number(number: u32) -> Option<Self> {
        match number {
            0 => Some(Syscall::Read),
            1 => Some(Syscall::Write),
            2 => Some(Syscall::Open),
            3 => Some(Syscall::Close),
            4 => Some(Syscall::Fork),
            5 => Some(Syscall::Exit),
            6 => Some(Syscall::Wait),
            _ => None,
        }
    }

    pub fn number(self) -> u32 {
        match self {
            Syscall::Read => 0,
            Syscall::Write => 1,
            Syscall::Open => 2,
            Syscall::Close => 3,
            Syscall::Fork => 4,
            Syscall::Exit => 5,
            Syscall::Wait => 6,
        }
    }

    fn trap_reason(self) -> &'static str {
        match self {
            Syscall::Read => "read() system call",
            Syscall::Write => "write() system call",
            Syscall::Open => "open() system call",
            Syscall::Close => "close() system call",
            Syscall::Fork => "fork() system call",
            Syscall::Exit => "exit() system call",
            Syscall::Wait => "wait() system call",
        }
    }
}

/// System-call handler
#[derive(Debug)]
pub struct SyscallHandler {
    next_handle: u32,
    invocations: u64,
}

impl SyscallHandler {
    pub fn new() -> Self {
        Self {
            next_handle: 3,
            invocations: 0,
        }
    }

    /// Executes system call `number` on behalf of a user-mode process
    pub fn handle_syscall(&mut self, pcb: &mut Pcb, number: u32) -> Vec<Transition> {
        let syscall = Syscall::from_number(number);
        let reason = syscall.map_or("unknown system call", Syscall::trap_reason);
        let Some(trap) = pcb.apply(ProcessEvent::Trap, reason) else {
            return Vec::new();
        };
        self.invocations += 1;

        let mut transitions = vec![trap];
        match syscall {
            Some(Syscall::Exit) => {
                transitions.extend(pcb.apply(ProcessEvent::Exit, "process terminated"));
            }
            Some(Syscall::Open) => {
                pcb.io.open_handles.push(self.next_handle);
                self.next_handle += 1;
            }
            Some(Syscall::Close) => {
                pcb.io.open_handles.pop();
            }
            Some(Syscall::Read | Syscall::Write | Syscall::Fork | Syscall::Wait) | None => {}
        }
        transitions
    }

    /// KERNEL_RUNNING → USER_RUNNING after a call completes
    pub fn return_from_syscall(&mut self, pcb: &mut Pcb) -> Option<Transition> {
        pcb.apply(ProcessEvent::ReturnToUser, "return from system call")
    }

    /// Calls that reached the kernel
    pub fn invocations(&self) -> u64 {
        self.invocations
    }
}

impl Default for SyscallHandler {
    fn default() -> Self {
        Self::new()
    }
}
