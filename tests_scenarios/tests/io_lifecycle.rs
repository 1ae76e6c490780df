//! Interrupt, System Call and I/O Lifecycle Tests
//!
//! Drives processes through the kernel's pass-through operations and checks
//! that every emitted transition follows the table.

use core_types::{CoreId, Pid, ProcessState};
use sim_kernel::{CoreAction, InterruptKind, ProcessDescriptor, Syscall};
use tests_scenarios::{broken_chains, first_illegal, recorded_kernel, Recorded};

/// Kernel with one process in USER_RUNNING on core 0
fn running(burst: u64) -> (Recorded, Pid) {
    let recorded = recorded_kernel();
    let pid = recorded.kernel.create_process("worker", burst, 3).pid;
    let step = recorded.kernel.step_core(CoreId(0)).unwrap();
    assert_eq!(step.action, CoreAction::Dispatched);
    assert_eq!(
        recorded.kernel.pcb(pid).unwrap().state(),
        ProcessState::UserRunning
    );
    (recorded, pid)
}

fn state(recorded: &Recorded, pid: Pid) -> ProcessState {
    recorded.kernel.process(pid).unwrap().state
}

fn assert_table_respected(recorded: &Recorded) {
    let events = recorded.events();
    assert!(first_illegal(&events).is_none());
    assert!(broken_chains(&events).is_empty());
}

#[test]
fn test_exit_system_call_terminates() {
    let (recorded, pid) = running(5);
    let kernel = &recorded.kernel;

    let transitions = kernel
        .handle_system_call(pid, Syscall::Exit.number())
        .unwrap();
    let path: Vec<_> = transitions.iter().map(|t| (t.to, t.reason)).collect();
    assert_eq!(
        path,
        vec![
            (ProcessState::KernelRunning, "exit() system call"),
            (ProcessState::Zombie, "process terminated"),
        ]
    );
    assert!(kernel.is_core_idle(CoreId(0)).unwrap());
    assert_eq!(kernel.completed_count(), 1);
    assert_eq!(kernel.memory_usage(), 0);
    assert_eq!(state(&recorded, pid), ProcessState::Zombie);
    assert_table_respected(&recorded);
}

#[test]
fn test_open_and_close_track_handles() {
    let (recorded, pid) = running(5);
    let kernel = &recorded.kernel;

    for _ in 0..2 {
        kernel.handle_system_call(pid, Syscall::Open.number()).unwrap();
        assert_eq!(kernel.return_to_user(pid).unwrap().len(), 1);
    }
    assert_eq!(kernel.pcb(pid).unwrap().io.open_handles.len(), 2);

    kernel.handle_system_call(pid, Syscall::Close.number()).unwrap();
    assert_eq!(kernel.pcb(pid).unwrap().io.open_handles.len(), 1);
    assert_eq!(state(&recorded, pid), ProcessState::KernelRunning);
    assert_table_respected(&recorded);
}

#[test]
fn test_unknown_system_call_only_traps() {
    let (recorded, pid) = running(5);
    let kernel = &recorded.kernel;

    let transitions = kernel.handle_system_call(pid, 42).unwrap();
    assert_eq!(transitions.len(), 1);
    assert_eq!(transitions[0].reason, "unknown system call");
    assert_eq!(state(&recorded, pid), ProcessState::KernelRunning);

    // A second call while in the kernel is illegal.
    assert!(kernel.handle_system_call(pid, 1).unwrap().is_empty());
    kernel.return_to_user(pid).unwrap();
    assert_eq!(state(&recorded, pid), ProcessState::UserRunning);
    assert_table_respected(&recorded);
}

#[test]
fn test_timer_interrupt_preempts_and_requeues() {
    let (recorded, pid) = running(5);
    let kernel = &recorded.kernel;
    assert_eq!(kernel.step_core(CoreId(0)).unwrap().action, CoreAction::Executed);

    let transitions = kernel.handle_interrupt(pid, InterruptKind::Timer).unwrap();
    let states: Vec<ProcessState> = transitions.iter().map(|t| t.to).collect();
    assert_eq!(
        states,
        vec![
            ProcessState::KernelRunning,
            ProcessState::Preempted,
            ProcessState::ReadyMemory
        ]
    );
    assert_eq!(kernel.ready_queue(), vec![pid]);
    assert_eq!(kernel.preemption_count(), 1);
    assert_eq!(kernel.interrupt_count(InterruptKind::Timer), 1);
    assert_eq!(kernel.saved_context(pid).unwrap().program_counter, 1);
    assert!(kernel.is_core_idle(CoreId(0)).unwrap());
    assert_table_respected(&recorded);
}

#[test]
fn test_device_interrupts_stay_in_kernel() {
    for kind in [
        InterruptKind::IoComplete,
        InterruptKind::PageFault,
        InterruptKind::Hardware,
    ] {
        let (recorded, pid) = running(5);
        let kernel = &recorded.kernel;

        let transitions = kernel.handle_interrupt(pid, kind).unwrap();
        assert_eq!(transitions.len(), 1, "{:?}", kind);
        assert_eq!(state(&recorded, pid), ProcessState::KernelRunning);

        let back = kernel.interrupt_return(pid).unwrap();
        assert_eq!(back[0].reason, "return to user mode");
        assert_eq!(state(&recorded, pid), ProcessState::UserRunning);
        assert_eq!(kernel.preemption_count(), 0);
        assert_eq!(kernel.interrupt_count(kind), 1);
        assert_eq!(kernel.interrupt_count(InterruptKind::Timer), 0);
        assert_table_respected(&recorded);
    }
}

#[test]
fn test_preempt_for_higher_priority() {
    let (recorded, pid) = running(5);
    let kernel = &recorded.kernel;
    kernel.create_process("urgent", 2, 10);

    let transitions = kernel.preempt_for_higher_priority(pid).unwrap();
    assert_eq!(transitions.len(), 2);
    assert_eq!(transitions[0].reason, "higher priority arrival");
    assert_eq!(state(&recorded, pid), ProcessState::ReadyMemory);
    assert!(kernel.is_core_idle(CoreId(0)).unwrap());

    // Only USER_RUNNING can be preempted this way.
    assert!(kernel.preempt_for_higher_priority(pid).unwrap().is_empty());
    assert_table_respected(&recorded);
}

#[test]
fn test_block_wake_and_reschedule() {
    let (recorded, pid) = running(5);
    let kernel = &recorded.kernel;

    kernel.handle_system_call(pid, Syscall::Read.number()).unwrap();
    let blocked = kernel.block_for_io(pid, "tty", "read").unwrap();
    assert_eq!(blocked[0].to, ProcessState::Sleep);
    assert_eq!(kernel.io_waiting_count(), 1);
    assert_eq!(
        kernel.pcb(pid).unwrap().io.waiting_device.as_deref(),
        Some("tty")
    );
    assert!(kernel.ready_queue().is_empty());

    let woken = kernel.wakeup(pid).unwrap();
    assert_eq!(woken[0].to, ProcessState::ReadyMemory);
    assert_eq!(kernel.io_waiting_count(), 0);
    assert_eq!(kernel.ready_queue(), vec![pid]);
    assert!(kernel.pcb(pid).unwrap().io.waiting_device.is_none());

    // Back on the CPU, trap, then give up the CPU voluntarily.
    kernel.step_core(CoreId(0)).unwrap();
    kernel.handle_system_call(pid, Syscall::Write.number()).unwrap();
    let rescheduled = kernel.reschedule(pid).unwrap();
    assert_eq!(rescheduled[0].to, ProcessState::ReadyMemory);
    assert_eq!(rescheduled[0].reason, "rescheduled");
    assert_eq!(kernel.ready_queue(), vec![pid]);
    assert_table_respected(&recorded);
}

#[test]
fn test_forced_exit_from_ready() {
    let recorded = recorded_kernel();
    let kernel = &recorded.kernel;
    let pid = kernel.create_process("doomed", 5, 1).pid;

    let transitions = kernel.exit(pid).unwrap();
    assert_eq!(transitions.len(), 1);
    assert_eq!(transitions[0].from, ProcessState::ReadyMemory);
    assert_eq!(transitions[0].to, ProcessState::Zombie);
    assert!(kernel.ready_queue().is_empty());
    assert_eq!(kernel.completed_count(), 1);
    assert!(kernel.exit(pid).is_err());
}

#[test]
fn test_child_process_waits_for_parent() {
    let recorded = recorded_kernel();
    let kernel = &recorded.kernel;
    let parent = kernel.create_process("shell", 4, 1).pid;
    let child = kernel.fork(&ProcessDescriptor::new("ls", 2, 1), parent);
    assert_eq!(state(&recorded, child), ProcessState::Created);
    assert_eq!(kernel.ready_queue(), vec![parent]);

    assert!(kernel.admit(child).unwrap().is_admitted());
    assert_eq!(kernel.pcb(child).unwrap().parent(), parent);
    assert_eq!(kernel.children(parent), vec![child]);

    tests_scenarios::run_to_completion(kernel, 10);
    // The kernel only reaps its own children.
    assert_eq!(state(&recorded, child), ProcessState::Zombie);
    assert!(kernel.pcb(child).is_some());
    assert!(kernel.pcb(parent).is_none());

    assert!(kernel.wait_for_child(parent, child).unwrap());
    assert!(kernel.pcb(child).is_none());
    assert!(kernel.saved_context(child).is_none());
    assert_eq!(kernel.memory_usage(), 0);
    assert_table_respected(&recorded);
}

#[test]
fn test_sleepers_swapped_out_and_completed() {
    let (recorded, pid) = running(3);
    let kernel = &recorded.kernel;

    kernel.handle_system_call(pid, Syscall::Read.number()).unwrap();
    kernel.block_for_io(pid, "disk", "read").unwrap();
    assert!(kernel.is_waiting_for_io(pid));

    let swapped = kernel.swap_out_sleeping();
    assert_eq!(swapped.len(), 1);
    assert_eq!(swapped[0].to, ProcessState::SleepSwapped);
    assert_eq!(kernel.memory_usage(), 0);
    assert_eq!(kernel.swap_usage(), 1);
    assert!(kernel.swap_out_sleeping().is_empty());

    let completed = kernel.io_complete(pid).unwrap();
    assert_eq!(completed[0].to, ProcessState::ReadySwapped);
    assert!(!kernel.is_waiting_for_io(pid));
    assert_eq!(kernel.io_completed_count(), 1);
    assert_eq!(kernel.ready_queue(), vec![pid]);

    tests_scenarios::run_to_completion(kernel, 10);
    assert_eq!(kernel.completed_count(), 1);
    assert_eq!(kernel.swap_usage(), 0);
    assert_table_respected(&recorded);
}
