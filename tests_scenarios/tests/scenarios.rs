//! Scheduling Scenarios
//!
//! Small fixed workloads with exact expected outcomes.

use core_types::{Pid, Priority, ProcessState};
use sim_kernel::process::{Pcb, Process};
use sim_kernel::scheduler::{PriorityScheduler, RoundRobinScheduler, Scheduler};
use sim_kernel::test_utils::{test_config, test_kernel};
use sim_kernel::{AdmitOutcome, CycleOutcome, SchedulerKind};
use tests_scenarios::{
    broken_chains, execution_order, first_illegal, recorded_kernel, recorded_kernel_with,
    run_to_completion,
};

fn pcb(pid: u32, level: i64) -> Pcb {
    Pcb::new(
        Process::new(Pid(pid), format!("p{}", pid), 4, Priority::clamped(level), 0),
        Pid::KERNEL,
    )
}

/// One process with burst 4 and quantum 2 finishes in two cycles
#[test]
fn test_single_process_two_cycles() {
    let recorded = recorded_kernel_with(test_config().with_time_quantum(2));
    let kernel = &recorded.kernel;
    let handle = kernel.create_process("solo", 4, 1);
    assert_eq!(handle.outcome, AdmitOutcome::Resident);

    let first = kernel.run_cycle();
    assert_eq!(
        first.outcome,
        CycleOutcome::Preempted {
            pid: handle.pid,
            executed: 2,
            remaining: 2
        }
    );
    assert_eq!(kernel.process(handle.pid).unwrap().remaining_time, 2);

    let second = kernel.run_cycle();
    assert_eq!(
        second.outcome,
        CycleOutcome::Terminated {
            pid: handle.pid,
            executed: 2
        }
    );
    assert_eq!(kernel.run_cycle().outcome, CycleOutcome::Idle);

    assert_eq!(kernel.cycle_count(), 2);
    assert_eq!(kernel.simulation_time(), 4);
    assert_eq!(kernel.context_switch_count(), 2);
    assert_eq!(kernel.preemption_count(), 1);

    let summary = kernel.process(handle.pid).unwrap();
    assert_eq!(summary.state, ProcessState::Zombie);
    assert_eq!(summary.remaining_time, 0);
    assert_eq!(summary.turnaround, Some(4));
    assert_eq!(summary.waiting, Some(0));

    let events = recorded.events();
    let states: Vec<ProcessState> = events.iter().map(|e| e.to).collect();
    assert_eq!(
        states,
        vec![
            ProcessState::ReadyMemory,
            ProcessState::KernelRunning,
            ProcessState::UserRunning,
            ProcessState::KernelRunning,
            ProcessState::Preempted,
            ProcessState::ReadyMemory,
            ProcessState::KernelRunning,
            ProcessState::UserRunning,
            ProcessState::KernelRunning,
            ProcessState::Zombie,
        ]
    );
    let ticks: Vec<u64> = events.iter().map(|e| e.tick).collect();
    assert_eq!(ticks, (1..=10).collect::<Vec<u64>>());
    assert!(first_illegal(&events).is_none());
    assert!(broken_chains(&events).is_empty());
}

/// A fourth process finds three memory slots taken and is admitted to swap
#[test]
fn test_fourth_process_goes_to_swap() {
    let recorded = recorded_kernel_with(test_config().with_memory_slots(3));
    let kernel = &recorded.kernel;

    let outcomes: Vec<AdmitOutcome> = ["a", "b", "c", "d"]
        .iter()
        .map(|name| kernel.create_process(name, 4, 3).outcome)
        .collect();
    assert_eq!(
        outcomes,
        vec![
            AdmitOutcome::Resident,
            AdmitOutcome::Resident,
            AdmitOutcome::Resident,
            AdmitOutcome::Swapped
        ]
    );
    assert_eq!(kernel.memory_usage(), 3);
    assert_eq!(kernel.swap_usage(), 1);
    assert_eq!(kernel.ready_queue().len(), 4);

    let swapped = recorded.events_of(Pid(4));
    assert_eq!(swapped.len(), 1);
    assert_eq!(swapped[0].from, ProcessState::Created);
    assert_eq!(swapped[0].to, ProcessState::ReadySwapped);
    assert_eq!(swapped[0].reason, "admitted to swap (memory full)");
    assert!(kernel.pcb(Pid(4)).unwrap().memory.is_none());
}

/// Levels {1, 3, 5} leave the priority scheduler highest first
#[test]
fn test_priority_order_any_insertion() {
    let insertions: [[i64; 3]; 6] = [
        [1, 3, 5],
        [1, 5, 3],
        [3, 1, 5],
        [3, 5, 1],
        [5, 1, 3],
        [5, 3, 1],
    ];
    for order in insertions {
        let mut scheduler = PriorityScheduler::new(2);
        for level in order {
            assert!(scheduler.add_process(&pcb(level as u32, level)));
        }
        let selected: Vec<Pid> = std::iter::from_fn(|| scheduler.select_next()).collect();
        assert_eq!(selected, vec![Pid(5), Pid(3), Pid(1)], "inserted {:?}", order);
    }
}

#[test]
fn test_priority_order_through_the_kernel() {
    let kernel = test_kernel(test_config().with_scheduler(SchedulerKind::Priority));
    kernel.create_process("low", 2, 1);
    kernel.create_process("high", 2, 5);
    kernel.create_process("mid", 2, 3);
    assert_eq!(kernel.ready_queue(), vec![Pid(2), Pid(3), Pid(1)]);

    let outcomes = run_to_completion(&kernel, 10);
    assert_eq!(execution_order(&outcomes), vec![Pid(2), Pid(3), Pid(1)]);
}

/// Bursts 6 and 4 alternate under round robin with quantum 2
#[test]
fn test_round_robin_interleaving() {
    let recorded = recorded_kernel();
    let kernel = &recorded.kernel;
    assert_eq!(kernel.scheduler_kind(), SchedulerKind::RoundRobin);
    let p1 = kernel.create_process("P1", 6, 1).pid;
    let p2 = kernel.create_process("P2", 4, 1).pid;

    let outcomes = run_to_completion(&kernel, 20);
    assert_eq!(execution_order(&outcomes), vec![p1, p2, p1, p2, p1]);
    assert_eq!(
        outcomes[3],
        CycleOutcome::Terminated {
            pid: p2,
            executed: 2
        }
    );
    assert_eq!(
        outcomes[4],
        CycleOutcome::Terminated {
            pid: p1,
            executed: 2
        }
    );

    assert_eq!(kernel.process(p2).unwrap().completion, Some(8));
    assert_eq!(kernel.process(p1).unwrap().completion, Some(10));
    assert_eq!(kernel.average_turnaround(), Some(9.0));
    assert!(first_illegal(&recorded.events()).is_none());
}

#[test]
fn test_round_robin_scheduler_is_fifo() {
    let mut scheduler = RoundRobinScheduler::new(2);
    for pid in [3, 1, 2] {
        scheduler.add_process(&pcb(pid, 10 - pid as i64));
    }
    assert_eq!(scheduler.queued(), vec![Pid(3), Pid(1), Pid(2)]);
    assert_eq!(scheduler.select_next(), Some(Pid(3)));
}

#[test]
fn test_standard_workload_runs_to_completion() {
    let recorded = recorded_kernel();
    let kernel = &recorded.kernel;
    for (name, burst, priority) in [
        ("VSCode", 8, 7),
        ("Chrome", 10, 5),
        ("Terminal", 4, 4),
        ("Spotify", 6, 2),
        ("Calculator", 2, 1),
    ] {
        kernel.create_process(name, burst, priority);
    }
    assert_eq!(kernel.swap_usage(), 2);

    let cycles = kernel.run_simulation(std::time::Duration::ZERO);
    assert_eq!(cycles, 15);
    assert!(kernel.is_complete());
    assert_eq!(kernel.simulation_time(), 30);
    assert_eq!(kernel.completed_count(), 5);
    assert_eq!(kernel.memory_usage(), 0);
    assert_eq!(kernel.swap_usage(), 0);

    let events = recorded.events();
    assert!(first_illegal(&events).is_none());
    assert!(broken_chains(&events).is_empty());
}
