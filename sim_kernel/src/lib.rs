//! # Simulated Kernel
//!
//! This crate models the control logic of an operating-system kernel:
//! process lifecycle, CPU scheduling, context-switch simulation and memory
//! residency under a fixed resident-set limit.
//!
//! ## Purpose
//!
//! The simulated kernel lets an observer step through and log how a
//! scheduler and a memory manager cooperate to run a fixed population of
//! synthetic workloads to completion:
//! - Deterministic (simulation time is a unit counter, not the wall clock)
//! - Inspectable (every state change is emitted as a [`TransitionEvent`])
//! - Shareable (the [`Kernel`] is a monitor usable from several threads)
//!
//! ## Philosophy
//!
//! **One lock, one cycle, one legal path.**
//!
//! Every mutating operation holds the single kernel lock for its full
//! duration. Statistics are republished into atomics after each operation so
//! a monitoring loop can read them without waiting on the scheduling loop.
//! Every state change goes through the transition table; an illegal request
//! is a silent no-op.
//!
//! ## Cycle
//!
//! 1. Select the next pid from the active scheduler (an empty scheduler
//!    makes the cycle a no-op).
//! 2. Swap it in if needed, then dispatch: READY_MEMORY → KERNEL_RUNNING.
//! 3. Return to user mode: KERNEL_RUNNING → USER_RUNNING.
//! 4. Execute `min(quantum, remaining)` units.
//! 5. Finished: exit system call, USER_RUNNING → KERNEL_RUNNING → ZOMBIE.
//! 6. Otherwise: timer interrupt, USER_RUNNING → KERNEL_RUNNING → PREEMPTED
//!    → READY_MEMORY and back into the ready queue.

pub mod config;
pub mod dispatcher;
pub mod error;
pub mod history;
pub mod interrupts;
pub mod io;
pub mod memory;
mod pacing;
pub mod process;
pub mod process_manager;
pub mod scheduler;
pub mod smp;
pub mod stats;
pub mod syscall;
pub mod test_utils;
pub mod timer;

pub use config::{KernelConfig, SchedulerKind, SwapPolicy};
pub use core_types::{CoreId, Pid, Priority, ProcessState, RunId};
use core_types::ProcessEvent;
pub use error::KernelError;
pub use interrupts::InterruptKind;
pub use process::{ContextData, Pcb, Transition, TransitionEvent};
pub use process_manager::{AdmitOutcome, ProcessDescriptor};
pub use smp::{CoreAction, CoreStepResult};
pub use stats::{ProcessSummary, StatsSnapshot};
pub use syscall::Syscall;

use dispatcher::Dispatcher;
use history::HistoryLog;
use interrupts::InterruptHandler;
use io::IoSubsystem;
use memory::{MemoryManager, SwapResult};
use pacing::Pacer;
use process_manager::ProcessManager;
use scheduler::{create_scheduler, Scheduler};
use services_logger::{LogComponent, LogEntry, LogLevel, LogSink, NullLog};
use smp::CoreSlots;
use stats::KernelStats;
use std::io::Write;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use syscall::SyscallHandler;
use timer::SimClock;

/// Core used by the whole-quantum cycle
const CYCLE_CORE: CoreId = CoreId(0);

/// Observer of transition events
///
/// Runs under the kernel lock; it must not call back into the kernel.
pub type StateChangeCallback = Box<dyn FnMut(&TransitionEvent) + Send>;

/// Returned by [`Kernel::create_process`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProcessHandle {
    pub pid: Pid,
    pub outcome: AdmitOutcome,
}

/// What one cycle did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleOutcome {
    /// Nothing was ready; the cycle was not counted
    Idle,
    /// Core 0 holds a process started by the stepping mode
    Busy,
    /// The selected process could not be brought into memory and was requeued
    Deferred { pid: Pid },
    /// The quantum ran out
    Preempted {
        pid: Pid,
        executed: u64,
        remaining: u64,
    },
    /// The process finished
    Terminated { pid: Pid, executed: u64 },
}

/// Returned by [`Kernel::run_cycle`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CycleReport {
    /// Counted cycles so far
    pub cycle: u64,
    pub outcome: CycleOutcome,
    /// A pacing delay was cut short by [`Kernel::stop`]
    pub interrupted: bool,
}

/// The simulated kernel
///
/// Safe to share between a scheduling thread and a monitoring thread
/// (`Arc<Kernel>`).
pub struct Kernel {
    core: Mutex<KernelCore>,
    stats: KernelStats,
    running: AtomicBool,
    interrupt: AtomicBool,
}

/// Everything behind the kernel lock
struct KernelCore {
    config: KernelConfig,
    scheduler: Box<dyn Scheduler>,
    dispatcher: Dispatcher,
    memory: MemoryManager,
    processes: ProcessManager,
    interrupts: InterruptHandler,
    syscalls: SyscallHandler,
    io: IoSubsystem,
    cores: CoreSlots,
    clock: SimClock,
    tick: u64,
    cycle: u64,
    preemptions: u64,
    completed: Vec<ProcessSummary>,
    logger: Box<dyn LogSink + Send>,
    history: Option<HistoryLog>,
    callback: Option<StateChangeCallback>,
}

/// Progress of one execution slice
#[derive(Debug, Clone, Copy)]
struct Slice {
    executed: u64,
    remaining: u64,
    quantum_left: u64,
}

fn lookup(processes: &mut ProcessManager, pid: Pid) -> Result<&mut Pcb, KernelError> {
    processes
        .get_mut(pid)
        .ok_or(KernelError::UnknownProcess(pid))
}

impl Kernel {
    /// Creates a kernel from a validated configuration
    pub fn new(config: KernelConfig) -> Result<Self, KernelError> {
        config.validate()?;
        let core = KernelCore::new(config);
        let stats = KernelStats::new();
        stats.publish(&core.snapshot());
        Ok(Self {
            core: Mutex::new(core),
            stats,
            running: AtomicBool::new(false),
            interrupt: AtomicBool::new(false),
        })
    }

    /// Sets the logging handle
    pub fn with_logger(mut self, logger: Box<dyn LogSink + Send>) -> Self {
        self.core
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner)
            .logger = logger;
        self
    }

    fn lock(&self) -> MutexGuard<'_, KernelCore> {
        self.core.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Runs `op` under the lock, then republishes statistics
    fn with_core<R>(
        &self,
        delay: Duration,
        op: impl FnOnce(&mut KernelCore, &mut Pacer<'_>) -> R,
    ) -> (R, bool) {
        let mut core = self.lock();
        let mut pacer = Pacer::new(delay, &self.interrupt);
        let result = op(&mut *core, &mut pacer);
        self.stats.publish(&core.snapshot());
        (result, pacer.interrupted())
    }

    fn mutate<R>(&self, op: impl FnOnce(&mut KernelCore, &mut Pacer<'_>) -> R) -> R {
        self.with_core(Duration::ZERO, op).0
    }

    // =========================================================================
    // Observers
    // =========================================================================

    /// Registers the transition observer, replacing any previous one
    pub fn set_state_change_callback<F>(&self, callback: F)
    where
        F: FnMut(&TransitionEvent) + Send + 'static,
    {
        self.lock().callback = Some(Box::new(callback));
    }

    /// Appends the history of this run to a file
    pub fn enable_history_logging(&self, path: impl AsRef<Path>) -> Result<RunId, KernelError> {
        let history = HistoryLog::open(path.as_ref());
        self.install_history(history)
    }

    /// Writes the history of this run to any writer
    pub fn enable_history_logging_to(
        &self,
        writer: Box<dyn Write + Send>,
    ) -> Result<RunId, KernelError> {
        self.install_history(HistoryLog::from_writer(writer))
    }

    fn install_history(
        &self,
        history: Result<HistoryLog, KernelError>,
    ) -> Result<RunId, KernelError> {
        let mut core = self.lock();
        match history {
            Ok(history) => {
                let run_id = history.run_id();
                core.log(
                    LogEntry::new(LogLevel::Info, LogComponent::Kernel, "history logging enabled")
                        .with_field("run", run_id),
                );
                core.history = Some(history);
                Ok(run_id)
            }
            Err(err) => {
                core.log(
                    LogEntry::new(LogLevel::Error, LogComponent::Kernel, "history log unavailable")
                        .with_field("error", &err),
                );
                Err(err)
            }
        }
    }

    /// Writes the summary block and closes the history log
    pub fn finish_history(&self) -> Result<(), KernelError> {
        let mut core = self.lock();
        let Some(mut history) = core.history.take() else {
            return Ok(());
        };
        let snapshot = core.snapshot();
        let summaries = core.summaries();
        history.record_summary(&snapshot, &summaries)?;
        history.flush()
    }

    // =========================================================================
    // Process creation
    // =========================================================================

    /// Forks a process under the kernel and admits it
    pub fn create_process(&self, name: &str, burst_time: u64, priority: i64) -> ProcessHandle {
        self.mutate(|core, pacer| {
            let descriptor = ProcessDescriptor::new(name, burst_time, priority);
            let pid = core.fork(&descriptor, Pid::KERNEL);
            let outcome = core.admit(pid, pacer).unwrap_or(AdmitOutcome::Rejected);
            ProcessHandle { pid, outcome }
        })
    }

    /// Forks without admitting; the process stays CREATED
    pub fn fork(&self, descriptor: &ProcessDescriptor, parent: Pid) -> Pid {
        self.mutate(|core, _| core.fork(descriptor, parent))
    }

    /// Admits a CREATED process into memory or swap and queues it
    pub fn admit(&self, pid: Pid) -> Result<AdmitOutcome, KernelError> {
        self.mutate(|core, pacer| core.admit(pid, pacer))
    }

    // =========================================================================
    // Cycle loop
    // =========================================================================

    /// Runs one full cycle without pacing
    pub fn run_cycle(&self) -> CycleReport {
        self.run_cycle_with_delay(Duration::ZERO)
    }

    /// Runs one full cycle, pausing `delay` after each transition
    pub fn run_cycle_with_delay(&self, delay: Duration) -> CycleReport {
        let (outcome, interrupted) = self.with_core(delay, |core, pacer| core.run_cycle(pacer));
        if interrupted {
            self.running.store(false, Ordering::SeqCst);
        }
        CycleReport {
            cycle: self.stats.cycles(),
            outcome,
            interrupted,
        }
    }

    /// Runs cycles until no work remains or [`Kernel::stop`] is called
    ///
    /// Returns the number of counted cycles. The loop also ends when every
    /// queued process was deferred in a row. A [`Kernel::stop`] issued before
    /// the call cancels the run; the pending stop is consumed either way.
    pub fn run_simulation(&self, delay: Duration) -> u64 {
        if self.interrupt.swap(false, Ordering::SeqCst) {
            self.running.store(false, Ordering::SeqCst);
            self.mutate(|core, _| {
                core.log(LogEntry::new(
                    LogLevel::Info,
                    LogComponent::Kernel,
                    "simulation cancelled before start",
                ))
            });
            return 0;
        }
        self.running.store(true, Ordering::SeqCst);

        let mut cycles = 0;
        let mut deferred_streak = 0;
        while self.running.load(Ordering::SeqCst) {
            let report = self.run_cycle_with_delay(delay);
            match report.outcome {
                CycleOutcome::Idle | CycleOutcome::Busy => break,
                CycleOutcome::Deferred { .. } => {
                    cycles += 1;
                    deferred_streak += 1;
                    if deferred_streak > self.stats.ready_queue_len() {
                        self.mutate(|core, _| {
                            core.log(LogEntry::new(
                                LogLevel::Warn,
                                LogComponent::Kernel,
                                "simulation stalled: no process can be brought into memory",
                            ))
                        });
                        break;
                    }
                }
                CycleOutcome::Preempted { .. } | CycleOutcome::Terminated { .. } => {
                    cycles += 1;
                    deferred_streak = 0;
                }
            }
            if report.interrupted {
                break;
            }
        }

        self.running.store(false, Ordering::SeqCst);
        self.interrupt.store(false, Ordering::SeqCst);
        cycles
    }

    /// Stops the run loop and cuts any pacing delay short
    pub fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
        self.interrupt.store(true, Ordering::SeqCst);
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// No queued process and no occupied core
    pub fn is_complete(&self) -> bool {
        let core = self.lock();
        core.scheduler.is_empty() && core.cores.all_idle()
    }

    // =========================================================================
    // Per-core stepping
    // =========================================================================

    /// Advances one core by one time unit
    pub fn step_core(&self, core: CoreId) -> Result<CoreStepResult, KernelError> {
        self.mutate(|kernel, pacer| kernel.step_core(core, pacer))
    }

    /// Process held by a core
    pub fn core_process(&self, core: CoreId) -> Result<Option<Pid>, KernelError> {
        let mut kernel = self.lock();
        let result = kernel.cores.current(core);
        if let Err(err) = &result {
            kernel.log_invalid_core(err);
        }
        result
    }

    pub fn is_core_idle(&self, core: CoreId) -> Result<bool, KernelError> {
        Ok(self.core_process(core)?.is_none())
    }

    /// Quantum units left for the process on a core (0 when idle)
    pub fn core_time_remaining(&self, core: CoreId) -> Result<u64, KernelError> {
        let mut kernel = self.lock();
        let result = kernel.cores.quantum_left(core);
        if let Err(err) = &result {
            kernel.log_invalid_core(err);
        }
        result
    }

    /// Units a core has executed in stepping mode
    pub fn core_ticks(&self, core: CoreId) -> Result<u64, KernelError> {
        let mut kernel = self.lock();
        let result = kernel.cores.ticks(core);
        if let Err(err) = &result {
            kernel.log_invalid_core(err);
        }
        result
    }

    // =========================================================================
    // Scheduler control
    // =========================================================================

    /// Switches policy; queued pids move over in their selection order
    pub fn set_scheduler(&self, kind: SchedulerKind) {
        self.mutate(|core, _| core.set_scheduler(kind));
    }

    pub fn scheduler_kind(&self) -> SchedulerKind {
        self.lock().scheduler.kind()
    }

    /// Display name of the active policy
    pub fn scheduler_name(&self) -> &'static str {
        self.lock().scheduler.name()
    }

    /// Queued pids in selection order
    pub fn ready_queue(&self) -> Vec<Pid> {
        self.lock().scheduler.queued()
    }

    /// Re-prioritizes a process (clamped into 1..=10)
    ///
    /// Returns whether a queued entry moved.
    pub fn change_priority(&self, pid: Pid, priority: i64) -> Result<bool, KernelError> {
        self.mutate(|core, _| core.change_priority(pid, priority))
    }

    /// Queues a ready process that is not yet queued
    pub fn enqueue_ready(&self, pid: Pid) -> Result<bool, KernelError> {
        self.mutate(|core, _| {
            let pcb = lookup(&mut core.processes, pid)?;
            Ok(core.scheduler.add_process(pcb))
        })
    }

    // =========================================================================
    // Interrupts, system calls and I/O
    // =========================================================================

    /// Executes system call `number` for a user-mode process
    pub fn handle_system_call(&self, pid: Pid, number: u32) -> Result<Vec<Transition>, KernelError> {
        self.mutate(|core, pacer| core.handle_system_call(pid, number, pacer))
    }

    /// Raises an interrupt while `pid` is in user mode
    pub fn handle_interrupt(
        &self,
        pid: Pid,
        kind: InterruptKind,
    ) -> Result<Vec<Transition>, KernelError> {
        self.mutate(|core, pacer| core.handle_interrupt(pid, kind, pacer))
    }

    /// Quantum exhaustion for a user-mode process
    pub fn time_quantum_expired(&self, pid: Pid) -> Result<Vec<Transition>, KernelError> {
        self.handle_interrupt(pid, InterruptKind::Timer)
    }

    /// KERNEL_RUNNING → USER_RUNNING, or ZOMBIE → KERNEL_RUNNING
    pub fn interrupt_return(&self, pid: Pid) -> Result<Vec<Transition>, KernelError> {
        self.mutate(|core, pacer| {
            let pcb = lookup(&mut core.processes, pid)?;
            let transition = core.interrupts.interrupt_return(pcb);
            Ok(core.emit_all(transition, pacer))
        })
    }

    /// Preempts the running process in favor of a higher-priority arrival
    pub fn preempt_for_higher_priority(&self, pid: Pid) -> Result<Vec<Transition>, KernelError> {
        self.mutate(|core, pacer| core.preempt_for_higher_priority(pid, pacer))
    }

    /// KERNEL_RUNNING → USER_RUNNING after a system call
    pub fn return_to_user(&self, pid: Pid) -> Result<Vec<Transition>, KernelError> {
        self.mutate(|core, pacer| {
            let pcb = lookup(&mut core.processes, pid)?;
            let transition = core.syscalls.return_from_syscall(pcb);
            Ok(core.emit_all(transition, pacer))
        })
    }

    /// KERNEL_RUNNING → SLEEP waiting on a device
    pub fn block_for_io(
        &self,
        pid: Pid,
        device: &str,
        operation: &str,
    ) -> Result<Vec<Transition>, KernelError> {
        self.mutate(|core, pacer| core.block_for_io(pid, device, operation, pacer))
    }

    /// Device completion: wakes and queues the sleeper
    pub fn io_complete(&self, pid: Pid) -> Result<Vec<Transition>, KernelError> {
        self.mutate(|core, pacer| core.io_complete(pid, pacer))
    }

    /// SLEEP → READY_MEMORY or SLEEP_SWAPPED → READY_SWAPPED without a request
    pub fn wakeup(&self, pid: Pid) -> Result<Vec<Transition>, KernelError> {
        self.mutate(|core, pacer| core.wakeup(pid, pacer))
    }

    /// KERNEL_RUNNING or PREEMPTED → READY_MEMORY, then queued
    pub fn reschedule(&self, pid: Pid) -> Result<Vec<Transition>, KernelError> {
        self.mutate(|core, pacer| core.reschedule(pid, pacer))
    }

    /// PREEMPTED → USER_RUNNING
    pub fn dispatch_preempted(&self, pid: Pid) -> Result<Vec<Transition>, KernelError> {
        self.mutate(|core, pacer| {
            let pcb = lookup(&mut core.processes, pid)?;
            let transition = pcb.apply(
                ProcessEvent::ReturnToUser,
                "resumed after preemption",
            );
            if transition.is_some() {
                core.scheduler.remove(pid);
            }
            Ok(core.emit_all(transition, pacer))
        })
    }

    /// Forces a process to ZOMBIE
    pub fn exit(&self, pid: Pid) -> Result<Vec<Transition>, KernelError> {
        self.mutate(|core, pacer| {
            if !core.processes.contains(pid) {
                return Err(KernelError::UnknownProcess(pid));
            }
            let transition = core.processes.exit(pid);
            let emitted = core.emit_all(transition, pacer);
            if !emitted.is_empty() {
                core.finish_exit(pid);
            }
            Ok(emitted)
        })
    }

    /// Live processes forked by `parent`
    pub fn children(&self, parent: Pid) -> Vec<Pid> {
        self.lock().processes.children_of(parent)
    }

    /// Reaps a zombie child; returns whether it was destroyed
    pub fn wait_for_child(&self, parent: Pid, child: Pid) -> Result<bool, KernelError> {
        self.mutate(|core, _| Ok(core.reap(parent, child)))
    }

    // =========================================================================
    // Memory
    // =========================================================================

    /// READY_MEMORY → READY_SWAPPED or SLEEP → SLEEP_SWAPPED
    pub fn swap_out(&self, pid: Pid) -> Result<Vec<Transition>, KernelError> {
        self.mutate(|core, pacer| {
            let pcb = lookup(&mut core.processes, pid)?;
            if !pcb.state().is_evictable() {
                return Ok(Vec::new());
            }
            let result = core.memory.swap_out(pcb, "swapped out");
            core.log_swap(pid, result, "swapped out");
            Ok(core.emit_all(result.transition, pacer))
        })
    }

    /// READY_SWAPPED → READY_MEMORY or SLEEP_SWAPPED → SLEEP
    pub fn swap_in(&self, pid: Pid) -> Result<Vec<Transition>, KernelError> {
        self.mutate(|core, pacer| {
            let pcb = lookup(&mut core.processes, pid)?;
            let result = core.memory.swap_in(pcb, "swapped in");
            core.log_swap(pid, result, "swapped in");
            Ok(core.emit_all(result.transition, pacer))
        })
    }

    /// Swaps every resident process blocked on I/O out to swap
    pub fn swap_out_sleeping(&self) -> Vec<Transition> {
        self.mutate(|core, pacer| {
            let transitions = core
                .io
                .swap_out_sleeping(&mut core.processes, &mut core.memory);
            for transition in &transitions {
                core.log(
                    LogEntry::new(LogLevel::Info, LogComponent::Memory, "sleeping process swapped out")
                        .with_source(transition.pid)
                        .with_field("memory", core.memory.memory_usage())
                        .with_field("swap", core.memory.swap_usage()),
                );
            }
            core.emit_all(transitions, pacer)
        })
    }

    // =========================================================================
    // Statistics (lock-free, possibly one operation stale)
    // =========================================================================

    /// Simulation time in units
    pub fn simulation_time(&self) -> u64 {
        self.stats.simulation_time()
    }

    pub fn cycle_count(&self) -> u64 {
        self.stats.cycles()
    }

    pub fn tick_count(&self) -> u64 {
        self.stats.ticks()
    }

    pub fn context_switch_count(&self) -> u64 {
        self.stats.context_switches()
    }

    /// Wall time per context switch
    pub fn average_dispatch_time(&self) -> Duration {
        self.stats.average_dispatch_time()
    }

    pub fn preemption_count(&self) -> u64 {
        self.stats.preemptions()
    }

    /// Occupied memory slots
    pub fn memory_usage(&self) -> usize {
        self.stats.memory_usage()
    }

    pub fn memory_capacity(&self) -> usize {
        self.stats.memory_capacity()
    }

    /// Pids in swap
    pub fn swap_usage(&self) -> usize {
        self.stats.swap_usage()
    }

    pub fn ready_queue_len(&self) -> usize {
        self.stats.ready_queue_len()
    }

    /// Live (not yet reaped) processes
    pub fn process_count(&self) -> usize {
        self.stats.process_count()
    }

    pub fn completed_count(&self) -> usize {
        self.stats.completed()
    }

    /// Every counter at once
    pub fn stats(&self) -> StatsSnapshot {
        self.stats.snapshot()
    }

    // =========================================================================
    // Process inspection (locked)
    // =========================================================================

    /// Live and completed processes in pid order
    pub fn process_summaries(&self) -> Vec<ProcessSummary> {
        self.lock().summaries()
    }

    pub fn process(&self, pid: Pid) -> Option<ProcessSummary> {
        self.lock().summary(pid)
    }

    /// Copy of a live PCB
    pub fn pcb(&self, pid: Pid) -> Option<Pcb> {
        self.lock().processes.get(pid).cloned()
    }

    /// Mean turnaround of completed processes
    pub fn average_turnaround(&self) -> Option<f64> {
        let core = self.lock();
        let turnarounds: Vec<u64> = core.completed.iter().filter_map(|p| p.turnaround).collect();
        if turnarounds.is_empty() {
            return None;
        }
        Some(turnarounds.iter().sum::<u64>() as f64 / turnarounds.len() as f64)
    }

    /// Resident pids, least recently used first
    pub fn lru_order(&self) -> Vec<Pid> {
        self.lock().memory.lru_order()
    }

    /// Processes blocked on I/O
    pub fn io_waiting_count(&self) -> usize {
        self.lock().io.waiting_count()
    }

    /// Whether `pid` has an outstanding I/O request
    pub fn is_waiting_for_io(&self, pid: Pid) -> bool {
        self.lock().io.is_waiting(pid)
    }

    /// I/O requests completed so far
    pub fn io_completed_count(&self) -> u64 {
        self.lock().io.completed_count()
    }

    /// Interrupts of one kind handled so far
    pub fn interrupt_count(&self, kind: InterruptKind) -> u64 {
        self.lock().interrupts.handled(kind)
    }

    /// Context the dispatcher last saved for `pid`
    pub fn saved_context(&self, pid: Pid) -> Option<ContextData> {
        self.lock().dispatcher.saved_context(pid).copied()
    }
}

impl KernelCore {
    fn new(config: KernelConfig) -> Self {
        Self {
            scheduler: create_scheduler(config.scheduler, config.time_quantum),
            dispatcher: Dispatcher::new(config.core_count, config.context_switch_cost()),
            memory: MemoryManager::new(config.memory_slots, config.swap_slots),
            processes: ProcessManager::new(),
            interrupts: InterruptHandler::new(),
            syscalls: SyscallHandler::new(),
            io: IoSubsystem::new(),
            cores: CoreSlots::new(config.core_count),
            clock: SimClock::new(),
            tick: 0,
            cycle: 0,
            preemptions: 0,
            completed: Vec::new(),
            logger: Box::new(NullLog),
            history: None,
            callback: None,
            config,
        }
    }

    fn log(&mut self, entry: LogEntry) {
        self.logger.log(entry);
    }

    fn log_invalid_core(&mut self, err: &KernelError) {
        self.log(
            LogEntry::new(LogLevel::Error, LogComponent::Kernel, "invalid core")
                .with_field("error", err),
        );
    }

    fn log_swap(&mut self, pid: Pid, result: SwapResult, message: &str) {
        if result.moved {
            self.log(
                LogEntry::new(LogLevel::Info, LogComponent::Memory, message)
                    .with_source(pid)
                    .with_field("memory", self.memory.memory_usage())
                    .with_field("swap", self.memory.swap_usage()),
            );
        }
    }

    fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            simulation_time: self.clock.now(),
            cycles: self.cycle,
            ticks: self.tick,
            context_switches: self.dispatcher.context_switch_count(),
            average_dispatch_time: self.dispatcher.average_dispatch_time(),
            preemptions: self.preemptions,
            memory_usage: self.memory.memory_usage(),
            memory_capacity: self.memory.total(),
            swap_usage: self.memory.swap_usage(),
            ready_queue_len: self.scheduler.size(),
            process_count: self.processes.len(),
            completed: self.completed.len(),
        }
    }

    fn summaries(&self) -> Vec<ProcessSummary> {
        let mut summaries: Vec<ProcessSummary> = self
            .processes
            .iter()
            .map(|pcb| ProcessSummary::from(pcb.process()))
            .collect();
        summaries.extend(
            self.completed
                .iter()
                .filter(|p| !self.processes.contains(p.pid))
                .cloned(),
        );
        summaries.sort_by_key(|p| p.pid);
        summaries
    }

    fn summary(&self, pid: Pid) -> Option<ProcessSummary> {
        match self.processes.get(pid) {
            Some(pcb) => Some(ProcessSummary::from(pcb.process())),
            None => self.completed.iter().find(|p| p.pid == pid).cloned(),
        }
    }

    // -------------------------------------------------------------------------
    // Transition emission
    // -------------------------------------------------------------------------

    fn emit(&mut self, transition: Transition, pacer: &mut Pacer<'_>) {
        self.tick += 1;
        let name = self
            .processes
            .get(transition.pid)
            .map(|pcb| pcb.process().name().to_string())
            .unwrap_or_default();
        let event = TransitionEvent {
            tick: self.tick,
            pid: transition.pid,
            name,
            from: transition.from,
            to: transition.to,
            reason: transition.reason.to_string(),
        };

        self.log(
            LogEntry::new(LogLevel::Debug, LogComponent::Process, "state transition")
                .with_source(transition.pid)
                .with_field("tick", event.tick)
                .with_field("from", transition.from)
                .with_field("to", transition.to)
                .with_field("reason", transition.reason),
        );
        self.write_history(|history| history.record_transition(&event));
        if let Some(callback) = self.callback.as_mut() {
            callback(&event);
        }
        pacer.pause();
    }

    fn emit_all(
        &mut self,
        transitions: impl IntoIterator<Item = Transition>,
        pacer: &mut Pacer<'_>,
    ) -> Vec<Transition> {
        let transitions: Vec<Transition> = transitions.into_iter().collect();
        for transition in &transitions {
            self.emit(*transition, pacer);
        }
        transitions
    }

    fn write_history<F>(&mut self, write: F)
    where
        F: FnOnce(&mut HistoryLog) -> Result<(), KernelError>,
    {
        let Some(history) = self.history.as_mut() else {
            return;
        };
        if let Err(err) = write(history) {
            self.history = None;
            self.log(
                LogEntry::new(LogLevel::Error, LogComponent::Kernel, "history log write failed")
                    .with_field("error", err),
            );
        }
    }

    fn snapshot_history_if_due(&mut self) {
        let every = self.config.snapshot_every;
        if self.history.is_none() || every == 0 || self.cycle % every != 0 {
            return;
        }
        let (cycle, time, summaries) = (self.cycle, self.clock.now(), self.summaries());
        self.write_history(|history| history.record_snapshot(cycle, time, &summaries));
    }

    // -------------------------------------------------------------------------
    // Lifecycle
    // -------------------------------------------------------------------------

    fn fork(&mut self, descriptor: &ProcessDescriptor, parent: Pid) -> Pid {
        let pid = self.processes.fork(descriptor, parent, self.clock.now());
        if let Some(pcb) = self.processes.get(pid) {
            self.dispatcher.register_process(pcb);
        }
        self.log(
            LogEntry::new(LogLevel::Info, LogComponent::Process, "process created")
                .with_source(pid)
                .with_field("name", &descriptor.name)
                .with_field("burst", descriptor.burst_time)
                .with_field("priority", Priority::clamped(descriptor.priority))
                .with_field("parent", parent),
        );
        pid
    }

    fn admit(&mut self, pid: Pid, pacer: &mut Pacer<'_>) -> Result<AdmitOutcome, KernelError> {
        if !self.processes.contains(pid) {
            return Err(KernelError::UnknownProcess(pid));
        }
        let admission = self
            .processes
            .admit(pid, &mut self.memory, self.config.swap_policy);

        if let Some(victim) = admission.evicted {
            self.log(
                LogEntry::new(LogLevel::Info, LogComponent::Memory, "evicted to swap")
                    .with_source(victim)
                    .with_field("for", pid),
            );
        }
        self.emit_all(admission.transitions, pacer);

        match admission.outcome {
            AdmitOutcome::Resident | AdmitOutcome::Swapped => {
                let queued = self
                    .processes
                    .get(pid)
                    .map(|pcb| self.scheduler.add_process(pcb))
                    .unwrap_or(false);
                let level = if queued { LogLevel::Info } else { LogLevel::Warn };
                let message = if queued {
                    "process admitted"
                } else {
                    "process admitted but not queued"
                };
                self.log(
                    LogEntry::new(level, LogComponent::Memory, message)
                        .with_source(pid)
                        .with_field("outcome", format!("{:?}", admission.outcome))
                        .with_field("memory", self.memory.memory_usage())
                        .with_field("swap", self.memory.swap_usage()),
                );
            }
            AdmitOutcome::Exhausted => {
                self.log(
                    LogEntry::new(LogLevel::Warn, LogComponent::Memory, "failed to admit")
                        .with_source(pid)
                        .with_field("memory", self.memory.memory_usage())
                        .with_field("swap", self.memory.swap_usage()),
                );
            }
            AdmitOutcome::Rejected => {
                self.log(
                    LogEntry::new(LogLevel::Debug, LogComponent::Memory, "admission ignored")
                        .with_source(pid),
                );
            }
        }
        Ok(admission.outcome)
    }

    /// Bookkeeping once a process has reached ZOMBIE
    fn finish_exit(&mut self, pid: Pid) {
        let now = self.clock.now();
        self.scheduler.remove(pid);
        self.cores.release_pid(pid);
        self.dispatcher.release_pid(pid);
        self.io.forget(pid);

        let Some(pcb) = self.processes.get_mut(pid) else {
            return;
        };
        let parent = pcb.parent();
        let summary = pcb
            .process_mut()
            .mark_completed(now)
            .then(|| ProcessSummary::from(pcb.process()));

        if let Some(summary) = summary {
            self.log(
                LogEntry::new(LogLevel::Info, LogComponent::Process, "process terminated")
                    .with_source(pid)
                    .with_field("time", now)
                    .with_field("turnaround", summary.turnaround.unwrap_or(0))
                    .with_field("waiting", summary.waiting.unwrap_or(0)),
            );
            self.completed.push(summary);
        }

        if self.config.auto_reap && parent == Pid::KERNEL {
            self.reap(Pid::KERNEL, pid);
        }
    }

    fn reap(&mut self, parent: Pid, child: Pid) -> bool {
        if self
            .processes
            .wait(parent, child, &mut self.memory)
            .is_none()
        {
            return false;
        }
        self.dispatcher.unregister_process(child);
        self.io.forget(child);
        self.log(
            LogEntry::new(LogLevel::Debug, LogComponent::Process, "process reaped")
                .with_source(child)
                .with_field("parent", parent),
        );
        true
    }

    fn change_priority(&mut self, pid: Pid, priority: i64) -> Result<bool, KernelError> {
        let priority = Priority::clamped(priority);
        let pcb = lookup(&mut self.processes, pid)?;
        pcb.set_priority(priority);
        let moved = self.scheduler.change_priority(pid, priority);
        self.log(
            LogEntry::new(LogLevel::Info, LogComponent::Scheduler, "priority changed")
                .with_source(pid)
                .with_field("priority", priority)
                .with_field("requeued", moved),
        );
        Ok(moved)
    }

    fn set_scheduler(&mut self, kind: SchedulerKind) {
        let queued = self.scheduler.drain();
        let mut scheduler = create_scheduler(kind, self.config.time_quantum);
        for pid in &queued {
            if let Some(pcb) = self.processes.get(*pid) {
                scheduler.add_process(pcb);
            }
        }
        self.scheduler = scheduler;
        self.config.scheduler = kind;
        self.log(
            LogEntry::new(LogLevel::Info, LogComponent::Scheduler, "scheduler changed")
                .with_field("scheduler", self.scheduler.name())
                .with_field("migrated", queued.len()),
        );
    }

    // -------------------------------------------------------------------------
    // Cycle
    // -------------------------------------------------------------------------

    fn run_cycle(&mut self, pacer: &mut Pacer<'_>) -> CycleOutcome {
        if matches!(self.cores.current(CYCLE_CORE), Ok(Some(_))) {
            return CycleOutcome::Busy;
        }
        let Some(pid) = self.select_ready() else {
            self.log(LogEntry::new(
                LogLevel::Debug,
                LogComponent::Scheduler,
                "no process ready to run",
            ));
            return CycleOutcome::Idle;
        };

        self.cycle += 1;
        self.log(
            LogEntry::new(LogLevel::Info, LogComponent::Scheduler, "process selected")
                .with_source(pid)
                .with_field("cycle", self.cycle)
                .with_field("time", self.clock.now())
                .with_field("scheduler", self.scheduler.name()),
        );

        let outcome = self.run_selected(pid, pacer);
        self.snapshot_history_if_due();
        outcome
    }

    fn run_selected(&mut self, pid: Pid, pacer: &mut Pacer<'_>) -> CycleOutcome {
        if !self.ensure_resident(pid, pacer) {
            self.defer(pid);
            return CycleOutcome::Deferred { pid };
        }
        self.memory.touch(pid);
        if let Err(err) = self.dispatch_on(CYCLE_CORE, pid, pacer) {
            self.log_invalid_core(&err);
            self.defer(pid);
            return CycleOutcome::Deferred { pid };
        }

        let quantum = self.scheduler.time_quantum();
        let slice = self.execute_slice(CYCLE_CORE, pid, quantum);
        if slice.remaining == 0 {
            self.terminate(pid, pacer);
            CycleOutcome::Terminated {
                pid,
                executed: slice.executed,
            }
        } else {
            self.preempt_on_timer(CYCLE_CORE, pid, pacer);
            CycleOutcome::Preempted {
                pid,
                executed: slice.executed,
                remaining: slice.remaining,
            }
        }
    }

    fn defer(&mut self, pid: Pid) {
        if let Some(pcb) = self.processes.get(pid) {
            self.scheduler.requeue(pcb);
        }
        self.log(
            LogEntry::new(LogLevel::Warn, LogComponent::Memory, "no memory for process, deferred")
                .with_source(pid),
        );
    }

    /// Next queued pid that is still ready
    fn select_ready(&mut self) -> Option<Pid> {
        while let Some(pid) = self.scheduler.select_next() {
            match self.processes.get(pid).map(Pcb::state) {
                Some(ProcessState::ReadyMemory | ProcessState::ReadySwapped) => return Some(pid),
                state => self.log(
                    LogEntry::new(LogLevel::Warn, LogComponent::Scheduler, "dropped stale entry")
                        .with_source(pid)
                        .with_field("state", format!("{:?}", state)),
                ),
            }
        }
        None
    }

    /// Makes sure `pid` holds a slot, evicting the LRU victim if needed
    fn ensure_resident(&mut self, pid: Pid, pacer: &mut Pacer<'_>) -> bool {
        match self.processes.get(pid).map(Pcb::state) {
            Some(ProcessState::ReadyMemory) => return true,
            Some(ProcessState::ReadySwapped) => {}
            _ => return false,
        }

        if !self.memory.has_available_memory() {
            let processes = &self.processes;
            let victim = self.memory.lru_victim(|candidate| {
                candidate != pid
                    && processes
                        .get(candidate)
                        .map(|pcb| pcb.state().is_evictable())
                        .unwrap_or(false)
            });
            let Some(victim) = victim else {
                return false;
            };
            let result = match self.processes.get_mut(victim) {
                Some(pcb) => self.memory.swap_out(pcb, "evicted (least recently used)"),
                None => SwapResult::default(),
            };
            if !result.moved {
                return false;
            }
            self.log_swap(victim, result, "evicted to swap");
            self.emit_all(result.transition, pacer);
        }

        let result = match self.processes.get_mut(pid) {
            Some(pcb) => self.memory.swap_in(pcb, "swapped in for dispatch"),
            None => return false,
        };
        self.log_swap(pid, result, "swapped in");
        self.emit_all(result.transition, pacer);
        result.moved
    }

    /// Dispatch plus return to user mode
    fn dispatch_on(
        &mut self,
        core: CoreId,
        pid: Pid,
        pacer: &mut Pacer<'_>,
    ) -> Result<(), KernelError> {
        let now = self.clock.now();
        let pcb = lookup(&mut self.processes, pid)?;
        let record = self.dispatcher.dispatch(core, pcb, None)?;
        pcb.accounting.last_scheduled = Some(now);

        self.log(
            LogEntry::new(LogLevel::Info, LogComponent::Dispatcher, "context switch")
                .with_source(pid)
                .with_field("core", core)
                .with_field("switches", self.dispatcher.context_switch_count())
                .with_field("elapsed_us", record.elapsed.as_micros()),
        );
        self.emit_all(record.transitions, pacer);

        let pcb = lookup(&mut self.processes, pid)?;
        let transition = self.interrupts.interrupt_return(pcb);
        self.emit_all(transition, pacer);
        Ok(())
    }

    fn execute_slice(&mut self, core: CoreId, pid: Pid, units: u64) -> Slice {
        let Some(pcb) = self.processes.get_mut(pid) else {
            return Slice {
                executed: 0,
                remaining: 0,
                quantum_left: 0,
            };
        };
        let executed = pcb.process_mut().execute(units);
        pcb.accounting.cpu_time += executed;
        pcb.context.program_counter += executed;
        let remaining = pcb.process().remaining_time();
        let name = pcb.process().name().to_string();

        self.clock.advance(executed);
        let quantum_left = self.cores.consume(core, executed).unwrap_or(0);

        self.log(
            LogEntry::new(LogLevel::Info, LogComponent::Process, "executed")
                .with_source(pid)
                .with_field("core", core)
                .with_field("executed", executed)
                .with_field("remaining", remaining)
                .with_field("time", self.clock.now()),
        );
        let tick = self.tick;
        self.write_history(|history| history.record_execution(tick, &name, executed, remaining));

        Slice {
            executed,
            remaining,
            quantum_left,
        }
    }

    /// Exit system call for a finished process; false if it was not in user mode
    fn terminate(&mut self, pid: Pid, pacer: &mut Pacer<'_>) -> bool {
        let transitions = match self.processes.get_mut(pid) {
            Some(pcb) => self.syscalls.handle_syscall(pcb, Syscall::Exit.number()),
            None => Vec::new(),
        };
        let emitted = self.emit_all(transitions, pacer);
        let exited = self
            .processes
            .get(pid)
            .map(|pcb| pcb.state().is_terminal())
            .unwrap_or(false);
        if exited && !emitted.is_empty() {
            self.finish_exit(pid);
        }
        exited
    }

    /// Timer interrupt at quantum expiry; false if it was not in user mode
    fn preempt_on_timer(&mut self, core: CoreId, pid: Pid, pacer: &mut Pacer<'_>) -> bool {
        let transitions = match self.processes.get_mut(pid) {
            Some(pcb) => {
                self.dispatcher.save_context(pcb);
                self.interrupts
                    .time_quantum_expired(pcb, &mut *self.scheduler)
            }
            None => Vec::new(),
        };
        if transitions.is_empty() {
            return false;
        }
        self.preemptions += 1;
        self.cores.release_pid(pid);
        self.dispatcher.release_pid(pid);
        self.log(
            LogEntry::new(LogLevel::Info, LogComponent::Scheduler, "quantum expired")
                .with_source(pid)
                .with_field("core", core)
                .with_field("queued", self.scheduler.size()),
        );
        self.emit_all(transitions, pacer);
        true
    }

    /// Brings a core's holder back to user mode before it executes
    ///
    /// A holder left in KERNEL_RUNNING by a trap returns to user mode. A
    /// holder in any other state has left the CPU; the core is cleared.
    fn resume_holder(&mut self, core: CoreId, pid: Pid, pacer: &mut Pacer<'_>) -> bool {
        let transition = match self.processes.get_mut(pid) {
            Some(pcb) if pcb.state() == ProcessState::UserRunning => return true,
            Some(pcb) if pcb.state() == ProcessState::KernelRunning => {
                self.interrupts.interrupt_return(pcb)
            }
            _ => None,
        };
        if transition.is_some() {
            self.emit_all(transition, pacer);
            return true;
        }

        self.cores.release_pid(pid);
        self.dispatcher.release_pid(pid);
        self.log(
            LogEntry::new(LogLevel::Warn, LogComponent::Dispatcher, "released stale core holder")
                .with_source(pid)
                .with_field("core", core),
        );
        false
    }

    fn step_core(
        &mut self,
        core: CoreId,
        pacer: &mut Pacer<'_>,
    ) -> Result<CoreStepResult, KernelError> {
        let current = match self.cores.current(core) {
            Ok(current) => current,
            Err(err) => {
                self.log_invalid_core(&err);
                return Err(err);
            }
        };

        let Some(pid) = current else {
            let Some(pid) = self.select_ready() else {
                return Ok(CoreStepResult::idle(core));
            };
            if !self.ensure_resident(pid, pacer) {
                self.defer(pid);
                return Ok(CoreStepResult::idle(core));
            }
            self.memory.touch(pid);
            self.dispatch_on(core, pid, pacer)?;
            self.cores.assign(core, pid, self.scheduler.time_quantum())?;
            let remaining = self
                .processes
                .get(pid)
                .map(|pcb| pcb.process().remaining_time())
                .unwrap_or(0);
            return Ok(CoreStepResult {
                core,
                action: CoreAction::Dispatched,
                pid: Some(pid),
                executed: 0,
                remaining,
            });
        };

        if !self.resume_holder(core, pid, pacer) {
            return Ok(CoreStepResult::idle(core));
        }
        let slice = self.execute_slice(core, pid, 1);
        let action = if slice.remaining == 0 && self.terminate(pid, pacer) {
            CoreAction::Terminated
        } else if slice.quantum_left == 0 && self.preempt_on_timer(core, pid, pacer) {
            CoreAction::Preempted
        } else {
            CoreAction::Executed
        };
        Ok(CoreStepResult {
            core,
            action,
            pid: Some(pid),
            executed: slice.executed,
            remaining: slice.remaining,
        })
    }

    // -------------------------------------------------------------------------
    // Handlers
    // -------------------------------------------------------------------------

    fn handle_system_call(
        &mut self,
        pid: Pid,
        number: u32,
        pacer: &mut Pacer<'_>,
    ) -> Result<Vec<Transition>, KernelError> {
        let pcb = lookup(&mut self.processes, pid)?;
        let transitions = self.syscalls.handle_syscall(pcb, number);
        let exited = pcb.state().is_terminal();
        self.log(
            LogEntry::new(LogLevel::Info, LogComponent::Process, "system call")
                .with_source(pid)
                .with_field("number", number)
                .with_field("handled", !transitions.is_empty()),
        );
        let emitted = self.emit_all(transitions, pacer);
        if exited && !emitted.is_empty() {
            self.finish_exit(pid);
        }
        Ok(emitted)
    }

    fn handle_interrupt(
        &mut self,
        pid: Pid,
        kind: InterruptKind,
        pacer: &mut Pacer<'_>,
    ) -> Result<Vec<Transition>, KernelError> {
        let pcb = lookup(&mut self.processes, pid)?;
        if kind == InterruptKind::Timer {
            self.dispatcher.save_context(pcb);
        }
        let transitions = self
            .interrupts
            .handle_interrupt(pcb, kind, &mut *self.scheduler);
        if kind == InterruptKind::Timer && !transitions.is_empty() {
            self.preemptions += 1;
            self.cores.release_pid(pid);
            self.dispatcher.release_pid(pid);
        }
        self.log(
            LogEntry::new(LogLevel::Info, LogComponent::Kernel, "interrupt")
                .with_source(pid)
                .with_field("kind", kind)
                .with_field("handled", !transitions.is_empty()),
        );
        Ok(self.emit_all(transitions, pacer))
    }

    fn preempt_for_higher_priority(
        &mut self,
        pid: Pid,
        pacer: &mut Pacer<'_>,
    ) -> Result<Vec<Transition>, KernelError> {
        let pcb = lookup(&mut self.processes, pid)?;
        self.dispatcher.save_context(pcb);
        let transitions = self
            .interrupts
            .preempt_for_higher_priority(pcb, &mut *self.scheduler);
        if !transitions.is_empty() {
            self.preemptions += 1;
            self.cores.release_pid(pid);
            self.dispatcher.release_pid(pid);
            self.log(
                LogEntry::new(LogLevel::Info, LogComponent::Scheduler, "preempted for higher priority")
                    .with_source(pid),
            );
        }
        Ok(self.emit_all(transitions, pacer))
    }

    fn block_for_io(
        &mut self,
        pid: Pid,
        device: &str,
        operation: &str,
        pacer: &mut Pacer<'_>,
    ) -> Result<Vec<Transition>, KernelError> {
        let now = self.clock.now();
        let pcb = lookup(&mut self.processes, pid)?;
        let transition = self.io.block_for_io(pcb, device, operation, now);
        if transition.is_some() {
            self.dispatcher.save_context(pcb);
            self.cores.release_pid(pid);
            self.dispatcher.release_pid(pid);
            self.log(
                LogEntry::new(LogLevel::Info, LogComponent::Io, "blocked for i/o")
                    .with_source(pid)
                    .with_field("device", device)
                    .with_field("operation", operation),
            );
        }
        Ok(self.emit_all(transition, pacer))
    }

    fn io_complete(
        &mut self,
        pid: Pid,
        pacer: &mut Pacer<'_>,
    ) -> Result<Vec<Transition>, KernelError> {
        let pcb = lookup(&mut self.processes, pid)?;
        let transition = self.io.io_complete(pcb);
        if transition.is_some() {
            self.scheduler.add_process(pcb);
            self.log(LogEntry::new(LogLevel::Info, LogComponent::Io, "i/o complete").with_source(pid));
        }
        Ok(self.emit_all(transition, pacer))
    }

    fn wakeup(&mut self, pid: Pid, pacer: &mut Pacer<'_>) -> Result<Vec<Transition>, KernelError> {
        let pcb = lookup(&mut self.processes, pid)?;
        let transition = pcb.apply(ProcessEvent::Wakeup, "woken up");
        if transition.is_some() {
            pcb.io.waiting_device = None;
            self.scheduler.add_process(pcb);
            self.io.forget(pid);
        }
        Ok(self.emit_all(transition, pacer))
    }

    fn reschedule(
        &mut self,
        pid: Pid,
        pacer: &mut Pacer<'_>,
    ) -> Result<Vec<Transition>, KernelError> {
        let pcb = lookup(&mut self.processes, pid)?;
        let transition = pcb.apply(ProcessEvent::Requeue, "rescheduled");
        if transition.is_some() {
            self.dispatcher.save_context(pcb);
            self.scheduler.requeue(pcb);
            self.cores.release_pid(pid);
            self.dispatcher.release_pid(pid);
        }
        Ok(self.emit_all(transition, pacer))
    }
}
