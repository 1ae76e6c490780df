//! Test utilities for kernel tests
//!
//! Helpers shared by the unit tests here and the integration tests in
//! `tests_scenarios`.

use crate::{CycleOutcome, Kernel, KernelConfig, TransitionEvent};
use services_logger::MemoryLog;
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Default configuration with no context-switch sleep
pub fn test_config() -> KernelConfig {
    KernelConfig::default().with_context_switch_cost(Duration::ZERO)
}

/// Builds a kernel from a configuration known to be valid
///
/// # Panics
///
/// Panics if `config` does not validate.
pub fn test_kernel(config: KernelConfig) -> Kernel {
    match Kernel::new(config) {
        Ok(kernel) => kernel,
        Err(err) => panic!("test config rejected: {}", err),
    }
}

/// Builds a kernel that records its log into the returned buffer
pub fn kernel_with_log(config: KernelConfig) -> (Kernel, MemoryLog) {
    let log = MemoryLog::new();
    let kernel = test_kernel(config).with_logger(Box::new(log.clone()));
    (kernel, log)
}

/// Installs a callback collecting every transition event
pub fn collect_transitions(kernel: &Kernel) -> Arc<Mutex<Vec<TransitionEvent>>> {
    let events = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&events);
    kernel.set_state_change_callback(move |event| {
        if let Ok(mut events) = sink.lock() {
            events.push(event.clone());
        }
    });
    events
}

/// Runs cycles until the kernel goes idle or `max_cycles` is reached
///
/// Returns every non-idle outcome in order.
pub fn run_to_completion(kernel: &Kernel, max_cycles: usize) -> Vec<CycleOutcome> {
    let mut outcomes = Vec::new();
    for _ in 0..max_cycles {
        match kernel.run_cycle().outcome {
            CycleOutcome::Idle | CycleOutcome::Busy => break,
            outcome => outcomes.push(outcome),
        }
    }
    outcomes
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Pid;

    #[test]
    fn test_config_has_no_switch_cost() {
        assert_eq!(test_config().context_switch_cost(), Duration::ZERO);
    }

    #[test]
    fn test_kernel_with_log_records() {
        let (kernel, log) = kernel_with_log(test_config());
        kernel.create_process("A", 1, 1);
        assert!(log.contains("process created"));
    }

    #[test]
    fn test_run_to_completion() {
        let kernel = test_kernel(test_config());
        kernel.create_process("A", 3, 1);
        let outcomes = run_to_completion(&kernel, 10);
        assert_eq!(outcomes.len(), 2);
        assert_eq!(
            outcomes[1],
            CycleOutcome::Terminated {
                pid: Pid(1),
                executed: 1
            }
        );
    }

    #[test]
    fn test_collect_transitions() {
        let kernel = test_kernel(test_config());
        let events = collect_transitions(&kernel);
        kernel.create_process("A", 1, 1);
        assert_eq!(events.lock().unwrap().len(), 1);
    }
}
