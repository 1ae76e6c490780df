//! # Host Runtime
//!
//! Builds the kernel, runs the scheduling loop and the monitoring loop on two
//! threads, and collects the final statistics.

use crate::report::render_monitor_line;
use crate::scenario::{Scenario, ScenarioError};
use services_logger::{ConsoleLog, JsonLinesLog, LogLevel, LogSink};
use sim_kernel::{Kernel, KernelConfig, KernelError, ProcessSummary, RunId, StatsSnapshot};
use std::io;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use thiserror::Error;

/// Longest single sleep of the monitoring loop
const MONITOR_SLICE: Duration = Duration::from_millis(10);

/// Host runtime error types
#[derive(Debug, Error)]
pub enum HostError {
    #[error("Kernel error: {0}")]
    Kernel(#[from] KernelError),

    #[error("Scenario error: {0}")]
    Scenario(#[from] ScenarioError),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("{0} thread panicked")]
    ThreadPanicked(&'static str),
}

/// Host runtime configuration
#[derive(Debug, Clone)]
pub struct HostRuntimeConfig {
    /// Kernel settings
    pub kernel: KernelConfig,
    /// Workload; the standard scenario when unset
    pub scenario: Option<Scenario>,
    /// History log file (appended)
    pub history: Option<PathBuf>,
    /// Pause after each state transition
    pub delay: Duration,
    /// Monitoring interval; zero disables the monitoring thread
    pub monitor_interval: Duration,
    /// Log as JSON lines instead of text
    pub json_log: bool,
    /// Least severe level printed
    pub log_level: LogLevel,
}

impl Default for HostRuntimeConfig {
    fn default() -> Self {
        Self {
            kernel: KernelConfig::default(),
            scenario: None,
            history: None,
            delay: Duration::ZERO,
            monitor_interval: Duration::ZERO,
            json_log: false,
            log_level: LogLevel::Info,
        }
    }
}

/// What a run produced
#[derive(Debug, Clone)]
pub struct RunSummary {
    pub run_id: Option<RunId>,
    pub cycles: u64,
    pub scheduler: &'static str,
    pub stats: StatsSnapshot,
    pub processes: Vec<ProcessSummary>,
    pub average_turnaround: Option<f64>,
    /// Monitoring lines printed during the run
    pub monitor_samples: usize,
}

/// Host runtime
pub struct HostRuntime {
    config: HostRuntimeConfig,
    kernel: Arc<Kernel>,
    run_id: Option<RunId>,
}

impl HostRuntime {
    /// Creates the kernel and the scenario's processes
    pub fn new(config: HostRuntimeConfig) -> Result<Self, HostError> {
        let logger: Box<dyn LogSink + Send> = if config.json_log {
            Box::new(JsonLinesLog::new(io::stderr()))
        } else {
            Box::new(ConsoleLog::new(config.log_level))
        };
        Self::with_logger(config, logger)
    }

    /// Creates the runtime with an explicit log sink
    pub fn with_logger(
        config: HostRuntimeConfig,
        logger: Box<dyn LogSink + Send>,
    ) -> Result<Self, HostError> {
        let kernel = Kernel::new(config.kernel.clone())?.with_logger(logger);

        let run_id = match &config.history {
            Some(path) => Some(kernel.enable_history_logging(path)?),
            None => None,
        };

        let scenario = config.scenario.clone().unwrap_or_default();
        scenario.validate()?;
        for process in &scenario.processes {
            let handle =
                kernel.create_process(&process.name, process.burst_time, process.priority);
            if !handle.outcome.is_admitted() {
                eprintln!("warning: {} ({}) was not admitted", process.name, handle.pid);
            }
        }

        Ok(Self {
            config,
            kernel: Arc::new(kernel),
            run_id,
        })
    }

    /// Shared handle to the kernel
    pub fn kernel(&self) -> Arc<Kernel> {
        Arc::clone(&self.kernel)
    }

    /// Runs the simulation to completion
    ///
    /// The scheduling loop runs on its own thread; when a monitoring interval
    /// is set, a second thread prints statistics until the loop finishes.
    pub fn run(&mut self) -> Result<RunSummary, HostError> {
        let done = Arc::new(AtomicBool::new(false));

        let monitor = if self.config.monitor_interval.is_zero() {
            None
        } else {
            let kernel = Arc::clone(&self.kernel);
            let done = Arc::clone(&done);
            let interval = self.config.monitor_interval;
            Some(thread::spawn(move || monitor_loop(&kernel, &done, interval)))
        };

        let scheduler = {
            let kernel = Arc::clone(&self.kernel);
            let delay = self.config.delay;
            thread::spawn(move || kernel.run_simulation(delay))
        };

        let cycles = scheduler.join();
        done.store(true, Ordering::SeqCst);
        let monitor_samples = match monitor {
            Some(handle) => handle
                .join()
                .map_err(|_| HostError::ThreadPanicked("monitor"))?,
            None => 0,
        };
        let cycles = cycles.map_err(|_| HostError::ThreadPanicked("scheduler"))?;

        self.kernel.finish_history()?;

        Ok(RunSummary {
            run_id: self.run_id,
            cycles,
            scheduler: self.kernel.scheduler_name(),
            stats: self.kernel.stats(),
            processes: self.kernel.process_summaries(),
            average_turnaround: self.kernel.average_turnaround(),
            monitor_samples,
        })
    }

    /// Asks a running simulation to stop
    pub fn stop(&self) {
        self.kernel.stop();
    }
}

/// Prints a status line every `interval` until `done` is raised
fn monitor_loop(kernel: &Kernel, done: &AtomicBool, interval: Duration) -> usize {
    let mut samples = 0;
    while !done.load(Ordering::SeqCst) {
        let mut slept = Duration::ZERO;
        while slept < interval && !done.load(Ordering::SeqCst) {
            let step = MONITOR_SLICE.min(interval - slept);
            thread::sleep(step);
            slept += step;
        }
        println!("{}", render_monitor_line(&kernel.stats()));
        samples += 1;
    }
    samples
}

#[cfg(test)]
mod tests {
    use super::*;
    use services_logger::{MemoryLog, NullLog};
    use sim_kernel::{ProcessDescriptor, ProcessState, SchedulerKind};

    fn quiet_config() -> HostRuntimeConfig {
        HostRuntimeConfig {
            kernel: KernelConfig::default().with_context_switch_cost(Duration::ZERO),
            ..HostRuntimeConfig::default()
        }
    }

    #[test]
    fn test_runtime_runs_standard_scenario() {
        let mut runtime = HostRuntime::with_logger(quiet_config(), Box::new(NullLog)).unwrap();
        let summary = runtime.run().unwrap();

        assert_eq!(summary.processes.len(), 5);
        assert!(summary
            .processes
            .iter()
            .all(|p| p.state == ProcessState::Zombie));
        assert_eq!(summary.stats.simulation_time, 30);
        assert_eq!(summary.scheduler, "Round Robin");
        assert!(summary.run_id.is_none());
    }

    #[test]
    fn test_runtime_logs_creation() {
        let log = MemoryLog::new();
        let config = HostRuntimeConfig {
            scenario: Some(Scenario {
                processes: vec![ProcessDescriptor::new("only", 2, 5)],
            }),
            ..quiet_config()
        };
        let mut runtime = HostRuntime::with_logger(config, Box::new(log.clone())).unwrap();
        let summary = runtime.run().unwrap();

        assert_eq!(summary.cycles, 1);
        assert!(log.contains("process created"));
        assert!(log.contains("process terminated"));
    }

    #[test]
    fn test_runtime_with_monitor() {
        let config = HostRuntimeConfig {
            kernel: quiet_config()
                .kernel
                .with_scheduler(SchedulerKind::Priority),
            monitor_interval: Duration::from_millis(1),
            delay: Duration::from_millis(1),
            ..quiet_config()
        };
        let mut runtime = HostRuntime::with_logger(config, Box::new(NullLog)).unwrap();
        let summary = runtime.run().unwrap();
        assert!(summary.monitor_samples >= 1);
        assert_eq!(summary.scheduler, "Priority");
    }

    #[test]
    fn test_runtime_history_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("history.log");
        let config = HostRuntimeConfig {
            history: Some(path.clone()),
            ..quiet_config()
        };
        let mut runtime = HostRuntime::with_logger(config, Box::new(NullLog)).unwrap();
        let summary = runtime.run().unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        let run_id = summary.run_id.unwrap();
        assert!(text.contains(&run_id.to_string()));
        assert!(text.contains("Summary"));
    }

    #[test]
    fn test_empty_scenario_rejected() {
        let config = HostRuntimeConfig {
            scenario: Some(Scenario {
                processes: vec![],
            }),
            ..quiet_config()
        };
        assert!(matches!(
            HostRuntime::with_logger(config, Box::new(NullLog)),
            Err(HostError::Scenario(ScenarioError::EmptyScenario))
        ));
    }

    #[test]
    fn test_invalid_kernel_config() {
        let config = HostRuntimeConfig {
            kernel: KernelConfig::default().with_core_count(0),
            ..HostRuntimeConfig::default()
        };
        assert!(matches!(
            HostRuntime::with_logger(config, Box::new(NullLog)),
            Err(HostError::Kernel(KernelError::InvalidConfig(_)))
        ));
    }
}
