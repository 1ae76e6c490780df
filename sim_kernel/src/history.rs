//! # History Log
//!
//! Append-only plain-text record of a simulation run. Write-only: nothing
//! parses it back.
//!
//! Line formats:
//!
//! ```text
//! [Tick 3] VSCode: READY_MEMORY -> KERNEL_RUNNING (dispatch - context switch)
//! [Tick 4] VSCode: executed 2, remaining 6
//! ```
//!
//! plus a header carrying the run id, tabular snapshots and a closing
//! summary block.

use crate::error::KernelError;
use crate::process::TransitionEvent;
use crate::stats::{ProcessSummary, StatsSnapshot};
use core_types::RunId;
use std::fs::OpenOptions;
use std::io::{self, Write};
use std::path::Path;

const RULE: &str = "==================================================";

fn io_error(err: io::Error) -> KernelError {
    KernelError::HistoryLog(err.to_string())
}

/// History log writer
pub struct HistoryLog {
    writer: Box<dyn Write + Send>,
    run_id: RunId,
}

impl HistoryLog {
    /// Opens (or creates) a file in append mode and writes the run header
    pub fn open(path: impl AsRef<Path>) -> Result<Self, KernelError> {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path.as_ref())
            .map_err(io_error)?;
        Self::from_writer(Box::new(file))
    }

    /// Uses any writer and writes the run header
    pub fn from_writer(writer: Box<dyn Write + Send>) -> Result<Self, KernelError> {
        let mut log = Self {
            writer,
            run_id: RunId::new(),
        };
        log.write_header()?;
        Ok(log)
    }

    pub fn run_id(&self) -> RunId {
        self.run_id
    }

    fn write_header(&mut self) -> Result<(), KernelError> {
        writeln!(self.writer, "{}", RULE).map_err(io_error)?;
        writeln!(self.writer, "Simulation {}", self.run_id).map_err(io_error)?;
        writeln!(self.writer, "{}", RULE).map_err(io_error)?;
        self.writer.flush().map_err(io_error)
    }

    /// `[Tick N] name: FROM -> TO (reason)`
    pub fn record_transition(&mut self, event: &TransitionEvent) -> Result<(), KernelError> {
        writeln!(
            self.writer,
            "[Tick {}] {}: {} -> {} ({})",
            event.tick, event.name, event.from, event.to, event.reason
        )
        .map_err(io_error)
    }

    /// `[Tick N] name: executed X, remaining Y`
    pub fn record_execution(
        &mut self,
        tick: u64,
        name: &str,
        executed: u64,
        remaining: u64,
    ) -> Result<(), KernelError> {
        writeln!(
            self.writer,
            "[Tick {}] {}: executed {}, remaining {}",
            tick, name, executed, remaining
        )
        .map_err(io_error)
    }

    /// Table of every known process
    pub fn record_snapshot(
        &mut self,
        cycle: u64,
        time: u64,
        processes: &[ProcessSummary],
    ) -> Result<(), KernelError> {
        let w = &mut self.writer;
        writeln!(w, "--- Snapshot: cycle {}, time {} ---", cycle, time).map_err(io_error)?;
        writeln!(
            w,
            "{:<5} | {:<12} | {:<14} | {:>4} | {:>9}",
            "PID", "Name", "State", "Prio", "Remaining"
        )
        .map_err(io_error)?;
        for p in processes {
            writeln!(
                w,
                "{:<5} | {:<12} | {:<14} | {:>4} | {:>9}",
                p.pid.to_string(),
                p.name,
                p.state.as_str(),
                p.priority.level(),
                p.remaining_time
            )
            .map_err(io_error)?;
        }
        w.flush().map_err(io_error)
    }

    /// Closing block with totals and per-process turnaround
    pub fn record_summary(
        &mut self,
        stats: &StatsSnapshot,
        processes: &[ProcessSummary],
    ) -> Result<(), KernelError> {
        let w = &mut self.writer;
        writeln!(w, "{}", RULE).map_err(io_error)?;
        writeln!(w, "Summary").map_err(io_error)?;
        writeln!(w, "Total ticks: {}", stats.ticks).map_err(io_error)?;
        writeln!(w, "Cycles: {}", stats.cycles).map_err(io_error)?;
        writeln!(w, "Context switches: {}", stats.context_switches).map_err(io_error)?;
        writeln!(w, "Preemptions: {}", stats.preemptions).map_err(io_error)?;
        writeln!(w, "Simulation time: {}", stats.simulation_time).map_err(io_error)?;
        writeln!(w, "Turnaround:").map_err(io_error)?;
        for p in processes {
            let line = match (p.turnaround, p.waiting) {
                (Some(turnaround), Some(waiting)) => writeln!(
                    w,
                    "  {} {}: turnaround {}, waiting {}",
                    p.pid, p.name, turnaround, waiting
                ),
                _ => writeln!(w, "  {} {}: not finished", p.pid, p.name),
            };
            line.map_err(io_error)?;
        }
        writeln!(w, "{}", RULE).map_err(io_error)?;
        w.flush().map_err(io_error)
    }

    pub fn flush(&mut self) -> Result<(), KernelError> {
        self.writer.flush().map_err(io_error)
    }
}

impl std::fmt::Debug for HistoryLog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HistoryLog")
            .field("run_id", &self.run_id)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core_types::{Pid, Priority, ProcessState};
    use std::io::Read;
    use std::sync::{Arc, Mutex};

    /// Writer that keeps its bytes reachable after being boxed
    #[derive(Clone, Default)]
    struct SharedBuffer(Arc<Mutex<Vec<u8>>>);

    impl Write for SharedBuffer {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    impl SharedBuffer {
        fn text(&self) -> String {
            String::from_utf8(self.0.lock().unwrap().clone()).unwrap()
        }
    }

    fn summary(pid: u32, completion: Option<u64>) -> ProcessSummary {
        ProcessSummary {
            pid: Pid(pid),
            name: format!("p{}", pid),
            priority: Priority::clamped(3),
            state: ProcessState::Zombie,
            burst_time: 4,
            remaining_time: 0,
            arrival: 0,
            completion,
            turnaround: completion,
            waiting: completion.map(|c| c - 4),
        }
    }

    #[test]
    fn test_header_contains_run_id() {
        let buffer = SharedBuffer::default();
        let log = HistoryLog::from_writer(Box::new(buffer.clone())).unwrap();
        assert!(buffer.text().contains(&log.run_id().to_string()));
    }

    #[test]
    fn test_transition_and_execution_lines() {
        let buffer = SharedBuffer::default();
        let mut log = HistoryLog::from_writer(Box::new(buffer.clone())).unwrap();

        log.record_transition(&TransitionEvent {
            tick: 3,
            pid: Pid(1),
            name: "VSCode".to_string(),
            from: ProcessState::ReadyMemory,
            to: ProcessState::KernelRunning,
            reason: "dispatch - context switch".to_string(),
        })
        .unwrap();
        log.record_execution(4, "VSCode", 2, 6).unwrap();

        let text = buffer.text();
        assert!(text.contains(
            "[Tick 3] VSCode: READY_MEMORY -> KERNEL_RUNNING (dispatch - context switch)\n"
        ));
        assert!(text.contains("[Tick 4] VSCode: executed 2, remaining 6\n"));
    }

    #[test]
    fn test_snapshot_and_summary() {
        let buffer = SharedBuffer::default();
        let mut log = HistoryLog::from_writer(Box::new(buffer.clone())).unwrap();
        let processes = vec![summary(1, Some(8)), summary(2, None)];

        log.record_snapshot(2, 4, &processes).unwrap();
        log.record_summary(
            &StatsSnapshot {
                ticks: 12,
                cycles: 2,
                context_switches: 2,
                ..StatsSnapshot::default()
            },
            &processes,
        )
        .unwrap();

        let text = buffer.text();
        assert!(text.contains("--- Snapshot: cycle 2, time 4 ---"));
        assert!(text.contains("Total ticks: 12"));
        assert!(text.contains("Context switches: 2"));
        assert!(text.contains("P1 p1: turnaround 8, waiting 4"));
        assert!(text.contains("P2 p2: not finished"));
    }

    #[test]
    fn test_open_appends() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("history.log");

        let first = HistoryLog::open(&path).unwrap().run_id();
        let second = HistoryLog::open(&path).unwrap().run_id();

        let mut text = String::new();
        std::fs::File::open(&path)
            .unwrap()
            .read_to_string(&mut text)
            .unwrap();
        assert!(text.contains(&first.to_string()));
        assert!(text.contains(&second.to_string()));
    }

    #[test]
    fn test_open_missing_directory_fails() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing").join("history.log");
        assert!(matches!(
            HistoryLog::open(&path),
            Err(KernelError::HistoryLog(_))
        ));
    }
}
