//! # Report Rendering
//!
//! Plain-text views of kernel statistics. The host prints these; nothing
//! here writes to a terminal.

use sim_kernel::{ProcessSummary, StatsSnapshot};
use std::fmt::Write;

/// One-line status for the monitoring loop
pub fn render_monitor_line(stats: &StatsSnapshot) -> String {
    format!(
        "[monitor] time={} cycles={} switches={} memory={}/{} swap={} ready={} done={}/{}",
        stats.simulation_time,
        stats.cycles,
        stats.context_switches,
        stats.memory_usage,
        stats.memory_capacity,
        stats.swap_usage,
        stats.ready_queue_len,
        stats.completed,
        stats.completed + stats.process_count,
    )
}

/// Final statistics table
pub fn render_report(
    scheduler: &str,
    stats: &StatsSnapshot,
    processes: &[ProcessSummary],
    average_turnaround: Option<f64>,
) -> String {
    let mut out = String::new();
    // Writing into a String cannot fail.
    let _ = writeln!(out, "=== Simulation Report ({}) ===", scheduler);
    let _ = writeln!(out, "Simulation time:        {}", stats.simulation_time);
    let _ = writeln!(out, "Cycles:                 {}", stats.cycles);
    let _ = writeln!(out, "State transitions:      {}", stats.ticks);
    let _ = writeln!(out, "Context switches:       {}", stats.context_switches);
    let _ = writeln!(
        out,
        "Average dispatch time:  {:.3} ms",
        stats.average_dispatch_time.as_secs_f64() * 1000.0
    );
    let _ = writeln!(out, "Preemptions:            {}", stats.preemptions);
    let _ = writeln!(
        out,
        "Memory in use:          {}/{}",
        stats.memory_usage, stats.memory_capacity
    );
    let _ = writeln!(out, "Swap in use:            {}", stats.swap_usage);
    match average_turnaround {
        Some(avg) => {
            let _ = writeln!(out, "Average turnaround:     {:.2}", avg);
        }
        None => {
            let _ = writeln!(out, "Average turnaround:     n/a");
        }
    }
    let _ = writeln!(out);
    let _ = writeln!(
        out,
        "{:<5} {:<12} {:>4} {:>5} {:>7} {:>10} {:>10} {:>7}  {}",
        "PID", "Name", "Prio", "Burst", "Arrival", "Completion", "Turnaround", "Waiting", "State"
    );
    for p in processes {
        let _ = writeln!(
            out,
            "{:<5} {:<12} {:>4} {:>5} {:>7} {:>10} {:>10} {:>7}  {}",
            p.pid.to_string(),
            p.name,
            p.priority.level(),
            p.burst_time,
            p.arrival,
            optional(p.completion),
            optional(p.turnaround),
            optional(p.waiting),
            p.state
        );
    }
    out
}

fn optional(value: Option<u64>) -> String {
    value.map_or_else(|| "-".to_string(), |v| v.to_string())
}
