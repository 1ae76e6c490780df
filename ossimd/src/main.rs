//! # OS Simulator Host Daemon
//!
//! Main entry point for the simulator host runtime.

use ossimd::{render_report, HostError, HostRuntime, HostRuntimeConfig, Scenario};
use sim_kernel::{KernelConfig, SchedulerKind};
use std::env;
use std::fs;
use std::path::PathBuf;
use std::process;
use std::time::Duration;

fn main() {
    let args: Vec<String> = env::args().collect();
    let program = args.first().map(String::as_str).unwrap_or("ossimd");

    let config = parse_args(&args).unwrap_or_else(|e| {
        eprintln!("Error: {}", e);
        print_usage(program);
        process::exit(1);
    });

    let mut runtime = HostRuntime::new(config).unwrap_or_else(|e| {
        eprintln!("Failed to create runtime: {}", e);
        process::exit(1);
    });

    match runtime.run() {
        Ok(summary) => {
            if let Some(run_id) = summary.run_id {
                println!("History written for {}", run_id);
            }
            print!(
                "{}",
                render_report(
                    summary.scheduler,
                    &summary.stats,
                    &summary.processes,
                    summary.average_turnaround
                )
            );
        }
        Err(e) => {
            eprintln!("Runtime error: {}", e);
            process::exit(1);
        }
    }
}

fn parse_args(args: &[String]) -> Result<HostRuntimeConfig, HostError> {
    let mut config = HostRuntimeConfig::default();
    // Flags override the config file regardless of their order.
    let mut kernel_file: Option<KernelConfig> = None;
    let mut scheduler = None;
    let mut quantum = None;
    let mut memory = None;
    let mut i = 1;

    while i < args.len() {
        match args[i].as_str() {
            "--config" | "-c" => {
                let path = value(args, &mut i, "--config")?;
                let text = fs::read_to_string(path).map_err(|e| {
                    HostError::InvalidArgument(format!("Failed to read config file: {}", e))
                })?;
                kernel_file = Some(KernelConfig::from_json(&text)?);
            }
            "--scenario" | "-s" => {
                let path = value(args, &mut i, "--scenario")?;
                config.scenario = Some(Scenario::load(path)?);
            }
            "--scheduler" => {
                scheduler = Some(value(args, &mut i, "--scheduler")?.parse::<SchedulerKind>()?);
            }
            "--quantum" | "-q" => {
                quantum = Some(number(args, &mut i, "--quantum")?);
            }
            "--memory" | "-m" => {
                memory = Some(number(args, &mut i, "--memory")? as usize);
            }
            "--history" => {
                config.history = Some(PathBuf::from(value(args, &mut i, "--history")?));
            }
            "--delay-ms" => {
                config.delay = Duration::from_millis(number(args, &mut i, "--delay-ms")?);
            }
            "--monitor-ms" => {
                config.monitor_interval =
                    Duration::from_millis(number(args, &mut i, "--monitor-ms")?);
            }
            "--json-log" => {
                config.json_log = true;
            }
            "--help" | "-h" => {
                print_usage(&args[0]);
                process::exit(0);
            }
            other => {
                return Err(HostError::InvalidArgument(format!(
                    "Unknown option: {}",
                    other
                )));
            }
        }
        i += 1;
    }

    let mut kernel = kernel_file.unwrap_or_default();
    if let Some(scheduler) = scheduler {
        kernel = kernel.with_scheduler(scheduler);
    }
    if let Some(quantum) = quantum {
        kernel = kernel.with_time_quantum(quantum);
    }
    if let Some(memory) = memory {
        kernel = kernel.with_memory_slots(memory);
    }
    kernel.validate()?;
    config.kernel = kernel;

    Ok(config)
}

fn value<'a>(args: &'a [String], i: &mut usize, flag: &str) -> Result<&'a str, HostError> {
    *i += 1;
    args.get(*i)
        .map(String::as_str)
        .ok_or_else(|| HostError::InvalidArgument(format!("Missing value for {}", flag)))
}

fn number(args: &[String], i: &mut usize, flag: &str) -> Result<u64, HostError> {
    let raw = value(args, i, flag)?;
    raw.parse()
        .map_err(|_| HostError::InvalidArgument(format!("Invalid {} value: {}", flag, raw)))
}

fn print_usage(program: &str) {
    eprintln!("Usage: {} [OPTIONS]", program);
    eprintln!();
    eprintln!("Options:");
    eprintln!("  -c, --config <FILE>      Kernel configuration (JSON)");
    eprintln!("  -s, --scenario <FILE>    Workload (JSON); default: five-process demo");
    eprintln!("  --scheduler <KIND>       priority or round-robin (default)");
    eprintln!("  -q, --quantum <N>        Time quantum in units (default 2)");
    eprintln!("  -m, --memory <N>         Memory slots (default 3)");
    eprintln!("  --history <FILE>         Append the run history to FILE");
    eprintln!("  --delay-ms <N>           Pause after each state transition");
    eprintln!("  --monitor-ms <N>         Print statistics every N ms");
    eprintln!("  --json-log               Log JSON lines to stderr");
    eprintln!("  -h, --help               Show this help message");
    eprintln!();
    eprintln!("Examples:");
    eprintln!("  {} --scheduler priority --quantum 3", program);
    eprintln!(
        "  {} --scenario demos/burst.json --history run.log --monitor-ms 50",
        program
    );
}
