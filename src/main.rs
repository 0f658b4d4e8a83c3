//! stressmon
//!
//! Spawns CPU and memory burn processes for a bounded time while showing a
//! live dashboard of CPU, memory and temperature readings.

mod config;
mod dashboard;
mod error;
mod logging;
mod metrics;
mod orchestrator;
mod process;
mod run_state;
mod signals;
mod supervisor;
mod workload;

use std::io;
use std::path::Path;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing::info;

use config::StressConfig;
use dashboard::Dashboard;
use metrics::{ProcfsMetrics, SystemMetrics};
use orchestrator::StressTest;
use run_state::RunState;
use supervisor::{SelfExec, Supervisor};
use workload::{CpuBurn, MemoryBurn};

fn default_cores() -> i64 {
    ProcfsMetrics::new().cpu_count_logical().unwrap_or(1) as i64
}

#[derive(Parser)]
#[command(name = "stressmon")]
#[command(about = "CPU & memory stress tester with real-time monitoring")]
#[command(version)]
#[command(args_conflicts_with_subcommands = true)]
struct Cli {
    /// Number of CPU worker processes (default: all logical cores)
    #[arg(short, long, allow_negative_numbers = true, default_value_t = default_cores())]
    cores: i64,

    /// Duration in seconds
    #[arg(short, long, allow_negative_numbers = true, default_value_t = 10)]
    time: i64,

    /// CPU workload intensity factor
    #[arg(short, long, allow_negative_numbers = true, default_value_t = 1)]
    intensity: i64,

    /// Number of memory stress processes (0 disables memory stress)
    #[arg(short = 'm', long, allow_negative_numbers = true, default_value_t = 0)]
    memory_processes: i64,

    /// Memory allocation size per process in MB
    #[arg(short = 's', long, allow_negative_numbers = true, default_value_t = 100)]
    memory_size: i64,

    /// Run CPU stress only with plain text polling (legacy mode)
    #[arg(long)]
    cpu_only: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Internal: run one workload until killed
    #[command(hide = true)]
    Worker {
        #[command(subcommand)]
        workload: WorkerCommands,
    },
}

#[derive(Subcommand)]
enum WorkerCommands {
    /// CPU burn
    Cpu {
        #[arg(long)]
        intensity: u32,
    },
    /// Memory churn
    Memory {
        #[arg(long)]
        size_mb: usize,
    },
}

fn main() -> ExitCode {
    let mut cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            let _ = e.print();
            // Usage errors are validation errors; --help and --version are not.
            return if e.use_stderr() {
                ExitCode::from(1)
            } else {
                ExitCode::SUCCESS
            };
        }
    };

    if let Some(Commands::Worker { workload }) = cli.command.take() {
        return run_worker(workload);
    }

    match run(&cli) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Unexpected error: {e:#}");
            ExitCode::from(1)
        }
    }
}

fn run_worker(workload: WorkerCommands) -> ExitCode {
    logging::init_worker_log();
    match workload {
        WorkerCommands::Cpu { intensity } => CpuBurn::new(intensity).run(),
        WorkerCommands::Memory { size_mb } => {
            MemoryBurn::new(size_mb).run();
            ExitCode::SUCCESS
        }
    }
}

fn run(cli: &Cli) -> Result<ExitCode> {
    let config = match StressConfig::new(
        cli.cores,
        cli.time,
        cli.intensity,
        cli.memory_processes,
        cli.memory_size,
    ) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{e}");
            return Ok(ExitCode::from(1));
        }
    };

    logging::init_run_log(Path::new("."))?;
    let mut metrics = ProcfsMetrics::new();
    config.capacity_warnings(metrics.cpu_count_logical().unwrap_or(config.cores));

    let supervisor = Supervisor::new(Box::new(SelfExec::current()?)).shared();
    let run_state = Arc::new(RunState::new());
    // Before any worker exists, so every thread inherits the blocked mask.
    signals::install(run_state.clone(), supervisor.clone())?;

    let test = StressTest::new(config.clone(), supervisor, run_state);
    let outcome = if cli.cpu_only {
        test.run_legacy(&mut metrics, &mut io::stdout())
    } else {
        print_configuration(&config);
        let mut dashboard = Dashboard::new(io::stdout());
        test.run(&mut metrics, &mut dashboard)
    };

    info!("Stress test finished: {}", outcome);
    Ok(ExitCode::from(outcome.exit_code() as u8))
}

fn print_configuration(config: &StressConfig) {
    println!("Advanced CPU & Memory Stress Tester");
    println!("Configuration:");
    println!("   CPU cores: {}", config.cores);
    println!("   Duration: {}s", config.duration.as_secs());
    println!("   CPU intensity: {}", config.intensity);
    if config.memory_processes > 0 {
        println!("   Memory processes: {}", config.memory_processes);
        println!("   Memory size: {}MB per process", config.memory_size_mb);
    }
    println!();
}
