//! Stress test orchestration: spawn the workers, poll and render once per
//! tick until the duration runs out or the run is interrupted, then make
//! sure every worker is gone.

use std::fmt;
use std::io::Write;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{debug, error, info, warn};

use crate::config::StressConfig;
use crate::dashboard::{self, Dashboard};
use crate::error::{Error, Result};
use crate::metrics::{MetricsSnapshot, SystemMetrics, TemperatureStatus};
use crate::process::Category;
use crate::run_state::RunState;
use crate::supervisor::{self, SharedSupervisor};

pub const TICK: Duration = Duration::from_secs(1);
const GIB: f64 = 1024.0 * 1024.0 * 1024.0;

/// Terminal state of a run.
#[derive(Debug)]
pub enum Outcome {
    /// The duration elapsed without an interrupt.
    Completed,
    /// An interrupt stopped the run.
    Interrupted,
    /// Spawning or displaying failed.
    Failed(Error),
}

impl Outcome {
    pub fn exit_code(&self) -> i32 {
        match self {
            Outcome::Completed | Outcome::Interrupted => 0,
            Outcome::Failed(_) => 1,
        }
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Outcome::Completed => f.write_str("completed"),
            Outcome::Interrupted => f.write_str("interrupted"),
            Outcome::Failed(e) => write!(f, "failed: {e}"),
        }
    }
}

pub struct StressTest {
    config: StressConfig,
    supervisor: SharedSupervisor,
    run_state: Arc<RunState>,
    tick: Duration,
}

impl StressTest {
    pub fn new(config: StressConfig, supervisor: SharedSupervisor, run_state: Arc<RunState>) -> Self {
        StressTest {
            config,
            supervisor,
            run_state,
            tick: TICK,
        }
    }

    #[cfg(test)]
    pub fn with_tick(mut self, tick: Duration) -> Self {
        self.tick = tick;
        self
    }

    /// Dashboard mode. Whatever happens, the supervisor is emptied before
    /// this returns.
    pub fn run<M, W>(&self, metrics: &mut M, dashboard: &mut Dashboard<W>) -> Outcome
    where
        M: SystemMetrics + ?Sized,
        W: Write,
    {
        let outcome = self.monitor(metrics, dashboard);
        self.finish(outcome)
    }

    /// Legacy `--cpu-only` mode: CPU workers and a plain usage line per tick.
    pub fn run_legacy<M, W>(&self, metrics: &mut M, out: &mut W) -> Outcome
    where
        M: SystemMetrics + ?Sized,
        W: Write,
    {
        let outcome = self.monitor_legacy(metrics, out);
        let outcome = self.finish(outcome);
        if matches!(outcome, Outcome::Completed) {
            println!("Legacy test finished");
        }
        outcome
    }

    fn monitor<M, W>(&self, metrics: &mut M, dashboard: &mut Dashboard<W>) -> Result<Outcome>
    where
        M: SystemMetrics + ?Sized,
        W: Write,
    {
        announce_system(metrics);
        info!(
            "Starting stress test: CPU cores={}, duration={}s, intensity={}",
            self.config.cores,
            self.config.duration.as_secs(),
            self.config.intensity
        );
        self.spawn_workers(true)?;

        let start = Instant::now();
        while self.run_state.is_running() && start.elapsed() < self.config.duration {
            self.check_workers();
            let snapshot = MetricsSnapshot::capture(metrics);
            // The interrupt path may have cleaned up while we were polling.
            if !self.run_state.is_running() {
                break;
            }
            dashboard.tick(start.elapsed(), &self.config, snapshot)?;
            self.run_state.sleep(self.tick);
        }

        Ok(self.conclude())
    }

    fn monitor_legacy<M, W>(&self, metrics: &mut M, out: &mut W) -> Result<Outcome>
    where
        M: SystemMetrics + ?Sized,
        W: Write,
    {
        println!(
            "Legacy mode: Stressing {} cores for {}s at intensity {}...",
            self.config.cores,
            self.config.duration.as_secs(),
            self.config.intensity
        );
        self.spawn_workers(false)?;
        // Baseline for the first delta.
        let _ = metrics.cpu_percent();

        let start = Instant::now();
        while self.run_state.is_running() && start.elapsed() < self.config.duration {
            if !self.run_state.sleep(self.tick) {
                break;
            }
            self.check_workers();
            let temperatures = match metrics.temperatures() {
                Ok(t) => TemperatureStatus::Read(t),
                Err(e) => TemperatureStatus::Error(e.to_string()),
            };
            let usage = metrics.cpu_percent();
            write_legacy_tick(out, start.elapsed(), usage, &temperatures).map_err(Error::Display)?;
        }

        Ok(self.conclude())
    }

    /// Spawning stops as soon as the run is interrupted; the loop then
    /// exits without a tick and the run concludes as interrupted.
    fn spawn_workers(&self, with_memory: bool) -> Result<()> {
        let mut supervisor = supervisor::lock(&self.supervisor);
        supervisor.spawn_cpu(self.config.cores, self.config.intensity, &self.run_state)?;
        if with_memory && self.config.memory_processes > 0 {
            supervisor.spawn_memory(
                self.config.memory_processes,
                self.config.memory_size_mb,
                &self.run_state,
            )?;
        }
        debug!(
            "Tracking {} CPU and {} memory workers",
            supervisor.count(Category::Cpu),
            supervisor.count(Category::Memory)
        );
        Ok(())
    }

    /// Workers that die are reported, never restarted.
    fn check_workers(&self) {
        let mut supervisor = supervisor::lock(&self.supervisor);
        if supervisor.poll_liveness() > 0 {
            warn!(
                "{} of {} workers still alive",
                supervisor.live_count(),
                supervisor.workers().len()
            );
        }
    }

    fn conclude(&self) -> Outcome {
        if self.run_state.is_running() {
            println!("\nStress test completed successfully!");
            info!("Stress test completed successfully");
            Outcome::Completed
        } else {
            info!("Test interrupted by user");
            Outcome::Interrupted
        }
    }

    /// Final cleanup, run on every exit path even if the interrupt path
    /// already emptied the supervisor.
    fn finish(&self, outcome: Result<Outcome>) -> Outcome {
        let outcome = outcome.unwrap_or_else(|e| {
            eprintln!("\nError during stress test: {e}");
            error!("Error during stress test: {}", e);
            Outcome::Failed(e)
        });
        let report = supervisor::lock(&self.supervisor).terminate_all();
        debug!("Final cleanup handled {} workers", report.total());
        outcome
    }
}

fn announce_system<M: SystemMetrics + ?Sized>(metrics: &M) {
    match (metrics.cpu_count_physical(), metrics.cpu_count_logical()) {
        (Ok(physical), Ok(logical)) => println!("System: {physical} cores ({logical} logical)"),
        (Err(e), _) | (_, Err(e)) => println!("System: core count unavailable ({e})"),
    }
    match metrics.virtual_memory() {
        Ok(mem) => println!(
            "Memory: {:.1}GB total, {:.1}GB available",
            mem.total as f64 / GIB,
            mem.available as f64 / GIB
        ),
        Err(e) => println!("Memory: unavailable ({e})"),
    }
    println!("Starting stress test...");
}

fn write_legacy_tick<W: Write>(
    out: &mut W,
    elapsed: Duration,
    usage: Result<f64>,
    temperatures: &TemperatureStatus,
) -> std::io::Result<()> {
    match usage {
        Ok(usage) => {
            writeln!(out, "CPU Usage: {usage:.1}%")?;
            info!("Elapsed: {:.1}s, CPU: {:.1}%", elapsed.as_secs_f64(), usage);
        }
        Err(e) => {
            writeln!(out, "CPU Usage: unavailable ({e})")?;
            error!("CPU poll failed: {}", e);
        }
    }
    for line in dashboard::temperature_lines(temperatures) {
        writeln!(out, "{line}")?;
    }
    writeln!(out, "{}", "-".repeat(20))?;
    out.flush()
}
