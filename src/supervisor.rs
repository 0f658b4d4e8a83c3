use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tracing::{error, info};

use crate::error::Result;
use crate::process::{Category, WorkerHandle};
use crate::run_state::RunState;
use crate::workload::Workload;

pub mod creation;
pub mod monitoring;
pub mod operations;

pub use creation::{Launcher, SelfExec};
use operations::Shutdown;

/// Wait after SIGTERM before escalating to SIGKILL.
pub const GRACE_PERIOD: Duration = Duration::from_secs(2);

/// Supervisor shared between the polling loop and the signal watcher.
pub type SharedSupervisor = Arc<Mutex<Supervisor>>;

/// Locks the shared supervisor even if a previous holder panicked: cleanup
/// must still be possible.
pub fn lock(shared: &SharedSupervisor) -> MutexGuard<'_, Supervisor> {
    shared.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Outcome of one `terminate_all` pass.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct CleanupReport {
    pub already_exited: usize,
    pub terminated: usize,
    pub killed: usize,
    pub failed: usize,
}

impl CleanupReport {
    pub fn total(&self) -> usize {
        self.already_exited + self.terminated + self.killed + self.failed
    }
}

/// Sole owner of the worker processes.
pub struct Supervisor {
    launcher: Box<dyn Launcher>,
    workers: Vec<WorkerHandle>,
    grace_period: Duration,
}

impl Supervisor {
    pub fn new(launcher: Box<dyn Launcher>) -> Self {
        Supervisor {
            launcher,
            workers: Vec::new(),
            grace_period: GRACE_PERIOD,
        }
    }

    #[cfg(test)]
    pub fn with_grace_period(mut self, grace_period: Duration) -> Self {
        self.grace_period = grace_period;
        self
    }

    pub fn shared(self) -> SharedSupervisor {
        Arc::new(Mutex::new(self))
    }

    /// Starts one worker. A creation failure is returned as-is; the workers
    /// already running stay tracked so the caller's cleanup still covers them.
    pub fn spawn(&mut self, workload: Workload) -> Result<&WorkerHandle> {
        let handle = creation::spawn_worker(self.launcher.as_ref(), &workload)?;
        info!(
            "Spawned {} worker PID {} ({:?})",
            handle.category, handle.process_id, workload
        );
        let index = self.workers.len();
        self.workers.push(handle);
        Ok(&self.workers[index])
    }

    /// Starts up to `count` copies of `workload`, stopping early once the
    /// run has been interrupted. Returns how many were started.
    fn spawn_while_running(
        &mut self,
        workload: Workload,
        count: usize,
        run_state: &RunState,
    ) -> Result<usize> {
        let mut started = 0;
        while started < count && run_state.is_running() {
            self.spawn(workload)?;
            started += 1;
        }
        Ok(started)
    }

    /// Starts `count` CPU workers unless the run is interrupted first.
    pub fn spawn_cpu(&mut self, count: usize, intensity: u32, run_state: &RunState) -> Result<usize> {
        let started = self.spawn_while_running(Workload::Cpu { intensity }, count, run_state)?;
        info!("Started {} CPU stress processes with intensity {}", started, intensity);
        Ok(started)
    }

    /// Starts `count` memory workers unless the run is interrupted first.
    pub fn spawn_memory(&mut self, count: usize, size_mb: usize, run_state: &RunState) -> Result<usize> {
        let started = self.spawn_while_running(Workload::Memory { size_mb }, count, run_state)?;
        info!("Started {} memory stress processes, {}MB each", started, size_mb);
        Ok(started)
    }

    /// Stops every tracked worker (SIGTERM, grace period, SIGKILL) and forgets
    /// them all. Failures are logged per worker and never stop the pass;
    /// the tracked set is empty afterwards no matter what, so calling this
    /// again is a harmless no-op.
    pub fn terminate_all(&mut self) -> CleanupReport {
        let mut report = CleanupReport::default();
        if self.is_empty() {
            return report;
        }

        for handle in self.workers.iter_mut() {
            match operations::shutdown_worker(handle, self.grace_period) {
                Ok(Shutdown::AlreadyExited) => report.already_exited += 1,
                Ok(Shutdown::Terminated) => report.terminated += 1,
                Ok(Shutdown::Killed) => report.killed += 1,
                Err(e) => {
                    error!("Error cleaning up process {}: {}", handle.process_id, e);
                    report.failed += 1;
                }
            }
        }

        self.workers.clear();
        info!(
            "All processes cleaned up ({} terminated, {} killed, {} already exited, {} failed)",
            report.terminated, report.killed, report.already_exited, report.failed
        );
        report
    }

    /// Reaps workers that died on their own. They stay tracked but are never
    /// restarted. Returns how many exits were noticed by this call.
    pub fn poll_liveness(&mut self) -> usize {
        let mut exited = 0;
        for handle in self.workers.iter_mut() {
            if monitoring::detect_exit(handle) {
                exited += 1;
            } else if handle.alive {
                monitoring::log_status(handle);
            }
        }
        exited
    }

    pub fn workers(&self) -> &[WorkerHandle] {
        &self.workers
    }

    pub fn count(&self, category: Category) -> usize {
        self.workers.iter().filter(|w| w.category == category).count()
    }

    pub fn live_count(&self) -> usize {
        self.workers.iter().filter(|w| w.alive).count()
    }

    pub fn is_empty(&self) -> bool {
        self.workers.is_empty()
    }
}

impl Drop for Supervisor {
    fn drop(&mut self) {
        if !self.is_empty() {
            self.terminate_all();
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::process::Command;
    use std::time::Instant;

    use crate::error::Error;
    use monitoring::is_reaped;

    /// Runs `sleep` for every workload so tests generate no load.
    pub(crate) struct SleepLauncher;

    impl Launcher for SleepLauncher {
        fn command(&self, _workload: &Workload) -> Command {
            let mut cmd = Command::new("sleep");
            cmd.arg("30");
            cmd
        }
    }

    /// A worker that ignores SIGTERM and must be killed.
    struct StubbornLauncher;

    impl Launcher for StubbornLauncher {
        fn command(&self, _workload: &Workload) -> Command {
            let mut cmd = Command::new("sh");
            cmd.args(["-c", "trap '' TERM; while true; do sleep 1; done"]);
            cmd
        }
    }

    struct MissingLauncher;

    impl Launcher for MissingLauncher {
        fn command(&self, _workload: &Workload) -> Command {
            Command::new("/nonexistent/stressmon-worker")
        }
    }

    fn pids(supervisor: &Supervisor) -> Vec<u32> {
        supervisor.workers().iter().map(|w| w.process_id).collect()
    }

    #[test]
    fn spawn_then_terminate_reaps_everything() {
        let running = RunState::new();
        let mut supervisor = Supervisor::new(Box::new(SleepLauncher));
        assert_eq!(supervisor.spawn_cpu(2, 1, &running).unwrap(), 2);
        assert_eq!(supervisor.spawn_memory(1, 10, &running).unwrap(), 1);
        assert_eq!(supervisor.count(Category::Cpu), 2);
        assert_eq!(supervisor.count(Category::Memory), 1);
        assert_eq!(supervisor.live_count(), 3);

        let spawned = pids(&supervisor);
        let started = Instant::now();
        let report = supervisor.terminate_all();

        assert!(supervisor.is_empty());
        assert_eq!(report.total(), 3);
        assert_eq!(report.terminated, 3);
        assert!(started.elapsed() < GRACE_PERIOD + Duration::from_secs(1));
        assert!(spawned.iter().all(|&pid| is_reaped(pid)));
    }

    #[test]
    fn terminate_all_is_idempotent() {
        let mut supervisor = Supervisor::new(Box::new(SleepLauncher));
        supervisor.spawn_cpu(1, 1, &RunState::new()).unwrap();

        let first = supervisor.terminate_all();
        assert_eq!(first.total(), 1);
        assert!(supervisor.is_empty());

        let second = supervisor.terminate_all();
        assert_eq!(second, CleanupReport::default());
        assert!(supervisor.is_empty());
    }

    #[test]
    fn escalates_to_kill_after_grace_period() {
        let grace = Duration::from_millis(300);
        let mut supervisor =
            Supervisor::new(Box::new(StubbornLauncher)).with_grace_period(grace);
        supervisor.spawn_cpu(1, 1, &RunState::new()).unwrap();
        // Give the shell time to install its trap.
        std::thread::sleep(Duration::from_millis(200));

        let spawned = pids(&supervisor);
        let started = Instant::now();
        let report = supervisor.terminate_all();

        assert_eq!(report.killed, 1);
        assert!(started.elapsed() >= grace);
        assert!(supervisor.is_empty());
        assert!(is_reaped(spawned[0]));
    }

    #[test]
    fn exited_workers_are_noticed_once_and_kept() {
        let mut supervisor = Supervisor::new(Box::new(SleepLauncher));
        let pid = supervisor.spawn(Workload::Cpu { intensity: 1 }).unwrap().process_id;
        operations::kill_worker(&supervisor.workers()[0]).unwrap();
        std::thread::sleep(Duration::from_millis(200));

        assert_eq!(supervisor.poll_liveness(), 1);
        assert_eq!(supervisor.poll_liveness(), 0);
        assert_eq!(supervisor.live_count(), 0);
        assert_eq!(supervisor.workers().len(), 1);
        assert!(is_reaped(pid));

        let report = supervisor.terminate_all();
        assert_eq!(report.already_exited, 1);
    }

    #[test]
    fn spawn_failure_is_reported() {
        let mut supervisor = Supervisor::new(Box::new(MissingLauncher));
        let err = supervisor.spawn_cpu(2, 1, &RunState::new()).unwrap_err();
        assert!(matches!(err, Error::Spawn { category: Category::Cpu, .. }));
        assert!(supervisor.is_empty());
    }

    #[test]
    fn nothing_is_spawned_once_the_run_is_stopped() {
        let stopped = RunState::new();
        stopped.stop();
        let mut supervisor = Supervisor::new(Box::new(SleepLauncher));

        assert_eq!(supervisor.spawn_cpu(3, 1, &stopped).unwrap(), 0);
        assert_eq!(supervisor.spawn_memory(2, 1, &stopped).unwrap(), 0);
        assert!(supervisor.is_empty());
    }

    #[test]
    fn drop_cleans_up() {
        let pid = {
            let mut supervisor = Supervisor::new(Box::new(SleepLauncher));
            supervisor.spawn(Workload::Memory { size_mb: 1 }).unwrap().process_id
        };
        assert!(is_reaped(pid));
    }
}
