use std::os::unix::process::CommandExt;
use std::path::PathBuf;
use std::process::{Command, Stdio};

use nix::sys::signal::{SigSet, Signal};

use crate::error::{Error, Result};
use crate::process::WorkerHandle;
use crate::workload::Workload;

/// Builds the command that runs a workload in a fresh process.
pub trait Launcher: Send {
    fn command(&self, workload: &Workload) -> Command;
}

/// Re-executes the current binary with the hidden `worker` subcommand.
#[derive(Debug, Clone)]
pub struct SelfExec {
    exe: PathBuf,
}

impl SelfExec {
    pub fn current() -> Result<Self> {
        Ok(SelfExec {
            exe: std::env::current_exe()?,
        })
    }
}

impl Launcher for SelfExec {
    fn command(&self, workload: &Workload) -> Command {
        let mut cmd = Command::new(&self.exe);
        cmd.args(workload.worker_args());
        cmd
    }
}

/// Start a worker in the background and return its handle.
/// A failed process creation is returned to the caller, never retried.
pub fn spawn_worker(launcher: &dyn Launcher, workload: &Workload) -> Result<WorkerHandle> {
    let category = workload.category();
    let mut cmd = launcher.command(workload);

    cmd.stdin(Stdio::null());
    cmd.stdout(Stdio::null());
    // Own process group: a terminal Ctrl+C reaches the controller only, which
    // then runs the shutdown protocol.
    cmd.process_group(0);

    // SAFETY: only async-signal-safe calls (prctl, pthread_sigmask) run
    // between fork and exec.
    unsafe {
        cmd.pre_exec(|| {
            if libc::prctl(libc::PR_SET_PDEATHSIG, libc::SIGKILL) != 0 {
                return Err(std::io::Error::last_os_error());
            }
            // The controller blocks these for its signal watcher and the mask
            // survives exec.
            let mut mask = SigSet::empty();
            mask.add(Signal::SIGINT);
            mask.add(Signal::SIGTERM);
            mask.thread_unblock().map_err(std::io::Error::from)?;
            Ok(())
        });
    }

    match cmd.spawn() {
        Ok(child) => Ok(WorkerHandle::new(category, child)),
        Err(source) => Err(Error::Spawn { category, source }),
    }
}
