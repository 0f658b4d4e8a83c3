use std::process::ExitStatus;
use std::thread;
use std::time::{Duration, Instant};

use nix::errno::Errno;
use nix::sys::signal::{self, Signal};
use nix::unistd::Pid;
use tracing::warn;

use crate::error::{Error, Result};
use crate::process::WorkerHandle;

const WAIT_POLL: Duration = Duration::from_millis(20);

/// How a single worker ended up being stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Shutdown {
    /// It had already exited; it was only reaped.
    AlreadyExited,
    /// It exited within the grace period after SIGTERM.
    Terminated,
    /// It ignored SIGTERM and was killed.
    Killed,
}

fn send(handle: &WorkerHandle, sig: Signal) -> Result<()> {
    let nix_pid = Pid::from_raw(handle.process_id as i32);

    match signal::kill(nix_pid, sig) {
        Ok(()) => Ok(()),
        // Exited between the liveness check and the signal; the wait reaps it.
        Err(Errno::ESRCH) => Ok(()),
        Err(source) => Err(Error::Signal {
            pid: handle.process_id,
            signal: sig,
            source,
        }),
    }
}

//Terminate (Graceful stop)
//Sends SIGTERM, giving the worker a chance to shut down cleanly
pub fn terminate_worker(handle: &WorkerHandle) -> Result<()> {
    send(handle, Signal::SIGTERM)
}

//Kill (Force terminate)
pub fn kill_worker(handle: &WorkerHandle) -> Result<()> {
    send(handle, Signal::SIGKILL)
}

/// Waits up to `timeout` for the worker to exit, reaping it if it does.
pub fn wait_timeout(handle: &mut WorkerHandle, timeout: Duration) -> Result<Option<ExitStatus>> {
    let deadline = Instant::now() + timeout;
    loop {
        let status = handle.child.try_wait().map_err(|source| Error::Wait {
            pid: handle.process_id,
            source,
        })?;
        if status.is_some() {
            return Ok(status);
        }
        let now = Instant::now();
        if now >= deadline {
            return Ok(None);
        }
        thread::sleep(WAIT_POLL.min(deadline - now));
    }
}

/// Blocks until the worker has exited and been reaped.
pub fn wait_blocking(handle: &mut WorkerHandle) -> Result<ExitStatus> {
    handle.child.wait().map_err(|source| Error::Wait {
        pid: handle.process_id,
        source,
    })
}

/// SIGTERM, wait up to `grace`, then SIGKILL and wait for good.
pub fn shutdown_worker(handle: &mut WorkerHandle, grace: Duration) -> Result<Shutdown> {
    if wait_timeout(handle, Duration::ZERO)?.is_some() {
        handle.alive = false;
        return Ok(Shutdown::AlreadyExited);
    }

    let sent = terminate_worker(handle);
    escalate(handle, sent, grace)
}

/// Waits out the grace period if SIGTERM went through, then kills. A worker
/// that could not be sent SIGTERM goes straight to SIGKILL.
fn escalate(handle: &mut WorkerHandle, sent: Result<()>, grace: Duration) -> Result<Shutdown> {
    match sent {
        Ok(()) => {
            if wait_timeout(handle, grace)?.is_some() {
                handle.alive = false;
                return Ok(Shutdown::Terminated);
            }
        }
        Err(e) => warn!("{}; escalating to SIGKILL", e),
    }

    kill_worker(handle)?;
    wait_blocking(handle)?;
    handle.alive = false;
    Ok(Shutdown::Killed)
}
