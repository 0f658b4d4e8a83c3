use std::convert::TryFrom;

use procfs::ProcError;
use tracing::{debug, warn};

use crate::process::{ProcStatus, WorkerHandle};

/// Non-blocking liveness check. Reaps the worker if it has exited and flips
/// its `alive` flag; returns true only on that transition.
pub fn detect_exit(handle: &mut WorkerHandle) -> bool {
    if !handle.alive {
        return false;
    }
    match handle.child.try_wait() {
        Ok(Some(status)) => {
            handle.alive = false;
            warn!(
                "{} worker PID {} exited on its own ({}); it will not be restarted",
                handle.category, handle.process_id, status
            );
            true
        }
        Ok(None) => false,
        Err(e) => {
            warn!("Could not check liveness of PID {}: {}", handle.process_id, e);
            false
        }
    }
}

/// Logs the kernel's view of a live worker.
pub fn log_status(handle: &WorkerHandle) {
    match ProcStatus::try_from(handle.process_id) {
        Ok(status) if status.is_zombie() => {
            debug!("{} worker PID {} is a zombie", handle.category, status.process_id)
        }
        Ok(status) => debug!(
            "{} worker PID {}: state {}, RSS {} MB, CPU {} jiffies",
            handle.category,
            status.process_id,
            status.state,
            status.memory_rss_mb,
            status.cpu_time_jiffies
        ),
        //Ignore the error if a worker vanished between the check and the read
        Err(ProcError::NotFound(_)) => {}
        Err(e) => debug!("Could not read /proc data for PID {}: {:?}", handle.process_id, e),
    }
}

/// True when no process (not even a zombie) is left for `pid`.
#[cfg(test)]
pub fn is_reaped(pid: u32) -> bool {
    matches!(ProcStatus::try_from(pid), Err(ProcError::NotFound(_)))
}
