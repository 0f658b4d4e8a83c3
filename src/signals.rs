//! Interrupt handling.
//!
//! SIGINT and SIGTERM are blocked process-wide and collected by a dedicated
//! thread with `sigwait`, so the shutdown work never runs in signal context.

use std::sync::Arc;
use std::thread::{self, JoinHandle};

use nix::sys::signal::{SigSet, Signal};
use tracing::{error, info, warn};

use crate::error::Result;
use crate::run_state::RunState;
use crate::supervisor::{self, SharedSupervisor};

fn interrupt_set() -> SigSet {
    let mut mask = SigSet::empty();
    mask.add(Signal::SIGINT);
    mask.add(Signal::SIGTERM);
    mask
}

/// First interrupt: stop the run and clean up the workers. Later ones are
/// ignored. Returns whether this call did the shutdown.
pub fn handle_interrupt(run_state: &RunState, supervisor: &SharedSupervisor) -> bool {
    if !run_state.stop() {
        warn!("Interrupt received while already shutting down; ignoring");
        return false;
    }
    println!("\nInterrupt received. Shutting down gracefully...");
    info!("Interrupt signal received, initiating shutdown");
    supervisor::lock(supervisor).terminate_all();
    true
}

/// Blocks the interrupt signals and starts the watcher thread.
///
/// Must run before any other thread or worker is created so that all of them
/// inherit the blocked mask.
pub fn install(run_state: Arc<RunState>, supervisor: SharedSupervisor) -> Result<JoinHandle<()>> {
    let mask = interrupt_set();
    mask.thread_block().map_err(std::io::Error::from)?;

    let handle = thread::Builder::new()
        .name("signal-watcher".into())
        .spawn(move || {
            loop {
                match mask.wait() {
                    Ok(sig) => {
                        info!("Received {}", sig);
                        handle_interrupt(&run_state, &supervisor);
                    }
                    Err(e) => {
                        error!("Waiting for signals failed: {}", e);
                        return;
                    }
                }
            }
        })?;
    Ok(handle)
}
