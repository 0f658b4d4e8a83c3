//! Cancellation token shared between the signal watcher and the polling loop.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Condvar, Mutex, PoisonError};
use std::time::Duration;

/// `running` starts true and flips to false at most once. One writer (the
/// interrupt path), any number of readers.
#[derive(Debug)]
pub struct RunState {
    running: AtomicBool,
    lock: Mutex<()>,
    stopped: Condvar,
}

impl RunState {
    pub fn new() -> Self {
        RunState {
            running: AtomicBool::new(true),
            lock: Mutex::new(()),
            stopped: Condvar::new(),
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Requests shutdown and wakes any sleeper. Returns true only for the
    /// call that performed the transition.
    pub fn stop(&self) -> bool {
        let _guard = self.lock.lock().unwrap_or_else(PoisonError::into_inner);
        let was_running = self.running.swap(false, Ordering::SeqCst);
        if was_running {
            self.stopped.notify_all();
        }
        was_running
    }

    /// Sleeps for `duration` unless stopped first. Returns whether the run
    /// is still going.
    pub fn sleep(&self, duration: Duration) -> bool {
        let guard = self.lock.lock().unwrap_or_else(PoisonError::into_inner);
        let _guard = self
            .stopped
            .wait_timeout_while(guard, duration, |_| self.is_running())
            .unwrap_or_else(PoisonError::into_inner);
        self.is_running()
    }
}

impl Default for RunState {
    fn default() -> Self {
        Self::new()
    }
}
