//! Error types for the stress tester.

use thiserror::Error;

use crate::process::Category;

/// Result type alias using our Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while configuring, running or cleaning up a stress test.
#[derive(Error, Debug)]
pub enum Error {
    /// Bad command line input. Fatal, nothing has been spawned yet.
    #[error("Invalid argument: {0}")]
    Validation(String),

    /// The OS refused to create a worker process.
    #[error("Failed to spawn {category} worker: {source}")]
    Spawn {
        category: Category,
        #[source]
        source: std::io::Error,
    },

    /// Sending a signal to a worker failed.
    #[error("Failed to send {signal} to PID {pid}: {source}")]
    Signal {
        pid: u32,
        signal: nix::sys::signal::Signal,
        #[source]
        source: nix::Error,
    },

    /// Waiting on a worker failed.
    #[error("Failed to wait for PID {pid}: {source}")]
    Wait {
        pid: u32,
        #[source]
        source: std::io::Error,
    },

    /// A single metrics poll failed.
    #[error("Metrics error: {0}")]
    Metrics(String),

    /// A workload failed inside its own worker process.
    #[error("Workload error: {0}")]
    Workload(String),

    /// Writing the dashboard to the terminal failed.
    #[error("Display error: {0}")]
    Display(#[source] std::io::Error),

    /// Any other I/O failure.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<procfs::ProcError> for Error {
    fn from(e: procfs::ProcError) -> Self {
        Error::Metrics(e.to_string())
    }
}
