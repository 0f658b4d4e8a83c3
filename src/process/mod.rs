use std::fmt;
use std::process::Child;

// 1. Declare submodules
mod status;

pub use status::ProcStatus;

/// Which workload a worker process runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Category {
    Cpu,
    Memory,
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Category::Cpu => f.write_str("cpu"),
            Category::Memory => f.write_str("memory"),
        }
    }
}

/// One spawned worker process.
///
/// Owned by the supervisor from spawn until it has been reaped; the `Child`
/// never leaves it, so nothing else can signal or wait on the worker.
#[derive(Debug)]
pub struct WorkerHandle {
    pub process_id: u32,
    pub category: Category,
    pub alive: bool,
    pub(crate) child: Child,
}

impl WorkerHandle {
    pub fn new(category: Category, child: Child) -> Self {
        WorkerHandle {
            process_id: child.id(),
            category,
            alive: true,
            child,
        }
    }
}
