//! Burn routines executed inside worker processes.
//!
//! Neither workload checks any flag: a worker only stops when the supervisor
//! terminates or kills its process.

mod cpu;
mod memory;
mod rng;

pub use cpu::CpuBurn;
pub use memory::MemoryBurn;

use crate::process::Category;

/// What a worker process should run, with its parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Workload {
    Cpu { intensity: u32 },
    Memory { size_mb: usize },
}

impl Workload {
    pub fn category(&self) -> Category {
        match self {
            Workload::Cpu { .. } => Category::Cpu,
            Workload::Memory { .. } => Category::Memory,
        }
    }

    /// Arguments that select this workload on the hidden `worker` subcommand.
    pub fn worker_args(&self) -> Vec<String> {
        match self {
            Workload::Cpu { intensity } => vec![
                "worker".into(),
                "cpu".into(),
                "--intensity".into(),
                intensity.to_string(),
            ],
            Workload::Memory { size_mb } => vec![
                "worker".into(),
                "memory".into(),
                "--size-mb".into(),
                size_mb.to_string(),
            ],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn worker_args_select_the_subcommand() {
        assert_eq!(
            Workload::Cpu { intensity: 3 }.worker_args(),
            ["worker", "cpu", "--intensity", "3"]
        );
        assert_eq!(
            Workload::Memory { size_mb: 64 }.worker_args(),
            ["worker", "memory", "--size-mb", "64"]
        );
        assert_eq!(Workload::Memory { size_mb: 1 }.category(), Category::Memory);
    }
}
