//! Validated stress test configuration.

use std::time::Duration;

use tracing::warn;

use crate::error::{Error, Result};

/// Memory size above which a warning is printed, in MB per worker.
const LARGE_MEMORY_MB: usize = 1000;

/// Immutable run parameters, validated once by [`StressConfig::new`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StressConfig {
    pub cores: usize,
    pub duration: Duration,
    pub intensity: u32,
    pub memory_processes: usize,
    pub memory_size_mb: usize,
}

impl StressConfig {
    /// Validates raw command line values.
    ///
    /// Every count must be strictly positive except `memory_processes`, which
    /// may be zero to disable memory stress.
    pub fn new(
        cores: i64,
        duration_secs: i64,
        intensity: i64,
        memory_processes: i64,
        memory_size_mb: i64,
    ) -> Result<Self> {
        if cores <= 0 {
            return Err(Error::Validation("Number of cores must be positive".into()));
        }
        if duration_secs <= 0 {
            return Err(Error::Validation("Duration must be positive".into()));
        }
        if intensity <= 0 {
            return Err(Error::Validation("Intensity must be positive".into()));
        }
        if memory_processes < 0 {
            return Err(Error::Validation("Memory processes cannot be negative".into()));
        }
        if memory_size_mb <= 0 {
            return Err(Error::Validation("Memory size must be positive".into()));
        }

        Ok(StressConfig {
            cores: to_usize(cores, "cores")?,
            duration: Duration::from_secs(duration_secs as u64),
            intensity: u32::try_from(intensity)
                .map_err(|_| Error::Validation(format!("Intensity too large: {intensity}")))?,
            memory_processes: to_usize(memory_processes, "memory processes")?,
            memory_size_mb: to_usize(memory_size_mb, "memory size")?,
        })
    }

    /// Memory size shown on the dashboard: zero when memory stress is off.
    pub fn effective_memory_size_mb(&self) -> usize {
        if self.memory_processes > 0 {
            self.memory_size_mb
        } else {
            0
        }
    }

    /// Non-fatal sanity checks against the host. Each warning is logged and
    /// returned.
    pub fn capacity_warnings(&self, logical_cores: usize) -> Vec<String> {
        let mut warnings = Vec::new();
        if self.cores > logical_cores {
            warnings.push(format!(
                "Requesting {} cores but system has {}",
                self.cores, logical_cores
            ));
        }
        if self.memory_processes > 0 && self.memory_size_mb > LARGE_MEMORY_MB {
            warnings.push(format!(
                "Large memory allocation ({}MB per process)",
                self.memory_size_mb
            ));
        }
        for w in &warnings {
            warn!("{}", w);
        }
        warnings
    }
}

fn to_usize(value: i64, name: &str) -> Result<usize> {
    usize::try_from(value).map_err(|_| Error::Validation(format!("Invalid {name}: {value}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rejects(cores: i64, time: i64, intensity: i64, mem_procs: i64, mem_size: i64) -> String {
        match StressConfig::new(cores, time, intensity, mem_procs, mem_size) {
            Err(Error::Validation(msg)) => msg,
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[test]
    fn rejects_invalid_values() {
        assert_eq!(rejects(0, 10, 1, 0, 100), "Number of cores must be positive");
        assert_eq!(rejects(1, -1, 1, 0, 100), "Duration must be positive");
        assert_eq!(rejects(1, 10, 0, 0, 100), "Intensity must be positive");
        assert_eq!(rejects(1, 10, 1, -1, 100), "Memory processes cannot be negative");
        assert_eq!(rejects(1, 10, 1, 0, 0), "Memory size must be positive");
    }

    #[test]
    fn accepts_minimal_config() {
        let config = StressConfig::new(1, 1, 1, 0, 1).unwrap();
        assert_eq!(config.cores, 1);
        assert_eq!(config.duration, Duration::from_secs(1));
        assert_eq!(config.intensity, 1);
        assert_eq!(config.memory_processes, 0);
        assert_eq!(config.memory_size_mb, 1);
        assert_eq!(config.effective_memory_size_mb(), 0);
    }

    #[test]
    fn intensity_overflow_is_a_validation_error() {
        let err = StressConfig::new(1, 1, i64::from(u32::MAX) + 1, 0, 1).unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
    }

    #[test]
    fn oversubscription_only_warns() {
        let config = StressConfig::new(64, 1, 1, 2, 2048).unwrap();
        let warnings = config.capacity_warnings(8);
        assert_eq!(warnings.len(), 2);
        assert!(warnings[0].contains("64 cores"));
        assert!(warnings[1].contains("2048MB"));

        let quiet = StressConfig::new(4, 1, 1, 0, 2048).unwrap();
        assert!(quiet.capacity_warnings(8).is_empty());
    }
}
