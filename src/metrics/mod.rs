//! System metrics.
//!
//! Provides CPU usage, memory usage and temperature sensor readings, and the
//! per-tick snapshot the dashboard is rendered from.

mod procfs_source;
mod sensors;

pub use procfs_source::ProcfsMetrics;

use std::collections::BTreeMap;

use crate::error::Result;

/// Point-in-time host metrics.
pub trait SystemMetrics {
    /// Number of physical cores.
    fn cpu_count_physical(&self) -> Result<usize>;

    /// Number of logical CPUs.
    fn cpu_count_logical(&self) -> Result<usize>;

    /// Overall CPU utilisation in percent since the previous call.
    fn cpu_percent(&mut self) -> Result<f64>;

    /// Per-CPU utilisation in percent since the previous call, indexed by CPU.
    fn cpu_percent_per_core(&mut self) -> Result<Vec<f64>>;

    /// Physical memory usage.
    fn virtual_memory(&self) -> Result<VirtualMemory>;

    /// Temperature sensors, or `Unsupported` when the host exposes none.
    fn temperatures(&self) -> Result<Temperatures>;
}

/// Memory figures in bytes.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VirtualMemory {
    pub total: u64,
    pub available: u64,
    pub used: u64,
    pub percent: f64,
}

impl VirtualMemory {
    pub fn from_total_available(total: u64, available: u64) -> Self {
        let used = total.saturating_sub(available);
        let percent = if total == 0 {
            0.0
        } else {
            used as f64 / total as f64 * 100.0
        };
        VirtualMemory {
            total,
            available,
            used,
            percent,
        }
    }
}

/// One temperature sensor reading in °C.
#[derive(Debug, Clone, PartialEq)]
pub struct TempReading {
    pub label: String,
    pub current: f64,
    pub high: Option<f64>,
    pub critical: Option<f64>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Temperatures {
    /// The platform offers no way to read sensors.
    Unsupported,
    /// Readings grouped by sensor name. May be empty.
    Sensors(BTreeMap<String, Vec<TempReading>>),
}

/// Temperature part of a snapshot. A failed sensor read does not invalidate
/// the rest of the tick.
#[derive(Debug, Clone, PartialEq)]
pub enum TemperatureStatus {
    Read(Temperatures),
    Error(String),
}

/// Everything rendered and logged for one tick.
#[derive(Debug, Clone, PartialEq)]
pub struct MetricsSnapshot {
    pub cpu_percent: f64,
    pub per_core: Vec<f64>,
    pub memory: VirtualMemory,
    pub temperatures: TemperatureStatus,
}

impl MetricsSnapshot {
    pub fn capture<M: SystemMetrics + ?Sized>(metrics: &mut M) -> Result<Self> {
        let cpu_percent = metrics.cpu_percent()?;
        let per_core = metrics.cpu_percent_per_core()?;
        let memory = metrics.virtual_memory()?;
        let temperatures = match metrics.temperatures() {
            Ok(t) => TemperatureStatus::Read(t),
            Err(e) => TemperatureStatus::Error(e.to_string()),
        };
        Ok(MetricsSnapshot {
            cpu_percent,
            per_core,
            memory,
            temperatures,
        })
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::error::Error;

    /// Canned metrics for renderer and orchestrator tests.
    pub(crate) struct FakeMetrics {
        pub per_core: Vec<f64>,
        pub memory: VirtualMemory,
        pub temperatures: Option<Temperatures>,
        pub fail_cpu: bool,
        pub polls: usize,
    }

    impl FakeMetrics {
        pub(crate) fn new() -> Self {
            FakeMetrics {
                per_core: vec![0.0, 45.0, 100.0],
                memory: VirtualMemory::from_total_available(8 << 30, 6 << 30),
                temperatures: Some(Temperatures::Sensors(BTreeMap::new())),
                fail_cpu: false,
                polls: 0,
            }
        }
    }

    impl SystemMetrics for FakeMetrics {
        fn cpu_count_physical(&self) -> Result<usize> {
            Ok(self.per_core.len())
        }

        fn cpu_count_logical(&self) -> Result<usize> {
            Ok(self.per_core.len())
        }

        fn cpu_percent(&mut self) -> Result<f64> {
            self.polls += 1;
            if self.fail_cpu {
                return Err(Error::Metrics("no /proc/stat".into()));
            }
            Ok(self.per_core.iter().sum::<f64>() / self.per_core.len() as f64)
        }

        fn cpu_percent_per_core(&mut self) -> Result<Vec<f64>> {
            Ok(self.per_core.clone())
        }

        fn virtual_memory(&self) -> Result<VirtualMemory> {
            Ok(self.memory)
        }

        fn temperatures(&self) -> Result<Temperatures> {
            self.temperatures
                .clone()
                .ok_or_else(|| Error::Metrics("sensor read failed".into()))
        }
    }

    #[test]
    fn memory_percent_from_available() {
        let mem = VirtualMemory::from_total_available(1000, 250);
        assert_eq!(mem.used, 750);
        assert!((mem.percent - 75.0).abs() < 1e-9);
        assert_eq!(VirtualMemory::from_total_available(0, 0).percent, 0.0);
    }

    #[test]
    fn snapshot_keeps_temperature_errors_local() {
        let mut fake = FakeMetrics::new();
        fake.temperatures = None;
        let snapshot = MetricsSnapshot::capture(&mut fake).unwrap();
        assert_eq!(snapshot.per_core, vec![0.0, 45.0, 100.0]);
        assert!(matches!(snapshot.temperatures, TemperatureStatus::Error(_)));
    }

    #[test]
    fn snapshot_fails_on_cpu_errors() {
        let mut fake = FakeMetrics::new();
        fake.fail_cpu = true;
        assert!(matches!(
            MetricsSnapshot::capture(&mut fake),
            Err(Error::Metrics(_))
        ));
    }
}
