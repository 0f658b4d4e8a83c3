use std::collections::HashSet;
use std::thread;
use std::time::Duration;

use procfs::{CpuInfo, CpuTime, Current, CurrentSI, KernelStats, Meminfo};

use super::sensors::SensorTree;
use super::{SystemMetrics, Temperatures, VirtualMemory};
use crate::error::{Error, Result};

/// Window sampled when a CPU method has no earlier reading to diff against.
const FIRST_SAMPLE: Duration = Duration::from_millis(100);

/// Busy and total jiffies of one CPU line of /proc/stat.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CpuTicks {
    pub busy: u64,
    pub total: u64,
}

impl From<&CpuTime> for CpuTicks {
    fn from(t: &CpuTime) -> Self {
        let idle = t.idle + t.iowait.unwrap_or(0);
        let busy = t.user
            + t.nice
            + t.system
            + t.irq.unwrap_or(0)
            + t.softirq.unwrap_or(0)
            + t.steal.unwrap_or(0);
        CpuTicks {
            busy,
            total: busy + idle,
        }
    }
}

/// Utilisation between two readings, in percent.
pub fn usage_percent(prev: CpuTicks, cur: CpuTicks) -> f64 {
    let total = cur.total.saturating_sub(prev.total);
    if total == 0 {
        return 0.0;
    }
    let busy = cur.busy.saturating_sub(prev.busy);
    (busy as f64 / total as f64 * 100.0).clamp(0.0, 100.0)
}

/// Metrics of the local Linux host.
pub struct ProcfsMetrics {
    last_total: Option<CpuTicks>,
    last_per_core: Option<Vec<CpuTicks>>,
    sensors: SensorTree,
}

impl ProcfsMetrics {
    pub fn new() -> Self {
        ProcfsMetrics {
            last_total: None,
            last_per_core: None,
            sensors: SensorTree::system(),
        }
    }

    fn read_ticks() -> Result<(CpuTicks, Vec<CpuTicks>)> {
        let stats = KernelStats::current()?;
        let total = CpuTicks::from(&stats.total);
        let per_core = stats.cpu_time.iter().map(CpuTicks::from).collect();
        Ok((total, per_core))
    }
}

impl Default for ProcfsMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl SystemMetrics for ProcfsMetrics {
    fn cpu_count_physical(&self) -> Result<usize> {
        let info = CpuInfo::current()?;
        let cores: HashSet<(&str, &str)> = (0..info.num_cores())
            .filter_map(|cpu| Some((info.get_field(cpu, "physical id")?, info.get_field(cpu, "core id")?)))
            .collect();
        // Some architectures (and VMs) do not report topology.
        if cores.is_empty() {
            Ok(info.num_cores())
        } else {
            Ok(cores.len())
        }
    }

    fn cpu_count_logical(&self) -> Result<usize> {
        Ok(CpuInfo::current()?.num_cores())
    }

    fn cpu_percent(&mut self) -> Result<f64> {
        let prev = match self.last_total {
            Some(prev) => prev,
            None => {
                let (total, _) = Self::read_ticks()?;
                thread::sleep(FIRST_SAMPLE);
                total
            }
        };
        let (cur, _) = Self::read_ticks()?;
        self.last_total = Some(cur);
        Ok(usage_percent(prev, cur))
    }

    fn cpu_percent_per_core(&mut self) -> Result<Vec<f64>> {
        let prev = match self.last_per_core.take() {
            Some(prev) => prev,
            None => {
                let (_, per_core) = Self::read_ticks()?;
                thread::sleep(FIRST_SAMPLE);
                per_core
            }
        };
        let (_, cur) = Self::read_ticks()?;
        // A CPU that went offline or came online has no usable baseline.
        let usage = cur
            .iter()
            .enumerate()
            .map(|(i, &c)| prev.get(i).map_or(0.0, |&p| usage_percent(p, c)))
            .collect();
        self.last_per_core = Some(cur);
        Ok(usage)
    }

    fn virtual_memory(&self) -> Result<VirtualMemory> {
        let meminfo = Meminfo::current()?;
        let total = meminfo.mem_total;
        if total == 0 {
            return Err(Error::Metrics("MemTotal reported as zero".into()));
        }
        // Kernels before 3.14 lack MemAvailable.
        let available = meminfo
            .mem_available
            .unwrap_or(meminfo.mem_free + meminfo.buffers + meminfo.cached)
            .min(total);
        Ok(VirtualMemory::from_total_available(total, available))
    }

    fn temperatures(&self) -> Result<Temperatures> {
        Ok(self.sensors.read()?)
    }
}
