//! Terminal dashboard.
//!
//! Rendering is a pure function of one tick's inputs; [`Dashboard::tick`]
//! draws the frame and writes the matching log line together.

use std::fmt::Write as _;
use std::io::Write;
use std::time::Duration;

use crossterm::cursor::MoveTo;
use crossterm::queue;
use crossterm::terminal::{Clear, ClearType};
use tracing::{error, info};

use crate::config::StressConfig;
use crate::error::{Error, Result};
use crate::metrics::{MetricsSnapshot, TemperatureStatus, Temperatures};

const WIDTH: usize = 60;
const BAR_SEGMENTS: usize = 20;
const GIB: f64 = 1024.0 * 1024.0 * 1024.0;

/// 20-segment usage bar, one segment per 5%.
pub fn bar(percent: f64) -> String {
    let filled = if percent.is_nan() {
        0
    } else {
        ((percent.clamp(0.0, 100.0) / 5.0) as usize).min(BAR_SEGMENTS)
    };
    format!("{}{}", "█".repeat(filled), "░".repeat(BAR_SEGMENTS - filled))
}

/// One line per sensor reading, or a single line explaining why there are none.
pub fn temperature_lines(status: &TemperatureStatus) -> Vec<String> {
    match status {
        TemperatureStatus::Error(e) => vec![format!("Temperature reading error: {e}")],
        TemperatureStatus::Read(Temperatures::Unsupported) => {
            vec!["Temperature monitoring not supported on this platform".to_string()]
        }
        TemperatureStatus::Read(Temperatures::Sensors(sensors)) if sensors.is_empty() => {
            vec!["Temperature sensors not available".to_string()]
        }
        TemperatureStatus::Read(Temperatures::Sensors(sensors)) => sensors
            .iter()
            .flat_map(|(name, readings)| {
                readings
                    .iter()
                    .filter(|r| r.current != 0.0)
                    .map(move |r| format!("Temp ({name}): {:.1}°C", r.current))
            })
            .collect(),
    }
}

pub fn render(elapsed: Duration, config: &StressConfig, metrics: &MetricsSnapshot) -> String {
    let heavy = "=".repeat(WIDTH);
    let light = "-".repeat(WIDTH);
    let mut out = String::new();

    // Writing into a String cannot fail.
    let _ = writeln!(out, "{heavy}");
    let _ = writeln!(out, "CPU & MEMORY STRESS TESTER DASHBOARD");
    let _ = writeln!(out, "{heavy}");
    let _ = writeln!(out, "Elapsed Time: {:.1}s", elapsed.as_secs_f64());
    let _ = writeln!(out, "CPU Cores Stressed: {}", config.cores);
    let _ = writeln!(
        out,
        "Memory Stress Size: {}MB per process",
        config.effective_memory_size_mb()
    );
    let _ = writeln!(out, "Intensity Level: {}", config.intensity);
    let _ = writeln!(out, "{light}");

    let _ = writeln!(out, "Overall CPU Usage: {:.1}%", metrics.cpu_percent);
    let _ = writeln!(out, "Per-Core Usage:");
    for (i, usage) in metrics.per_core.iter().enumerate() {
        let _ = writeln!(out, "   Core {i:2}: [{}] {usage:5.1}%", bar(*usage));
    }
    let _ = writeln!(out, "{light}");

    let mem = &metrics.memory;
    let _ = writeln!(out, "Memory Usage: {:.1}%", mem.percent);
    let _ = writeln!(
        out,
        "Used: {:.2}GB / {:.2}GB",
        mem.used as f64 / GIB,
        mem.total as f64 / GIB
    );
    let _ = writeln!(out, "   Memory: [{}] {:.1}%", bar(mem.percent), mem.percent);
    let _ = writeln!(out, "{light}");

    let _ = writeln!(out, "Temperature Information:");
    for line in temperature_lines(&metrics.temperatures) {
        let _ = writeln!(out, "   {line}");
    }
    let _ = writeln!(out, "{light}");
    let _ = writeln!(out, "Press Ctrl+C to stop the stress test gracefully");
    let _ = writeln!(out, "{heavy}");
    out
}

/// Draws frames onto a terminal (or any writer).
pub struct Dashboard<W: Write> {
    out: W,
    clear_screen: bool,
}

impl<W: Write> Dashboard<W> {
    pub fn new(out: W) -> Self {
        Dashboard {
            out,
            clear_screen: true,
        }
    }

    /// Appends frames instead of redrawing in place.
    #[cfg(test)]
    pub fn without_clearing(mut self) -> Self {
        self.clear_screen = false;
        self
    }

    #[cfg(test)]
    pub fn writer(&self) -> &W {
        &self.out
    }

    /// Draws one tick. A failed poll is shown and logged instead of the
    /// frame; only a failure to write to the terminal is returned.
    pub fn tick(
        &mut self,
        elapsed: Duration,
        config: &StressConfig,
        metrics: Result<MetricsSnapshot>,
    ) -> Result<()> {
        self.draw(elapsed, config, metrics).map_err(Error::Display)
    }

    fn draw(
        &mut self,
        elapsed: Duration,
        config: &StressConfig,
        metrics: Result<MetricsSnapshot>,
    ) -> std::io::Result<()> {
        match metrics {
            Ok(snapshot) => {
                if self.clear_screen {
                    queue!(self.out, Clear(ClearType::All), MoveTo(0, 0))?;
                }
                self.out.write_all(render(elapsed, config, &snapshot).as_bytes())?;
                info!(
                    "Elapsed: {:.1}s, CPU: {:.1}%, Memory: {:.1}%",
                    elapsed.as_secs_f64(),
                    snapshot.cpu_percent,
                    snapshot.memory.percent
                );
            }
            Err(e) => {
                writeln!(self.out, "Dashboard error: {e}")?;
                error!("Dashboard error: {}", e);
            }
        }
        self.out.flush()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    use crate::metrics::{TempReading, VirtualMemory};

    fn filled(bar: &str) -> usize {
        bar.chars().filter(|&c| c == '█').count()
    }

    fn snapshot() -> MetricsSnapshot {
        MetricsSnapshot {
            cpu_percent: 48.3,
            per_core: vec![0.0, 45.0, 100.0],
            memory: VirtualMemory::from_total_available(16 << 30, 12 << 30),
            temperatures: TemperatureStatus::Read(Temperatures::Unsupported),
        }
    }

    #[test]
    fn bar_segments() {
        assert_eq!(bar(0.0), "░".repeat(20));
        assert_eq!(bar(100.0), "█".repeat(20));
        assert_eq!(filled(&bar(45.0)), 9);
        assert_eq!(bar(45.0).chars().count(), 20);
        assert_eq!(filled(&bar(4.9)), 0);
        assert_eq!(filled(&bar(250.0)), 20);
        assert_eq!(filled(&bar(-3.0)), 0);
        assert_eq!(filled(&bar(f64::NAN)), 0);
    }

    #[test]
    fn renders_all_sections() {
        let config = StressConfig::new(3, 10, 2, 1, 256).unwrap();
        let frame = render(Duration::from_millis(2_345), &config, &snapshot());

        assert!(frame.contains("Elapsed Time: 2.3s"));
        assert!(frame.contains("CPU Cores Stressed: 3"));
        assert!(frame.contains("Memory Stress Size: 256MB per process"));
        assert!(frame.contains("Intensity Level: 2"));
        assert!(frame.contains("Overall CPU Usage: 48.3%"));
        assert!(frame.contains(&format!("Core  1: [{}]  45.0%", bar(45.0))));
        assert!(frame.contains("Core  2: ["));
        assert!(frame.contains("Memory Usage: 25.0%"));
        assert!(frame.contains("Used: 4.00GB / 16.00GB"));
        assert!(frame.contains("Temperature monitoring not supported on this platform"));
    }

    #[test]
    fn memory_size_is_zero_without_memory_workers() {
        let config = StressConfig::new(1, 10, 1, 0, 256).unwrap();
        let frame = render(Duration::ZERO, &config, &snapshot());
        assert!(frame.contains("Memory Stress Size: 0MB per process"));
    }

    #[test]
    fn temperature_messages() {
        let empty = TemperatureStatus::Read(Temperatures::Sensors(BTreeMap::new()));
        assert_eq!(temperature_lines(&empty), ["Temperature sensors not available"]);

        let mut sensors = BTreeMap::new();
        sensors.insert(
            "coretemp".to_string(),
            vec![
                TempReading {
                    label: "Core 0".into(),
                    current: 51.34,
                    high: Some(80.0),
                    critical: None,
                },
                TempReading {
                    label: "Core 1".into(),
                    current: 0.0,
                    high: None,
                    critical: None,
                },
            ],
        );
        let lines = temperature_lines(&TemperatureStatus::Read(Temperatures::Sensors(sensors)));
        assert_eq!(lines, ["Temp (coretemp): 51.3°C"]);

        let failed = TemperatureStatus::Error("permission denied".into());
        assert_eq!(
            temperature_lines(&failed),
            ["Temperature reading error: permission denied"]
        );
    }

    #[test]
    fn tick_draws_frame_or_error_line() {
        let config = StressConfig::new(1, 10, 1, 0, 1).unwrap();
        let mut dashboard = Dashboard::new(Vec::new()).without_clearing();

        dashboard
            .tick(Duration::from_secs(1), &config, Ok(snapshot()))
            .unwrap();
        dashboard
            .tick(
                Duration::from_secs(2),
                &config,
                Err(Error::Metrics("no /proc/stat".into())),
            )
            .unwrap();

        let text = String::from_utf8(dashboard.writer().clone()).unwrap();
        assert!(text.contains("Elapsed Time: 1.0s"));
        assert!(text.contains("Dashboard error: Metrics error: no /proc/stat"));
    }
}
