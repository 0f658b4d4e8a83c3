//! Temperature sensors from sysfs (hwmon, with thermal zones as fallback).

use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use super::{TempReading, Temperatures};

/// Reads `<root>/hwmon` and `<root>/thermal`; the root is `/sys/class` on a
/// real host.
#[derive(Debug, Clone)]
pub struct SensorTree {
    root: PathBuf,
}

impl SensorTree {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        SensorTree { root: root.into() }
    }

    pub fn system() -> Self {
        Self::new("/sys/class")
    }

    /// `Unsupported` when neither sysfs class exists; otherwise every
    /// readable sensor, grouped by chip name (possibly none at all).
    pub fn read(&self) -> io::Result<Temperatures> {
        let hwmon = self.root.join("hwmon");
        let thermal = self.root.join("thermal");
        if !hwmon.is_dir() && !thermal.is_dir() {
            return Ok(Temperatures::Unsupported);
        }

        let mut sensors = BTreeMap::new();
        if hwmon.is_dir() {
            read_hwmon(&hwmon, &mut sensors)?;
        }
        if sensors.is_empty() && thermal.is_dir() {
            read_thermal(&thermal, &mut sensors)?;
        }
        Ok(Temperatures::Sensors(sensors))
    }
}

fn read_trimmed(path: &Path) -> Option<String> {
    fs::read_to_string(path).ok().map(|s| s.trim().to_string())
}

/// sysfs reports millidegrees Celsius.
fn read_millidegrees(path: &Path) -> Option<f64> {
    read_trimmed(path)?.parse::<f64>().ok().map(|v| v / 1000.0)
}

fn sorted_entries(dir: &Path) -> io::Result<Vec<PathBuf>> {
    let mut entries: Vec<PathBuf> = fs::read_dir(dir)?
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .collect();
    entries.sort();
    Ok(entries)
}

fn read_hwmon(dir: &Path, sensors: &mut BTreeMap<String, Vec<TempReading>>) -> io::Result<()> {
    for chip in sorted_entries(dir)? {
        let name = read_trimmed(&chip.join("name")).unwrap_or_else(|| {
            chip.file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default()
        });

        let Ok(files) = sorted_entries(&chip) else {
            continue;
        };
        for input in files {
            let Some(file_name) = input.file_name().and_then(|n| n.to_str()) else {
                continue;
            };
            let Some(prefix) = file_name
                .strip_suffix("_input")
                .filter(|p| p.starts_with("temp"))
            else {
                continue;
            };
            let Some(current) = read_millidegrees(&input) else {
                continue;
            };
            let reading = TempReading {
                label: read_trimmed(&chip.join(format!("{prefix}_label"))).unwrap_or_default(),
                current,
                high: read_millidegrees(&chip.join(format!("{prefix}_max"))),
                critical: read_millidegrees(&chip.join(format!("{prefix}_crit"))),
            };
            sensors.entry(name.clone()).or_default().push(reading);
        }
    }
    Ok(())
}

fn read_thermal(dir: &Path, sensors: &mut BTreeMap<String, Vec<TempReading>>) -> io::Result<()> {
    for zone in sorted_entries(dir)? {
        let is_zone = zone
            .file_name()
            .and_then(|n| n.to_str())
            .is_some_and(|n| n.starts_with("thermal_zone"));
        if !is_zone {
            continue;
        }
        let Some(current) = read_millidegrees(&zone.join("temp")) else {
            continue;
        };
        let name = read_trimmed(&zone.join("type")).unwrap_or_else(|| "thermal".to_string());
        sensors.entry(name).or_default().push(TempReading {
            label: String::new(),
            current,
            high: None,
            critical: None,
        });
    }
    Ok(())
}
