//! Output formatting utilities
//!
//! Provides table and JSON output formatting for CLI commands.

use crate::cli::args::OutputFormat;
use crate::domain::{ClockLock, FanSpeed, GpuInfo, GpuSample};
use crate::memtemp::ProbeTarget;
use crate::services::LoopSummary;
use serde::Serialize;
use std::io::{self, Write};

/// Format and print output based on the selected format
pub fn print_output<T: Serialize + TableDisplay>(data: &T, format: OutputFormat) -> io::Result<()> {
    let stdout = io::stdout();
    let mut handle = stdout.lock();

    match format {
        OutputFormat::Table => {
            writeln!(handle, "{}", data.to_table())?;
        }
        OutputFormat::Json => {
            let json = serde_json::to_string_pretty(data).unwrap_or_else(|_| "{}".to_string());
            writeln!(handle, "{}", json)?;
        }
        OutputFormat::Compact => {
            writeln!(handle, "{}", data.to_compact())?;
        }
    }

    Ok(())
}

/// Trait for types that can be displayed as a table
pub trait TableDisplay {
    /// Format as a table string
    fn to_table(&self) -> String;

    /// Format as a compact single line
    fn to_compact(&self) -> String {
        self.to_table().replace('\n', " | ")
    }
}

/// Clock against its lock
#[derive(Debug, Clone, Serialize)]
pub struct ClockStatus {
    pub current_mhz: u32,
    pub lock_mhz: u32,
    pub offset_mhz: i64,
}

impl From<ClockLock> for ClockStatus {
    fn from(lock: ClockLock) -> Self {
        Self {
            current_mhz: lock.current.as_mhz(),
            lock_mhz: lock.lock.as_mhz(),
            offset_mhz: lock.offset_mhz(),
        }
    }
}

/// One telemetry sample with the duty the fan law picks for it
#[derive(Debug, Clone, Serialize)]
pub struct StatusReport {
    pub gpu_index: u32,
    pub gpu_name: String,
    pub core_temp_c: f32,
    pub mem_temp_c: Option<f32>,
    pub power_w: Option<f32>,
    pub power_limit_w: Option<f32>,
    pub gpu_util_pct: Option<u8>,
    pub mem_util_pct: Option<u8>,
    pub core_clock: Option<ClockStatus>,
    pub mem_clock: Option<ClockStatus>,
    pub vram_used_mb: Option<f64>,
    pub vram_total_mb: Option<f64>,
    pub fan_speed_pct: Option<u8>,
    pub target_duty_pct: u8,
}

impl StatusReport {
    /// Build the report for `sample` taken on `info`
    pub fn new(info: &GpuInfo, sample: &GpuSample, target: FanSpeed) -> Self {
        let core = sample.core();
        Self {
            gpu_index: info.index,
            gpu_name: info.name.clone(),
            core_temp_c: sample.core_temperature().as_celsius(),
            mem_temp_c: sample.memory_temperature().map(|t| t.as_celsius()),
            power_w: core.power_usage.map(|p| p.as_watts()),
            power_limit_w: core.power_limit.map(|p| p.as_watts()),
            gpu_util_pct: core.utilization.map(|u| u.gpu_percent()),
            mem_util_pct: core.utilization.map(|u| u.memory_percent()),
            core_clock: core.core_lock.map(ClockStatus::from),
            mem_clock: core.memory_lock.map(ClockStatus::from),
            vram_used_mb: core.memory.map(|m| m.used_mb()),
            vram_total_mb: core.memory.map(|m| m.total_mb()),
            fan_speed_pct: core.fan_speed.map(|f| f.as_percentage()),
            target_duty_pct: target.as_percentage(),
        }
    }
}

fn or_na<T: std::fmt::Display>(value: Option<T>, unit: &str) -> String {
    match value {
        Some(v) => format!("{}{}", v, unit),
        None => "N/A".to_string(),
    }
}

impl TableDisplay for StatusReport {
    fn to_table(&self) -> String {
        let mut output = format!("[{}] {}\n", self.gpu_index, self.gpu_name);

        output.push_str(&format!(
            "  Power: {} / {}\n",
            or_na(self.power_w.map(|w| format!("{:.2}", w)), " W"),
            or_na(self.power_limit_w.map(|w| format!("{:.2}", w)), " W")
        ));
        output.push_str(&format!("  Core Temperature: {}°C\n", self.core_temp_c));
        output.push_str(&format!(
            "  Memory Temperature: {}\n",
            or_na(self.mem_temp_c, "°C")
        ));
        output.push_str(&format!(
            "  Utilization: GPU {}, Memory {}\n",
            or_na(self.gpu_util_pct, "%"),
            or_na(self.mem_util_pct, "%")
        ));

        for (label, clock) in [("Core", &self.core_clock), ("Memory", &self.mem_clock)] {
            match clock {
                Some(c) => output.push_str(&format!(
                    "  {} Clock: {} MHz (lock {} MHz, offset {:+} MHz)\n",
                    label, c.current_mhz, c.lock_mhz, c.offset_mhz
                )),
                None => output.push_str(&format!("  {} Clock: N/A\n", label)),
            }
        }

        if let (Some(used), Some(total)) = (self.vram_used_mb, self.vram_total_mb) {
            output.push_str(&format!("  VRAM: {:.0} / {:.0} MB\n", used, total));
        }

        output.push_str(&format!(
            "  Fan: {} (target {}%)\n",
            or_na(self.fan_speed_pct, "%"),
            self.target_duty_pct
        ));

        output
    }

    fn to_compact(&self) -> String {
        let mut line = format!("core {}°C", self.core_temp_c);
        if let Some(mem) = self.mem_temp_c {
            line.push_str(&format!(" mem {}°C", mem));
        }
        if let Some(w) = self.power_w {
            line.push_str(&format!(" power {:.0}W", w));
        }
        line.push_str(&format!(
            " fan {} -> {}%",
            or_na(self.fan_speed_pct, "%"),
            self.target_duty_pct
        ));
        line
    }
}

/// Memory-junction probe details
#[derive(Debug, Clone, Serialize)]
pub struct MemTempReport {
    pub gpu_index: u32,
    pub gpu_name: String,
    pub pci_bus_id: Option<String>,
    pub pci_device_id: Option<String>,
    pub target: Option<ProbeTarget>,
    pub register_address: Option<String>,
    pub raw: Option<String>,
    pub mem_temp_c: Option<f32>,
    pub error: Option<String>,
}

impl TableDisplay for MemTempReport {
    fn to_table(&self) -> String {
        let mut output = format!("[{}] {}\n", self.gpu_index, self.gpu_name);

        if let (Some(bus), Some(dev)) = (&self.pci_bus_id, &self.pci_device_id) {
            output.push_str(&format!("  PCI: {} (device {})\n", bus, dev));
        }
        if let Some(target) = &self.target {
            output.push_str(&format!("  Architecture: {}\n", target.arch));
            output.push_str(&format!("  BAR0: {:#x}\n", target.bar0));
        }
        if let Some(addr) = &self.register_address {
            output.push_str(&format!("  Register: {}\n", addr));
        }
        if let Some(raw) = &self.raw {
            output.push_str(&format!("  Raw Value: {}\n", raw));
        }
        output.push_str(&format!(
            "  Memory Temperature: {}\n",
            or_na(self.mem_temp_c, "°C")
        ));
        if let Some(err) = &self.error {
            output.push_str(&format!("  Error: {}\n", err));
        }

        output
    }

    fn to_compact(&self) -> String {
        match (&self.target, self.mem_temp_c, &self.error) {
            (Some(t), Some(temp), _) => format!("{} {}°C", t.arch, temp),
            (_, _, Some(err)) => format!("unavailable: {}", err),
            _ => "unavailable".to_string(),
        }
    }
}

impl TableDisplay for LoopSummary {
    fn to_table(&self) -> String {
        format!(
            "Ticks: {}\nSkipped: {}\nActuator Failures: {}",
            self.ticks, self.skipped, self.actuator_failures
        )
    }

    fn to_compact(&self) -> String {
        format!(
            "ticks={} skipped={} actuator_failures={}",
            self.ticks, self.skipped, self.actuator_failures
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{ClockSpeed, CoreMetrics, Power, Temperature};
    use crate::memtemp::ArchitectureId;

    fn info() -> GpuInfo {
        GpuInfo::new(0, "NVIDIA GeForce RTX 3090".to_string(), "GPU-1".to_string())
    }

    #[test]
    fn test_status_report_table() {
        let mut core = CoreMetrics::with_temperature(Temperature::new(64.0));
        core.power_usage = Some(Power::from_watts(250));
        core.core_lock = Some(ClockLock::new(
            ClockSpeed::new(1800),
            Some(ClockSpeed::new(1905)),
        ));
        let sample = GpuSample::new(core, Some(Temperature::new(88.0)));

        let report = StatusReport::new(&info(), &sample, FanSpeed::new(90).unwrap());
        let table = report.to_table();

        assert!(table.contains("[0] NVIDIA GeForce RTX 3090"));
        assert!(table.contains("Power: 250.00 W / N/A"));
        assert!(table.contains("Memory Temperature: 88°C"));
        assert!(table.contains("offset +105 MHz"));
        assert!(table.contains("Memory Clock: N/A"));
        assert!(table.contains("target 90%"));
    }

    #[test]
    fn test_status_report_compact() {
        let sample = GpuSample::new(CoreMetrics::with_temperature(Temperature::new(75.0)), None);
        let report = StatusReport::new(&info(), &sample, FanSpeed::new(25).unwrap());
        assert_eq!(report.to_compact(), "core 75°C fan N/A -> 25%");
    }

    #[test]
    fn test_status_report_json() {
        let sample = GpuSample::new(CoreMetrics::with_temperature(Temperature::new(75.0)), None);
        let report = StatusReport::new(&info(), &sample, FanSpeed::new(25).unwrap());
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["core_temp_c"], 75.0);
        assert!(json["mem_temp_c"].is_null());
        assert_eq!(json["target_duty_pct"], 25);
    }

    #[test]
    fn test_memtemp_report() {
        let report = MemTempReport {
            gpu_index: 0,
            gpu_name: "RTX 3090".to_string(),
            pci_bus_id: Some("0000:01:00.0".to_string()),
            pci_device_id: Some("2204".to_string()),
            target: Some(ProbeTarget {
                bar0: 0xfb00_0000,
                arch: ArchitectureId::Ga102,
            }),
            register_address: Some("0xfb00e2a8".to_string()),
            raw: Some("0x00000b40".to_string()),
            mem_temp_c: Some(90.0),
            error: None,
        };

        let table = report.to_table();
        assert!(table.contains("Architecture: GA102"));
        assert!(table.contains("BAR0: 0xfb000000"));
        assert_eq!(report.to_compact(), "GA102 90°C");
    }
}
