//! Memtemp command implementation
//!
//! Diagnoses the memory-junction probe: detection, mapping and one read.

use crate::cli::args::{OutputFormat, ProbeArgs};
use crate::cli::output::{print_output, MemTempReport};
use crate::cli::Cli;
use crate::commands::{apply_probe_args, base_config, resolve_target};
use crate::config::MemTempSettings;
use crate::error::{MemoryError, Result};
use crate::memtemp::MemTempProbe;
use crate::nvml::{GpuDevice, GpuManager, NvmlManager};

/// Execute the memtemp command
///
/// The report is printed even when the probe fails; the failure is then
/// returned so the exit status reflects it.
pub fn run_memtemp(cli: &Cli, args: &ProbeArgs, format: OutputFormat) -> Result<()> {
    // Probes even when memtemp.enabled is false
    let runtime = apply_probe_args(base_config(cli)?, args)
        .with_memtemp(Some(true))
        .build()
        .validate()?;
    let settings = runtime.memtemp.ok_or_else(|| {
        MemoryError::ProbeUnavailable("memory temperature monitoring disabled".to_string())
    })?;

    let manager = NvmlManager::new()?;
    let device = manager.device_by_index(runtime.gpu_index)?;

    let (report, outcome) = diagnose(&device, &settings)?;
    print_output(&report, format)?;
    outcome.map_err(Into::into)
}

/// Build the report, keeping the probe failure separate from NVML failures
pub fn diagnose<D: GpuDevice>(
    device: &D,
    settings: &MemTempSettings,
) -> Result<(MemTempReport, std::result::Result<(), MemoryError>)> {
    let info = device.info()?;

    let mut report = MemTempReport {
        gpu_index: info.index,
        gpu_name: info.name.clone(),
        pci_bus_id: info.pci.as_ref().map(|p| p.sysfs_address()),
        pci_device_id: info.pci.as_ref().map(|p| format!("{:04x}", p.device_id)),
        target: None,
        register_address: None,
        raw: None,
        mem_temp_c: None,
        error: None,
    };

    let outcome = read_probe(device, settings, &mut report);
    if let Err(e) = &outcome {
        report.error = Some(e.to_string());
    }
    Ok((report, outcome))
}

fn read_probe<D: GpuDevice>(
    device: &D,
    settings: &MemTempSettings,
    report: &mut MemTempReport,
) -> std::result::Result<(), MemoryError> {
    let target = resolve_target(device, settings)?;
    report.target = Some(target);
    report.register_address = Some(format!("{:#010x}", target.register_address()?));

    let mut probe = MemTempProbe::open(&settings.device, target)?;
    let raw = probe.read_raw();
    probe.close();
    let raw = raw?;

    report.raw = Some(format!("{:#010x}", raw));
    report.mem_temp_c = Some(target.arch.layout().decode(raw).as_celsius());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memtemp::ArchitectureId;
    use crate::mock::MockDevice;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_diagnose_reads_file_backed_register() {
        // A file standing in for /dev/mem with BAR0 at offset 0
        let layout = ArchitectureId::Ga102.layout();
        let mut bytes = vec![0u8; layout.window_len()];
        bytes[layout.offset..layout.offset + 4].copy_from_slice(&0x0b40u32.to_le_bytes());
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(&bytes).unwrap();
        file.flush().unwrap();

        let settings = MemTempSettings {
            device: file.path().to_path_buf(),
            arch: Some(ArchitectureId::Ga102),
            bar0: Some(0),
        };

        let (report, outcome) = diagnose(&MockDevice::new(0), &settings).unwrap();
        assert!(outcome.is_ok());
        assert_eq!(report.mem_temp_c, Some(90.0));
        assert_eq!(report.raw.as_deref(), Some("0x00000b40"));
        assert_eq!(report.register_address.as_deref(), Some("0x0000e2a8"));
        assert_eq!(report.pci_device_id.as_deref(), Some("2684"));
    }

    #[test]
    fn test_diagnose_reports_missing_device() {
        let settings = MemTempSettings {
            device: "/nonexistent/autofan-mem".into(),
            arch: Some(ArchitectureId::Ad102),
            bar0: Some(0xfb00_0000),
        };

        let (report, outcome) = diagnose(&MockDevice::new(0), &settings).unwrap();
        assert!(matches!(outcome, Err(MemoryError::UnsupportedPlatform(_))));
        assert!(report.target.is_some());
        assert!(report.error.is_some());
        assert!(report.mem_temp_c.is_none());
    }
}
