//! Command handlers
//!
//! Each command handler orchestrates the execution of a CLI command.

pub mod memtemp;
pub mod run;
pub mod status;

pub use memtemp::run_memtemp;
pub use run::run_loop;
pub use status::run_status;

use crate::cli::args::ProbeArgs;
use crate::cli::Cli;
use crate::config::{ConfigBuilder, MemTempSettings};
use crate::error::{ConfigError, MemoryError};
use crate::memtemp::{MemTempProbe, ProbeTarget};
use crate::nvml::GpuDevice;

/// Start a builder from the config file and the global flags
fn base_config(cli: &Cli) -> Result<ConfigBuilder, ConfigError> {
    Ok(ConfigBuilder::new()
        .with_file(cli.config.as_deref())?
        .with_gpu_index(cli.gpu)
        .with_dry_run(cli.dry_run.then_some(true)))
}

/// Layer the probe flags onto a builder
fn apply_probe_args(builder: ConfigBuilder, args: &ProbeArgs) -> ConfigBuilder {
    builder
        .with_memtemp(args.no_memtemp.then_some(false))
        .with_probe_target(args.arch.clone(), args.bar0)
}

/// Resolve where the sensor lives on `device`
fn resolve_target<D: GpuDevice>(
    device: &D,
    settings: &MemTempSettings,
) -> Result<ProbeTarget, MemoryError> {
    let pci = match device.pci_location() {
        Ok(pci) => Some(pci),
        Err(e) => {
            log::debug!("No PCI location for GPU {}: {}", device.index(), e);
            None
        }
    };
    ProbeTarget::resolve(pci.as_ref(), settings.bar0, settings.arch)
}

/// Resolve the target and map the register window
fn open_probe<D: GpuDevice>(
    device: &D,
    settings: &MemTempSettings,
) -> Result<MemTempProbe, MemoryError> {
    let target = resolve_target(device, settings)?;
    MemTempProbe::open(&settings.device, target)
}

/// Open the probe, or report why memory monitoring is off
///
/// Failure is reported once here; the caller runs without the probe.
fn open_probe_or_degrade<D: GpuDevice>(
    device: &D,
    settings: Option<&MemTempSettings>,
) -> Option<MemTempProbe> {
    let settings = settings?;
    match open_probe(device, settings) {
        Ok(probe) => Some(probe),
        Err(e) => {
            log::warn!("GDDR6 temperature monitoring disabled: {}", e);
            None
        }
    }
}
