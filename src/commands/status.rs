//! Status command implementation
//!
//! Takes one sample and shows it with the duty the fan law would command.

use crate::cli::args::{OutputFormat, ProbeArgs};
use crate::cli::output::{print_output, StatusReport};
use crate::cli::Cli;
use crate::commands::{apply_probe_args, base_config, open_probe_or_degrade};
use crate::config::RuntimeConfig;
use crate::error::Result;
use crate::nvml::{GpuDevice, GpuManager, NvmlManager};
use crate::services::TelemetryAggregator;

/// Execute the status command
pub fn run_status(cli: &Cli, args: &ProbeArgs, format: OutputFormat) -> Result<()> {
    let runtime = apply_probe_args(base_config(cli)?, args)
        .build()
        .validate()?;
    let manager = NvmlManager::new()?;

    let report = collect_status(&manager, &runtime)?;
    print_output(&report, format)?;
    Ok(())
}

/// Sample the configured GPU once
pub fn collect_status<M: GpuManager>(manager: &M, runtime: &RuntimeConfig) -> Result<StatusReport> {
    let device = manager.device_by_index(runtime.gpu_index)?;
    let info = device.info()?;

    let probe = open_probe_or_degrade(&device, runtime.memtemp.as_ref());
    let mut telemetry = TelemetryAggregator::new(device, probe);
    let sample = telemetry.sample()?;
    telemetry.close();

    let target = runtime.law.evaluate(&sample);
    Ok(StatusReport::new(&info, &sample, target))
}
