//! Run command implementation
//!
//! Runs the fan control loop until interrupted or the tick limit is hit.

use crate::cli::args::{OutputFormat, RunArgs};
use crate::cli::output::print_output;
use crate::cli::Cli;
use crate::commands::{apply_probe_args, base_config, open_probe_or_degrade};
use crate::config::{ActuatorKind, RuntimeConfig};
use crate::error::{AppError, Result};
use crate::nvml::{GpuDevice, GpuManager, NvmlManager};
use crate::services::{
    Controller, DryRunActuator, FanActuator, NoWatchdog, NvidiaSettingsActuator, NvmlActuator,
    SystemdWatchdog, TelemetryAggregator, Watchdog,
};

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Execute the run command
pub fn run_loop(cli: &Cli, args: &RunArgs, format: OutputFormat) -> Result<()> {
    let builder = base_config(cli)?
        .with_interval(args.interval)
        .with_max_ticks(args.max_ticks())
        .with_fan_law(args.fan_temp_threshold, args.fan_temp_max, args.min_duty)
        .with_actuator(args.actuator)
        .with_watchdog(args.no_watchdog.then_some(false));
    let runtime = apply_probe_args(builder, &args.probe).build().validate()?;

    let manager = NvmlManager::new()?;

    let shutdown = Arc::new(AtomicBool::new(false));
    let flag = Arc::clone(&shutdown);
    ctrlc::set_handler(move || {
        log::info!("Shutdown requested");
        flag.store(true, Ordering::SeqCst);
    })
    .map_err(|e| AppError::Signal(e.to_string()))?;

    let mut controller = build_controller(&manager, &runtime)?;
    let summary = controller.run(&shutdown);
    drop(controller);

    print_output(&summary, format)?;
    Ok(())
}

/// Wire up the controller for the configured GPU
///
/// The memory probe is opened once here; if that fails the controller runs
/// on core temperature alone.
pub fn build_controller<M>(manager: &M, runtime: &RuntimeConfig) -> Result<Controller<M::Device>>
where
    M: GpuManager,
    M::Device: 'static,
{
    let device = manager.device_by_index(runtime.gpu_index)?;
    let info = device.info()?;
    log::info!("Controlling {}", info);

    let probe = open_probe_or_degrade(&device, runtime.memtemp.as_ref());
    let telemetry = TelemetryAggregator::new(device, probe);

    let actuator = build_actuator(manager, runtime, info.fan_count)?;
    let watchdog: Box<dyn Watchdog> = if runtime.watchdog {
        Box::new(SystemdWatchdog)
    } else {
        Box::new(NoWatchdog)
    };

    Ok(Controller::new(
        telemetry,
        runtime.law,
        actuator,
        watchdog,
        runtime.loop_settings,
    ))
}

fn build_actuator<M>(
    manager: &M,
    runtime: &RuntimeConfig,
    fan_count: u32,
) -> Result<Box<dyn FanActuator>>
where
    M: GpuManager,
    M::Device: 'static,
{
    if runtime.dry_run {
        return Ok(Box::new(DryRunActuator));
    }

    match runtime.actuator {
        ActuatorKind::Nvml => {
            let device = manager.device_by_index(runtime.gpu_index)?;
            Ok(Box::new(NvmlActuator::new(device)?))
        }
        ActuatorKind::NvidiaSettings => {
            // nvidia-settings numbers fans across all GPUs
            let fans = if manager.device_count()? == 1 {
                (0..fan_count.max(1)).collect()
            } else {
                vec![runtime.gpu_index]
            };
            Ok(Box::new(NvidiaSettingsActuator::new(
                runtime.gpu_index,
                fans,
                runtime.command_timeout,
            )?))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::domain::FanPolicy;
    use crate::mock::{MockDevice, MockManager};

    fn runtime(config: Config) -> RuntimeConfig {
        config.validate().unwrap()
    }

    fn quick_config(ticks: u64) -> Config {
        let mut config = Config::default();
        config.general.interval_seconds = 0.001;
        config.general.max_ticks = Some(ticks);
        config.service.watchdog = false;
        config
    }

    #[test]
    fn test_controller_drives_mock_fans() {
        let device = MockDevice::new(0);
        device.script_temperatures([75.0, 85.0]);
        let manager = MockManager::with_devices(vec![device.clone()]);

        let mut config = quick_config(2);
        config.memtemp.enabled = false;

        let mut controller = build_controller(&manager, &runtime(config)).unwrap();
        let summary = controller.run(&AtomicBool::new(false));
        drop(controller);

        assert_eq!(summary.ticks, 2);
        let speeds: Vec<u8> = device
            .fan_writes()
            .iter()
            .map(|(_, s)| s.as_percentage())
            .collect();
        assert_eq!(speeds, vec![25, 25, 75, 75]);
        assert_eq!(device.fan_policy(0), Some(FanPolicy::Auto));
    }

    #[test]
    fn test_probe_failure_degrades() {
        let manager = MockManager::new(1);
        let mut config = quick_config(1);
        config.memtemp.device = "/nonexistent/autofan-mem".into();

        let controller = build_controller(&manager, &runtime(config)).unwrap();
        assert!(!controller.telemetry().has_memory_probe());
    }

    #[test]
    fn test_dry_run_never_touches_fans() {
        let device = MockDevice::new(0);
        device.set_temperature(crate::domain::Temperature::new(95.0));
        let manager = MockManager::with_devices(vec![device.clone()]);

        let mut config = quick_config(2);
        config.memtemp.enabled = false;
        config.general.dry_run = true;

        let mut controller = build_controller(&manager, &runtime(config)).unwrap();
        controller.run(&AtomicBool::new(false));

        assert!(device.fan_writes().is_empty());
        assert_eq!(device.fan_policy(0), Some(FanPolicy::Auto));
    }

    #[test]
    fn test_missing_gpu() {
        let manager = MockManager::new(1);
        let mut config = quick_config(1);
        config.gpu.index = 4;
        assert!(build_controller(&manager, &runtime(config)).is_err());
    }

    #[test]
    fn test_gpu_without_fans() {
        let manager = MockManager::with_devices(vec![MockDevice::new(0).with_fan_count(0)]);
        let mut config = quick_config(1);
        config.memtemp.enabled = false;
        assert!(matches!(
            build_controller(&manager, &runtime(config)),
            Err(AppError::Actuator(_))
        ));
    }
}
