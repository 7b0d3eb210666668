//! Fan actuators
//!
//! Commit a duty cycle to the hardware, either through NVML or by driving
//! the `nvidia-settings` tool.

use crate::domain::{FanPolicy, FanSpeed};
use crate::error::ActuatorError;
use crate::nvml::GpuDevice;

use std::process::{Command, Stdio};
use std::time::Duration;
use wait_timeout::ChildExt;

/// Sink for fan duty commands
pub trait FanActuator {
    /// Drive every fan of the GPU at `duty`
    fn set_fan_duty(&mut self, duty: FanSpeed) -> Result<(), ActuatorError>;

    /// Hand the fans back to the driver's automatic control
    fn release(&mut self) -> Result<(), ActuatorError>;

    /// Short backend name for logs
    fn name(&self) -> &'static str;
}

impl<T: FanActuator + ?Sized> FanActuator for Box<T> {
    fn set_fan_duty(&mut self, duty: FanSpeed) -> Result<(), ActuatorError> {
        (**self).set_fan_duty(duty)
    }

    fn release(&mut self) -> Result<(), ActuatorError> {
        (**self).release()
    }

    fn name(&self) -> &'static str {
        (**self).name()
    }
}

/// Actuator writing fan speeds through NVML
///
/// Commands below the board's minimum fan speed are raised to it, since the
/// driver rejects them.
pub struct NvmlActuator<D: GpuDevice> {
    device: D,
    fan_count: u32,
    min_speed: FanSpeed,
    manual: bool,
}

impl<D: GpuDevice> NvmlActuator<D> {
    /// Create an actuator over every fan of `device`
    pub fn new(device: D) -> Result<Self, ActuatorError> {
        let fan_count = device.fan_count()?;
        if fan_count == 0 {
            return Err(ActuatorError::NoFans);
        }
        let min_speed = match device.min_fan_speed() {
            Ok(min) => {
                log::debug!("Minimum fan speed is {}", min);
                min
            }
            Err(e) => {
                log::debug!("Minimum fan speed unavailable, assuming 0%: {}", e);
                FanSpeed::OFF
            }
        };
        Ok(Self {
            device,
            fan_count,
            min_speed,
            manual: false,
        })
    }

    /// Number of fans driven
    pub fn fan_count(&self) -> u32 {
        self.fan_count
    }

    /// Lowest duty actually written to the fans
    pub fn min_speed(&self) -> FanSpeed {
        self.min_speed
    }

    fn set_policy(&mut self, policy: FanPolicy) -> Result<(), ActuatorError> {
        let mut first_error = None;
        for fan_idx in 0..self.fan_count {
            if let Err(e) = self.device.set_fan_policy(fan_idx, policy) {
                log::warn!("Failed to set fan {} policy to {}: {}", fan_idx, policy, e);
                first_error.get_or_insert(e);
            }
        }
        match first_error {
            Some(e) => Err(e.into()),
            None => Ok(()),
        }
    }
}

impl<D: GpuDevice> FanActuator for NvmlActuator<D> {
    fn set_fan_duty(&mut self, duty: FanSpeed) -> Result<(), ActuatorError> {
        if !self.manual {
            self.set_policy(FanPolicy::Manual)?;
            self.manual = true;
        }

        let duty = duty.max(self.min_speed);
        let mut first_error = None;
        for fan_idx in 0..self.fan_count {
            if let Err(e) = self.device.set_fan_speed(fan_idx, duty) {
                first_error.get_or_insert(e);
            }
        }
        match first_error {
            Some(e) => Err(e.into()),
            None => {
                log::debug!("Set {} fan(s) to {}", self.fan_count, duty);
                Ok(())
            }
        }
    }

    fn release(&mut self) -> Result<(), ActuatorError> {
        self.set_policy(FanPolicy::Auto)?;
        self.manual = false;
        log::info!("Fans returned to automatic control");
        Ok(())
    }

    fn name(&self) -> &'static str {
        "nvml"
    }
}

/// Actuator driving `nvidia-settings -a` assignments
///
/// Needs a running X server the invoking user may talk to.
#[derive(Debug, Clone)]
pub struct NvidiaSettingsActuator {
    program: String,
    gpu_index: u32,
    fans: Vec<u32>,
    timeout: Duration,
    manual: bool,
}

impl NvidiaSettingsActuator {
    /// Default program name
    pub const PROGRAM: &'static str = "nvidia-settings";

    /// Create an actuator for one GPU and the given global fan indices
    pub fn new(gpu_index: u32, fans: Vec<u32>, timeout: Duration) -> Result<Self, ActuatorError> {
        if fans.is_empty() {
            return Err(ActuatorError::NoFans);
        }
        Ok(Self {
            program: Self::PROGRAM.to_string(),
            gpu_index,
            fans,
            timeout,
            manual: false,
        })
    }

    /// Use another executable in place of `nvidia-settings`
    pub fn with_program(mut self, program: impl Into<String>) -> Self {
        self.program = program.into();
        self
    }

    /// Run one `-a` assignment, killing the tool if it outlives the timeout
    fn assign(&self, assignment: &str) -> Result<(), ActuatorError> {
        log::debug!("{} -a {}", self.program, assignment);

        let mut child = Command::new(&self.program)
            .arg("-a")
            .arg(assignment)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| ActuatorError::Spawn {
                program: self.program.clone(),
                reason: e.to_string(),
            })?;

        match child.wait_timeout(self.timeout) {
            Ok(Some(status)) if status.success() => Ok(()),
            Ok(Some(status)) => Err(ActuatorError::CommandFailed {
                program: self.program.clone(),
                status: status.to_string(),
            }),
            Ok(None) => {
                let _ = child.kill();
                let _ = child.wait();
                Err(ActuatorError::Timeout {
                    program: self.program.clone(),
                    timeout_ms: self.timeout.as_millis() as u64,
                })
            }
            Err(e) => {
                let _ = child.kill();
                let _ = child.wait();
                Err(ActuatorError::Spawn {
                    program: self.program.clone(),
                    reason: e.to_string(),
                })
            }
        }
    }

    fn set_control_state(&self, manual: bool) -> Result<(), ActuatorError> {
        self.assign(&format!(
            "[gpu:{}]/GPUFanControlState={}",
            self.gpu_index,
            u8::from(manual)
        ))
    }
}

impl FanActuator for NvidiaSettingsActuator {
    fn set_fan_duty(&mut self, duty: FanSpeed) -> Result<(), ActuatorError> {
        if !self.manual {
            self.set_control_state(true)?;
            self.manual = true;
        }
        for fan in &self.fans {
            self.assign(&format!(
                "[fan:{}]/GPUTargetFanSpeed={}",
                fan,
                duty.as_percentage()
            ))?;
        }
        Ok(())
    }

    fn release(&mut self) -> Result<(), ActuatorError> {
        self.set_control_state(false)?;
        self.manual = false;
        log::info!("Fans returned to automatic control");
        Ok(())
    }

    fn name(&self) -> &'static str {
        "nvidia-settings"
    }
}

/// Actuator that only logs what it would do
#[derive(Debug, Default, Clone, Copy)]
pub struct DryRunActuator;

impl FanActuator for DryRunActuator {
    fn set_fan_duty(&mut self, duty: FanSpeed) -> Result<(), ActuatorError> {
        log::info!("DRY RUN: Would set fan speed to {}", duty);
        Ok(())
    }

    fn release(&mut self) -> Result<(), ActuatorError> {
        log::info!("DRY RUN: Would return fans to automatic control");
        Ok(())
    }

    fn name(&self) -> &'static str {
        "dry-run"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::NvmlError;
    use crate::mock::MockDevice;

    #[test]
    fn test_nvml_actuator_sets_all_fans() {
        let device = MockDevice::new(0);
        let mut actuator = NvmlActuator::new(device.clone()).unwrap();

        actuator.set_fan_duty(FanSpeed::new(55).unwrap()).unwrap();

        assert_eq!(device.fan_policy(0), Some(FanPolicy::Manual));
        assert_eq!(device.fan_policy(1), Some(FanPolicy::Manual));
        let writes = device.fan_writes();
        assert_eq!(writes.len(), 2);
        assert!(writes.iter().all(|(_, s)| s.as_percentage() == 55));
    }

    #[test]
    fn test_nvml_actuator_release_restores_auto() {
        let device = MockDevice::new(0);
        let mut actuator = NvmlActuator::new(device.clone()).unwrap();

        actuator.set_fan_duty(FanSpeed::FULL).unwrap();
        actuator.release().unwrap();

        assert_eq!(device.fan_policy(0), Some(FanPolicy::Auto));
        assert_eq!(device.fan_policy(1), Some(FanPolicy::Auto));
    }

    #[test]
    fn test_nvml_actuator_raises_duty_to_fan_minimum() {
        let device = MockDevice::new(0).with_min_fan_speed(30);
        let mut actuator = NvmlActuator::new(device.clone()).unwrap();
        assert_eq!(actuator.min_speed().as_percentage(), 30);

        actuator.set_fan_duty(FanSpeed::OFF).unwrap();
        actuator.set_fan_duty(FanSpeed::new(45).unwrap()).unwrap();

        let speeds: Vec<u8> = device
            .fan_writes()
            .iter()
            .map(|(_, s)| s.as_percentage())
            .collect();
        assert_eq!(speeds, vec![30, 30, 45, 45]);
    }

    #[test]
    fn test_nvml_actuator_reports_write_failure() {
        let device = MockDevice::new(0);
        device.fail_fan_writes(true);
        let mut actuator = NvmlActuator::new(device).unwrap();

        let err = actuator.set_fan_duty(FanSpeed::FULL).unwrap_err();
        assert!(matches!(err, ActuatorError::Nvml(NvmlError::NotSupported(_))));
    }

    #[test]
    fn test_nvml_actuator_requires_fans() {
        let device = MockDevice::new(0).with_fan_count(0);
        assert!(matches!(
            NvmlActuator::new(device),
            Err(ActuatorError::NoFans)
        ));
    }

    #[test]
    fn test_nvidia_settings_requires_fans() {
        assert!(matches!(
            NvidiaSettingsActuator::new(0, Vec::new(), Duration::from_secs(1)),
            Err(ActuatorError::NoFans)
        ));
    }

    #[test]
    fn test_nvidia_settings_success() {
        let mut actuator = NvidiaSettingsActuator::new(0, vec![0, 1], Duration::from_secs(5))
            .unwrap()
            .with_program("true");

        actuator.set_fan_duty(FanSpeed::new(70).unwrap()).unwrap();
        actuator.release().unwrap();
    }

    #[test]
    fn test_nvidia_settings_nonzero_exit() {
        let mut actuator = NvidiaSettingsActuator::new(0, vec![0], Duration::from_secs(5))
            .unwrap()
            .with_program("false");

        let err = actuator.set_fan_duty(FanSpeed::FULL).unwrap_err();
        assert!(matches!(err, ActuatorError::CommandFailed { .. }));
    }

    #[test]
    fn test_nvidia_settings_missing_program() {
        let mut actuator = NvidiaSettingsActuator::new(0, vec![0], Duration::from_secs(1))
            .unwrap()
            .with_program("/nonexistent/nvidia-settings");

        let err = actuator.set_fan_duty(FanSpeed::FULL).unwrap_err();
        assert!(matches!(err, ActuatorError::Spawn { .. }));
    }

    #[test]
    fn test_dry_run_accepts_everything() {
        let mut actuator = DryRunActuator;
        assert!(actuator.set_fan_duty(FanSpeed::FULL).is_ok());
        assert!(actuator.release().is_ok());
        assert_eq!(actuator.name(), "dry-run");
    }
}
