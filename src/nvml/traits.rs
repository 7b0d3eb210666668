//! Trait definitions for GPU operations
//!
//! These traits abstract over NVML to enable testing with mocks.

use crate::domain::{
    ClockLock, ClockSpeed, ClockType, Clocks, CoreMetrics, FanPolicy, FanSpeed, GpuInfo,
    MemoryInfo, PciLocation, Power, Temperature, Utilization,
};
use crate::error::NvmlError;

/// Trait for GPU device operations
///
/// This is the telemetry provider for the control loop and the backend of
/// the NVML fan actuator. Mock implementations stand in for it in tests.
pub trait GpuDevice: Send + Sync {
    /// Get GPU information
    fn info(&self) -> Result<GpuInfo, NvmlError>;

    /// Get the GPU name
    fn name(&self) -> Result<String, NvmlError>;

    /// Get the GPU index
    fn index(&self) -> u32;

    /// Get the PCI bus id and device id
    fn pci_location(&self) -> Result<PciLocation, NvmlError>;

    // Temperature operations
    /// Get current core temperature
    fn temperature(&self) -> Result<Temperature, NvmlError>;

    // Fan operations
    /// Get the number of fans
    fn fan_count(&self) -> Result<u32, NvmlError>;

    /// Get current fan speed for a specific fan
    fn fan_speed(&self, fan_idx: u32) -> Result<FanSpeed, NvmlError>;

    /// Lowest speed the fan controller accepts
    ///
    /// Boards that stop their fans at idle report 0.
    fn min_fan_speed(&self) -> Result<FanSpeed, NvmlError> {
        Err(NvmlError::NotSupported("minimum fan speed".to_string()))
    }

    /// Set fan speed for a specific fan
    fn set_fan_speed(&mut self, fan_idx: u32, speed: FanSpeed) -> Result<(), NvmlError>;

    /// Set fan control policy
    fn set_fan_policy(&mut self, fan_idx: u32, policy: FanPolicy) -> Result<(), NvmlError>;

    // Power operations
    /// Get current power usage
    fn power_usage(&self) -> Result<Power, NvmlError>;

    /// Get the power management limit
    fn power_limit(&self) -> Result<Power, NvmlError>;

    // Performance monitoring operations
    /// Get current clock speed for a specific clock type
    fn clock_speed(&self, clock_type: ClockType) -> Result<ClockSpeed, NvmlError>;

    /// Get the application clock (the clock lock) for a clock type
    fn applications_clock(&self, clock_type: ClockType) -> Result<ClockSpeed, NvmlError>;

    /// Get GPU and memory utilization rates
    fn utilization(&self) -> Result<Utilization, NvmlError>;

    /// Get memory (VRAM) information
    fn memory_info(&self) -> Result<MemoryInfo, NvmlError>;

    /// Read everything the control loop and status report need in one go
    ///
    /// Fails only when the core temperature cannot be read; the remaining
    /// fields are `None` when the GPU does not report them.
    fn core_metrics(&self) -> Result<CoreMetrics, NvmlError> {
        let temperature = self.temperature()?;

        let clocks = match (
            self.clock_speed(ClockType::Graphics),
            self.clock_speed(ClockType::Memory),
        ) {
            (Ok(graphics), Ok(memory)) => Some(Clocks { graphics, memory }),
            _ => None,
        };

        let core_lock = clocks.map(|c| {
            ClockLock::new(
                c.graphics,
                self.applications_clock(ClockType::Graphics).ok(),
            )
        });
        let memory_lock = clocks.map(|c| {
            ClockLock::new(c.memory, self.applications_clock(ClockType::Memory).ok())
        });

        let fan_speed = match self.fan_count() {
            Ok(count) if count > 0 => self.fan_speed(0).ok(),
            _ => None,
        };

        Ok(CoreMetrics {
            temperature,
            power_usage: self.power_usage().ok(),
            power_limit: self.power_limit().ok(),
            utilization: self.utilization().ok(),
            clocks,
            core_lock,
            memory_lock,
            memory: self.memory_info().ok(),
            fan_speed,
        })
    }
}

/// Trait for accessing GPUs by index
pub trait GpuManager: Send + Sync {
    /// The device type returned by this manager
    type Device: GpuDevice;

    /// Get the number of GPU devices
    fn device_count(&self) -> Result<u32, NvmlError>;

    /// Get a device by index
    fn device_by_index(&self, index: u32) -> Result<Self::Device, NvmlError>;
}
