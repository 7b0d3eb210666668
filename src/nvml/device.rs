//! NVML device implementation
//!
//! Real implementation of GpuDevice trait using nvml-wrapper.

use crate::domain::{
    ClockSpeed, ClockType, FanPolicy, FanSpeed, GpuInfo, MemoryInfo, PciLocation, Power,
    Temperature, Utilization,
};
use crate::error::NvmlError;
use crate::nvml::traits::GpuDevice;

use nvml_wrapper::enum_wrappers::device::{Clock, TemperatureSensor};
use nvml_wrapper::enums::device::FanControlPolicy;
use nvml_wrapper::Device;

/// NVML device wrapper implementing GpuDevice trait
pub struct NvmlDevice<'a> {
    device: Device<'a>,
    index: u32,
}

impl<'a> NvmlDevice<'a> {
    /// Create a new NVML device wrapper
    pub fn new(device: Device<'a>, index: u32) -> Self {
        Self { device, index }
    }

    /// Convert NVML error to our error type
    fn convert_error(err: nvml_wrapper::error::NvmlError) -> NvmlError {
        use nvml_wrapper::error::NvmlError as NE;
        match err {
            NE::NotSupported => {
                NvmlError::NotSupported("Operation not supported by this GPU".to_string())
            }
            NE::NoPermission => {
                NvmlError::InsufficientPermissions("Insufficient permissions".to_string())
            }
            NE::GpuLost => NvmlError::GpuLost,
            NE::InvalidArg => NvmlError::InvalidArgument("Invalid argument".to_string()),
            _ => NvmlError::Unknown(err.to_string()),
        }
    }

    fn nvml_clock(clock_type: ClockType) -> Clock {
        match clock_type {
            ClockType::Graphics => Clock::Graphics,
            ClockType::Memory => Clock::Memory,
        }
    }
}

impl GpuDevice for NvmlDevice<'_> {
    fn info(&self) -> Result<GpuInfo, NvmlError> {
        let name = self.name()?;
        let uuid = self.device.uuid().map_err(Self::convert_error)?;
        let fan_count = self.fan_count().unwrap_or(0);

        let mut info = GpuInfo::new(self.index, name, uuid).with_fan_count(fan_count);

        // Try to get optional info
        if let Ok(pci) = self.pci_location() {
            info = info.with_pci(pci);
        }

        Ok(info)
    }

    fn name(&self) -> Result<String, NvmlError> {
        self.device.name().map_err(Self::convert_error)
    }

    fn index(&self) -> u32 {
        self.index
    }

    fn pci_location(&self) -> Result<PciLocation, NvmlError> {
        let pci = self.device.pci_info().map_err(Self::convert_error)?;
        Ok(PciLocation::from_nvml(pci.bus_id, pci.pci_device_id))
    }

    fn temperature(&self) -> Result<Temperature, NvmlError> {
        let temp = self
            .device
            .temperature(TemperatureSensor::Gpu)
            .map_err(Self::convert_error)?;
        Ok(Temperature::from(temp))
    }

    fn fan_count(&self) -> Result<u32, NvmlError> {
        self.device.num_fans().map_err(Self::convert_error)
    }

    fn fan_speed(&self, fan_idx: u32) -> Result<FanSpeed, NvmlError> {
        let speed = self
            .device
            .fan_speed(fan_idx)
            .map_err(Self::convert_error)?;

        // NVML can report > 100 in some edge cases
        Ok(FanSpeed::saturating(speed))
    }

    fn min_fan_speed(&self) -> Result<FanSpeed, NvmlError> {
        let (min, _max) = self
            .device
            .min_max_fan_speed()
            .map_err(Self::convert_error)?;
        Ok(FanSpeed::saturating(min))
    }

    fn set_fan_speed(&mut self, fan_idx: u32, speed: FanSpeed) -> Result<(), NvmlError> {
        self.device
            .set_fan_speed(fan_idx, speed.as_percentage() as u32)
            .map_err(Self::convert_error)
    }

    fn set_fan_policy(&mut self, fan_idx: u32, policy: FanPolicy) -> Result<(), NvmlError> {
        let nvml_policy = match policy {
            FanPolicy::Auto => FanControlPolicy::TemperatureContinousSw,
            FanPolicy::Manual => FanControlPolicy::Manual,
        };

        self.device
            .set_fan_control_policy(fan_idx, nvml_policy)
            .map_err(Self::convert_error)
    }

    fn power_usage(&self) -> Result<Power, NvmlError> {
        let usage_mw = self.device.power_usage().map_err(Self::convert_error)?;
        Ok(Power::from_milliwatts(usage_mw))
    }

    fn power_limit(&self) -> Result<Power, NvmlError> {
        let limit_mw = self
            .device
            .power_management_limit()
            .map_err(Self::convert_error)?;
        Ok(Power::from_milliwatts(limit_mw))
    }

    fn clock_speed(&self, clock_type: ClockType) -> Result<ClockSpeed, NvmlError> {
        let speed = self
            .device
            .clock_info(Self::nvml_clock(clock_type))
            .map_err(Self::convert_error)?;

        Ok(ClockSpeed::new(speed))
    }

    fn applications_clock(&self, clock_type: ClockType) -> Result<ClockSpeed, NvmlError> {
        let speed = self
            .device
            .applications_clock(Self::nvml_clock(clock_type))
            .map_err(Self::convert_error)?;

        Ok(ClockSpeed::new(speed))
    }

    fn utilization(&self) -> Result<Utilization, NvmlError> {
        let util = self
            .device
            .utilization_rates()
            .map_err(Self::convert_error)?;

        Ok(Utilization::new(
            util.gpu.min(100) as u8,
            util.memory.min(100) as u8,
        ))
    }

    fn memory_info(&self) -> Result<MemoryInfo, NvmlError> {
        let mem = self.device.memory_info().map_err(Self::convert_error)?;

        Ok(MemoryInfo::new(mem.total, mem.used, mem.free))
    }
}
