//! Telemetry aggregation
//!
//! Combines the provider's core metrics with the optional GDDR6 probe into
//! one sample per tick.

use crate::domain::{GpuSample, Temperature};
use crate::error::ServiceError;
use crate::memtemp::MemTempProbe;
use crate::nvml::GpuDevice;

/// Produces one `GpuSample` per control tick
pub struct TelemetryAggregator<D: GpuDevice> {
    device: D,
    probe: Option<MemTempProbe>,
    probe_failing: bool,
}

impl<D: GpuDevice> TelemetryAggregator<D> {
    /// Create an aggregator; `probe` is `None` when memory monitoring is off
    pub fn new(device: D, probe: Option<MemTempProbe>) -> Self {
        Self {
            device,
            probe,
            probe_failing: false,
        }
    }

    /// Take a fresh sample
    ///
    /// A failed core read fails the whole sample. A failed memory read only
    /// drops the memory temperature from this sample.
    pub fn sample(&mut self) -> Result<GpuSample, ServiceError> {
        let core = self.device.core_metrics()?;
        let memory_temperature = self.read_memory_temperature();
        Ok(GpuSample::new(core, memory_temperature))
    }

    fn read_memory_temperature(&mut self) -> Option<Temperature> {
        let probe = self.probe.as_ref()?;
        match probe.read() {
            Ok(temp) => {
                if self.probe_failing {
                    log::info!("GDDR6 temperature readable again");
                    self.probe_failing = false;
                }
                Some(temp)
            }
            Err(e) => {
                // Only the first failure of a streak is worth a warning
                if self.probe_failing {
                    log::debug!("GDDR6 temperature unavailable: {}", e);
                } else {
                    log::warn!("GDDR6 temperature unavailable: {}", e);
                    self.probe_failing = true;
                }
                None
            }
        }
    }

    /// Whether a memory-junction probe is attached
    pub fn has_memory_probe(&self) -> bool {
        self.probe.is_some()
    }

    /// The telemetry provider
    pub fn device(&self) -> &D {
        &self.device
    }

    /// Release the memory mapping; later samples carry no memory temperature
    pub fn close(&mut self) {
        if let Some(mut probe) = self.probe.take() {
            probe.close();
            log::debug!("GDDR6 temperature probe closed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::MemoryError;
    use crate::memtemp::{ArchitectureId, ProbeTarget};
    use crate::mock::{MockDevice, ScriptedRegisters};

    fn probe(regs: &ScriptedRegisters) -> MemTempProbe {
        MemTempProbe::new(
            Box::new(regs.clone()),
            ProbeTarget {
                bar0: 0xfb00_0000,
                arch: ArchitectureId::Ga102,
            },
        )
    }

    #[test]
    fn test_sample_without_probe() {
        let device = MockDevice::new(0);
        device.set_temperature(Temperature::new(66.0));
        let mut aggregator = TelemetryAggregator::new(device, None);

        let sample = aggregator.sample().unwrap();
        assert_eq!(sample.core_temperature().as_celsius(), 66.0);
        assert!(sample.memory_temperature().is_none());
        assert!(sample.core().power_usage.is_some());
    }

    #[test]
    fn test_sample_with_probe() {
        let regs = ScriptedRegisters::fixed(0x0bc0); // 94 C
        let mut aggregator = TelemetryAggregator::new(MockDevice::new(0), Some(probe(&regs)));

        let sample = aggregator.sample().unwrap();
        assert_eq!(sample.memory_temperature().unwrap().as_celsius(), 94.0);
        assert_eq!(sample.effective_temperature().as_celsius(), 94.0);
    }

    #[test]
    fn test_memory_failure_degrades_sample() {
        let regs = ScriptedRegisters::fixed(0x0a00);
        regs.push(Err(MemoryError::ReadFailed(0xfb00_e2a8)));
        let mut aggregator = TelemetryAggregator::new(MockDevice::new(0), Some(probe(&regs)));

        let first = aggregator.sample().unwrap();
        assert!(first.memory_temperature().is_none());

        let second = aggregator.sample().unwrap();
        assert_eq!(second.memory_temperature().unwrap().as_celsius(), 80.0);
    }

    #[test]
    fn test_core_failure_fails_sample() {
        let device = MockDevice::new(0);
        device.fail_temperature(true);
        let mut aggregator = TelemetryAggregator::new(device, None);

        assert!(matches!(
            aggregator.sample(),
            Err(ServiceError::DeviceUnavailable(_))
        ));
    }

    #[test]
    fn test_close_releases_probe() {
        let regs = ScriptedRegisters::fixed(0x0a00);
        let mut aggregator = TelemetryAggregator::new(MockDevice::new(0), Some(probe(&regs)));
        assert!(aggregator.has_memory_probe());

        aggregator.close();
        assert!(regs.is_closed());
        assert!(!aggregator.has_memory_probe());
        assert!(aggregator.sample().unwrap().memory_temperature().is_none());
    }
}
