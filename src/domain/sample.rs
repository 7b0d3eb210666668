//! Per-tick telemetry sample
//!
//! `CoreMetrics` is what the telemetry provider returns; `GpuSample` adds
//! the memory-junction temperature and is what the fan law consumes.

use crate::domain::{ClockLock, Clocks, FanSpeed, MemoryInfo, Power, Temperature, Utilization};
use serde::Serialize;

/// Metrics from the telemetry provider for one tick
///
/// Only the core temperature is required. The other fields pass through
/// to reporting and are `None` when the GPU does not support them.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CoreMetrics {
    /// Core (die) temperature
    pub temperature: Temperature,
    /// Current power draw
    pub power_usage: Option<Power>,
    /// Enforced power limit
    pub power_limit: Option<Power>,
    /// GPU and memory utilization
    pub utilization: Option<Utilization>,
    /// Current graphics and memory clocks
    pub clocks: Option<Clocks>,
    /// Graphics clock against its application-clock lock
    pub core_lock: Option<ClockLock>,
    /// Memory clock against its application-clock lock
    pub memory_lock: Option<ClockLock>,
    /// VRAM usage
    pub memory: Option<MemoryInfo>,
    /// Speed of the first fan as reported by the driver
    pub fan_speed: Option<FanSpeed>,
}

impl CoreMetrics {
    /// Metrics carrying only a core temperature
    pub fn with_temperature(temperature: Temperature) -> Self {
        Self {
            temperature,
            power_usage: None,
            power_limit: None,
            utilization: None,
            clocks: None,
            core_lock: None,
            memory_lock: None,
            memory: None,
            fan_speed: None,
        }
    }
}

/// One immutable telemetry sample
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GpuSample {
    core: CoreMetrics,
    memory_temperature: Option<Temperature>,
}

impl GpuSample {
    /// Combine provider metrics with an optional memory-junction reading
    pub fn new(core: CoreMetrics, memory_temperature: Option<Temperature>) -> Self {
        Self {
            core,
            memory_temperature,
        }
    }

    /// Core (die) temperature
    pub fn core_temperature(&self) -> Temperature {
        self.core.temperature
    }

    /// GDDR6 memory-junction temperature, if it was read this tick
    pub fn memory_temperature(&self) -> Option<Temperature> {
        self.memory_temperature
    }

    /// Hottest known temperature: the core, or the memory junction if hotter
    pub fn effective_temperature(&self) -> Temperature {
        match self.memory_temperature {
            Some(mem) => self.core.temperature.hottest(mem),
            None => self.core.temperature,
        }
    }

    /// Pass-through provider metrics
    pub fn core(&self) -> &CoreMetrics {
        &self.core
    }
}
