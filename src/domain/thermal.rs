//! Thermal domain types
//!
//! Provides the temperature type shared by the telemetry provider,
//! the memory-junction decoder and the fan law.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Temperature in degrees Celsius
///
/// Core temperatures from NVML are whole degrees while decoded memory-junction
/// readings have 1/32 °C resolution, so the value is kept as a float.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Temperature(f32);

impl Temperature {
    /// Create a new Temperature
    pub const fn new(celsius: f32) -> Self {
        Self(celsius)
    }

    /// Get the temperature in Celsius
    #[inline]
    pub const fn as_celsius(&self) -> f32 {
        self.0
    }

    /// The hotter of two readings
    pub fn hottest(self, other: Temperature) -> Temperature {
        if other.0 > self.0 {
            other
        } else {
            self
        }
    }
}

impl fmt::Display for Temperature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}°C", self.0)
    }
}

impl From<f32> for Temperature {
    fn from(value: f32) -> Self {
        Self::new(value)
    }
}

impl From<u32> for Temperature {
    fn from(value: u32) -> Self {
        Self::new(value as f32)
    }
}

impl From<Temperature> for f32 {
    fn from(temp: Temperature) -> Self {
        temp.0
    }
}
