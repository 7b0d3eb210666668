//! Power domain types
//!
//! NVML reports power in milliwatts; the display unit is watts.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Power in milliwatts (stored internally) but displayed as watts
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Power(u32);

impl Power {
    /// Create a new power value from watts
    pub const fn from_watts(watts: u32) -> Self {
        Self(watts * 1000)
    }

    /// Create a new power value from milliwatts
    pub const fn from_milliwatts(mw: u32) -> Self {
        Self(mw)
    }

    /// Get the power in watts
    #[inline]
    pub fn as_watts(&self) -> f32 {
        self.0 as f32 / 1000.0
    }

    /// Get the power in milliwatts
    #[inline]
    pub const fn as_milliwatts(&self) -> u32 {
        self.0
    }
}

impl fmt::Display for Power {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.2} W", self.as_watts())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_power_from_watts() {
        let power = Power::from_watts(300);
        assert_eq!(power.as_watts(), 300.0);
        assert_eq!(power.as_milliwatts(), 300_000);
    }

    #[test]
    fn test_power_display() {
        assert_eq!(Power::from_milliwatts(123_456).to_string(), "123.46 W");
        assert_eq!(Power::from_watts(350).to_string(), "350.00 W");
    }
}
