//! Fan-related domain types
//!
//! Provides validated types for fan speed, policies and the
//! threshold/max fan law.

use crate::domain::{GpuSample, Temperature};
use crate::error::DomainError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Fan speed percentage (0-100)
///
/// Validated on construction to ensure the value is within valid range.
/// This is also the fan command handed to the actuator each tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct FanSpeed(u8);

impl FanSpeed {
    /// Minimum valid fan speed
    pub const MIN: u8 = 0;
    /// Maximum valid fan speed
    pub const MAX: u8 = 100;

    /// Fans off (or at the firmware minimum)
    pub const OFF: FanSpeed = FanSpeed(Self::MIN);
    /// Fans at full speed
    pub const FULL: FanSpeed = FanSpeed(Self::MAX);

    /// Create a new FanSpeed with validation
    ///
    /// # Errors
    /// Returns `DomainError::InvalidFanSpeed` if value > 100
    pub fn new(value: u8) -> Result<Self, DomainError> {
        if value > Self::MAX {
            return Err(DomainError::InvalidFanSpeed(value));
        }
        Ok(Self(value))
    }

    /// Create a FanSpeed by clamping into 0-100
    pub fn saturating(value: u32) -> Self {
        Self(value.min(Self::MAX as u32) as u8)
    }

    /// Get the speed as a percentage value (0-100)
    #[inline]
    pub const fn as_percentage(&self) -> u8 {
        self.0
    }
}

impl fmt::Display for FanSpeed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}%", self.0)
    }
}

impl TryFrom<u8> for FanSpeed {
    type Error = DomainError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<FanSpeed> for u8 {
    fn from(speed: FanSpeed) -> Self {
        speed.0
    }
}

impl From<FanSpeed> for u32 {
    fn from(speed: FanSpeed) -> Self {
        speed.0 as u32
    }
}

/// Fan control policy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum FanPolicy {
    /// GPU controls fan speed automatically
    #[default]
    Auto,
    /// Manual fan speed control
    Manual,
}

impl fmt::Display for FanPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FanPolicy::Auto => write!(f, "Auto"),
            FanPolicy::Manual => write!(f, "Manual"),
        }
    }
}

/// Piecewise-linear fan law
///
/// Below `threshold` the fans sit at `min_duty`, at or above `max` they run
/// at 100%, and in between the duty ramps linearly. The law keeps no state
/// between evaluations: no hysteresis, no rate limiting.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct FanLaw {
    threshold: Temperature,
    max: Temperature,
    min_duty: FanSpeed,
}

impl FanLaw {
    /// Create a new fan law
    ///
    /// # Errors
    /// Returns `DomainError::InvalidTemperature` for non-finite bounds and
    /// `DomainError::InvalidFanRange` unless `threshold < max`.
    pub fn new(
        threshold: Temperature,
        max: Temperature,
        min_duty: FanSpeed,
    ) -> Result<Self, DomainError> {
        for bound in [threshold, max] {
            if !bound.as_celsius().is_finite() {
                return Err(DomainError::InvalidTemperature(bound.as_celsius()));
            }
        }

        if threshold.as_celsius() >= max.as_celsius() {
            return Err(DomainError::InvalidFanRange {
                threshold: threshold.as_celsius(),
                max: max.as_celsius(),
            });
        }

        Ok(Self {
            threshold,
            max,
            min_duty,
        })
    }

    /// Get the target fan speed for a given temperature
    ///
    /// A non-finite reading runs the fans at full speed.
    pub fn speed_for_temperature(&self, temp: Temperature) -> FanSpeed {
        let t = temp.as_celsius();
        let threshold = self.threshold.as_celsius();
        let max = self.max.as_celsius();

        if !t.is_finite() {
            return FanSpeed::FULL;
        }
        if t <= threshold {
            return self.min_duty;
        }
        if t >= max {
            return FanSpeed::FULL;
        }

        let ramp = (100.0 * (t - threshold) / (max - threshold))
            .round()
            .clamp(0.0, 100.0);
        FanSpeed::saturating(ramp as u32).max(self.min_duty)
    }

    /// Evaluate the law against a sample's hottest known temperature
    pub fn evaluate(&self, sample: &GpuSample) -> FanSpeed {
        self.speed_for_temperature(sample.effective_temperature())
    }

    /// Temperature at which the ramp starts
    pub fn threshold(&self) -> Temperature {
        self.threshold
    }

    /// Temperature at which the fans reach 100%
    pub fn max(&self) -> Temperature {
        self.max
    }

    /// Duty used at or below the threshold
    pub fn min_duty(&self) -> FanSpeed {
        self.min_duty
    }
}

impl Default for FanLaw {
    fn default() -> Self {
        Self {
            threshold: Temperature::new(70.0),
            max: Temperature::new(90.0),
            min_duty: FanSpeed::OFF,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn law(threshold: f32, max: f32) -> FanLaw {
        FanLaw::new(
            Temperature::new(threshold),
            Temperature::new(max),
            FanSpeed::OFF,
        )
        .unwrap()
    }

    fn duty(law: &FanLaw, t: f32) -> u8 {
        law.speed_for_temperature(Temperature::new(t))
            .as_percentage()
    }

    #[test]
    fn test_fan_speed_valid() {
        assert!(FanSpeed::new(0).is_ok());
        assert!(FanSpeed::new(50).is_ok());
        assert!(FanSpeed::new(100).is_ok());
    }

    #[test]
    fn test_fan_speed_invalid() {
        assert!(FanSpeed::new(101).is_err());
        assert!(FanSpeed::new(255).is_err());
    }

    #[test]
    fn test_fan_speed_display() {
        let speed = FanSpeed::new(75).unwrap();
        assert_eq!(speed.to_string(), "75%");
    }

    #[test]
    fn test_fan_speed_saturating() {
        assert_eq!(FanSpeed::saturating(42).as_percentage(), 42);
        assert_eq!(FanSpeed::saturating(250).as_percentage(), 100);
    }

    #[test]
    fn test_fan_law_rejects_inverted_range() {
        let result = FanLaw::new(
            Temperature::new(90.0),
            Temperature::new(70.0),
            FanSpeed::OFF,
        );
        assert!(matches!(result, Err(DomainError::InvalidFanRange { .. })));
    }

    #[test]
    fn test_fan_law_rejects_equal_bounds() {
        let result = FanLaw::new(
            Temperature::new(80.0),
            Temperature::new(80.0),
            FanSpeed::OFF,
        );
        assert!(matches!(result, Err(DomainError::InvalidFanRange { .. })));
    }

    #[test]
    fn test_fan_law_rejects_nan_bound() {
        let result = FanLaw::new(
            Temperature::new(f32::NAN),
            Temperature::new(80.0),
            FanSpeed::OFF,
        );
        assert!(matches!(result, Err(DomainError::InvalidTemperature(_))));
    }

    #[test]
    fn test_fan_law_midpoint() {
        assert_eq!(duty(&law(70.0, 90.0), 80.0), 50);
    }

    #[test]
    fn test_fan_law_below_threshold() {
        let law = law(70.0, 90.0);
        assert_eq!(duty(&law, 69.9), 0);
        assert_eq!(duty(&law, 70.0), 0);
        assert_eq!(duty(&law, 20.0), 0);
        assert_eq!(duty(&law, -40.0), 0);
    }

    #[test]
    fn test_fan_law_at_and_above_max() {
        let law = law(70.0, 90.0);
        assert_eq!(duty(&law, 90.0), 100);
        assert_eq!(duty(&law, 90.1), 100);
        assert_eq!(duty(&law, 130.0), 100);
    }

    #[test]
    fn test_fan_law_rounds_to_nearest() {
        let law = law(70.0, 90.0);
        // 100 * 0.3 / 20 = 1.5 rounds away from zero
        assert_eq!(duty(&law, 70.3), 2);
        // 100 * 0.2 / 20 = 1.0
        assert_eq!(duty(&law, 70.2), 1);
    }

    #[test]
    fn test_fan_law_monotonic() {
        let law = law(70.0, 90.0);
        let mut last = 0;
        let mut t = 60.0;
        while t <= 100.0 {
            let d = duty(&law, t);
            assert!(d >= last, "duty dropped from {} to {} at {}", last, d, t);
            assert!(d <= 100);
            last = d;
            t += 0.1;
        }
        assert_eq!(last, 100);
    }

    #[test]
    fn test_fan_law_min_duty_floor() {
        let law = FanLaw::new(
            Temperature::new(70.0),
            Temperature::new(90.0),
            FanSpeed::new(30).unwrap(),
        )
        .unwrap();

        assert_eq!(duty(&law, 50.0), 30);
        // Ramp below the floor is lifted to the floor
        assert_eq!(duty(&law, 72.0), 30);
        assert_eq!(duty(&law, 86.0), 80);
        assert_eq!(duty(&law, 95.0), 100);
    }

    #[test]
    fn test_fan_law_non_finite_reading_is_full_speed() {
        let law = law(70.0, 90.0);
        assert_eq!(duty(&law, f32::NAN), 100);
        assert_eq!(duty(&law, f32::INFINITY), 100);
    }

    #[test]
    fn test_fan_law_default() {
        let law = FanLaw::default();
        assert_eq!(law.threshold().as_celsius(), 70.0);
        assert_eq!(law.max().as_celsius(), 90.0);
        assert_eq!(law.min_duty(), FanSpeed::OFF);
    }

    #[test]
    fn test_fan_policy_display() {
        assert_eq!(FanPolicy::Auto.to_string(), "Auto");
        assert_eq!(FanPolicy::Manual.to_string(), "Manual");
    }
}
