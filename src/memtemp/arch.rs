//! GPU architectures with a known memory-junction sensor register
//!
//! Each architecture maps to one [`RegisterLayout`]: where the sensor sits in
//! BAR0 and how its raw value turns into degrees Celsius.

use crate::domain::Temperature;
use crate::error::DomainError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Location and encoding of the memory-junction temperature register
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RegisterLayout {
    /// Byte offset of the register from BAR0
    pub offset: usize,
    /// Bits holding the temperature field
    pub mask: u32,
    /// Right shift applied after masking
    pub shift: u32,
    /// Field units per degree Celsius
    pub divisor: f32,
    /// Added after scaling
    pub bias: f32,
}

impl RegisterLayout {
    /// Bytes that must be mapped from BAR0 to reach the register
    pub fn window_len(&self) -> usize {
        self.offset + std::mem::size_of::<u32>()
    }

    /// Decode a raw register value into degrees Celsius
    pub fn decode(&self, raw: u32) -> Temperature {
        let field = (raw & self.mask) >> self.shift;
        Temperature::new(field as f32 / self.divisor + self.bias)
    }
}

/// The junction sensor reports in 1/32 °C steps in the low 12 bits.
const JUNCTION_FIELD_MASK: u32 = 0x0000_0fff;
const JUNCTION_UNITS_PER_DEGREE: f32 = 32.0;

const GA102_LAYOUT: RegisterLayout = RegisterLayout {
    offset: 0x0000_e2a8,
    mask: JUNCTION_FIELD_MASK,
    shift: 0,
    divisor: JUNCTION_UNITS_PER_DEGREE,
    bias: 0.0,
};

const GA104_LAYOUT: RegisterLayout = RegisterLayout {
    offset: 0x0000_ee50,
    mask: JUNCTION_FIELD_MASK,
    shift: 0,
    divisor: JUNCTION_UNITS_PER_DEGREE,
    bias: 0.0,
};

const GA106_LAYOUT: RegisterLayout = GA102_LAYOUT;

const ADA_LAYOUT: RegisterLayout = GA102_LAYOUT;

/// GPU architectures whose memory-junction register is known
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum ArchitectureId {
    /// Ampere GA102 (RTX 3080/3090, A10, A5000)
    Ga102,
    /// Ampere GA104 (RTX 3070)
    Ga104,
    /// Ampere GA106 (RTX A2000)
    Ga106,
    /// Ada AD102 (RTX 4090, L40S)
    Ad102,
    /// Ada AD103 (RTX 4080)
    Ad103,
    /// Ada AD104 (RTX 4070, L4)
    Ad104,
}

impl ArchitectureId {
    /// Every supported architecture
    pub const ALL: [ArchitectureId; 6] = [
        ArchitectureId::Ga102,
        ArchitectureId::Ga104,
        ArchitectureId::Ga106,
        ArchitectureId::Ad102,
        ArchitectureId::Ad103,
        ArchitectureId::Ad104,
    ];

    /// Register layout for this architecture
    pub fn layout(&self) -> RegisterLayout {
        match self {
            ArchitectureId::Ga102 => GA102_LAYOUT,
            ArchitectureId::Ga104 => GA104_LAYOUT,
            ArchitectureId::Ga106 => GA106_LAYOUT,
            ArchitectureId::Ad102 | ArchitectureId::Ad103 | ArchitectureId::Ad104 => ADA_LAYOUT,
        }
    }

    /// Lowercase chip name
    pub fn as_str(&self) -> &'static str {
        match self {
            ArchitectureId::Ga102 => "ga102",
            ArchitectureId::Ga104 => "ga104",
            ArchitectureId::Ga106 => "ga106",
            ArchitectureId::Ad102 => "ad102",
            ArchitectureId::Ad103 => "ad103",
            ArchitectureId::Ad104 => "ad104",
        }
    }
}

/// Decode a raw memory-junction register value for `arch`
pub fn decode_mem_temp(raw: u32, arch: ArchitectureId) -> Temperature {
    arch.layout().decode(raw)
}

impl fmt::Display for ArchitectureId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.as_str().to_uppercase())
    }
}

impl FromStr for ArchitectureId {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_lowercase();
        Self::ALL
            .into_iter()
            .find(|arch| arch.as_str() == wanted)
            .ok_or_else(|| DomainError::UnsupportedArchitecture(s.to_string()))
    }
}

impl TryFrom<String> for ArchitectureId {
    type Error = DomainError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<ArchitectureId> for String {
    fn from(arch: ArchitectureId) -> Self {
        arch.as_str().to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_whole_degrees() {
        // 0x0a40 = 2624 = 82 * 32
        assert_eq!(decode_mem_temp(0x0000_0a40, ArchitectureId::Ga102).as_celsius(), 82.0);
    }

    #[test]
    fn test_decode_fractional() {
        // 2632 / 32 = 82.25
        assert_eq!(decode_mem_temp(0x0000_0a48, ArchitectureId::Ad102).as_celsius(), 82.25);
    }

    #[test]
    fn test_decode_ignores_high_bits() {
        let low = decode_mem_temp(0x0000_0a40, ArchitectureId::Ga104);
        let noisy = decode_mem_temp(0xabcd_fa40, ArchitectureId::Ga104);
        assert_eq!(low, noisy);
    }

    #[test]
    fn test_decode_range() {
        assert_eq!(decode_mem_temp(0, ArchitectureId::Ga102).as_celsius(), 0.0);
        // Full 12-bit field
        assert_eq!(
            decode_mem_temp(0xffff_ffff, ArchitectureId::Ga102).as_celsius(),
            4095.0 / 32.0
        );
    }

    #[test]
    fn test_decode_deterministic() {
        for arch in ArchitectureId::ALL {
            for raw in [0u32, 1, 0x0a40, 0x0fff, 0x1234_5678, u32::MAX] {
                assert_eq!(decode_mem_temp(raw, arch), decode_mem_temp(raw, arch));
            }
        }
    }

    #[test]
    fn test_layout_offsets() {
        assert_eq!(ArchitectureId::Ga102.layout().offset, 0xe2a8);
        assert_eq!(ArchitectureId::Ga104.layout().offset, 0xee50);
        assert_eq!(ArchitectureId::Ad103.layout().offset, 0xe2a8);
        assert_eq!(ArchitectureId::Ga104.layout().window_len(), 0xee54);
    }

    #[test]
    fn test_parse_architecture() {
        assert_eq!("GA102".parse::<ArchitectureId>().unwrap(), ArchitectureId::Ga102);
        assert_eq!(" ad104 ".parse::<ArchitectureId>().unwrap(), ArchitectureId::Ad104);
        for arch in ArchitectureId::ALL {
            assert_eq!(arch.as_str().parse::<ArchitectureId>().unwrap(), arch);
        }
    }

    #[test]
    fn test_parse_unknown_architecture() {
        let err = "tu102".parse::<ArchitectureId>().unwrap_err();
        assert_eq!(err, DomainError::UnsupportedArchitecture("tu102".to_string()));
    }

    #[test]
    fn test_display() {
        assert_eq!(ArchitectureId::Ga104.to_string(), "GA104");
    }
}
