//! Performance and utilization domain types
//!
//! Types for GPU clocks, utilization rates, and VRAM usage.

use serde::{Deserialize, Serialize};

/// GPU clock speed in MHz
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ClockSpeed(u32);

impl ClockSpeed {
    /// Create a new clock speed value
    pub fn new(mhz: u32) -> Self {
        Self(mhz)
    }

    /// Get clock speed in MHz
    pub fn as_mhz(&self) -> u32 {
        self.0
    }
}

impl std::fmt::Display for ClockSpeed {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} MHz", self.0)
    }
}

/// Clock type for querying specific clocks
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClockType {
    /// Graphics/SM clock
    Graphics,
    /// Memory clock
    Memory,
}

/// Current clocks of one GPU
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Clocks {
    /// Graphics clock
    pub graphics: ClockSpeed,
    /// Memory clock
    pub memory: ClockSpeed,
}

/// A clock compared against its application-clock lock
///
/// An unset lock (reported as 0 MHz or unsupported) falls back to the
/// current clock, giving a zero offset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClockLock {
    /// Current clock
    pub current: ClockSpeed,
    /// Locked application clock
    pub lock: ClockSpeed,
}

impl ClockLock {
    /// Build from the current clock and the raw application clock, if any
    pub fn new(current: ClockSpeed, lock: Option<ClockSpeed>) -> Self {
        let lock = match lock {
            Some(l) if l.as_mhz() != 0 => l,
            _ => current,
        };
        Self { current, lock }
    }

    /// Lock minus current clock, in MHz
    pub fn offset_mhz(&self) -> i64 {
        self.lock.as_mhz() as i64 - self.current.as_mhz() as i64
    }
}

/// GPU and memory utilization rates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Utilization {
    /// GPU compute utilization (0-100%)
    pub gpu: u8,
    /// Memory bandwidth utilization (0-100%)
    pub memory: u8,
}

impl Utilization {
    /// Create a new utilization value
    pub fn new(gpu: u8, memory: u8) -> Self {
        Self {
            gpu: gpu.min(100),
            memory: memory.min(100),
        }
    }

    /// Get GPU utilization as percentage
    pub fn gpu_percent(&self) -> u8 {
        self.gpu
    }

    /// Get memory bandwidth utilization as percentage
    pub fn memory_percent(&self) -> u8 {
        self.memory
    }
}

/// VRAM/Memory information
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct MemoryInfo {
    /// Total memory in bytes
    pub total: u64,
    /// Used memory in bytes
    pub used: u64,
    /// Free memory in bytes
    pub free: u64,
}

impl MemoryInfo {
    /// Create a new memory info value
    pub fn new(total: u64, used: u64, free: u64) -> Self {
        Self { total, used, free }
    }

    /// Get total memory in MB
    pub fn total_mb(&self) -> f64 {
        self.total as f64 / (1024.0 * 1024.0)
    }

    /// Get used memory in MB
    pub fn used_mb(&self) -> f64 {
        self.used as f64 / (1024.0 * 1024.0)
    }
}
