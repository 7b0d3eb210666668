//! Domain models for autofan
//!
//! This module contains all domain types with validation.
//! Types are validated on construction (fail-fast pattern).

pub mod fan;
pub mod gpu;
pub mod performance;
pub mod power;
pub mod sample;
pub mod thermal;

pub use fan::{FanLaw, FanPolicy, FanSpeed};
pub use gpu::{GpuInfo, PciLocation};
pub use performance::{ClockLock, ClockSpeed, ClockType, Clocks, MemoryInfo, Utilization};
pub use power::Power;
pub use sample::{CoreMetrics, GpuSample};
pub use thermal::Temperature;
