//! Service layer for fan control
//!
//! Services encapsulate telemetry aggregation, fan actuation, liveness
//! notifications and the control loop that ties them together.

pub mod actuator;
pub mod controller;
pub mod telemetry;
pub mod watchdog;

pub use actuator::{DryRunActuator, FanActuator, NvidiaSettingsActuator, NvmlActuator};
pub use controller::{Controller, LoopSettings, LoopSummary, TickReport};
pub use telemetry::TelemetryAggregator;
pub use watchdog::{NoWatchdog, SystemdWatchdog, Watchdog};
