//! autofan - NVIDIA GPU fan controller library
//!
//! This library polls a GPU's core telemetry through NVML, reads the GDDR6
//! memory-junction temperature straight from the GPU's registers, and drives
//! the fans with a bounded piecewise-linear law.
//!
//! # Modules
//!
//! - [`cli`]: Command-line interface definitions
//! - [`commands`]: Command handlers
//! - [`config`]: Configuration system
//! - [`domain`]: Domain models with validation
//! - [`error`]: Error types
//! - [`memtemp`]: Physical memory access and register decoding
//! - [`nvml`]: NVML abstraction layer
//! - [`services`]: Telemetry, actuation and the control loop

pub mod cli;
pub mod commands;
pub mod config;
pub mod domain;
pub mod error;
pub mod memtemp;
pub mod nvml;
pub mod services;

#[cfg(any(test, feature = "mock"))]
pub mod mock;

pub use error::{AppError, Result};
