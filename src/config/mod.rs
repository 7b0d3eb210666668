//! Configuration system
//!
//! Handles TOML config file parsing, CLI argument merging, and the one-time
//! validation into a `RuntimeConfig`.

pub mod builder;
pub mod file;

pub use builder::ConfigBuilder;
pub use file::ConfigFile;

use crate::domain::{FanLaw, FanSpeed, Temperature};
use crate::error::ConfigError;
use crate::memtemp::{ArchitectureId, DEV_MEM};
use crate::services::LoopSettings;

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    /// General settings
    pub general: GeneralConfig,
    /// GPU selection settings
    pub gpu: GpuConfig,
    /// Fan control settings
    pub fan: FanConfig,
    /// GDDR6 memory-junction temperature settings
    pub memtemp: MemTempConfig,
    /// Service manager integration
    pub service: ServiceConfig,
}

/// General configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Control loop interval in seconds
    pub interval_seconds: f64,
    /// Log decisions without touching the fans
    pub dry_run: bool,
    /// Stop after this many ticks (normally set from the command line)
    pub max_ticks: Option<u64>,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            interval_seconds: 1.0,
            dry_run: false,
            max_ticks: None,
        }
    }
}

/// GPU selection configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct GpuConfig {
    /// Target GPU by index
    pub index: u32,
}

/// Fan backend
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "kebab-case")]
pub enum ActuatorKind {
    /// NVML fan control
    #[default]
    Nvml,
    /// The `nvidia-settings` command (needs an X server)
    NvidiaSettings,
}

impl std::fmt::Display for ActuatorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ActuatorKind::Nvml => write!(f, "nvml"),
            ActuatorKind::NvidiaSettings => write!(f, "nvidia-settings"),
        }
    }
}

/// Fan control configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FanConfig {
    /// At or below this temperature the fans run at `min_duty`
    pub temp_threshold: f32,
    /// At or above this temperature the fans run at 100%
    pub temp_max: f32,
    /// Lowest duty ever commanded
    pub min_duty: u8,
    /// Fan backend
    pub actuator: ActuatorKind,
    /// Timeout for one `nvidia-settings` invocation in milliseconds
    pub command_timeout_ms: u64,
}

impl Default for FanConfig {
    fn default() -> Self {
        Self {
            temp_threshold: 70.0,
            temp_max: 90.0,
            min_duty: 0,
            actuator: ActuatorKind::Nvml,
            command_timeout_ms: 5000,
        }
    }
}

impl FanConfig {
    /// Convert to a FanLaw domain object
    pub fn to_fan_law(&self) -> Result<FanLaw, crate::error::DomainError> {
        FanLaw::new(
            Temperature::new(self.temp_threshold),
            Temperature::new(self.temp_max),
            FanSpeed::new(self.min_duty)?,
        )
    }
}

/// GDDR6 memory-junction temperature configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MemTempConfig {
    /// Read the memory-junction temperature
    pub enabled: bool,
    /// Physical memory device
    pub device: PathBuf,
    /// Architecture override (ga102, ga104, ga106, ad102, ad103, ad104)
    pub arch: Option<String>,
    /// BAR0 override; read from sysfs when absent
    pub bar0: Option<u64>,
}

impl Default for MemTempConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            device: PathBuf::from(DEV_MEM),
            arch: None,
            bar0: None,
        }
    }
}

/// Service manager configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    /// Send sd_notify READY/WATCHDOG/STOPPING messages
    pub watchdog: bool,
    /// Longest a telemetry sample may take in milliseconds
    pub sample_timeout_ms: u64,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            watchdog: true,
            sample_timeout_ms: 2000,
        }
    }
}

/// Memory probe settings after validation
#[derive(Debug, Clone, PartialEq)]
pub struct MemTempSettings {
    /// Physical memory device
    pub device: PathBuf,
    /// Architecture override
    pub arch: Option<ArchitectureId>,
    /// BAR0 override
    pub bar0: Option<u64>,
}

/// Validated configuration, read-only once the loop starts
#[derive(Debug, Clone, PartialEq)]
pub struct RuntimeConfig {
    pub gpu_index: u32,
    pub loop_settings: LoopSettings,
    pub law: FanLaw,
    pub actuator: ActuatorKind,
    pub command_timeout: Duration,
    pub dry_run: bool,
    /// `None` when memory monitoring is disabled
    pub memtemp: Option<MemTempSettings>,
    pub watchdog: bool,
}

impl Config {
    /// Check every invariant and produce the runtime configuration
    pub fn validate(&self) -> Result<RuntimeConfig, ConfigError> {
        let interval = positive_seconds("general.interval_seconds", self.general.interval_seconds)?;
        let sample_timeout = positive_millis("service.sample_timeout_ms", self.service.sample_timeout_ms)?;
        let command_timeout = positive_millis("fan.command_timeout_ms", self.fan.command_timeout_ms)?;

        if self.general.max_ticks == Some(0) {
            return Err(ConfigError::InvalidValue {
                key: "general.max_ticks".to_string(),
                message: "must be at least 1".to_string(),
            });
        }

        let law = self.fan.to_fan_law()?;

        let memtemp = if self.memtemp.enabled {
            let arch = self
                .memtemp
                .arch
                .as_deref()
                .map(str::parse::<ArchitectureId>)
                .transpose()?;
            Some(MemTempSettings {
                device: self.memtemp.device.clone(),
                arch,
                bar0: self.memtemp.bar0,
            })
        } else {
            None
        };

        Ok(RuntimeConfig {
            gpu_index: self.gpu.index,
            loop_settings: LoopSettings {
                interval,
                sample_timeout,
                max_ticks: self.general.max_ticks,
            },
            law,
            actuator: self.fan.actuator,
            command_timeout,
            dry_run: self.general.dry_run,
            memtemp,
            watchdog: self.service.watchdog,
        })
    }
}

fn positive_seconds(key: &str, seconds: f64) -> Result<Duration, ConfigError> {
    if !seconds.is_finite() || seconds <= 0.0 {
        return Err(ConfigError::InvalidValue {
            key: key.to_string(),
            message: format!("must be a positive number of seconds, got {}", seconds),
        });
    }
    Duration::try_from_secs_f64(seconds).map_err(|e| ConfigError::InvalidValue {
        key: key.to_string(),
        message: e.to_string(),
    })
}

fn positive_millis(key: &str, millis: u64) -> Result<Duration, ConfigError> {
    if millis == 0 {
        return Err(ConfigError::InvalidValue {
            key: key.to_string(),
            message: "must be greater than zero".to_string(),
        });
    }
    Ok(Duration::from_millis(millis))
}
