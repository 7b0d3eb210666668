//! Unified error types for autofan
//!
//! This module defines all error types used throughout the application.
//! Uses thiserror for ergonomic error definitions.

use thiserror::Error;

/// Top-level application error type
#[derive(Error, Debug)]
pub enum AppError {
    /// Error from NVML operations
    #[error("NVML error: {0}")]
    Nvml(#[from] NvmlError),

    /// Error from configuration parsing/validation
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Error from domain type validation
    #[error("Domain validation error: {0}")]
    Domain(#[from] DomainError),

    /// Error from the physical memory accessor
    #[error("Memory access error: {0}")]
    Memory(#[from] MemoryError),

    /// Error from the fan actuator
    #[error("Actuator error: {0}")]
    Actuator(#[from] ActuatorError),

    /// Error from a control tick
    #[error("Control error: {0}")]
    Service(#[from] ServiceError),

    /// Signal handler could not be installed
    #[error("Failed to install signal handler: {0}")]
    Signal(String),

    /// IO error (file operations, terminal output)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors from NVML wrapper operations
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum NvmlError {
    /// Failed to initialize NVML library
    #[error("Failed to initialize NVML: {0}")]
    InitializationFailed(String),

    /// NVML library not found
    #[error("NVML library not found. Is the NVIDIA driver installed?")]
    LibraryNotFound,

    /// Device not found at index
    #[error("GPU device not found at index {0}")]
    DeviceNotFound(u32),

    /// Operation not supported by this GPU
    #[error("Operation not supported: {0}")]
    NotSupported(String),

    /// Insufficient permissions
    #[error("Insufficient permissions: {0}. Try running with sudo.")]
    InsufficientPermissions(String),

    /// GPU is lost (fallen off bus, etc.)
    #[error("GPU is lost or has become inaccessible")]
    GpuLost,

    /// Invalid argument passed to NVML
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Unknown NVML error
    #[error("NVML error: {0}")]
    Unknown(String),
}

/// Errors from the physical memory accessor
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MemoryError {
    /// Caller lacks the privilege to map physical memory
    #[error("Permission denied opening {0}. GDDR6 temperature requires root.")]
    PermissionDenied(String),

    /// The physical memory device node does not exist
    #[error("Physical memory device {0} not available on this platform")]
    UnsupportedPlatform(String),

    /// Any other OS-level mapping failure
    #[error("Failed to map physical range {base:#x}+{length:#x}: {reason}")]
    MapFailed {
        base: u64,
        length: usize,
        reason: String,
    },

    /// Read offset lies outside the mapped window
    #[error("Register offset {offset:#x} out of range for window of {length:#x} bytes")]
    OutOfRange { offset: usize, length: usize },

    /// Register offset is not 32-bit aligned
    #[error("Register offset {0:#x} is not 4-byte aligned")]
    Misaligned(usize),

    /// The underlying read faulted or the device stopped responding
    #[error("Register read at {0:#x} failed (device not responding)")]
    ReadFailed(u64),

    /// The window has already been closed
    #[error("Memory window is closed")]
    Closed,

    /// The GPU's register space or sensor layout could not be determined
    #[error("Memory temperature probe unavailable: {0}")]
    ProbeUnavailable(String),
}

/// Errors from domain type validation
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DomainError {
    /// Invalid fan speed value (must be 0-100)
    #[error("Invalid fan speed: {0}% (must be 0-100)")]
    InvalidFanSpeed(u8),

    /// Invalid temperature value
    #[error("Invalid temperature: {0}°C")]
    InvalidTemperature(f32),

    /// Fan law threshold must be strictly below the max temperature
    #[error("Fan threshold {threshold}°C must be below fan max {max}°C")]
    InvalidFanRange { threshold: f32, max: f32 },

    /// Architecture name not in the supported set
    #[error("Unsupported GPU architecture: {0}")]
    UnsupportedArchitecture(String),

    /// Invalid value provided
    #[error("Invalid value: {0}")]
    InvalidValue(String),
}

/// Errors from configuration parsing and validation
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Config file not found
    #[error("Configuration file not found: {0}")]
    FileNotFound(String),

    /// Invalid config value
    #[error("Invalid configuration value for '{key}': {message}")]
    InvalidValue { key: String, message: String },

    /// Domain validation failed for a config value
    #[error("Invalid configuration: {0}")]
    Domain(#[from] DomainError),

    /// TOML parsing error
    #[error("TOML parse error: {0}")]
    TomlError(#[from] toml::de::Error),
}

/// Errors from fan actuation
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ActuatorError {
    /// NVML refused the fan command
    #[error("NVML fan command failed: {0}")]
    Nvml(#[from] NvmlError),

    /// External command could not be started
    #[error("Failed to run {program}: {reason}")]
    Spawn { program: String, reason: String },

    /// External command exited unsuccessfully
    #[error("{program} exited with {status}")]
    CommandFailed { program: String, status: String },

    /// External command did not finish in time
    #[error("{program} timed out after {timeout_ms} ms")]
    Timeout { program: String, timeout_ms: u64 },

    /// The device exposes no controllable fans
    #[error("Fan control not available for this GPU")]
    NoFans,
}

/// Errors from a single control tick
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ServiceError {
    /// Core telemetry could not be read; the tick is skipped
    #[error("GPU telemetry unavailable: {0}")]
    DeviceUnavailable(#[from] NvmlError),

    /// Sampling took longer than the configured timeout
    #[error("Telemetry sample took {elapsed_ms} ms (timeout {timeout_ms} ms)")]
    SampleTimeout { elapsed_ms: u64, timeout_ms: u64 },
}

/// Result type alias using AppError
pub type Result<T> = std::result::Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_domain_error_display() {
        let err = DomainError::InvalidFanSpeed(150);
        assert_eq!(err.to_string(), "Invalid fan speed: 150% (must be 0-100)");
    }

    #[test]
    fn test_nvml_error_display() {
        let err = NvmlError::LibraryNotFound;
        assert!(err.to_string().contains("NVIDIA driver"));
    }

    #[test]
    fn test_memory_error_display() {
        let err = MemoryError::OutOfRange {
            offset: 0xE2A8,
            length: 0x1000,
        };
        assert!(err.to_string().contains("0xe2a8"));
        assert!(err.to_string().contains("0x1000"));

        let err = MemoryError::PermissionDenied("/dev/mem".to_string());
        assert!(err.to_string().contains("root"));
    }

    #[test]
    fn test_fan_range_error_display() {
        let err = DomainError::InvalidFanRange {
            threshold: 90.0,
            max: 70.0,
        };
        assert!(err.to_string().contains("90°C"));
        assert!(err.to_string().contains("70°C"));
    }

    #[test]
    fn test_error_conversion() {
        let domain_err = DomainError::InvalidFanSpeed(120);
        let app_err: AppError = domain_err.into();
        assert!(matches!(app_err, AppError::Domain(_)));

        let tick_err: ServiceError = NvmlError::GpuLost.into();
        assert!(matches!(tick_err, ServiceError::DeviceUnavailable(_)));
        let app_err: AppError = tick_err.into();
        assert!(matches!(app_err, AppError::Service(_)));
    }
}
