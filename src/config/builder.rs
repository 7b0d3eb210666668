//! Configuration builder
//!
//! Merges configuration from files and CLI arguments.

use crate::config::{ActuatorKind, Config, ConfigFile};
use crate::error::ConfigError;

use std::path::Path;

/// Builder for merging configuration sources
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Create a new builder with default configuration
    pub fn new() -> Self {
        Self {
            config: Config::default(),
        }
    }

    /// Load configuration from `path`, or from the default locations
    pub fn with_file(mut self, path: Option<&Path>) -> Result<Self, ConfigError> {
        let file_config = match path {
            Some(path) => Some(ConfigFile::load(path)?),
            None => ConfigFile::load_default()?,
        };

        if let Some(cfg) = file_config {
            self.config = cfg;
        }

        Ok(self)
    }

    /// Override with CLI dry-run flag
    pub fn with_dry_run(mut self, dry_run: Option<bool>) -> Self {
        if let Some(d) = dry_run {
            self.config.general.dry_run = d;
        }
        self
    }

    /// Override with CLI interval in seconds
    pub fn with_interval(mut self, interval: Option<f64>) -> Self {
        if let Some(i) = interval {
            self.config.general.interval_seconds = i;
        }
        self
    }

    /// Override with CLI tick limit
    pub fn with_max_ticks(mut self, ticks: Option<u64>) -> Self {
        if let Some(t) = ticks {
            self.config.general.max_ticks = Some(t);
        }
        self
    }

    /// Override with CLI GPU index
    pub fn with_gpu_index(mut self, index: Option<u32>) -> Self {
        if let Some(i) = index {
            self.config.gpu.index = i;
        }
        self
    }

    /// Override with CLI fan law bounds
    pub fn with_fan_law(
        mut self,
        threshold: Option<f32>,
        max: Option<f32>,
        min_duty: Option<u8>,
    ) -> Self {
        if let Some(t) = threshold {
            self.config.fan.temp_threshold = t;
        }
        if let Some(m) = max {
            self.config.fan.temp_max = m;
        }
        if let Some(d) = min_duty {
            self.config.fan.min_duty = d;
        }
        self
    }

    /// Override with CLI fan backend
    pub fn with_actuator(mut self, actuator: Option<ActuatorKind>) -> Self {
        if let Some(a) = actuator {
            self.config.fan.actuator = a;
        }
        self
    }

    /// Override with CLI memory-temperature switch
    pub fn with_memtemp(mut self, enabled: Option<bool>) -> Self {
        if let Some(e) = enabled {
            self.config.memtemp.enabled = e;
        }
        self
    }

    /// Override with CLI architecture and BAR0
    pub fn with_probe_target(mut self, arch: Option<String>, bar0: Option<u64>) -> Self {
        if arch.is_some() {
            self.config.memtemp.arch = arch;
        }
        if bar0.is_some() {
            self.config.memtemp.bar0 = bar0;
        }
        self
    }

    /// Override with CLI watchdog switch
    pub fn with_watchdog(mut self, enabled: Option<bool>) -> Self {
        if let Some(e) = enabled {
            self.config.service.watchdog = e;
        }
        self
    }

    /// Build the final configuration
    pub fn build(self) -> Config {
        self.config
    }
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_builder_defaults() {
        let config = ConfigBuilder::new().build();
        assert!(!config.general.dry_run);
        assert!(config.memtemp.enabled);
    }

    #[test]
    fn test_builder_overrides() {
        let config = ConfigBuilder::new()
            .with_dry_run(Some(true))
            .with_interval(Some(0.5))
            .with_gpu_index(Some(1))
            .with_fan_law(Some(60.0), None, Some(15))
            .with_actuator(Some(ActuatorKind::NvidiaSettings))
            .with_memtemp(Some(false))
            .build();

        assert!(config.general.dry_run);
        assert_eq!(config.general.interval_seconds, 0.5);
        assert_eq!(config.gpu.index, 1);
        assert_eq!(config.fan.temp_threshold, 60.0);
        assert_eq!(config.fan.temp_max, 90.0);
        assert_eq!(config.fan.min_duty, 15);
        assert_eq!(config.fan.actuator, ActuatorKind::NvidiaSettings);
        assert!(!config.memtemp.enabled);
    }

    #[test]
    fn test_cli_overrides_file() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(
            file,
            "[general]\ninterval_seconds = 3.0\n\n[fan]\ntemp_threshold = 50.0"
        )
        .unwrap();

        let config = ConfigBuilder::new()
            .with_file(Some(file.path()))
            .unwrap()
            .with_interval(Some(1.5))
            .with_fan_law(None, None, None)
            .build();

        assert_eq!(config.general.interval_seconds, 1.5);
        assert_eq!(config.fan.temp_threshold, 50.0);
    }

    #[test]
    fn test_explicit_missing_file_is_error() {
        let result = ConfigBuilder::new().with_file(Some(Path::new("/nonexistent/autofan.toml")));
        assert!(matches!(result, Err(ConfigError::FileNotFound(_))));
    }

    #[test]
    fn test_cli_can_produce_invalid_config() {
        let config = ConfigBuilder::new()
            .with_fan_law(Some(95.0), Some(90.0), None)
            .build();
        assert!(config.validate().is_err());
    }
}
