//! Configuration file loading
//!
//! Handles loading configuration from TOML files.

use crate::config::Config;
use crate::error::ConfigError;

use std::path::{Path, PathBuf};

/// Configuration file handler
pub struct ConfigFile;

impl ConfigFile {
    /// Load configuration from a file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Config, ConfigError> {
        let path = path.as_ref();

        let content = std::fs::read_to_string(path)
            .map_err(|_| ConfigError::FileNotFound(path.display().to_string()))?;

        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }

    /// Load the first configuration file found in the default locations
    ///
    /// A file that exists but does not parse is an error, not a fallback to
    /// the next location.
    pub fn load_default() -> Result<Option<Config>, ConfigError> {
        Self::load_first(&Self::default_paths())
    }

    fn load_first(paths: &[PathBuf]) -> Result<Option<Config>, ConfigError> {
        for path in paths {
            if path.exists() {
                let config = Self::load(path)?;
                log::info!("Loaded config from {}", path.display());
                return Ok(Some(config));
            }
        }
        Ok(None)
    }

    /// Get default configuration file paths
    pub fn default_paths() -> Vec<PathBuf> {
        let mut paths = Vec::new();

        // System-wide config
        paths.push(PathBuf::from("/etc/autofan/config.toml"));

        // User config
        if let Some(dir) = dirs::config_dir() {
            paths.push(dir.join("autofan/config.toml"));
        }

        // Current directory
        paths.push(PathBuf::from("autofan.toml"));
        paths.push(PathBuf::from(".autofan.toml"));

        paths
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::{NamedTempFile, TempDir};

    #[test]
    fn test_default_paths_order() {
        let paths = ConfigFile::default_paths();
        assert_eq!(paths[0], PathBuf::from("/etc/autofan/config.toml"));
        assert_eq!(paths.last(), Some(&PathBuf::from(".autofan.toml")));
    }

    #[test]
    fn test_load_missing_file() {
        let result = ConfigFile::load("/nonexistent/path/config.toml");
        assert!(matches!(result, Err(ConfigError::FileNotFound(_))));
    }

    #[test]
    fn test_load_file() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "[fan]\ntemp_threshold = 65.0\nmin_duty = 25").unwrap();

        let config = ConfigFile::load(file.path()).unwrap();
        assert_eq!(config.fan.temp_threshold, 65.0);
        assert_eq!(config.fan.min_duty, 25);
        assert_eq!(config.fan.temp_max, 90.0);
    }

    #[test]
    fn test_load_invalid_toml() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "[fan\ntemp_threshold = ").unwrap();

        assert!(matches!(
            ConfigFile::load(file.path()),
            Err(ConfigError::TomlError(_))
        ));
    }

    #[test]
    fn test_load_first_skips_missing() {
        let dir = TempDir::new().unwrap();
        let present = dir.path().join("b.toml");
        std::fs::write(&present, "[gpu]\nindex = 3\n").unwrap();

        let paths = vec![dir.path().join("a.toml"), present];
        let config = ConfigFile::load_first(&paths).unwrap().unwrap();
        assert_eq!(config.gpu.index, 3);
    }

    #[test]
    fn test_load_first_none_found() {
        let dir = TempDir::new().unwrap();
        let paths = vec![dir.path().join("missing.toml")];
        assert!(ConfigFile::load_first(&paths).unwrap().is_none());
    }

    #[test]
    fn test_load_first_propagates_parse_error() {
        let dir = TempDir::new().unwrap();
        let broken = dir.path().join("broken.toml");
        std::fs::write(&broken, "interval_seconds = = 1").unwrap();

        assert!(ConfigFile::load_first(&[broken]).is_err());
    }
}
