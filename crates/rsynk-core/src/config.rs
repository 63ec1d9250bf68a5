//! Configuration system for rsynk
//!
//! Supports TOML configuration files with sensible defaults.
//! Configuration is loaded from:
//! - macOS: ~/Library/Application Support/rsynk/config.toml
//! - Linux: ~/.config/rsynk/config.toml
//! - Windows: %APPDATA%/rsynk/config.toml

use std::path::{Path, PathBuf};

use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::types::{Group, User};
use crate::{DEFAULT_BUFFER_SIZE, DEFAULT_WINDOW_SIZE};

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Window and buffer sizing
    pub transmission: TransmissionConfig,
    /// File metadata defaults
    pub files: FilesConfig,
}

/// Transmission window configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TransmissionConfig {
    /// Bytes examined at once by the matcher
    pub window_size: usize,
    /// Capacity of the per-file buffer; must exceed the window
    pub buffer_size: usize,
}

impl Default for TransmissionConfig {
    fn default() -> Self {
        Self {
            window_size: DEFAULT_WINDOW_SIZE,
            buffer_size: DEFAULT_BUFFER_SIZE,
        }
    }
}

/// Defaults used when file metadata cannot be resolved
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FilesConfig {
    /// Owner reported when the real one cannot be looked up
    pub default_user: String,
    pub default_uid: u32,
    /// Group reported when the real one cannot be looked up
    pub default_group: String,
    pub default_gid: u32,
    /// Permission bits reported for directories
    pub default_dir_permission: u32,
    /// Permission bits reported for everything else
    pub default_file_permission: u32,
}

impl Default for FilesConfig {
    fn default() -> Self {
        Self {
            default_user: "nobody".into(),
            default_uid: 65534,
            default_group: "nogroup".into(),
            default_gid: 65534,
            default_dir_permission: 0o755,
            default_file_permission: 0o644,
        }
    }
}

impl FilesConfig {
    pub fn default_user(&self) -> User {
        User::new(self.default_uid, self.default_user.clone())
    }

    pub fn default_group(&self) -> Group {
        Group::new(self.default_gid, self.default_group.clone())
    }
}

impl Config {
    /// Load configuration from the default path
    pub fn load() -> Self {
        match Self::default_path() {
            Some(path) => Self::load_from(&path).unwrap_or_else(|e| {
                warn!("Failed to load config from {:?}: {}, using defaults", path, e);
                Self::default()
            }),
            None => {
                debug!("No config directory found, using defaults");
                Self::default()
            }
        }
    }

    /// Load configuration from a specific path
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            debug!("Config file {:?} not found, using defaults", path);
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::Io(e.to_string()))?;

        let config: Config = toml::from_str(&content)
            .map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;

        info!("Loaded config from {:?}", path);
        Ok(config)
    }

    /// Save configuration to a specific path
    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| ConfigError::Io(e.to_string()))?;
        }

        let content = toml::to_string_pretty(self)
            .map_err(|e| ConfigError::Serialize(e.to_string()))?;

        std::fs::write(path, content)
            .map_err(|e| ConfigError::Io(e.to_string()))?;

        info!("Saved config to {:?}", path);
        Ok(())
    }

    /// Check values serde cannot check on its own
    pub fn validate(&self) -> Result<(), ConfigError> {
        let t = &self.transmission;
        if t.window_size == 0 {
            return Err(ConfigError::Invalid("transmission.window_size must be positive".into()));
        }
        if t.window_size >= t.buffer_size {
            return Err(ConfigError::Invalid(format!(
                "transmission.window_size ({}) must be smaller than transmission.buffer_size ({})",
                t.window_size, t.buffer_size
            )));
        }
        for (name, bits) in [
            ("files.default_dir_permission", self.files.default_dir_permission),
            ("files.default_file_permission", self.files.default_file_permission),
        ] {
            if bits > 0o7777 {
                return Err(ConfigError::Invalid(format!(
                    "{} ({:o}) is not a permission value",
                    name, bits
                )));
            }
        }
        Ok(())
    }

    /// Get the default config file path
    pub fn default_path() -> Option<PathBuf> {
        ProjectDirs::from("", "", "rsynk")
            .map(|dirs| dirs.config_dir().join("config.toml"))
    }

    /// Generate a sample configuration file content
    pub fn sample() -> String {
        let config = Self::default();
        toml::to_string_pretty(&config).unwrap_or_else(|_| String::new())
    }
}

/// Configuration errors
#[derive(Debug, Clone)]
pub enum ConfigError {
    /// I/O error
    Io(String),
    /// Parse error
    Parse(String),
    /// Serialization error
    Serialize(String),
    /// A value is out of range
    Invalid(String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Io(e) => write!(f, "I/O error: {}", e),
            ConfigError::Parse(e) => write!(f, "Parse error: {}", e),
            ConfigError::Serialize(e) => write!(f, "Serialization error: {}", e),
            ConfigError::Invalid(e) => write!(f, "Invalid configuration: {}", e),
        }
    }
}

impl std::error::Error for ConfigError {}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.transmission.window_size, 700);
        assert_eq!(config.transmission.buffer_size, 8 * 1024);
        assert_eq!(config.files.default_dir_permission, 0o755);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_config() {
        let toml_str = r#"
            [transmission]
            window_size = 1024
        "#;
        let config: Config = toml::from_str(toml_str).unwrap();
        assert_eq!(config.transmission.window_size, 1024);
        // Other values should be defaults
        assert_eq!(config.transmission.buffer_size, 8 * 1024);
        assert_eq!(config.files.default_user, "nobody");
    }

    #[test]
    fn test_window_must_fit_buffer() {
        let mut config = Config::default();
        config.transmission.window_size = config.transmission.buffer_size;
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));

        config.transmission.window_size = 0;
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_permission_range() {
        let mut config = Config::default();
        config.files.default_file_permission = 0o100644;
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_sample_config() {
        let sample = Config::sample();
        assert!(sample.contains("[transmission]"));
        assert!(sample.contains("[files]"));
    }

    #[test]
    fn test_config_load_missing() {
        let config = Config::load_from(Path::new("/nonexistent/config.toml")).unwrap();
        assert_eq!(config.transmission.window_size, 700);
    }

    #[test]
    fn test_save_and_load() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("nested").join("config.toml");

        let mut config = Config::default();
        config.files.default_user = "rsync".into();
        config.transmission.buffer_size = 32 * 1024;
        config.save_to(&path).unwrap();

        let loaded = Config::load_from(&path).unwrap();
        assert_eq!(loaded.files.default_user, "rsync");
        assert_eq!(loaded.transmission.buffer_size, 32 * 1024);
    }

    #[test]
    fn test_load_rejects_invalid_values() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("config.toml");
        std::fs::write(&path, "[transmission]\nwindow_size = 9000\n").unwrap();

        assert!(matches!(Config::load_from(&path), Err(ConfigError::Invalid(_))));
    }
}
