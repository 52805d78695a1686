//! Configuration file support for Repcoach.
//!
//! Configuration is loaded from `$XDG_CONFIG_HOME/repcoach/config.toml`.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Application configuration
#[derive(Clone, Debug, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub data: DataConfig,

    #[serde(default)]
    pub limits: LimitsConfig,

    #[serde(default)]
    pub progression: ProgressionConfig,

    #[serde(default)]
    pub adapter: AdapterConfig,
}

/// Data storage configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DataConfig {
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
        }
    }
}

/// Admission-control defaults for callers that do not pick their own
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct LimitsConfig {
    /// Bucket capacity in tokens
    #[serde(default = "default_capacity")]
    pub capacity: f64,

    /// Tokens restored per minute of real time
    #[serde(default = "default_refill_per_minute")]
    pub refill_per_minute: f64,
}

impl LimitsConfig {
    /// Refill rate in the unit the limiter consumes
    pub fn refill_per_second(&self) -> f64 {
        self.refill_per_minute / 60.0
    }
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            capacity: default_capacity(),
            refill_per_minute: default_refill_per_minute(),
        }
    }
}

/// Progression engine parameters
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ProgressionConfig {
    /// Maximum number of recent sessions fed into snapshot recomputation
    #[serde(default = "default_lookback_sessions")]
    pub lookback_sessions: usize,
}

impl Default for ProgressionConfig {
    fn default() -> Self {
        Self {
            lookback_sessions: default_lookback_sessions(),
        }
    }
}

/// Session adapter defaults
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AdapterConfig {
    /// Time budget assumed when the caller does not supply one
    #[serde(default = "default_minutes")]
    pub default_minutes: u32,
}

impl Default for AdapterConfig {
    fn default() -> Self {
        Self {
            default_minutes: default_minutes(),
        }
    }
}

// Default value functions
fn default_data_dir() -> PathBuf {
    let base = dirs::data_local_dir().unwrap_or_else(|| {
        let home = std::env::var("HOME").expect("HOME environment variable not set");
        PathBuf::from(home).join(".local/share")
    });
    base.join("repcoach")
}

fn default_capacity() -> f64 {
    60.0
}

fn default_refill_per_minute() -> f64 {
    60.0
}

fn default_lookback_sessions() -> usize {
    150
}

fn default_minutes() -> u32 {
    45
}

impl Config {
    /// Load configuration from the standard config path
    pub fn load() -> Result<Self> {
        let config_path = Self::default_config_path();
        if config_path.exists() {
            Self::load_from(&config_path)
        } else {
            tracing::info!("No config file found at {:?}, using defaults", config_path);
            Ok(Self::default())
        }
    }

    /// Load configuration from a specific path
    pub fn load_from(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&contents)?;
        tracing::info!("Loaded config from {:?}", path);
        Ok(config)
    }

    /// Get the default config file path
    pub fn default_config_path() -> PathBuf {
        let base = dirs::config_dir().unwrap_or_else(|| {
            let home = std::env::var("HOME").expect("HOME environment variable not set");
            PathBuf::from(home).join(".config")
        });
        base.join("repcoach").join("config.toml")
    }

    /// Save the current configuration to the default path
    pub fn save(&self) -> Result<()> {
        let config_path = Self::default_config_path();
        self.save_to(&config_path)
    }

    /// Save the current configuration to a specific path
    pub fn save_to(&self, path: &Path) -> Result<()> {
        // Ensure parent directory exists
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let contents = toml::to_string_pretty(self)
            .map_err(|e| Error::Config(format!("Failed to serialize config: {}", e)))?;
        std::fs::write(path, contents)?;
        tracing::info!("Saved config to {:?}", path);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.progression.lookback_sessions, 150);
        assert_eq!(config.adapter.default_minutes, 45);
        assert!(config.limits.capacity > 0.0);
    }

    #[test]
    fn test_refill_per_second() {
        let limits = LimitsConfig {
            capacity: 5.0,
            refill_per_minute: 5.0,
        };
        let per_second = limits.refill_per_second();
        assert!((per_second - 5.0 / 60.0).abs() < 1e-12);
    }

    #[test]
    fn test_config_roundtrip() {
        let config = Config::default();
        let toml_str = toml::to_string(&config).unwrap();
        let parsed: Config = toml::from_str(&toml_str).unwrap();

        assert_eq!(
            config.progression.lookback_sessions,
            parsed.progression.lookback_sessions
        );
        assert_eq!(config.adapter.default_minutes, parsed.adapter.default_minutes);
    }

    #[test]
    fn test_partial_config() {
        let toml_str = r#"
[limits]
capacity = 5.0
refill_per_minute = 5.0
"#;
        let config: Config = toml::from_str(toml_str).unwrap();
        assert_eq!(config.limits.capacity, 5.0);
        assert_eq!(config.progression.lookback_sessions, 150); // default
    }
}
