//! Configuration management for route contracts
//!
//! Supports loading configuration from:
//! - Default values
//! - Config file (contract.toml)
//! - The bare `ENVIRONMENT` variable (seeds `mode`)
//! - Environment variables (CONTRACT__*)
//!
//! ## Example config file (contract.toml):
//! ```toml
//! mode = "development"
//!
//! [artifact]
//! path = "js/api/types.ts"
//!
//! [logging]
//! filter = "info,route_contract=debug"
//! ```

use config_crate::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Main configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ContractConfig {
    /// Development mode regenerates the artifact at startup
    #[serde(default)]
    pub mode: RunMode,

    /// Generated artifact settings
    #[serde(default)]
    pub artifact: ArtifactConfig,

    /// Logging settings
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Deployment mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum RunMode {
    #[default]
    #[serde(alias = "dev")]
    Development,
    #[serde(alias = "prod")]
    Production,
}

/// Artifact configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArtifactConfig {
    /// Where the TypeScript contract is written
    #[serde(default = "default_artifact_path")]
    pub path: PathBuf,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// `EnvFilter` directive used when `RUST_LOG` is unset
    #[serde(default = "default_filter")]
    pub filter: String,
}

// Default value functions
fn default_artifact_path() -> PathBuf {
    PathBuf::from("js/api/types.ts")
}

fn default_filter() -> String {
    "info".to_string()
}

impl Default for ArtifactConfig {
    fn default() -> Self {
        Self {
            path: default_artifact_path(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: default_filter(),
        }
    }
}

impl ContractConfig {
    /// Load configuration from default locations
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(None)
    }

    /// Load configuration from a specific file
    pub fn load_from(config_path: Option<&str>) -> Result<Self, ConfigError> {
        let mut builder = Config::builder();

        if let Ok(environment) = std::env::var("ENVIRONMENT") {
            builder = builder.set_default("mode", environment.to_lowercase())?;
        }

        // Load from default locations
        let config_locations = ["contract.toml", ".contract.toml", "config/contract.toml"];

        for location in config_locations {
            builder = builder.add_source(File::with_name(location).required(false));
        }

        // Load from XDG config directory
        if let Some(config_dir) = directories::ProjectDirs::from("dev", "familiar", "route-contract") {
            let xdg_config = config_dir.config_dir().join("contract.toml");
            if xdg_config.exists() {
                builder = builder.add_source(File::from(xdg_config).required(false));
            }
        }

        // Load from specified path
        if let Some(path) = config_path {
            builder = builder.add_source(File::with_name(path).required(true));
        }

        // Load from environment variables (CONTRACT__*)
        builder = builder.add_source(
            Environment::with_prefix("CONTRACT")
                .prefix_separator("__")
                .separator("__")
                .try_parsing(true),
        );

        let config = builder.build()?;
        config.try_deserialize()
    }

    /// Save configuration to a file
    pub fn save(&self, path: &str) -> std::io::Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        std::fs::write(path, content)
    }

    pub fn is_development(&self) -> bool {
        self.mode == RunMode::Development
    }

    /// Get the artifact path (resolves relative paths)
    pub fn artifact_path(&self) -> PathBuf {
        if self.artifact.path.is_absolute() {
            self.artifact.path.clone()
        } else {
            std::env::current_dir()
                .unwrap_or_default()
                .join(&self.artifact.path)
        }
    }
}
