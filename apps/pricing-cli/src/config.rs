//! # CLI Configuration
//!
//! Where rule packs live, which version to use when an order names none, and
//! how the engine is built.
//!
//! ## Configuration Sources (Priority Order)
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Configuration Loading                                │
//! │                                                                         │
//! │  1. Command-line flags (highest priority, applied in main.rs)           │
//! │     --rules-dir ./rules  --version v1.2                                 │
//! │                                                                         │
//! │  2. Environment variables                                               │
//! │     PRICING_RULES_DIR=./rules                                           │
//! │     PRICING_RULES_VERSION=v1.2                                          │
//! │     PRICING_CACHE_PACKS=false                                           │
//! │                                                                         │
//! │  3. Config file (pricing.toml)                                          │
//! │     ~/.config/pricing-engine/pricing.toml                               │
//! │                                                                         │
//! │  4. Defaults (lowest priority)                                          │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Example Config File
//! ```toml
//! rules_dir = "/srv/pricing/rules"
//! default_version = "v1.2"
//! cache_packs = true
//! default_guard_message = "Order blocked by pricing policy"
//! ```

use std::path::{Path, PathBuf};

use pricing_core::validation::validate_version;
use pricing_core::{normalize_version, DEFAULT_GUARD_MESSAGE};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};

/// File name looked up in the platform config directory.
pub const CONFIG_FILE_NAME: &str = "pricing.toml";

pub const ENV_RULES_DIR: &str = "PRICING_RULES_DIR";
pub const ENV_RULES_VERSION: &str = "PRICING_RULES_VERSION";
pub const ENV_CACHE_PACKS: &str = "PRICING_CACHE_PACKS";

// =============================================================================
// Errors
// =============================================================================

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config file {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

pub type ConfigResult<T> = Result<T, ConfigError>;

// =============================================================================
// Engine Config
// =============================================================================

/// Effective CLI configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Directory holding `<version>_rules.{json,yaml,yml}` files.
    #[serde(default = "default_rules_dir")]
    pub rules_dir: PathBuf,

    /// Version used when neither the flag nor the order names one.
    #[serde(default = "default_version")]
    pub default_version: String,

    /// Keep compiled packs between runs in this process.
    #[serde(default = "default_cache_packs")]
    pub cache_packs: bool,

    /// Context of guard violations whose rule has no message.
    #[serde(default = "default_guard_message")]
    pub default_guard_message: String,
}

fn default_rules_dir() -> PathBuf {
    PathBuf::from("rules")
}

fn default_version() -> String {
    "v1.0".to_string()
}

fn default_cache_packs() -> bool {
    true
}

fn default_guard_message() -> String {
    DEFAULT_GUARD_MESSAGE.to_string()
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            rules_dir: default_rules_dir(),
            default_version: default_version(),
            cache_packs: default_cache_packs(),
            default_guard_message: default_guard_message(),
        }
    }
}

impl EngineConfig {
    /// Loads configuration from file (if any), then environment, then validates.
    ///
    /// An explicit `config_path` that does not exist is an error; a missing
    /// file at the default location is not.
    pub fn load(config_path: Option<&Path>) -> ConfigResult<Self> {
        let mut config = match config_path {
            Some(path) => Self::from_file(path)?,
            None => match Self::default_config_path() {
                Some(path) if path.exists() => Self::from_file(&path)?,
                Some(path) => {
                    debug!(?path, "Config file not found, using defaults");
                    Self::default()
                }
                None => Self::default(),
            },
        };

        config.apply_env_overrides();
        config.validate()?;

        Ok(config)
    }

    /// Parses one TOML file. Missing keys take their defaults.
    pub fn from_file(path: &Path) -> ConfigResult<Self> {
        info!(?path, "Loading pricing config from file");
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&contents).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn validate(&self) -> ConfigResult<()> {
        if self.rules_dir.as_os_str().is_empty() {
            return Err(ConfigError::Invalid("rules_dir must not be empty".into()));
        }

        validate_version(&normalize_version(&self.default_version)).map_err(|e| {
            ConfigError::Invalid(format!("default_version: {}", e))
        })?;

        if self.default_guard_message.trim().is_empty() {
            return Err(ConfigError::Invalid(
                "default_guard_message must not be empty".into(),
            ));
        }

        Ok(())
    }

    fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    /// Applies overrides from any key → value source.
    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(dir) = lookup(ENV_RULES_DIR) {
            debug!(dir = %dir, "Overriding rules dir from environment");
            self.rules_dir = PathBuf::from(dir);
        }

        if let Some(version) = lookup(ENV_RULES_VERSION) {
            debug!(version = %version, "Overriding default rules version from environment");
            self.default_version = version;
        }

        if let Some(cache) = lookup(ENV_CACHE_PACKS) {
            match parse_bool(&cache) {
                Some(enabled) => self.cache_packs = enabled,
                None => warn!(value = %cache, "Unknown {} value in environment", ENV_CACHE_PACKS),
            }
        }
    }

    fn default_config_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("com", "pricing", "pricing-engine")
            .map(|dirs| dirs.config_dir().join(CONFIG_FILE_NAME))
    }

    /// Normalized default version (`1.0` → `v1.0`).
    pub fn default_version(&self) -> String {
        normalize_version(&self.default_version)
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
