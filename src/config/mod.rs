//! Configuration module for g4track
//!
//! Manages the converter command, what happens to converted JPGs and the
//! worker pool size. Configuration is stored in the user's config directory
//! and can be overridden with `G4TRACK_*` environment variables.

use std::fs;
use std::path::{Path, PathBuf};

use config::{Config, ConfigError, Environment, File, FileFormat};
use serde::{Deserialize, Serialize};

use crate::convert::{default_workers, OriginalPolicy, DEFAULT_COMMAND};

/// Keys accepted by `config get` / `config set`
pub const KEYS: &[&str] = &["codec_command", "original_policy", "workers", "quiet"];

fn default_codec_command() -> String {
    DEFAULT_COMMAND.to_string()
}

/// Application configuration structure
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct G4TrackConfig {
    /// Converter command template with `{input}` and `{output}` placeholders
    #[serde(default = "default_codec_command")]
    pub codec_command: String,

    /// Keep or delete the JPG once its conversion is saved
    #[serde(default)]
    pub original_policy: OriginalPolicy,

    /// Converter worker threads, 0 = automatic
    #[serde(default)]
    pub workers: usize,

    /// Suppress informational output by default
    #[serde(default)]
    pub quiet: bool,
}

impl Default for G4TrackConfig {
    fn default() -> Self {
        Self {
            codec_command: default_codec_command(),
            original_policy: OriginalPolicy::default(),
            workers: 0,
            quiet: false,
        }
    }
}

impl G4TrackConfig {
    /// Get the path to the config file
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if the system config directory cannot be determined.
    pub fn config_path() -> Result<PathBuf, ConfigError> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| ConfigError::Message("Could not determine config directory".to_string()))?;
        Ok(config_dir.join("g4track").join("config.toml"))
    }

    /// Load configuration from the default location, creating it if missing
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if the config file cannot be read, parsed, or created.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(&Self::config_path()?)
    }

    /// Load configuration from `path`, writing defaults there if it doesn't exist
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if the file cannot be read, parsed, or created.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            let default_config = Self::default();
            default_config.save_to(path)?;
        }

        let settings = Config::builder()
            .add_source(File::from(path).format(FileFormat::Toml))
            .add_source(Environment::with_prefix("G4TRACK"))
            .build()?;

        settings.try_deserialize()
    }

    /// Save configuration to the default location
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if the file cannot be written.
    pub fn save(&self) -> Result<(), ConfigError> {
        self.save_to(&Self::config_path()?)
    }

    /// Save configuration to `path`
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if the config directory cannot be created, the
    /// configuration cannot be serialized to TOML, or the file cannot be written.
    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .map_err(|e| ConfigError::Message(format!("Failed to create config directory: {e}")))?;
        }

        let toml_string = toml::to_string_pretty(self)
            .map_err(|e| ConfigError::Message(format!("Failed to serialize config: {e}")))?;

        fs::write(path, toml_string)
            .map_err(|e| ConfigError::Message(format!("Failed to write config file: {e}")))?;

        Ok(())
    }

    /// Worker count with 0 resolved to the automatic default
    #[must_use]
    pub fn worker_count(&self) -> usize {
        if self.workers == 0 { default_workers() } else { self.workers }
    }

    /// Read one key as text
    #[must_use]
    pub fn get(&self, key: &str) -> Option<String> {
        match key {
            "codec_command" => Some(self.codec_command.clone()),
            "original_policy" => Some(self.original_policy.to_string()),
            "workers" => Some(self.workers.to_string()),
            "quiet" => Some(self.quiet.to_string()),
            _ => None,
        }
    }

    /// Set one key from text, without saving
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` for unknown keys or values that don't parse.
    pub fn set(&mut self, key: &str, value: &str) -> Result<(), ConfigError> {
        let invalid = |msg: String| ConfigError::Message(msg);
        match key {
            "codec_command" => {
                if !value.contains("{input}") || !value.contains("{output}") {
                    return Err(invalid(
                        "codec_command must contain {input} and {output}".to_string(),
                    ));
                }
                self.codec_command = value.to_string();
            }
            "original_policy" => self.original_policy = value.parse().map_err(invalid)?,
            "workers" => {
                self.workers = value.parse().map_err(|_| {
                    invalid(format!("Invalid value for workers: '{value}'. Use a number"))
                })?;
            }
            "quiet" => {
                self.quiet = value.parse().map_err(|_| {
                    invalid(format!("Invalid value for quiet: '{value}'. Use 'true' or 'false'"))
                })?;
            }
            _ => {
                return Err(invalid(format!(
                    "Unknown configuration key: '{key}'. Available keys: {}",
                    KEYS.join(", ")
                )));
            }
        }
        Ok(())
    }
}
