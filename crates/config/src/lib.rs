//! Configuration loading and validation for Dendrite.
//!
//! Loads configuration from `~/.dendrite/config.toml` with environment
//! variable overrides. Validates all settings at startup.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// The root configuration structure.
///
/// Maps directly to `~/.dendrite/config.toml`.
#[derive(Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Base URL of the OpenAI-compatible endpoint
    #[serde(default = "default_api_base")]
    pub api_base: String,

    /// API key for the endpoint
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Model used for assistant replies
    #[serde(default = "default_model")]
    pub default_model: String,

    /// Model used for cheap side tasks (title derivation, task analysis).
    /// Falls back to `default_model` when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub analyzer_model: Option<String>,

    /// Sampling temperature
    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Max tokens per model response (endpoint default when unset)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,

    /// Max tool-dispatch rounds per user turn
    #[serde(default = "default_max_turns")]
    pub max_turns: u32,

    /// Nested delegation hops allowed per run
    #[serde(default = "default_delegation_depth")]
    pub delegation_depth: u8,

    /// Directory where chat JSON files are stored
    #[serde(default = "default_chats_dir")]
    pub chats_dir: PathBuf,
}

fn default_api_base() -> String {
    "https://api.openai.com/v1".into()
}
fn default_model() -> String {
    "gpt-4o".into()
}
fn default_temperature() -> f32 {
    0.7
}
fn default_max_turns() -> u32 {
    10
}
fn default_delegation_depth() -> u8 {
    4
}
fn default_chats_dir() -> PathBuf {
    AppConfig::config_dir().join("chats")
}

fn redact(s: &Option<String>) -> &'static str {
    match s {
        Some(_) => "[REDACTED]",
        None => "None",
    }
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("api_base", &self.api_base)
            .field("api_key", &redact(&self.api_key))
            .field("default_model", &self.default_model)
            .field("analyzer_model", &self.analyzer_model)
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field("max_turns", &self.max_turns)
            .field("delegation_depth", &self.delegation_depth)
            .field("chats_dir", &self.chats_dir)
            .finish()
    }
}

impl AppConfig {
    /// Load configuration from the default path (~/.dendrite/config.toml).
    ///
    /// Environment variables take priority over the file:
    /// - `DENDRITE_API_BASE`
    /// - `DENDRITE_API_KEY` (then `OPENAI_API_KEY`)
    /// - `DENDRITE_MODEL`
    pub fn load() -> Result<Self, ConfigError> {
        let config_path = Self::config_dir().join("config.toml");
        let mut config = Self::load_from(&config_path)?;

        if let Ok(base) = std::env::var("DENDRITE_API_BASE") {
            config.api_base = base;
        }

        if config.api_key.is_none() {
            config.api_key = std::env::var("DENDRITE_API_KEY")
                .ok()
                .or_else(|| std::env::var("OPENAI_API_KEY").ok());
        }

        if let Ok(model) = std::env::var("DENDRITE_MODEL") {
            config.default_model = model;
        }

        Ok(config)
    }

    /// Load configuration from a specific file path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::info!("No config file found at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        let config: Self = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Get the configuration directory path.
    pub fn config_dir() -> PathBuf {
        dirs_home().join(".dendrite")
    }

    /// Model to use for side tasks.
    pub fn analyzer_model(&self) -> &str {
        self.analyzer_model.as_deref().unwrap_or(&self.default_model)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.temperature < 0.0 || self.temperature > 2.0 {
            return Err(ConfigError::ValidationError(
                "temperature must be between 0.0 and 2.0".into(),
            ));
        }

        if self.max_turns == 0 {
            return Err(ConfigError::ValidationError(
                "max_turns must be at least 1".into(),
            ));
        }

        Ok(())
    }

    /// Check if an API key is available (from config or environment).
    pub fn has_api_key(&self) -> bool {
        self.api_key.is_some()
    }

    /// Generate a default config TOML string (for `init` command).
    pub fn default_toml() -> String {
        toml::to_string_pretty(&Self::default()).unwrap_or_default()
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            api_base: default_api_base(),
            api_key: None,
            default_model: default_model(),
            analyzer_model: None,
            temperature: default_temperature(),
            max_tokens: None,
            max_turns: default_max_turns(),
            delegation_depth: default_delegation_depth(),
            chats_dir: default_chats_dir(),
        }
    }
}

/// Get the user's home directory.
fn dirs_home() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        std::env::var("USERPROFILE")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("C:\\Users\\Default"))
    }
    #[cfg(not(target_os = "windows"))]
    {
        std::env::var("HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("/tmp"))
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file at {path}: {reason}")]
    ReadError { path: PathBuf, reason: String },

    #[error("Failed to parse config file at {path}: {reason}")]
    ParseError { path: PathBuf, reason: String },

    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}
