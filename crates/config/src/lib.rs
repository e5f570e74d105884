//! Configuration loading, validation, and management for MindScope.
//!
//! Loads configuration from `~/.mindscope/config.toml` with environment
//! variable overrides. Validates all settings at startup.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// The root configuration structure.
///
/// Maps directly to `~/.mindscope/config.toml`.
#[derive(Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// API key (can be overridden per-provider)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Default dialogue provider
    #[serde(default = "default_provider")]
    pub default_provider: String,

    /// Default model
    #[serde(default = "default_model")]
    pub default_model: String,

    /// Default temperature
    #[serde(default = "default_temperature")]
    pub default_temperature: f32,

    /// Default max tokens per LLM response
    #[serde(default = "default_max_tokens")]
    pub default_max_tokens: u32,

    /// Providers tried, in order, after the default one fails
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub fallback_providers: Vec<String>,

    /// Dialogue call settings
    #[serde(default)]
    pub dialogue: DialogueConfig,

    /// Sentiment fusion weights
    #[serde(default)]
    pub fusion: FusionConfig,

    /// Session store limits
    #[serde(default)]
    pub sessions: SessionConfig,

    /// Provider-specific configurations
    #[serde(default)]
    pub providers: HashMap<String, ProviderConfig>,
}

fn default_provider() -> String {
    "gemini".into()
}
fn default_model() -> String {
    "gemini-2.0-flash".into()
}
fn default_temperature() -> f32 {
    0.7
}
fn default_max_tokens() -> u32 {
    1024
}

/// Redact a secret string for Debug output.
fn redact(s: &Option<String>) -> &'static str {
    match s {
        Some(_) => "[REDACTED]",
        None => "None",
    }
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("api_key", &redact(&self.api_key))
            .field("default_provider", &self.default_provider)
            .field("default_model", &self.default_model)
            .field("default_temperature", &self.default_temperature)
            .field("default_max_tokens", &self.default_max_tokens)
            .field("fallback_providers", &self.fallback_providers)
            .field("dialogue", &self.dialogue)
            .field("fusion", &self.fusion)
            .field("sessions", &self.sessions)
            .field("providers", &self.providers)
            .finish()
    }
}

impl std::fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderConfig")
            .field("api_key", &redact(&self.api_key))
            .field("api_url", &self.api_url)
            .field("default_model", &self.default_model)
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DialogueConfig {
    /// Upper bound on a single dialogue backend call. On expiry the turn
    /// gets the deterministic fallback reply.
    #[serde(default = "default_dialogue_timeout")]
    pub timeout_secs: u64,

    /// Most recent history messages replayed per call (0 = all).
    #[serde(default = "default_max_history")]
    pub max_history_messages: usize,
}

fn default_dialogue_timeout() -> u64 {
    30
}
fn default_max_history() -> usize {
    40
}

impl Default for DialogueConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_dialogue_timeout(),
            max_history_messages: default_max_history(),
        }
    }
}

/// Per-modality weights applied by the fusion engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FusionConfig {
    #[serde(default = "default_text_weight")]
    pub text_weight: f64,

    /// Divisor in the image rescale step; must be > 0.
    #[serde(default = "default_image_weight")]
    pub image_weight: f64,

    /// Applied to single audio verdicts only.
    #[serde(default = "default_audio_weight")]
    pub audio_weight: f64,
}

fn default_text_weight() -> f64 {
    0.3
}
fn default_image_weight() -> f64 {
    0.2
}
fn default_audio_weight() -> f64 {
    0.5
}

impl Default for FusionConfig {
    fn default() -> Self {
        Self {
            text_weight: default_text_weight(),
            image_weight: default_image_weight(),
            audio_weight: default_audio_weight(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Maximum live sessions; the least recently used one is evicted beyond it.
    #[serde(default = "default_session_capacity")]
    pub capacity: usize,

    /// Idle time after which a session expires (0 = never).
    #[serde(default = "default_session_ttl")]
    pub ttl_secs: u64,
}

fn default_session_capacity() -> usize {
    10_000
}
fn default_session_ttl() -> u64 {
    24 * 60 * 60
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            capacity: default_session_capacity(),
            ttl_secs: default_session_ttl(),
        }
    }
}

#[derive(Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_url: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_model: Option<String>,

    /// Per-provider timeout inside a fallback chain
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_secs: Option<u64>,
}

impl AppConfig {
    /// Load configuration from the default path (~/.mindscope/config.toml).
    ///
    /// Also checks environment variables for API keys:
    /// - `MINDSCOPE_API_KEY` (highest priority)
    /// - `GEMINI_API_KEY`
    /// - `OPENAI_API_KEY`
    pub fn load() -> Result<Self, ConfigError> {
        let config_path = Self::config_dir().join("config.toml");
        let mut config = Self::load_from(&config_path)?;
        config.apply_env_overrides();
        config.validate()?;
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

    fn apply_env_overrides(&mut self) {
        if self.api_key.is_none() {
            self.api_key = std::env::var("MINDSCOPE_API_KEY")
                .ok()
                .or_else(|| std::env::var("GEMINI_API_KEY").ok())
                .or_else(|| std::env::var("OPENAI_API_KEY").ok());
        }

        if let Ok(provider) = std::env::var("MINDSCOPE_PROVIDER") {
            self.default_provider = provider;
        }

        if let Ok(model) = std::env::var("MINDSCOPE_MODEL") {
            self.default_model = model;
        }
    }

    /// Get the configuration directory path.
    pub fn config_dir() -> PathBuf {
        dirs_home().join(".mindscope")
    }

    /// Validate the configuration.
    fn validate(&self) -> Result<(), ConfigError> {
        if !(0.0..=2.0).contains(&self.default_temperature) {
            return Err(ConfigError::ValidationError(
                "default_temperature must be between 0.0 and 2.0".into(),
            ));
        }

        let fusion = &self.fusion;
        let weights = [fusion.text_weight, fusion.image_weight, fusion.audio_weight];
        if weights.iter().any(|w| !w.is_finite()) {
            return Err(ConfigError::ValidationError(
                "fusion weights must be finite numbers".into(),
            ));
        }
        if fusion.image_weight <= 0.0 {
            return Err(ConfigError::ValidationError(
                "fusion.image_weight must be > 0".into(),
            ));
        }
        if fusion.text_weight < 0.0 || fusion.audio_weight < 0.0 {
            return Err(ConfigError::ValidationError(
                "fusion weights must be non-negative".into(),
            ));
        }

        if self.sessions.capacity == 0 {
            return Err(ConfigError::ValidationError(
                "sessions.capacity must be at least 1".into(),
            ));
        }

        if self.dialogue.timeout_secs == 0 {
            return Err(ConfigError::ValidationError(
                "dialogue.timeout_secs must be > 0".into(),
            ));
        }

        Ok(())
    }

    /// Check if an API key is available (from config or environment).
    pub fn has_api_key(&self) -> bool {
        self.api_key.is_some() || self.providers.values().any(|p| p.api_key.is_some())
    }

    /// Generate a default config TOML string (for `onboard` command).
    pub fn default_toml() -> String {
        let config = Self::default();
        toml::to_string_pretty(&config).unwrap_or_default()
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            default_provider: default_provider(),
            default_model: default_model(),
            default_temperature: default_temperature(),
            default_max_tokens: default_max_tokens(),
            fallback_providers: Vec::new(),
            dialogue: DialogueConfig::default(),
            fusion: FusionConfig::default(),
            sessions: SessionConfig::default(),
            providers: HashMap::new(),
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
