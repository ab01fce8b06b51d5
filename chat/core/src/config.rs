//! TOML Configuration File Support
//!
//! Centralized configuration for the chat core, with an optional TOML file at
//! `~/.config/chat-widget/config.toml`.
//!
//! # Configuration Priority
//!
//! Configuration values are loaded with the following priority (highest first):
//! 1. Programmatic / CLI overrides ([`ConfigOverrides`])
//! 2. Environment variables (`CHAT_WIDGET_*`)
//! 3. TOML configuration file
//! 4. Default values
//!
//! # Example Configuration
//!
//! ```toml
//! [backend]
//! base_url = "https://chat.example.com"
//! request_timeout_secs = 30
//!
//! [messages]
//! placeholder = "Waiting..."
//! fallback = "Something went wrong. Please try again later."
//! welcome_text = "Hi! Ask me anything."
//! welcome_id = "welcome"
//!
//! [session]
//! default_id = "1"
//! ```

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::messages::{MessageId, SessionId};

/// Errors that can occur when loading configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read config file
    #[error("Failed to read config file at {path}: {source}")]
    ReadError {
        /// The path that was attempted
        path: PathBuf,
        /// The underlying IO error
        source: std::io::Error,
    },

    /// Failed to parse TOML
    #[error("Failed to parse TOML config: {0}")]
    ParseError(#[from] toml::de::Error),

    /// Invalid configuration value
    #[error("Invalid configuration: {0}")]
    ValidationError(String),
}

/// Tracks where the configuration came from
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConfigSource {
    /// Programmatic or command-line override
    Cli,
    /// Environment variable
    Env,
    /// TOML configuration file
    File,
    /// Default value
    Default,
}

impl std::fmt::Display for ConfigSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Cli => write!(f, "CLI"),
            Self::Env => write!(f, "environment"),
            Self::File => write!(f, "config file"),
            Self::Default => write!(f, "default"),
        }
    }
}

// =============================================================================
// TOML Configuration Structures
// =============================================================================

/// Backend section of the TOML configuration
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct BackendToml {
    /// Base URL of the chat service
    pub base_url: Option<String>,

    /// HTTP request timeout in seconds
    pub request_timeout_secs: Option<u64>,
}

/// Messages section of the TOML configuration
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct MessagesToml {
    /// Text shown while an answer is pending
    pub placeholder: Option<String>,

    /// Text shown when a request fails
    pub fallback: Option<String>,

    /// Greeting that opens every hydrated timeline
    pub welcome_text: Option<String>,

    /// Fixed id of the greeting
    pub welcome_id: Option<String>,
}

/// Session section of the TOML configuration
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionToml {
    /// Session opened on startup
    pub default_id: Option<String>,
}

/// Top-level TOML configuration structure
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ChatToml {
    /// Backend section
    pub backend: BackendToml,

    /// Messages section
    pub messages: MessagesToml,

    /// Session section
    pub session: SessionToml,
}

// =============================================================================
// Main Configuration Struct
// =============================================================================

/// Configuration supplied to the chat core at construction
#[derive(Clone, Debug)]
pub struct ChatConfig {
    /// Text of the pending assistant bubble
    pub placeholder: String,

    /// Text of the assistant bubble after a failed request
    pub fallback: String,

    /// Greeting that opens every hydrated timeline
    pub welcome_text: String,

    /// Fixed id of the greeting
    pub welcome_id: MessageId,

    /// Base URL of the chat service
    pub base_url: String,

    /// HTTP request timeout
    pub request_timeout: Duration,

    /// Session opened on startup
    pub default_session_id: SessionId,

    /// Path to the config file that was loaded (if any)
    pub config_file_path: Option<PathBuf>,

    /// Source of configuration values
    source: ConfigSource,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            placeholder: "Waiting...".to_string(),
            fallback: "Sorry, something went wrong. Please try again later.".to_string(),
            welcome_text: "Hello! How can I help you today?".to_string(),
            welcome_id: MessageId::from("welcome"),
            base_url: "http://localhost:3000".to_string(),
            request_timeout: Duration::from_secs(60),
            default_session_id: SessionId::new("1"),
            config_file_path: None,
            source: ConfigSource::Default,
        }
    }
}

impl ChatConfig {
    /// Create a new configuration with default values
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the primary source of this configuration
    #[must_use]
    pub fn source(&self) -> ConfigSource {
        self.source
    }

    /// Check that the values can drive a conversation
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::ValidationError`] naming the first bad value.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let non_empty = [
            ("placeholder", self.placeholder.as_str()),
            ("fallback", self.fallback.as_str()),
            ("welcome_text", self.welcome_text.as_str()),
            ("welcome_id", self.welcome_id.as_str()),
        ];
        for (name, value) in non_empty {
            if value.trim().is_empty() {
                return Err(ConfigError::ValidationError(format!(
                    "{name} must not be empty"
                )));
            }
        }

        match reqwest::Url::parse(&self.base_url) {
            Ok(url) if matches!(url.scheme(), "http" | "https") => {}
            Ok(url) => {
                return Err(ConfigError::ValidationError(format!(
                    "base_url must be http or https, got '{}'",
                    url.scheme()
                )))
            }
            Err(e) => {
                return Err(ConfigError::ValidationError(format!(
                    "base_url '{}' is not a valid URL: {e}",
                    self.base_url
                )))
            }
        }

        if self.request_timeout.is_zero() {
            return Err(ConfigError::ValidationError(
                "request_timeout must be greater than zero".to_string(),
            ));
        }

        Ok(())
    }
}

// =============================================================================
// Configuration Loading
// =============================================================================

/// Get the default configuration file path
///
/// Returns `$XDG_CONFIG_HOME/chat-widget/config.toml` or
/// `~/.config/chat-widget/config.toml` if `XDG_CONFIG_HOME` is not set.
#[must_use]
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|p| p.join("chat-widget").join("config.toml"))
}

/// Load configuration from the default file, then the environment
///
/// # Errors
///
/// Returns an error if the config file exists but cannot be parsed, or if the
/// resulting configuration is invalid. A missing config file is not an error.
pub fn load_config() -> Result<ChatConfig, ConfigError> {
    load_config_from_path(default_config_path())
}

/// Load configuration from a specific path, then the environment
///
/// # Errors
///
/// Returns an error if the specified config file cannot be read or parsed, or
/// if the resulting configuration is invalid.
pub fn load_config_from_path(path: Option<PathBuf>) -> Result<ChatConfig, ConfigError> {
    load_config_with_env(path, |key| std::env::var(key).ok())
}

/// Load configuration with an explicit environment lookup
///
/// # Errors
///
/// See [`load_config_from_path`].
pub fn load_config_with_env<F>(path: Option<PathBuf>, env: F) -> Result<ChatConfig, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let mut config = ChatConfig::default();

    if let Some(ref config_path) = path {
        if config_path.exists() {
            let toml_content =
                std::fs::read_to_string(config_path).map_err(|e| ConfigError::ReadError {
                    path: config_path.clone(),
                    source: e,
                })?;

            let toml_config: ChatToml = toml::from_str(&toml_content)?;
            apply_toml_config(&mut config, &toml_config);
            config.config_file_path = Some(config_path.clone());
            config.source = ConfigSource::File;

            tracing::info!(
                path = %config_path.display(),
                "Loaded configuration from file"
            );
        } else {
            tracing::debug!(
                path = %config_path.display(),
                "Config file not found, using defaults"
            );
        }
    }

    apply_env_config(&mut config, env);
    config.validate()?;

    Ok(config)
}

/// Apply TOML configuration values to the config struct
fn apply_toml_config(config: &mut ChatConfig, toml: &ChatToml) {
    if let Some(ref url) = toml.backend.base_url {
        config.base_url.clone_from(url);
    }
    if let Some(secs) = toml.backend.request_timeout_secs {
        config.request_timeout = Duration::from_secs(secs);
    }

    if let Some(ref text) = toml.messages.placeholder {
        config.placeholder.clone_from(text);
    }
    if let Some(ref text) = toml.messages.fallback {
        config.fallback.clone_from(text);
    }
    if let Some(ref text) = toml.messages.welcome_text {
        config.welcome_text.clone_from(text);
    }
    if let Some(ref id) = toml.messages.welcome_id {
        config.welcome_id = MessageId::from(id.as_str());
    }

    if let Some(ref id) = toml.session.default_id {
        config.default_session_id = SessionId::new(id.as_str());
    }
}

/// Apply environment variable overrides to the config
fn apply_env_config<F>(config: &mut ChatConfig, env: F)
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(url) = env("CHAT_WIDGET_BASE_URL") {
        config.base_url = url;
        config.source = ConfigSource::Env;
    }
    if let Some(timeout) = env("CHAT_WIDGET_TIMEOUT_SECS") {
        if let Ok(secs) = timeout.parse::<u64>() {
            config.request_timeout = Duration::from_secs(secs);
            config.source = ConfigSource::Env;
        } else {
            tracing::warn!(value = %timeout, "Ignoring unparsable CHAT_WIDGET_TIMEOUT_SECS");
        }
    }
    if let Some(text) = env("CHAT_WIDGET_PLACEHOLDER") {
        config.placeholder = text;
        config.source = ConfigSource::Env;
    }
    if let Some(text) = env("CHAT_WIDGET_FALLBACK") {
        config.fallback = text;
        config.source = ConfigSource::Env;
    }
    if let Some(text) = env("CHAT_WIDGET_WELCOME_TEXT") {
        config.welcome_text = text;
        config.source = ConfigSource::Env;
    }
    if let Some(id) = env("CHAT_WIDGET_WELCOME_ID") {
        config.welcome_id = MessageId::from(id);
        config.source = ConfigSource::Env;
    }
    if let Some(id) = env("CHAT_WIDGET_SESSION") {
        config.default_session_id = SessionId::new(id);
        config.source = ConfigSource::Env;
    }
}

// =============================================================================
// CLI Override Support
// =============================================================================

/// Builder for applying overrides on top of a loaded configuration
#[derive(Clone, Debug, Default)]
pub struct ConfigOverrides {
    /// Base URL override
    pub base_url: Option<String>,

    /// Startup session override
    pub session_id: Option<SessionId>,

    /// Request timeout override
    pub request_timeout: Option<Duration>,
}

impl ConfigOverrides {
    /// Create a new empty set of overrides
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set base URL override
    #[must_use]
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    /// Set startup session override
    #[must_use]
    pub fn with_session_id(mut self, id: SessionId) -> Self {
        self.session_id = Some(id);
        self
    }

    /// Set request timeout override
    #[must_use]
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = Some(timeout);
        self
    }

    /// Apply overrides to a configuration
    ///
    /// # Errors
    ///
    /// Returns an error if the overridden configuration is invalid.
    pub fn apply(&self, config: &mut ChatConfig) -> Result<(), ConfigError> {
        if self.base_url.is_some() || self.session_id.is_some() || self.request_timeout.is_some()
        {
            config.source = ConfigSource::Cli;
        }

        if let Some(ref url) = self.base_url {
            config.base_url.clone_from(url);
        }
        if let Some(ref id) = self.session_id {
            config.default_session_id = id.clone();
        }
        if let Some(timeout) = self.request_timeout {
            config.request_timeout = timeout;
        }

        config.validate()
    }
}
