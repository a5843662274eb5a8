//! TOML Configuration File Support
//!
//! Centralized configuration loading for localchat, with an optional TOML
//! file at `~/.config/localchat/config.toml`.
//!
//! # Configuration Priority
//!
//! Configuration values are loaded with the following priority (highest first):
//! 1. CLI arguments ([`ConfigOverrides`])
//! 2. Environment variables
//! 3. TOML configuration file
//! 4. Default values
//!
//! # Example Configuration
//!
//! ```toml
//! [server]
//! host = "localhost"
//! port = 11434
//! connect_timeout_ms = 5000
//! request_timeout_secs = 120
//!
//! [chat]
//! default_model = "llama3.2"
//! system_prompt = "Answer briefly."
//!
//! [history]
//! dir = "/home/me/.local/share/localchat/history"
//!
//! [ui]
//! typing_interval_ms = 500
//! ```

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::backend::BackendConfig;
use crate::store::HistoryDirectory;
use crate::typing::DEFAULT_TYPING_INTERVAL;

// =============================================================================
// Error Types
// =============================================================================

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

// =============================================================================
// Configuration Source Tracking
// =============================================================================

/// Tracks where the configuration came from
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConfigSource {
    /// Value from command-line argument
    Cli,
    /// Value from environment variable
    Env,
    /// Value from TOML configuration file
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

/// `[server]` section
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerToml {
    /// Host name or full base URL of the Ollama server
    pub host: Option<String>,
    /// Port of the Ollama server
    pub port: Option<u16>,
    /// Connection timeout in milliseconds
    pub connect_timeout_ms: Option<u64>,
    /// Timeout for non-streaming requests in seconds
    pub request_timeout_secs: Option<u64>,
}

/// `[chat]` section
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ChatToml {
    /// Model selected at startup
    pub default_model: Option<String>,
    /// System prompt sent with every request
    pub system_prompt: Option<String>,
}

/// `[history]` section
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct HistoryToml {
    /// Folder holding saved conversations
    pub dir: Option<PathBuf>,
}

/// `[ui]` section
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct UiToml {
    /// Typing animation interval in milliseconds
    pub typing_interval_ms: Option<u64>,
}

/// Top-level TOML configuration structure
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LocalChatToml {
    /// Server section
    pub server: ServerToml,
    /// Chat section
    pub chat: ChatToml,
    /// History section
    pub history: HistoryToml,
    /// UI section
    pub ui: UiToml,
}

// =============================================================================
// Main Configuration Struct
// =============================================================================

/// Resolved configuration
#[derive(Clone, Debug)]
pub struct ChatConfig {
    /// Ollama host name, or a full base URL
    pub host: String,
    /// Ollama port
    pub port: u16,
    /// Connection timeout
    pub connect_timeout: Duration,
    /// Timeout for non-streaming requests
    pub request_timeout: Duration,
    /// Model selected at startup; `None` picks the first listed model
    pub default_model: Option<String>,
    /// System prompt
    pub system_prompt: Option<String>,
    /// History folder; `None` uses the platform data directory
    pub history_dir: Option<PathBuf>,
    /// Typing animation interval
    pub typing_interval: Duration,
    /// Path to the config file that was loaded (if any)
    pub config_file_path: Option<PathBuf>,
    source: ConfigSource,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 11434,
            connect_timeout: Duration::from_secs(5),
            request_timeout: Duration::from_secs(120),
            default_model: None,
            system_prompt: None,
            history_dir: None,
            typing_interval: DEFAULT_TYPING_INTERVAL,
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

    /// Highest-priority source that contributed a value
    #[must_use]
    pub fn source(&self) -> ConfigSource {
        self.source
    }

    /// Backend connection settings
    #[must_use]
    pub fn backend_config(&self) -> BackendConfig {
        BackendConfig::ollama(self.host.clone(), self.port)
    }

    /// History folder, falling back to `./history` without a data directory
    #[must_use]
    pub fn resolved_history_dir(&self) -> PathBuf {
        self.history_dir
            .clone()
            .or_else(HistoryDirectory::default_dir)
            .unwrap_or_else(|| PathBuf::from("history"))
    }

    /// Reject values that cannot work
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::ValidationError`] naming the bad value.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.host.trim().is_empty() {
            return Err(ConfigError::ValidationError("server host is empty".into()));
        }
        if self.port == 0 {
            return Err(ConfigError::ValidationError("server port must be non-zero".into()));
        }
        if self.typing_interval.is_zero() {
            return Err(ConfigError::ValidationError(
                "typing_interval_ms must be positive".into(),
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
/// Returns `$XDG_CONFIG_HOME/localchat/config.toml`.
#[must_use]
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|p| p.join("localchat").join("config.toml"))
}

/// Load configuration from the default file and the environment
///
/// # Errors
///
/// Returns an error if the config file exists but cannot be parsed.
/// A missing config file is not an error (defaults are used).
pub async fn load_config() -> Result<ChatConfig, ConfigError> {
    load_config_from_path(default_config_path()).await
}

/// Load configuration from a specific path and the environment
///
/// # Errors
///
/// Returns an error if the file exists but cannot be read or parsed.
pub async fn load_config_from_path(path: Option<PathBuf>) -> Result<ChatConfig, ConfigError> {
    let mut config = load_file(path).await?;
    apply_env_config(&mut config, |key| std::env::var(key).ok());
    Ok(config)
}

/// Defaults overlaid with the file at `path`, if it exists
async fn load_file(path: Option<PathBuf>) -> Result<ChatConfig, ConfigError> {
    let mut config = ChatConfig::default();

    let Some(config_path) = path else {
        return Ok(config);
    };

    match tokio::fs::read_to_string(&config_path).await {
        Ok(content) => {
            let toml_config: LocalChatToml = toml::from_str(&content)?;
            apply_toml_config(&mut config, &toml_config);
            config.config_file_path = Some(config_path.clone());
            config.source = ConfigSource::File;

            tracing::info!(
                path = %config_path.display(),
                "Loaded configuration from file"
            );
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            tracing::debug!(
                path = %config_path.display(),
                "Config file not found, using defaults"
            );
        }
        Err(e) => {
            return Err(ConfigError::ReadError {
                path: config_path,
                source: e,
            });
        }
    }

    Ok(config)
}

/// Apply TOML configuration values to the config struct
fn apply_toml_config(config: &mut ChatConfig, toml: &LocalChatToml) {
    if let Some(host) = &toml.server.host {
        config.host.clone_from(host);
    }
    if let Some(port) = toml.server.port {
        config.port = port;
    }
    if let Some(ms) = toml.server.connect_timeout_ms {
        config.connect_timeout = Duration::from_millis(ms);
    }
    if let Some(secs) = toml.server.request_timeout_secs {
        config.request_timeout = Duration::from_secs(secs);
    }

    if toml.chat.default_model.is_some() {
        config.default_model.clone_from(&toml.chat.default_model);
    }
    if toml.chat.system_prompt.is_some() {
        config.system_prompt.clone_from(&toml.chat.system_prompt);
    }

    if toml.history.dir.is_some() {
        config.history_dir.clone_from(&toml.history.dir);
    }

    if let Some(ms) = toml.ui.typing_interval_ms {
        config.typing_interval = Duration::from_millis(ms);
    }
}

/// Apply environment variable overrides, reading variables through `var`
fn apply_env_config(config: &mut ChatConfig, var: impl Fn(&str) -> Option<String>) {
    if let Some(host) = var("OLLAMA_HOST").filter(|h| !h.trim().is_empty()) {
        let (host, port) = split_host_port(host.trim());
        config.host = host;
        if let Some(port) = port {
            config.port = port;
        }
        config.source = ConfigSource::Env;
    }
    if let Some(port) = var("OLLAMA_PORT").and_then(|p| p.parse::<u16>().ok()) {
        config.port = port;
        config.source = ConfigSource::Env;
    }
    if let Some(model) = var("LOCALCHAT_MODEL") {
        config.default_model = Some(model);
        config.source = ConfigSource::Env;
    }
    if let Some(prompt) = var("LOCALCHAT_SYSTEM_PROMPT") {
        config.system_prompt = Some(prompt);
        config.source = ConfigSource::Env;
    }
    if let Some(dir) = var("LOCALCHAT_HISTORY_DIR") {
        config.history_dir = Some(PathBuf::from(dir));
        config.source = ConfigSource::Env;
    }
    if let Some(ms) = var("LOCALCHAT_TYPING_INTERVAL_MS").and_then(|v| v.parse::<u64>().ok()) {
        config.typing_interval = Duration::from_millis(ms);
        config.source = ConfigSource::Env;
    }
}

/// Split `host:port` (no scheme) into its parts; URLs are kept whole
fn split_host_port(value: &str) -> (String, Option<u16>) {
    if value.contains("://") {
        return (value.to_string(), None);
    }
    match value.rsplit_once(':') {
        Some((host, port)) if !host.is_empty() => match port.parse::<u16>() {
            Ok(port) => (host.to_string(), Some(port)),
            Err(_) => (value.to_string(), None),
        },
        _ => (value.to_string(), None),
    }
}

// =============================================================================
// CLI Override Support
// =============================================================================

/// Builder for applying CLI overrides to configuration
///
/// Use this after [`load_config`] to apply command-line argument overrides.
#[derive(Clone, Debug, Default)]
pub struct ConfigOverrides {
    /// Host override
    pub host: Option<String>,
    /// Port override
    pub port: Option<u16>,
    /// Model override
    pub default_model: Option<String>,
    /// History folder override
    pub history_dir: Option<PathBuf>,
}

impl ConfigOverrides {
    /// Create a new empty set of overrides
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set host override
    #[must_use]
    pub fn with_host(mut self, host: String) -> Self {
        self.host = Some(host);
        self
    }

    /// Set port override
    #[must_use]
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = Some(port);
        self
    }

    /// Set model override
    #[must_use]
    pub fn with_default_model(mut self, model: String) -> Self {
        self.default_model = Some(model);
        self
    }

    /// Set history folder override
    #[must_use]
    pub fn with_history_dir(mut self, dir: PathBuf) -> Self {
        self.history_dir = Some(dir);
        self
    }

    /// Apply overrides to a configuration
    pub fn apply(&self, config: &mut ChatConfig) {
        if self.host.is_some()
            || self.port.is_some()
            || self.default_model.is_some()
            || self.history_dir.is_some()
        {
            config.source = ConfigSource::Cli;
        }

        if let Some(host) = &self.host {
            config.host.clone_from(host);
        }
        if let Some(port) = self.port {
            config.port = port;
        }
        if let Some(model) = &self.default_model {
            config.default_model = Some(model.clone());
        }
        if let Some(dir) = &self.history_dir {
            config.history_dir = Some(dir.clone());
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
