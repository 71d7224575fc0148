//! Server configuration loading from file and environment variables.

use followcall_ai::OpenAiConfig;
use followcall_voice::config::DEFAULT_ELEVENLABS_BASE_URL;
use followcall_voice::ElevenLabsConfig;
use serde::Deserialize;
use std::fmt;
use std::net::{IpAddr, Ipv4Addr};
use thiserror::Error;

/// Top-level server configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub database: DatabaseConfig,

    #[serde(default)]
    pub logging: LoggingConfig,

    /// Remote voice platform.
    #[serde(default)]
    pub voice: VoiceConfig,

    /// LLM provider used for prompt generation and post-processing.
    #[serde(default)]
    pub ai: OpenAiConfig,
}

/// Network configuration for the HTTP server.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: IpAddr,

    #[serde(default = "default_port")]
    pub port: u16,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// Path to the SQLite database file.
    #[serde(default = "default_db_path")]
    pub path: String,

    #[serde(default = "default_busy_timeout_ms")]
    pub busy_timeout_ms: u64,

    #[serde(default = "default_pool_max_size")]
    pub pool_max_size: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level filter (e.g., "info", "debug", "followcall_voice=debug,info").
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Whether to output logs in JSON format.
    #[serde(default)]
    pub json: bool,
}

#[derive(Clone, Deserialize)]
pub struct VoiceConfig {
    /// ElevenLabs API key. Empty disables remote agent management and the
    /// credential endpoint.
    #[serde(default)]
    pub api_key: String,

    #[serde(default = "default_voice_base_url")]
    pub base_url: String,

    #[serde(default = "default_voice_timeout_seconds")]
    pub request_timeout_seconds: u64,

    /// When set, every call dials this remote agent instead of the agent's
    /// own remote id.
    #[serde(default)]
    pub dial_override_agent_id: Option<String>,
}

impl fmt::Debug for VoiceConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VoiceConfig")
            .field("api_key", &"[REDACTED]")
            .field("base_url", &self.base_url)
            .field("request_timeout_seconds", &self.request_timeout_seconds)
            .field("dial_override_agent_id", &self.dial_override_agent_id)
            .finish()
    }
}

impl VoiceConfig {
    pub fn elevenlabs(&self) -> ElevenLabsConfig {
        ElevenLabsConfig {
            api_key: self.api_key.clone(),
            base_url: self.base_url.clone(),
            request_timeout_seconds: self.request_timeout_seconds,
        }
    }

    pub fn is_configured(&self) -> bool {
        !self.api_key.trim().is_empty()
    }
}

fn default_host() -> IpAddr {
    IpAddr::V4(Ipv4Addr::new(127, 0, 0, 1))
}

fn default_port() -> u16 {
    3000
}

fn default_db_path() -> String {
    "followcall.db".to_string()
}

fn default_busy_timeout_ms() -> u64 {
    5000
}

fn default_pool_max_size() -> u32 {
    8
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_voice_base_url() -> String {
    DEFAULT_ELEVENLABS_BASE_URL.to_string()
}

fn default_voice_timeout_seconds() -> u64 {
    30
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
            busy_timeout_ms: default_busy_timeout_ms(),
            pool_max_size: default_pool_max_size(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

impl Default for VoiceConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            base_url: default_voice_base_url(),
            request_timeout_seconds: default_voice_timeout_seconds(),
            dial_override_agent_id: None,
        }
    }
}

/// Errors that can occur when loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    FileRead(#[from] std::io::Error),

    #[error("failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Loads configuration from a TOML file, falling back to defaults when the
/// file does not exist.
///
/// Environment variable overrides:
/// - `FOLLOWCALL_HOST`, `FOLLOWCALL_PORT`
/// - `FOLLOWCALL_DB_PATH`
/// - `FOLLOWCALL_LOG_LEVEL`, `FOLLOWCALL_LOG_JSON` ("true" or "1")
/// - `ELEVENLABS_API_KEY`, `FOLLOWCALL_VOICE_BASE_URL`,
///   `FOLLOWCALL_DIAL_OVERRIDE_AGENT_ID`
/// - `OPENAI_API_KEY`, `FOLLOWCALL_AI_BASE_URL`, `FOLLOWCALL_AI_MODEL`
///
/// # Errors
///
/// Returns `ConfigError` if the file exists but cannot be read or parsed.
pub fn load_config(path: Option<&str>) -> Result<Config, ConfigError> {
    let mut config = match path {
        Some(p) => match std::fs::read_to_string(p) {
            Ok(contents) => toml::from_str(&contents)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::info!(path = p, "config file not found, using defaults");
                Config::default()
            }
            Err(e) => return Err(ConfigError::FileRead(e)),
        },
        None => Config::default(),
    };

    apply_env_overrides(&mut config, |key| std::env::var(key).ok());
    Ok(config)
}

fn apply_env_overrides(config: &mut Config, var: impl Fn(&str) -> Option<String>) {
    if let Some(parsed) = var("FOLLOWCALL_HOST").and_then(|v| v.parse().ok()) {
        config.server.host = parsed;
    }
    if let Some(parsed) = var("FOLLOWCALL_PORT").and_then(|v| v.parse().ok()) {
        config.server.port = parsed;
    }
    if let Some(db_path) = var("FOLLOWCALL_DB_PATH") {
        config.database.path = db_path;
    }
    if let Some(level) = var("FOLLOWCALL_LOG_LEVEL") {
        config.logging.level = level;
    }
    if let Some(json) = var("FOLLOWCALL_LOG_JSON") {
        config.logging.json = json == "true" || json == "1";
    }

    if let Some(key) = var("ELEVENLABS_API_KEY") {
        config.voice.api_key = key;
    }
    if let Some(url) = var("FOLLOWCALL_VOICE_BASE_URL") {
        config.voice.base_url = url;
    }
    if let Some(id) = var("FOLLOWCALL_DIAL_OVERRIDE_AGENT_ID") {
        config.voice.dial_override_agent_id = Some(id).filter(|id| !id.trim().is_empty());
    }

    if let Some(key) = var("OPENAI_API_KEY") {
        config.ai.api_key = key;
    }
    if let Some(url) = var("FOLLOWCALL_AI_BASE_URL") {
        config.ai.base_url = url;
    }
    if let Some(model) = var("FOLLOWCALL_AI_MODEL") {
        config.ai.model = model;
    }
}
