use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

pub const DEFAULT_ELEVENLABS_BASE_URL: &str = "https://api.elevenlabs.io/v1";

fn default_base_url() -> String {
    DEFAULT_ELEVENLABS_BASE_URL.to_string()
}

fn default_request_timeout_seconds() -> u64 {
    30
}

/// Connection settings for the remote voice platform's REST API.
#[derive(Clone, Serialize, Deserialize)]
pub struct ElevenLabsConfig {
    #[serde(skip_serializing)]
    pub api_key: String,
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_request_timeout_seconds")]
    pub request_timeout_seconds: u64,
}

impl Default for ElevenLabsConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            base_url: default_base_url(),
            request_timeout_seconds: default_request_timeout_seconds(),
        }
    }
}

impl fmt::Debug for ElevenLabsConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ElevenLabsConfig")
            .field("api_key", &"[REDACTED]")
            .field("base_url", &self.base_url)
            .field("request_timeout_seconds", &self.request_timeout_seconds)
            .finish()
    }
}

impl ElevenLabsConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            ..Self::default()
        }
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    pub fn is_configured(&self) -> bool {
        !self.api_key.trim().is_empty()
    }
}

/// Capture constraints requested when acquiring the microphone. The
/// defaults are tuned for speech.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AudioConstraints {
    pub echo_cancellation: bool,
    pub noise_suppression: bool,
    pub auto_gain_control: bool,
    pub sample_rate: u32,
}

impl Default for AudioConstraints {
    fn default() -> Self {
        Self {
            echo_cancellation: true,
            noise_suppression: true,
            auto_gain_control: true,
            sample_rate: 16_000,
        }
    }
}

/// Timing and capture tunables for [`crate::CallSessionCoordinator`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoordinatorSettings {
    /// How often the remote session's status property is polled.
    pub status_poll_interval: Duration,
    /// Resolution of the duration counter.
    pub duration_tick_interval: Duration,
    /// How often the input level meter is sampled.
    pub level_sample_interval: Duration,
    /// Delay between credentials becoming available and the automatic
    /// connection attempt.
    pub auto_connect_delay: Duration,
    pub audio: AudioConstraints,
}

impl Default for CoordinatorSettings {
    fn default() -> Self {
        Self {
            status_poll_interval: Duration::from_millis(500),
            duration_tick_interval: Duration::from_secs(1),
            level_sample_interval: Duration::from_millis(50),
            auto_connect_delay: Duration::from_secs(1),
            audio: AudioConstraints::default(),
        }
    }
}
