use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum VoiceError {
    /// A required identifier or credential is missing.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Credentials have not been loaded yet; the caller may retry.
    #[error("not ready: {0}")]
    NotReady(String),

    #[error("microphone permission denied: {0}")]
    PermissionDenied(String),

    #[error("audio device error: {0}")]
    Device(String),

    /// The remote duplex session failed to open or reported a failure.
    #[error("remote session error: {0}")]
    RemoteSession(String),

    /// Transport-level failure talking to the remote voice platform.
    #[error("http error: {0}")]
    Http(String),

    /// The remote voice platform answered with a non-success status.
    #[error("voice API error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("invalid response: {0}")]
    InvalidResponse(String),
}

impl VoiceError {
    /// Only a missing-credentials condition clears up on its own.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::NotReady(_))
    }
}

impl From<reqwest::Error> for VoiceError {
    fn from(e: reqwest::Error) -> Self {
        Self::Http(e.to_string())
    }
}
