use followcall_types::SchemaError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AiError {
    /// No API key or model configured.
    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("http error: {0}")]
    Http(String),

    #[error("LLM API error ({status}): {message}")]
    Api { status: u16, message: String },

    /// The model answered, but not with what was asked for.
    #[error("invalid response: {0}")]
    InvalidResponse(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("invalid data schema: {0}")]
    Schema(#[from] SchemaError),
}

impl From<reqwest::Error> for AiError {
    fn from(e: reqwest::Error) -> Self {
        Self::Http(e.to_string())
    }
}
