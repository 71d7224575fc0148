//! Shared API error type and helpers for the HTTP handlers.

use crate::calls::CallError;
use axum::{
    extract::Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use followcall_ai::AiError;
use followcall_db::StoreError;
use followcall_voice::VoiceError;
use thiserror::Error;

/// API error type mapping to HTTP status codes.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("invalid input: {0}")]
    BadRequest(String),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("conflict: {0}")]
    Conflict(String),
    #[error("internal server error: {0}")]
    InternalServerError(String),
    /// An upstream service (voice platform, LLM provider) failed.
    #[error("upstream error: {0}")]
    BadGateway(String),
    /// An upstream service is not configured.
    #[error("service unavailable: {0}")]
    ServiceUnavailable(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            ApiError::Conflict(msg) => (StatusCode::CONFLICT, msg),
            ApiError::InternalServerError(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
            ApiError::BadGateway(msg) => (StatusCode::BAD_GATEWAY, msg),
            ApiError::ServiceUnavailable(msg) => (StatusCode::SERVICE_UNAVAILABLE, msg),
        };

        if status.is_server_error() {
            tracing::error!(status = status.as_u16(), "request failed: {}", message);
        }

        let body = Json(serde_json::json!({
            "error": message
        }));

        (status, body).into_response()
    }
}

impl From<StoreError> for ApiError {
    fn from(e: StoreError) -> Self {
        ApiError::InternalServerError(e.to_string())
    }
}

impl From<VoiceError> for ApiError {
    fn from(e: VoiceError) -> Self {
        match e {
            VoiceError::Configuration(_) | VoiceError::NotReady(_) => {
                ApiError::ServiceUnavailable(e.to_string())
            }
            VoiceError::Api { .. }
            | VoiceError::Http(_)
            | VoiceError::InvalidResponse(_)
            | VoiceError::RemoteSession(_) => ApiError::BadGateway(e.to_string()),
            VoiceError::PermissionDenied(_) | VoiceError::Device(_) => {
                ApiError::InternalServerError(e.to_string())
            }
        }
    }
}

impl From<AiError> for ApiError {
    fn from(e: AiError) -> Self {
        match e {
            AiError::Configuration(_) => ApiError::ServiceUnavailable(e.to_string()),
            AiError::Schema(_) => ApiError::BadRequest(e.to_string()),
            _ => ApiError::BadGateway(e.to_string()),
        }
    }
}

impl From<CallError> for ApiError {
    fn from(e: CallError) -> Self {
        match e {
            CallError::Dial(_) => ApiError::BadRequest(e.to_string()),
            CallError::AgentNotFound(_) | CallError::CallNotFound(_) => {
                ApiError::NotFound(e.to_string())
            }
            CallError::NotActive(_) => ApiError::Conflict(e.to_string()),
            CallError::Store(inner) => inner.into(),
            CallError::Join(msg) => ApiError::InternalServerError(msg),
        }
    }
}

/// Maps a failed `spawn_blocking` join into a 500.
pub(crate) fn join_error(e: tokio::task::JoinError) -> ApiError {
    ApiError::InternalServerError(format!("task join error: {}", e))
}

/// Returns the trimmed value of a required text field, or a 400 naming it.
pub(crate) fn required<'a>(value: Option<&'a str>, field: &str) -> Result<&'a str, ApiError> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .ok_or_else(|| ApiError::BadRequest(format!("{} is required", field)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn voice_errors_map_to_gateway_statuses() {
        let unavailable: ApiError = VoiceError::Configuration("no key".into()).into();
        assert!(matches!(unavailable, ApiError::ServiceUnavailable(_)));

        let upstream: ApiError = VoiceError::Api {
            status: 500,
            message: "boom".into(),
        }
        .into();
        assert!(matches!(upstream, ApiError::BadGateway(_)));
    }

    #[test]
    fn call_errors_map_to_client_statuses() {
        let missing: ApiError = CallError::CallNotFound("c1".into()).into();
        assert!(matches!(missing, ApiError::NotFound(_)));

        let closed: ApiError = CallError::NotActive("c1".into()).into();
        assert!(matches!(closed, ApiError::Conflict(_)));

        let dial: ApiError = CallError::Dial(VoiceError::Configuration("x".into())).into();
        assert!(matches!(dial, ApiError::BadRequest(_)));
    }

    #[test]
    fn required_rejects_blank() {
        assert_eq!(required(Some(" hola "), "name").unwrap(), "hola");
        assert!(matches!(required(Some("  "), "name"), Err(ApiError::BadRequest(m)) if m == "name is required"));
        assert!(required(None, "name").is_err());
    }
}
