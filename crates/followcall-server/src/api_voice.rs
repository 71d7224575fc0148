//! Voice platform credential endpoint.

use crate::api::ApiError;
use crate::AppState;
use axum::extract::{Extension, Json};
use serde_json::{json, Value};
use std::sync::Arc;

/// Handler for `GET /api/voice/credentials`.
///
/// Hands the voice platform key to the client that opens the duplex
/// session. Answers 503 while no key is configured.
pub async fn credentials_handler(
    Extension(state): Extension<Arc<AppState>>,
) -> Result<Json<Value>, ApiError> {
    let api_key = state
        .voice_api_key
        .as_deref()
        .filter(|k| !k.trim().is_empty())
        .ok_or_else(|| ApiError::ServiceUnavailable("ELEVENLABS_API_KEY is not configured".to_string()))?;

    Ok(Json(json!({ "apiKey": api_key })))
}
