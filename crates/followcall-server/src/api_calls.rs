//! Call record endpoints.

use crate::api::{join_error, required, ApiError};
use crate::calls::{self, StartedCall};
use crate::AppState;
use axum::{
    extract::{Extension, Json, Path, Query},
    http::StatusCode,
};
use followcall_db::{calls_for_agent, get_record, list_records};
use followcall_types::Call;
use serde::Deserialize;
use std::sync::Arc;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListCallsQuery {
    pub agent_id: Option<String>,
}

/// Handler for `GET /api/calls`, optionally filtered by `?agentId=`.
pub async fn list_calls_handler(
    Extension(state): Extension<Arc<AppState>>,
    Query(query): Query<ListCallsQuery>,
) -> Result<Json<Vec<Call>>, ApiError> {
    let calls = tokio::task::spawn_blocking(move || {
        let store = state.store.as_ref();
        match query.agent_id.as_deref().filter(|id| !id.is_empty()) {
            Some(agent_id) => calls_for_agent(store, agent_id),
            None => list_records::<Call>(store),
        }
    })
    .await
    .map_err(join_error)??;
    Ok(Json(calls))
}

/// Handler for `GET /api/calls/{id}`.
pub async fn get_call_handler(
    Extension(state): Extension<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<Call>, ApiError> {
    let lookup = id.clone();
    let call = tokio::task::spawn_blocking(move || get_record::<Call>(state.store.as_ref(), &lookup))
        .await
        .map_err(join_error)??;
    call.map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("call {}", id)))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StartCallRequest {
    #[serde(default)]
    pub agent_id: Option<String>,
}

/// Handler for `POST /api/calls`.
pub async fn start_call_handler(
    Extension(state): Extension<Arc<AppState>>,
    Json(payload): Json<StartCallRequest>,
) -> Result<(StatusCode, Json<StartedCall>), ApiError> {
    let agent_id = required(payload.agent_id.as_deref(), "agentId")?;
    let started = calls::start_call(
        state.store.clone(),
        state.voice.as_deref(),
        state.dial_override.as_deref(),
        agent_id,
    )
    .await?;
    Ok((StatusCode::CREATED, Json(started)))
}

#[derive(Debug, Deserialize)]
pub struct ProgressRequest {
    pub transcript: String,
    /// Connected seconds so far.
    #[serde(default)]
    pub duration: u64,
}

/// Handler for `PUT /api/calls/{id}/progress`.
pub async fn progress_handler(
    Extension(state): Extension<Arc<AppState>>,
    Path(id): Path<String>,
    Json(payload): Json<ProgressRequest>,
) -> Result<Json<Call>, ApiError> {
    let call = tokio::task::spawn_blocking(move || {
        calls::record_progress(state.store.as_ref(), &id, payload.transcript, payload.duration)
    })
    .await
    .map_err(join_error)??;
    Ok(Json(call))
}

#[derive(Debug, Default, Deserialize)]
pub struct EndCallRequest {
    #[serde(default)]
    pub transcript: Option<String>,
    #[serde(default)]
    pub duration: Option<u64>,
}

/// Handler for `POST /api/calls/{id}/end`.
///
/// Returns the completed call as soon as it is saved. Structured data is
/// attached later by the background post-processor.
pub async fn end_call_handler(
    Extension(state): Extension<Arc<AppState>>,
    Path(id): Path<String>,
    payload: Option<Json<EndCallRequest>>,
) -> Result<Json<Call>, ApiError> {
    let payload = payload.map(|Json(p)| p).unwrap_or_default();
    let (call, _post_processing) =
        calls::complete_call(&state.post_processing(), &id, payload.transcript, payload.duration).await?;
    Ok(Json(call))
}
