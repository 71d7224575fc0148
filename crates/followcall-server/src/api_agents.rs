//! Agent endpoints: local CRUD plus remote agent administration.

use crate::api::{join_error, required, ApiError};
use crate::AppState;
use axum::{
    extract::{Extension, Json, Path},
    http::StatusCode,
};
use followcall_db::{delete_record, get_record, list_records, save_agent};
use followcall_types::{Agent, NewAgent};
use followcall_voice::{AgentUpdate, CreateRemoteAgent};
use serde::Deserialize;
use serde_json::Value;
use std::sync::Arc;

/// Request body for `POST /api/agents` and `PUT /api/agents/{id}`.
#[derive(Debug, Deserialize)]
pub struct AgentRequest {
    #[serde(flatten)]
    pub agent: NewAgent,
    /// Links an already-existing remote agent.
    #[serde(default, rename = "elevenLabsAgentId")]
    pub remote_agent_id: Option<String>,
}

fn validate(agent: &NewAgent) -> Result<(), ApiError> {
    required(Some(agent.name.as_str()), "name")?;
    required(Some(agent.system_prompt.as_str()), "systemPrompt")?;
    agent
        .data_schema
        .validate()
        .map_err(|e| ApiError::BadRequest(e.to_string()))
}

fn blank_to_none(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

/// Handler for `GET /api/agents`.
pub async fn list_agents_handler(
    Extension(state): Extension<Arc<AppState>>,
) -> Result<Json<Vec<Agent>>, ApiError> {
    let agents = tokio::task::spawn_blocking(move || list_records::<Agent>(state.store.as_ref()))
        .await
        .map_err(join_error)??;
    Ok(Json(agents))
}

/// Handler for `POST /api/agents`.
pub async fn create_agent_handler(
    Extension(state): Extension<Arc<AppState>>,
    Json(payload): Json<AgentRequest>,
) -> Result<(StatusCode, Json<Agent>), ApiError> {
    validate(&payload.agent)?;
    let agent = payload
        .agent
        .into_agent(blank_to_none(payload.remote_agent_id));

    let saved = tokio::task::spawn_blocking(move || save_agent(state.store.as_ref(), agent))
        .await
        .map_err(join_error)??;

    tracing::info!(agent_id = %saved.id, name = %saved.name, "agent created");
    Ok((StatusCode::CREATED, Json(saved)))
}

/// Handler for `GET /api/agents/{id}`.
pub async fn get_agent_handler(
    Extension(state): Extension<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<Agent>, ApiError> {
    let lookup = id.clone();
    let agent = tokio::task::spawn_blocking(move || get_record::<Agent>(state.store.as_ref(), &lookup))
        .await
        .map_err(join_error)??;
    agent
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("agent {}", id)))
}

/// Handler for `PUT /api/agents/{id}`.
///
/// Replaces the agent's editable fields. The id and creation time are kept;
/// the remote agent link is kept unless the body carries a new one.
pub async fn update_agent_handler(
    Extension(state): Extension<Arc<AppState>>,
    Path(id): Path<String>,
    Json(payload): Json<AgentRequest>,
) -> Result<Json<Agent>, ApiError> {
    validate(&payload.agent)?;

    let saved = tokio::task::spawn_blocking(move || {
        let store = state.store.as_ref();
        let existing = get_record::<Agent>(store, &id)?
            .ok_or_else(|| ApiError::NotFound(format!("agent {}", id)))?;

        let remote_agent_id = blank_to_none(payload.remote_agent_id).or(existing.remote_agent_id);
        let mut agent = payload.agent.into_agent(remote_agent_id);
        agent.id = existing.id;
        agent.created_at = existing.created_at;

        Ok::<_, ApiError>(save_agent(store, agent)?)
    })
    .await
    .map_err(join_error)??;

    tracing::info!(agent_id = %saved.id, "agent updated");
    Ok(Json(saved))
}

/// Handler for `DELETE /api/agents/{id}`.
pub async fn delete_agent_handler(
    Extension(state): Extension<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    let lookup = id.clone();
    let removed = tokio::task::spawn_blocking(move || delete_record::<Agent>(state.store.as_ref(), &lookup))
        .await
        .map_err(join_error)??;

    if !removed {
        return Err(ApiError::NotFound(format!("agent {}", id)));
    }
    tracing::info!(agent_id = %id, "agent deleted");
    Ok(StatusCode::NO_CONTENT)
}

/// Handler for `POST /api/agents/create`.
///
/// Creates the conversational agent on the voice platform first, then
/// stores the local agent linked to it.
pub async fn create_remote_agent_handler(
    Extension(state): Extension<Arc<AppState>>,
    Json(payload): Json<NewAgent>,
) -> Result<(StatusCode, Json<Agent>), ApiError> {
    required(Some(payload.name.as_str()), "name")?;
    required(Some(payload.system_prompt.as_str()), "systemPrompt")?;
    required(Some(payload.voice_id.as_str()), "voiceId")?;
    payload
        .data_schema
        .validate()
        .map_err(|e| ApiError::BadRequest(e.to_string()))?;

    let client = state.voice_client()?;
    let remote_id = client
        .create_agent(&CreateRemoteAgent {
            name: payload.name.clone(),
            system_prompt: payload.system_prompt.clone(),
            voice_id: payload.voice_id.clone(),
            language: payload.language.clone(),
            first_message: blank_to_none(payload.first_message.clone()),
        })
        .await?;

    let agent = payload.into_agent(Some(remote_id));
    let saved = tokio::task::spawn_blocking(move || save_agent(state.store.as_ref(), agent))
        .await
        .map_err(join_error)??;

    tracing::info!(
        agent_id = %saved.id,
        remote_agent_id = saved.remote_agent_id.as_deref().unwrap_or_default(),
        "agent created on voice platform"
    );
    Ok((StatusCode::CREATED, Json(saved)))
}

/// Request body for `PATCH /api/agents/update`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteAgentUpdateRequest {
    #[serde(default)]
    pub agent_id: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub system_prompt: Option<String>,
    #[serde(default)]
    pub first_message: Option<String>,
    #[serde(default)]
    pub voice_id: Option<String>,
}

/// Handler for `PATCH /api/agents/update`.
///
/// `agentId` is the remote agent identifier. Returns the remote agent's
/// configuration as the voice platform reports it after the update.
pub async fn update_remote_agent_handler(
    Extension(state): Extension<Arc<AppState>>,
    Json(payload): Json<RemoteAgentUpdateRequest>,
) -> Result<Json<Value>, ApiError> {
    let agent_id = required(payload.agent_id.as_deref(), "agentId")?.to_string();

    let update = AgentUpdate {
        name: payload.name,
        system_prompt: payload.system_prompt,
        first_message: payload.first_message,
        voice_id: payload.voice_id,
    };
    if update.is_empty() {
        return Err(ApiError::BadRequest("nothing to update".to_string()));
    }

    let client = state.voice_client()?;
    let updated = client.update_agent(&agent_id, &update).await?;
    Ok(Json(updated))
}
