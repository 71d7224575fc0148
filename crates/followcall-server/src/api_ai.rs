//! LLM-backed endpoints.

use crate::api::{required, ApiError};
use crate::AppState;
use axum::extract::{Extension, Json};
use followcall_ai::{generate_mock_data, generate_prompt_and_schema, PromptGeneration};
use followcall_types::{DataSchema, MockData, StructuredCallData};
use serde::Deserialize;
use std::sync::Arc;

#[derive(Debug, Deserialize)]
pub struct GeneratePromptRequest {
    #[serde(default)]
    pub objective: Option<String>,
}

/// Handler for `POST /api/ai/generate-prompt`.
pub async fn generate_prompt_handler(
    Extension(state): Extension<Arc<AppState>>,
    Json(payload): Json<GeneratePromptRequest>,
) -> Result<Json<PromptGeneration>, ApiError> {
    let objective = required(payload.objective.as_deref(), "objective")?;
    let generator = state.generator()?;

    let generated = generate_prompt_and_schema(generator.as_ref(), objective).await?;
    Ok(Json(generated))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateMockDataRequest {
    #[serde(default)]
    pub agent_type: Option<String>,
    #[serde(default)]
    pub objective: Option<String>,
}

/// Handler for `POST /api/ai/generate-mock-data`.
pub async fn generate_mock_data_handler(
    Extension(state): Extension<Arc<AppState>>,
    Json(payload): Json<GenerateMockDataRequest>,
) -> Result<Json<MockData>, ApiError> {
    let agent_type = required(payload.agent_type.as_deref(), "agentType")?;
    let objective = required(payload.objective.as_deref(), "objective")?;
    let generator = state.generator()?;

    let data = generate_mock_data(generator.as_ref(), agent_type, objective).await?;
    Ok(Json(data))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParseTranscriptRequest {
    #[serde(default)]
    pub transcript: Option<String>,
    #[serde(default)]
    pub data_schema: Option<DataSchema>,
    #[serde(default)]
    pub system_prompt: Option<String>,
}

/// Handler for `POST /api/ai/parse-transcript`.
pub async fn parse_transcript_handler(
    Extension(state): Extension<Arc<AppState>>,
    Json(payload): Json<ParseTranscriptRequest>,
) -> Result<Json<StructuredCallData>, ApiError> {
    let transcript = required(payload.transcript.as_deref(), "transcript")?;
    let system_prompt = required(payload.system_prompt.as_deref(), "systemPrompt")?;
    let schema = payload
        .data_schema
        .as_ref()
        .ok_or_else(|| ApiError::BadRequest("dataSchema is required".to_string()))?;
    let processor = state.post_processor()?;

    tracing::debug!(
        transcript_len = transcript.len(),
        fields = schema.fields.len(),
        "parsing transcript"
    );
    let data = processor.process(transcript, schema, system_prompt).await?;
    Ok(Json(data))
}
