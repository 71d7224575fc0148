//! followcall server library logic.

pub mod api;
pub mod api_agents;
pub mod api_ai;
pub mod api_calls;
pub mod api_voice;
pub mod background;
pub mod calls;
pub mod config;

use api::ApiError;
use axum::{
    extract::DefaultBodyLimit,
    routing::{get, patch, post, put},
    Extension, Json, Router,
};
use background::{PostProcessEvent, PostProcessing};
use followcall_ai::{AiError, LlmTranscriptParser, OpenAiClient, StructuredGenerator, TranscriptPostProcessor};
use followcall_db::RecordStore;
use followcall_voice::{ElevenLabsClient, VoiceError};
use serde_json::{json, Value};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::broadcast;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// Capacity of the post-processing event channel.
const POST_PROCESS_CHANNEL_CAPACITY: usize = 64;

/// Application state shared across all request handlers.
#[derive(Clone)]
pub struct AppState {
    /// Agents and calls.
    pub store: Arc<dyn RecordStore>,
    /// Remote agent administration. `None` when no voice key is configured.
    pub voice: Option<Arc<ElevenLabsClient>>,
    /// Key handed to session clients by the credential endpoint.
    pub voice_api_key: Option<String>,
    /// Remote agent every call dials instead of the agent's own.
    pub dial_override: Option<String>,
    /// LLM used for prompt and mock data generation.
    pub generator: Option<Arc<dyn StructuredGenerator>>,
    pub post_processor: Option<Arc<dyn TranscriptPostProcessor>>,
    /// Outcomes of background post-processing.
    pub post_process_tx: broadcast::Sender<PostProcessEvent>,
}

/// Errors raised while building [`AppState`] from configuration.
#[derive(Debug, Error)]
pub enum StateError {
    #[error("voice client: {0}")]
    Voice(#[from] VoiceError),
    #[error("LLM client: {0}")]
    Ai(#[from] AiError),
}

impl AppState {
    /// State with only a record store; every upstream is unconfigured.
    pub fn new(store: Arc<dyn RecordStore>) -> Self {
        let (post_process_tx, _) = broadcast::channel(POST_PROCESS_CHANNEL_CAPACITY);
        Self {
            store,
            voice: None,
            voice_api_key: None,
            dial_override: None,
            generator: None,
            post_processor: None,
            post_process_tx,
        }
    }

    /// Builds the state described by `config`, creating the upstream clients
    /// whose keys are present.
    pub fn from_config(store: Arc<dyn RecordStore>, config: &config::Config) -> Result<Self, StateError> {
        let mut state = Self::new(store)
            .with_dial_override(config.voice.dial_override_agent_id.clone());

        if config.voice.is_configured() {
            let client = ElevenLabsClient::new(&config.voice.elevenlabs())?;
            state = state.with_voice(Arc::new(client), config.voice.api_key.clone());
        } else {
            tracing::warn!("ELEVENLABS_API_KEY not set; remote agent endpoints and credentials are disabled");
        }

        if config.ai.is_configured() {
            let client = OpenAiClient::new(&config.ai)?;
            state = state.with_generator(Arc::new(client));
        } else {
            tracing::warn!("OPENAI_API_KEY not set; AI endpoints and post-processing are disabled");
        }

        Ok(state)
    }

    pub fn with_voice(mut self, client: Arc<ElevenLabsClient>, api_key: impl Into<String>) -> Self {
        self.voice = Some(client);
        self.voice_api_key = Some(api_key.into());
        self
    }

    pub fn with_voice_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.voice_api_key = Some(api_key.into());
        self
    }

    pub fn with_dial_override(mut self, agent_id: Option<String>) -> Self {
        self.dial_override = agent_id.filter(|id| !id.trim().is_empty());
        self
    }

    /// Uses `generator` for generation and, unless one is already set, for
    /// transcript post-processing.
    pub fn with_generator(mut self, generator: Arc<dyn StructuredGenerator>) -> Self {
        if self.post_processor.is_none() {
            self.post_processor = Some(Arc::new(LlmTranscriptParser::new(generator.clone())));
        }
        self.generator = Some(generator);
        self
    }

    pub fn with_post_processor(mut self, processor: Arc<dyn TranscriptPostProcessor>) -> Self {
        self.post_processor = Some(processor);
        self
    }

    pub fn voice_client(&self) -> Result<&ElevenLabsClient, ApiError> {
        self.voice
            .as_deref()
            .ok_or_else(|| ApiError::ServiceUnavailable("ELEVENLABS_API_KEY is not configured".to_string()))
    }

    pub fn generator(&self) -> Result<Arc<dyn StructuredGenerator>, ApiError> {
        self.generator
            .clone()
            .ok_or_else(|| ApiError::ServiceUnavailable("OPENAI_API_KEY is not configured".to_string()))
    }

    pub fn post_processor(&self) -> Result<Arc<dyn TranscriptPostProcessor>, ApiError> {
        self.post_processor
            .clone()
            .ok_or_else(|| ApiError::ServiceUnavailable("no transcript post-processor configured".to_string()))
    }

    pub fn post_processing(&self) -> PostProcessing {
        PostProcessing {
            store: self.store.clone(),
            processor: self.post_processor.clone(),
            events: self.post_process_tx.clone(),
        }
    }

    /// Subscribes to background post-processing outcomes.
    pub fn subscribe_post_processing(&self) -> broadcast::Receiver<PostProcessEvent> {
        self.post_process_tx.subscribe()
    }
}

/// Maximum request body size (2 MiB). Protects against OOM from oversized payloads.
const MAX_REQUEST_BODY_BYTES: usize = 2 * 1024 * 1024;

/// Health check handler.
async fn health() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION")
    }))
}

/// Builds the application router with all routes.
pub fn app(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route(
            "/api/agents",
            get(api_agents::list_agents_handler).post(api_agents::create_agent_handler),
        )
        .route(
            "/api/agents/create",
            post(api_agents::create_remote_agent_handler),
        )
        .route(
            "/api/agents/update",
            patch(api_agents::update_remote_agent_handler),
        )
        .route(
            "/api/agents/{id}",
            get(api_agents::get_agent_handler)
                .put(api_agents::update_agent_handler)
                .delete(api_agents::delete_agent_handler),
        )
        .route(
            "/api/ai/generate-prompt",
            post(api_ai::generate_prompt_handler),
        )
        .route(
            "/api/ai/generate-mock-data",
            post(api_ai::generate_mock_data_handler),
        )
        .route(
            "/api/ai/parse-transcript",
            post(api_ai::parse_transcript_handler),
        )
        .route("/api/voice/credentials", get(api_voice::credentials_handler))
        .route(
            "/api/calls",
            get(api_calls::list_calls_handler).post(api_calls::start_call_handler),
        )
        .route("/api/calls/{id}", get(api_calls::get_call_handler))
        .route("/api/calls/{id}/progress", put(api_calls::progress_handler))
        .route("/api/calls/{id}/end", post(api_calls::end_call_handler))
        .layer(DefaultBodyLimit::max(MAX_REQUEST_BODY_BYTES))
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(Extension(Arc::new(state)))
}
