#![allow(dead_code)]

use async_trait::async_trait;
use axum::body::Body;
use axum::extract::Path;
use axum::http::{Request, StatusCode};
use axum::routing::{get, post};
use axum::{Json, Router};
use followcall_ai::{AiError, StructuredGenerator};
use followcall_db::{put_record, MemoryRecordStore, RecordStore};
use followcall_server::AppState;
use followcall_types::{Agent, DataField, DataSchema, FieldType, NewAgent};
use followcall_voice::{ElevenLabsClient, ElevenLabsConfig};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tower::ServiceExt;

pub fn memory_store() -> Arc<dyn RecordStore> {
    Arc::new(MemoryRecordStore::new())
}

pub fn schema() -> DataSchema {
    DataSchema::new(vec![
        DataField {
            name: "nivelDolor".to_string(),
            field_type: FieldType::Number,
            description: "Nivel de dolor del 1 al 10".to_string(),
            required: true,
        },
        DataField {
            name: "tomaMedicacion".to_string(),
            field_type: FieldType::Boolean,
            description: "Si toma la medicación".to_string(),
            required: false,
        },
    ])
}

pub fn seed_agent(store: &Arc<dyn RecordStore>, remote_agent_id: Option<&str>) -> Agent {
    let agent = NewAgent {
        name: "Seguimiento post-operatorio".to_string(),
        objective: "Saber cómo evoluciona el paciente".to_string(),
        system_prompt: "Eres un asistente de seguimiento.".to_string(),
        first_message: Some("Hola, le llamo de la clínica.".to_string()),
        voice_id: "voice-1".to_string(),
        language: "es".to_string(),
        data_schema: schema(),
    }
    .into_agent(remote_agent_id.map(str::to_string));
    put_record(store.as_ref(), &agent).unwrap();
    agent
}

/// Generator that answers from a table keyed by schema name.
#[derive(Default)]
pub struct FakeGenerator {
    answers: Mutex<HashMap<String, Value>>,
    calls: Mutex<Vec<String>>,
}

impl FakeGenerator {
    pub fn answering(name: &str, answer: Value) -> Self {
        let generator = Self::default();
        generator.answer(name, answer);
        generator
    }

    pub fn answer(&self, name: &str, answer: Value) {
        self.answers.lock().unwrap().insert(name.to_string(), answer);
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl StructuredGenerator for FakeGenerator {
    async fn generate_object(&self, name: &str, _schema: &Value, _prompt: &str) -> Result<Value, AiError> {
        self.calls.lock().unwrap().push(name.to_string());
        self.answers
            .lock()
            .unwrap()
            .get(name)
            .cloned()
            .ok_or_else(|| AiError::Api {
                status: 500,
                message: format!("no canned answer for {}", name),
            })
    }
}

/// Requests the voice mock received, as `(method path, body)`.
pub type Recorded = Arc<Mutex<Vec<(String, Value)>>>;

/// Spawns a fake voice platform and returns a client pointed at it.
pub async fn voice_mock() -> (Arc<ElevenLabsClient>, Recorded) {
    let recorded: Recorded = Arc::default();

    let on_create = recorded.clone();
    let on_get = recorded.clone();
    let on_patch = recorded.clone();
    let app = Router::new()
        .route(
            "/v1/convai/agents",
            post(move |Json(body): Json<Value>| {
                let recorded = on_create.clone();
                async move {
                    recorded.lock().unwrap().push(("POST /convai/agents".to_string(), body));
                    Json(json!({ "agent_id": "agent_remote_new" }))
                }
            }),
        )
        .route(
            "/v1/convai/agents/{id}",
            get(move |Path(id): Path<String>| {
                let recorded = on_get.clone();
                async move {
                    recorded
                        .lock()
                        .unwrap()
                        .push((format!("GET /convai/agents/{}", id), Value::Null));
                    if id == "agent_broken" {
                        return Err(StatusCode::INTERNAL_SERVER_ERROR);
                    }
                    Ok(Json(json!({
                        "name": "Remote",
                        "conversation_config": {
                            "agent": { "language": "es", "prompt": { "prompt": "old", "llm": "gpt-4o-mini" } }
                        }
                    })))
                }
            })
            .patch(move |Path(id): Path<String>, Json(body): Json<Value>| {
                let recorded = on_patch.clone();
                async move {
                    recorded
                        .lock()
                        .unwrap()
                        .push((format!("PATCH /convai/agents/{}", id), body.clone()));
                    if id == "agent_broken" {
                        return Err(StatusCode::INTERNAL_SERVER_ERROR);
                    }
                    Ok(Json(body))
                }
            }),
        );

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    let config = ElevenLabsConfig::new("xi-test").with_base_url(format!("http://{}/v1", addr));
    (Arc::new(ElevenLabsClient::new(&config).unwrap()), recorded)
}

pub fn state(store: Arc<dyn RecordStore>) -> AppState {
    AppState::new(store)
}

/// Sends one request through a fresh router and returns status and JSON body
/// (`Value::Null` when the body is empty).
pub async fn send(state: &AppState, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let mut request = Request::builder().method(method).uri(uri);
    let body = match body {
        Some(body) => {
            request = request.header("content-type", "application/json");
            Body::from(body.to_string())
        }
        None => Body::empty(),
    };

    let response = followcall_server::app(state.clone())
        .oneshot(request.body(body).unwrap())
        .await
        .unwrap();

    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, json)
}
