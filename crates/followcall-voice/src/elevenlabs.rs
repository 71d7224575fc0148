//! REST client for managing conversational agents on ElevenLabs.

use crate::config::ElevenLabsConfig;
use crate::error::VoiceError;
use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE};
use reqwest::{Method, StatusCode};
use serde::Serialize;
use serde_json::{json, Map, Value};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Parameters for creating a remote agent.
#[derive(Debug, Clone, Serialize)]
pub struct CreateRemoteAgent {
    pub name: String,
    pub system_prompt: String,
    pub voice_id: String,
    pub language: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub first_message: Option<String>,
}

/// A partial update to a remote agent. `None` leaves the field untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AgentUpdate {
    pub name: Option<String>,
    pub system_prompt: Option<String>,
    pub first_message: Option<String>,
    pub voice_id: Option<String>,
}

impl AgentUpdate {
    pub fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.system_prompt.is_none()
            && self.first_message.is_none()
            && self.voice_id.is_none()
    }

    /// Builds the request body, merging into the agent's current
    /// configuration so that only the prompt text and first message change
    /// inside `conversation_config`. Language and model settings are kept
    /// as they are remotely.
    pub fn merged_body(&self, current: Option<&Value>) -> Value {
        let mut body = Map::new();

        let current_name = current
            .and_then(|c| c.get("name"))
            .and_then(Value::as_str)
            .map(str::to_string);
        if let Some(name) = self.name.clone().or(current_name) {
            body.insert("name".to_string(), Value::String(name));
        }

        if self.system_prompt.is_some() || self.first_message.is_some() {
            let mut conversation_config = object_at(current, "conversation_config");
            let mut agent = conversation_config
                .get("agent")
                .and_then(Value::as_object)
                .cloned()
                .unwrap_or_default();

            if let Some(prompt_text) = &self.system_prompt {
                let mut prompt = agent
                    .get("prompt")
                    .and_then(Value::as_object)
                    .cloned()
                    .unwrap_or_default();
                prompt.insert("prompt".to_string(), Value::String(prompt_text.clone()));
                agent.insert("prompt".to_string(), Value::Object(prompt));
            }
            if let Some(first_message) = &self.first_message {
                agent.insert(
                    "first_message".to_string(),
                    Value::String(first_message.clone()),
                );
            }

            conversation_config.insert("agent".to_string(), Value::Object(agent));
            body.insert(
                "conversation_config".to_string(),
                Value::Object(conversation_config),
            );
        }

        if let Some(voice_id) = &self.voice_id {
            body.insert("voice_id".to_string(), Value::String(voice_id.clone()));
        }

        Value::Object(body)
    }
}

fn object_at(value: Option<&Value>, key: &str) -> Map<String, Value> {
    value
        .and_then(|v| v.get(key))
        .and_then(Value::as_object)
        .cloned()
        .unwrap_or_default()
}

/// Client for the agent management endpoints.
///
/// Several endpoints exist under two paths depending on the account's API
/// generation; the client tries the current path first and falls back on
/// 404.
#[derive(Debug, Clone)]
pub struct ElevenLabsClient {
    http: reqwest::Client,
    base_url: String,
}

impl ElevenLabsClient {
    pub fn new(config: &ElevenLabsConfig) -> Result<Self, VoiceError> {
        if !config.is_configured() {
            return Err(VoiceError::Configuration(
                "ELEVENLABS_API_KEY is not configured".to_string(),
            ));
        }

        let mut headers = HeaderMap::new();
        let mut key = HeaderValue::from_str(config.api_key.trim())
            .map_err(|e| VoiceError::Configuration(format!("invalid API key: {}", e)))?;
        key.set_sensitive(true);
        headers.insert("xi-api-key", key);
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let http = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_secs(config.request_timeout_seconds))
            .build()?;

        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn send(
        &self,
        method: Method,
        path: &str,
        body: Option<&Value>,
    ) -> Result<reqwest::Response, VoiceError> {
        let mut request = self.http.request(method.clone(), self.url(path));
        if let Some(body) = body {
            request = request.json(body);
        }
        debug!(%method, path, "voice API request");
        Ok(request.send().await?)
    }

    /// Sends to `primary`, retrying once against `fallback` with
    /// `fallback_method` when the first attempt answers 404.
    async fn send_with_fallback(
        &self,
        method: Method,
        primary: &str,
        fallback_method: Method,
        fallback: &str,
        body: Option<&Value>,
    ) -> Result<Value, VoiceError> {
        let mut response = self.send(method, primary, body).await?;
        if response.status() == StatusCode::NOT_FOUND {
            debug!(primary, fallback, "voice API endpoint not found, retrying");
            response = self.send(fallback_method, fallback, body).await?;
        }
        Self::read_json(response).await
    }

    async fn read_json(response: reqwest::Response) -> Result<Value, VoiceError> {
        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(VoiceError::Api {
                status: status.as_u16(),
                message,
            });
        }
        response
            .json()
            .await
            .map_err(|e| VoiceError::InvalidResponse(e.to_string()))
    }

    /// Creates a remote agent and returns its identifier.
    pub async fn create_agent(&self, params: &CreateRemoteAgent) -> Result<String, VoiceError> {
        let body = json!({
            "name": params.name,
            "system_prompt": params.system_prompt,
            "voice_id": params.voice_id,
            "language": if params.language.trim().is_empty() { "es" } else { params.language.as_str() },
            "first_message": params.first_message,
        });

        let created = self
            .send_with_fallback(
                Method::POST,
                "/convai/agents",
                Method::POST,
                "/convai/agent",
                Some(&body),
            )
            .await?;

        let agent_id = created
            .get("agent_id")
            .or_else(|| created.get("id"))
            .and_then(Value::as_str)
            .filter(|id| !id.is_empty())
            .ok_or_else(|| {
                VoiceError::InvalidResponse("create response carried no agent id".to_string())
            })?;

        info!(remote_agent_id = agent_id, name = %params.name, "created remote agent");
        Ok(agent_id.to_string())
    }

    /// Fetches a remote agent's full configuration.
    pub async fn get_agent(&self, agent_id: &str) -> Result<Value, VoiceError> {
        self.send_with_fallback(
            Method::GET,
            &format!("/convai/agents/{}", agent_id),
            Method::GET,
            &format!("/agents/{}", agent_id),
            None,
        )
        .await
    }

    /// Applies `update` to a remote agent, merging with its current
    /// configuration when it can be read.
    pub async fn update_agent(
        &self,
        agent_id: &str,
        update: &AgentUpdate,
    ) -> Result<Value, VoiceError> {
        let current = match self.get_agent(agent_id).await {
            Ok(current) => Some(current),
            Err(e) => {
                warn!(remote_agent_id = agent_id, error = %e, "could not read current agent config; sending partial update");
                None
            }
        };

        let body = update.merged_body(current.as_ref());
        let path = format!("/convai/agents/{}", agent_id);
        let updated = self
            .send_with_fallback(Method::PATCH, &path, Method::PUT, &path, Some(&body))
            .await?;

        info!(
            remote_agent_id = agent_id,
            prompt_updated = update.system_prompt.is_some(),
            first_message_updated = update.first_message.is_some(),
            "updated remote agent"
        );
        Ok(updated)
    }

    /// Lists the voices available to the account.
    pub async fn list_voices(&self) -> Result<Value, VoiceError> {
        let response = self.send(Method::GET, "/voices", None).await?;
        Self::read_json(response).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn merge_touches_only_prompt_text_and_first_message() {
        let current = json!({
            "name": "Remote name",
            "conversation_config": {
                "agent": {
                    "language": "es",
                    "first_message": "Hola",
                    "prompt": { "prompt": "old", "llm": "gpt-4o-mini", "temperature": 0.3 }
                },
                "tts": { "voice_id": "v1" }
            }
        });
        let update = AgentUpdate {
            system_prompt: Some("new prompt".to_string()),
            ..AgentUpdate::default()
        };

        let body = update.merged_body(Some(&current));
        assert_eq!(body["name"], "Remote name");
        let agent = &body["conversation_config"]["agent"];
        assert_eq!(agent["prompt"]["prompt"], "new prompt");
        assert_eq!(agent["prompt"]["llm"], "gpt-4o-mini");
        assert_eq!(agent["language"], "es");
        assert_eq!(agent["first_message"], "Hola");
        assert_eq!(body["conversation_config"]["tts"]["voice_id"], "v1");
    }

    #[test]
    fn merge_without_current_config() {
        let update = AgentUpdate {
            first_message: Some("Buenos días".to_string()),
            voice_id: Some("v2".to_string()),
            ..AgentUpdate::default()
        };
        let body = update.merged_body(None);
        assert!(body.get("name").is_none());
        assert_eq!(body["conversation_config"]["agent"]["first_message"], "Buenos días");
        assert!(body["conversation_config"]["agent"].get("prompt").is_none());
        assert_eq!(body["voice_id"], "v2");
    }

    #[test]
    fn name_only_update_leaves_conversation_config_out() {
        let update = AgentUpdate {
            name: Some("Nuevo".to_string()),
            ..AgentUpdate::default()
        };
        let body = update.merged_body(Some(&json!({"name": "Viejo"})));
        assert_eq!(body, json!({"name": "Nuevo"}));
    }

    #[test]
    fn requires_api_key() {
        let err = ElevenLabsClient::new(&ElevenLabsConfig::default()).unwrap_err();
        assert!(matches!(err, VoiceError::Configuration(_)));
    }
}
