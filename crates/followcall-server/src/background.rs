//! Background tasks for the followcall server.
//!
//! Includes:
//! - Post-processing a completed call's transcript into structured data.

use followcall_ai::TranscriptPostProcessor;
use followcall_db::{get_record, put_record, RecordStore};
use followcall_types::{Agent, Call};
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

/// Outcome of the second step of call completion.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum PostProcessEvent {
    /// Structured data was attached to the call.
    #[serde(rename_all = "camelCase")]
    Attached { call_id: String },
    /// Post-processing ran and failed. The call stays completed without
    /// structured data.
    #[serde(rename_all = "camelCase")]
    Failed { call_id: String, error: String },
    /// Post-processing was not attempted.
    #[serde(rename_all = "camelCase")]
    Skipped { call_id: String, reason: String },
}

impl PostProcessEvent {
    pub fn call_id(&self) -> &str {
        match self {
            Self::Attached { call_id } | Self::Failed { call_id, .. } | Self::Skipped { call_id, .. } => {
                call_id
            }
        }
    }
}

/// Everything the post-processing task needs, detached from request state.
#[derive(Clone)]
pub struct PostProcessing {
    pub store: Arc<dyn RecordStore>,
    pub processor: Option<Arc<dyn TranscriptPostProcessor>>,
    pub events: broadcast::Sender<PostProcessEvent>,
}

impl PostProcessing {
    /// Starts post-processing for a call that has already been saved as
    /// completed. The outcome is broadcast on `events`.
    pub fn spawn(&self, call: Call) -> JoinHandle<()> {
        let this = self.clone();
        tokio::spawn(async move {
            let event = this.run(call).await;
            match &event {
                PostProcessEvent::Attached { call_id } => {
                    tracing::info!(call_id = %call_id, "structured data attached to call");
                }
                PostProcessEvent::Failed { call_id, error } => {
                    tracing::error!(call_id = %call_id, "post-processing failed: {}", error);
                }
                PostProcessEvent::Skipped { call_id, reason } => {
                    tracing::debug!(call_id = %call_id, reason = %reason, "post-processing skipped");
                }
            }
            // No subscribers is fine.
            let _ = this.events.send(event);
        })
    }

    async fn run(&self, call: Call) -> PostProcessEvent {
        let call_id = call.id.clone();

        if call.transcript.trim().is_empty() {
            return PostProcessEvent::Skipped {
                call_id,
                reason: "empty transcript".to_string(),
            };
        }
        let Some(processor) = self.processor.clone() else {
            return PostProcessEvent::Skipped {
                call_id,
                reason: "no transcript post-processor configured".to_string(),
            };
        };

        let store = self.store.clone();
        let agent_id = call.agent_id.clone();
        let agent = match tokio::task::spawn_blocking(move || get_record::<Agent>(store.as_ref(), &agent_id)).await {
            Ok(Ok(Some(agent))) => agent,
            Ok(Ok(None)) => {
                return PostProcessEvent::Failed {
                    call_id,
                    error: format!("agent {} no longer exists", call.agent_id),
                }
            }
            Ok(Err(e)) => return PostProcessEvent::Failed { call_id, error: e.to_string() },
            Err(e) => {
                return PostProcessEvent::Failed {
                    call_id,
                    error: format!("task join error: {}", e),
                }
            }
        };

        let data = match processor
            .process(&call.transcript, &agent.data_schema, &agent.system_prompt)
            .await
        {
            Ok(data) => data,
            Err(e) => return PostProcessEvent::Failed { call_id, error: e.to_string() },
        };

        // Re-read so a concurrent write to the record is not clobbered.
        let store = self.store.clone();
        let id = call_id.clone();
        let saved = tokio::task::spawn_blocking(move || {
            let mut current = get_record::<Call>(store.as_ref(), &id)?.unwrap_or(call);
            current.structured_data = Some(data);
            put_record(store.as_ref(), &current)
        })
        .await;

        match saved {
            Ok(Ok(())) => PostProcessEvent::Attached { call_id },
            Ok(Err(e)) => PostProcessEvent::Failed { call_id, error: e.to_string() },
            Err(e) => PostProcessEvent::Failed {
                call_id,
                error: format!("task join error: {}", e),
            },
        }
    }
}
