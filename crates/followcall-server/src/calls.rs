//! Call record lifecycle: start, progress, recording and completion.

use crate::background::PostProcessing;
use followcall_db::{get_record, put_record, RecordStore, StoreError};
use followcall_types::{Agent, Call};
use followcall_voice::{resolve_dial_target, AgentUpdate, DialTarget, ElevenLabsClient, SessionSnapshot, VoiceError};
use serde::Serialize;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

#[derive(Debug, Error)]
pub enum CallError {
    #[error("agent not found: {0}")]
    AgentNotFound(String),

    #[error("call not found: {0}")]
    CallNotFound(String),

    #[error("call {0} is not active")]
    NotActive(String),

    #[error("cannot dial agent: {0}")]
    Dial(VoiceError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("task join error: {0}")]
    Join(String),
}

async fn blocking<T, F>(f: F) -> Result<T, CallError>
where
    F: FnOnce() -> Result<T, CallError> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| CallError::Join(e.to_string()))?
}

/// A freshly started call and where it is dialled.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StartedCall {
    pub call: Call,
    pub dial_target: DialTarget,
    /// Whether the agent's prompt was pushed to the remote agent.
    pub prompt_synced: bool,
}

/// Starts a call for `agent_id`.
///
/// Resolves the remote agent to dial, pushes the agent's current prompt and
/// first message to it (a failed push is logged and the call goes ahead),
/// then stores an `active` call record.
pub async fn start_call(
    store: Arc<dyn RecordStore>,
    voice: Option<&ElevenLabsClient>,
    dial_override: Option<&str>,
    agent_id: &str,
) -> Result<StartedCall, CallError> {
    let agent = {
        let store = store.clone();
        let id = agent_id.to_string();
        blocking(move || {
            get_record::<Agent>(store.as_ref(), &id)?.ok_or(CallError::AgentNotFound(id))
        })
        .await?
    };

    let dial_target = resolve_dial_target(&agent, dial_override).map_err(CallError::Dial)?;
    let prompt_synced = sync_remote_prompt(voice, &agent, &dial_target).await;

    let call = Call::start(&agent.id);
    let stored = call.clone();
    blocking(move || Ok(put_record(store.as_ref(), &stored)?)).await?;

    info!(
        call_id = %call.id,
        agent_id = %agent.id,
        remote_agent_id = %dial_target.agent_id,
        prompt_synced,
        "call started"
    );
    Ok(StartedCall {
        call,
        dial_target,
        prompt_synced,
    })
}

async fn sync_remote_prompt(
    voice: Option<&ElevenLabsClient>,
    agent: &Agent,
    target: &DialTarget,
) -> bool {
    let Some(client) = voice else {
        debug!(agent_id = %agent.id, "voice platform not configured, skipping prompt sync");
        return false;
    };

    let update = AgentUpdate {
        system_prompt: Some(agent.system_prompt.clone()),
        first_message: agent.first_message.clone(),
        ..AgentUpdate::default()
    };
    match client.update_agent(&target.agent_id, &update).await {
        Ok(_) => true,
        Err(e) => {
            warn!(
                agent_id = %agent.id,
                remote_agent_id = %target.agent_id,
                error = %e,
                "failed to sync prompt to remote agent, continuing with its current prompt"
            );
            false
        }
    }
}

fn load_active(store: &dyn RecordStore, call_id: &str) -> Result<Call, CallError> {
    let call = get_record::<Call>(store, call_id)?
        .ok_or_else(|| CallError::CallNotFound(call_id.to_string()))?;
    if !call.is_active() {
        return Err(CallError::NotActive(call_id.to_string()));
    }
    Ok(call)
}

/// Saves the live transcript and duration of an active call.
pub fn record_progress(
    store: &dyn RecordStore,
    call_id: &str,
    transcript: String,
    duration: u64,
) -> Result<Call, CallError> {
    let mut call = load_active(store, call_id)?;
    call.transcript = transcript;
    call.duration = duration;
    put_record(store, &call)?;
    Ok(call)
}

/// Saves an active call as completed, optionally with the final transcript
/// and duration.
pub fn finish_call(
    store: &dyn RecordStore,
    call_id: &str,
    transcript: Option<String>,
    duration: Option<u64>,
) -> Result<Call, CallError> {
    let mut call = load_active(store, call_id)?;
    if let Some(transcript) = transcript {
        call.transcript = transcript;
    }
    if let Some(duration) = duration {
        call.duration = duration;
    }
    let call = call.complete();
    put_record(store, &call)?;
    Ok(call)
}

/// Completes a call in two steps.
///
/// The completed record is saved before this returns. Transcript
/// post-processing then runs in the background and reports through
/// [`PostProcessing::events`]; its handle is returned so callers may wait
/// for it.
pub async fn complete_call(
    post: &PostProcessing,
    call_id: &str,
    transcript: Option<String>,
    duration: Option<u64>,
) -> Result<(Call, JoinHandle<()>), CallError> {
    let store = post.store.clone();
    let id = call_id.to_string();
    let call = blocking(move || finish_call(store.as_ref(), &id, transcript, duration)).await?;

    info!(call_id = %call.id, duration = call.duration, "call completed");
    let handle = post.spawn(call.clone());
    Ok((call, handle))
}

/// Persists a live session's transcript and duration onto a call record.
///
/// The recorder follows a coordinator's snapshot stream and writes whenever
/// the session is connecting or connected and either value changed. It
/// stops on its own once the call is no longer active, the record is gone,
/// or the coordinator is dropped.
pub struct CallRecorder {
    handle: JoinHandle<()>,
}

impl CallRecorder {
    pub fn start(
        store: Arc<dyn RecordStore>,
        call_id: impl Into<String>,
        snapshots: watch::Receiver<SessionSnapshot>,
    ) -> Self {
        let handle = tokio::spawn(record_loop(store, call_id.into(), snapshots));
        Self { handle }
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Stops recording. Writes already in flight still land.
    pub fn stop(self) {
        self.handle.abort();
    }

    /// Waits for the recorder to stop on its own.
    pub async fn finished(self) {
        let _ = self.handle.await;
    }
}

async fn record_loop(
    store: Arc<dyn RecordStore>,
    call_id: String,
    mut snapshots: watch::Receiver<SessionSnapshot>,
) {
    let mut last = (String::new(), 0u64);

    loop {
        let (transcript, duration, live) = {
            let snapshot = snapshots.borrow_and_update();
            (
                snapshot.transcript.clone(),
                snapshot.duration_secs,
                snapshot.is_connected || snapshot.is_connecting,
            )
        };

        if live && (transcript != last.0 || duration != last.1) {
            let store = store.clone();
            let id = call_id.clone();
            let text = transcript.clone();
            match blocking(move || record_progress(store.as_ref(), &id, text, duration)).await {
                Ok(_) => last = (transcript, duration),
                Err(CallError::NotActive(_)) | Err(CallError::CallNotFound(_)) => {
                    debug!(call_id = %call_id, "call no longer active, recorder stopping");
                    return;
                }
                Err(e) => warn!(call_id = %call_id, error = %e, "failed to record call progress"),
            }
        }

        if snapshots.changed().await.is_err() {
            debug!(call_id = %call_id, "session gone, recorder stopping");
            return;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use followcall_db::MemoryRecordStore;
    use followcall_types::{CallStatus, NewAgent};
    use followcall_voice::SessionPhase;
    use tokio::sync::broadcast;

    fn snapshot(phase: SessionPhase, transcript: &str, duration_secs: u64) -> SessionSnapshot {
        SessionSnapshot {
            phase,
            is_connected: phase == SessionPhase::Connected,
            is_connecting: phase == SessionPhase::Connecting,
            is_recording: phase == SessionPhase::Connected,
            transcript: transcript.to_string(),
            duration_secs,
            error: None,
            mic_muted: false,
            credentials_ready: true,
            audio_level: 0.0,
        }
    }

    fn seeded(remote: Option<&str>) -> (Arc<dyn RecordStore>, Agent) {
        let store: Arc<dyn RecordStore> = Arc::new(MemoryRecordStore::new());
        let agent = NewAgent {
            name: "Seguimiento".to_string(),
            objective: "Post-operatorio".to_string(),
            system_prompt: "Eres un asistente.".to_string(),
            first_message: None,
            voice_id: "v1".to_string(),
            language: "es".to_string(),
            data_schema: Default::default(),
        }
        .into_agent(remote.map(str::to_string));
        put_record(store.as_ref(), &agent).unwrap();
        (store, agent)
    }

    async fn yield_a_bit() {
        for _ in 0..20 {
            tokio::task::yield_now().await;
            tokio::time::sleep(std::time::Duration::from_millis(1)).await;
        }
    }

    #[tokio::test]
    async fn start_without_voice_client_skips_prompt_sync() {
        let (store, agent) = seeded(Some("agent_remote"));
        let started = start_call(store.clone(), None, None, &agent.id).await.unwrap();

        assert!(!started.prompt_synced);
        assert_eq!(started.dial_target.agent_id, "agent_remote");
        assert_eq!(started.call.status, CallStatus::Active);
        let stored: Call = get_record(store.as_ref(), &started.call.id).unwrap().unwrap();
        assert_eq!(stored, started.call);
    }

    #[tokio::test]
    async fn start_requires_a_dial_target() {
        let (store, agent) = seeded(None);
        let err = start_call(store.clone(), None, None, &agent.id).await.unwrap_err();
        assert!(matches!(err, CallError::Dial(VoiceError::Configuration(_))));

        let overridden = start_call(store, None, Some("agent_fixed"), &agent.id).await.unwrap();
        assert_eq!(overridden.dial_target.agent_id, "agent_fixed");
    }

    #[tokio::test]
    async fn start_unknown_agent() {
        let (store, _) = seeded(None);
        let err = start_call(store, None, None, "nope").await.unwrap_err();
        assert!(matches!(err, CallError::AgentNotFound(id) if id == "nope"));
    }

    #[test]
    fn progress_only_on_active_calls() {
        let (store, agent) = seeded(None);
        let call = Call::start(&agent.id);
        put_record(store.as_ref(), &call).unwrap();

        let updated = record_progress(store.as_ref(), &call.id, "Agente: Hola".into(), 4).unwrap();
        assert_eq!(updated.duration, 4);

        finish_call(store.as_ref(), &call.id, None, None).unwrap();
        let err = record_progress(store.as_ref(), &call.id, "tarde".into(), 5).unwrap_err();
        assert!(matches!(err, CallError::NotActive(_)));
        assert!(matches!(
            record_progress(store.as_ref(), "missing", String::new(), 0),
            Err(CallError::CallNotFound(_))
        ));
    }

    #[test]
    fn finish_keeps_transcript_when_none_given() {
        let (store, agent) = seeded(None);
        let mut call = Call::start(&agent.id);
        call.transcript = "Agente: Hola".to_string();
        put_record(store.as_ref(), &call).unwrap();

        let done = finish_call(store.as_ref(), &call.id, None, Some(12)).unwrap();
        assert_eq!(done.status, CallStatus::Completed);
        assert_eq!(done.transcript, "Agente: Hola");
        assert_eq!(done.duration, 12);
        assert!(done.ended_at.is_some());
    }

    #[tokio::test]
    async fn completing_with_empty_transcript_skips_post_processing() {
        let (store, agent) = seeded(None);
        let call = Call::start(&agent.id);
        put_record(store.as_ref(), &call).unwrap();

        let (events, mut rx) = broadcast::channel(4);
        let post = PostProcessing {
            store: store.clone(),
            processor: None,
            events,
        };

        let (done, handle) = complete_call(&post, &call.id, None, None).await.unwrap();
        assert_eq!(done.status, CallStatus::Completed);
        handle.await.unwrap();

        match rx.recv().await.unwrap() {
            crate::background::PostProcessEvent::Skipped { call_id, .. } => assert_eq!(call_id, call.id),
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[tokio::test]
    async fn recorder_persists_live_snapshots_only() {
        let (store, agent) = seeded(None);
        let call = Call::start(&agent.id);
        put_record(store.as_ref(), &call).unwrap();

        let (tx, rx) = watch::channel(snapshot(SessionPhase::Idle, "", 0));
        let recorder = CallRecorder::start(store.clone(), call.id.clone(), rx);

        tx.send_replace(snapshot(SessionPhase::Connected, "Agente: Hola", 3));
        yield_a_bit().await;
        let stored: Call = get_record(store.as_ref(), &call.id).unwrap().unwrap();
        assert_eq!(stored.transcript, "Agente: Hola");
        assert_eq!(stored.duration, 3);

        // Teardown clears the snapshot; the record keeps the last live values.
        tx.send_replace(snapshot(SessionPhase::TearingDown, "", 0));
        yield_a_bit().await;
        let stored: Call = get_record(store.as_ref(), &call.id).unwrap().unwrap();
        assert_eq!(stored.transcript, "Agente: Hola");

        assert!(!recorder.is_finished());
        drop(tx);
        recorder.finished().await;
    }

    #[tokio::test]
    async fn recorder_stops_once_call_completes() {
        let (store, agent) = seeded(None);
        let call = Call::start(&agent.id);
        put_record(store.as_ref(), &call).unwrap();

        let (tx, rx) = watch::channel(snapshot(SessionPhase::Connected, "", 0));
        let recorder = CallRecorder::start(store.clone(), call.id.clone(), rx);

        finish_call(store.as_ref(), &call.id, Some("Agente: Adiós".into()), Some(9)).unwrap();
        tx.send_replace(snapshot(SessionPhase::Connected, "Agente: Adiós", 10));
        recorder.finished().await;

        let stored: Call = get_record(store.as_ref(), &call.id).unwrap().unwrap();
        assert_eq!(stored.status, CallStatus::Completed);
        assert_eq!(stored.duration, 9);
    }
}
