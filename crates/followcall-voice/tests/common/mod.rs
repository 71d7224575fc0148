#![allow(dead_code)]

use async_trait::async_trait;
use followcall_voice::{
    AudioConstraints, AudioLevelMeter, CallSessionCoordinator, CoordinatorSettings, Credentials,
    MediaDevices, MediaTrack, MicrophoneStream, RemoteSession, RemoteStatus, SessionEvent,
    SessionHandle, StaticCredentials, TurnRole, VoiceError, VoiceSessionClient,
};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;

#[derive(Default)]
struct ClientState {
    opens: usize,
    opened_with: Vec<String>,
    closes: Vec<String>,
    status: Option<RemoteStatus>,
    events: Option<mpsc::UnboundedSender<SessionEvent>>,
    mute_calls: Vec<bool>,
}

/// Scripted remote session. Tests drive it with `emit` (event stream) and
/// `set_polled_status` (what the status property reports).
#[derive(Default)]
pub struct FakeVoiceClient {
    state: Mutex<ClientState>,
    open_delay: Option<Duration>,
    fail_open: Option<String>,
    fail_close: bool,
    close_delay: Option<Duration>,
}

impl FakeVoiceClient {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn with_open_delay(delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            open_delay: Some(delay),
            ..Self::default()
        })
    }

    pub fn failing_open(message: &str) -> Arc<Self> {
        Arc::new(Self {
            fail_open: Some(message.to_string()),
            ..Self::default()
        })
    }

    pub fn failing_close() -> Arc<Self> {
        Arc::new(Self {
            fail_close: true,
            ..Self::default()
        })
    }

    pub fn with_close_delay(delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            close_delay: Some(delay),
            ..Self::default()
        })
    }

    pub fn emit(&self, event: SessionEvent) {
        let mut state = self.state.lock().unwrap();
        if let SessionEvent::Status(status) = &event {
            state.status = Some(*status);
        }
        if let Some(tx) = &state.events {
            let _ = tx.send(event);
        }
    }

    pub fn turn(&self, role: TurnRole, text: &str) {
        self.emit(SessionEvent::Turn {
            role,
            text: text.to_string(),
        });
    }

    pub fn set_polled_status(&self, status: RemoteStatus) {
        self.state.lock().unwrap().status = Some(status);
    }

    /// Ends the event stream without a status event.
    pub fn drop_events(&self) {
        self.state.lock().unwrap().events = None;
    }

    pub fn opens(&self) -> usize {
        self.state.lock().unwrap().opens
    }

    pub fn opened_with(&self) -> Vec<String> {
        self.state.lock().unwrap().opened_with.clone()
    }

    pub fn closes(&self) -> Vec<String> {
        self.state.lock().unwrap().closes.clone()
    }

    pub fn mute_calls(&self) -> Vec<bool> {
        self.state.lock().unwrap().mute_calls.clone()
    }
}

#[async_trait]
impl VoiceSessionClient for FakeVoiceClient {
    async fn open_session(
        &self,
        remote_agent_id: &str,
        _credentials: &Credentials,
    ) -> Result<RemoteSession, VoiceError> {
        let n = {
            let mut state = self.state.lock().unwrap();
            state.opens += 1;
            state.opened_with.push(remote_agent_id.to_string());
            state.opens
        };
        if let Some(delay) = self.open_delay {
            tokio::time::sleep(delay).await;
        }
        if let Some(message) = &self.fail_open {
            return Err(VoiceError::RemoteSession(message.clone()));
        }

        let (tx, rx) = mpsc::unbounded_channel();
        let mut state = self.state.lock().unwrap();
        state.events = Some(tx);
        state.status = Some(RemoteStatus::Connecting);
        Ok(RemoteSession {
            handle: SessionHandle::new(format!("conv-{}", n)),
            events: rx,
        })
    }

    async fn close_session(&self, handle: &SessionHandle) -> Result<(), VoiceError> {
        {
            let mut state = self.state.lock().unwrap();
            state.closes.push(handle.to_string());
            state.status = Some(RemoteStatus::Disconnected);
            state.events = None;
        }
        if let Some(delay) = self.close_delay {
            tokio::time::sleep(delay).await;
        }
        if self.fail_close {
            return Err(VoiceError::RemoteSession("socket already gone".to_string()));
        }
        Ok(())
    }

    fn status(&self, _handle: &SessionHandle) -> RemoteStatus {
        self.state
            .lock()
            .unwrap()
            .status
            .unwrap_or(RemoteStatus::Disconnected)
    }

    fn set_muted(&self, _handle: &SessionHandle, muted: bool) {
        self.state.lock().unwrap().mute_calls.push(muted);
    }
}

pub struct FixedMeter(pub f32);

impl AudioLevelMeter for FixedMeter {
    fn level(&self) -> f32 {
        self.0
    }
}

/// Microphone that grants single-track streams, optionally after a delay
/// standing in for the permission prompt.
#[derive(Default)]
pub struct FakeMedia {
    streams: Mutex<Vec<MicrophoneStream>>,
    acquisitions: Mutex<usize>,
    release_all_calls: Mutex<usize>,
    acquire_delay: Option<Duration>,
    deny: bool,
}

impl FakeMedia {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn with_prompt_delay(delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            acquire_delay: Some(delay),
            ..Self::default()
        })
    }

    pub fn denying() -> Arc<Self> {
        Arc::new(Self {
            deny: true,
            ..Self::default()
        })
    }

    pub fn acquisitions(&self) -> usize {
        *self.acquisitions.lock().unwrap()
    }

    pub fn release_all_calls(&self) -> usize {
        *self.release_all_calls.lock().unwrap()
    }

    pub fn live_tracks(&self) -> usize {
        self.streams
            .lock()
            .unwrap()
            .iter()
            .flat_map(|s| s.tracks().iter())
            .filter(|t| t.is_live())
            .count()
    }

    /// Acquires a stream the coordinator never sees, as a stray capture
    /// left behind by an earlier session would be.
    pub async fn acquire_orphan(&self) -> MicrophoneStream {
        self.acquire_microphone(&AudioConstraints::default())
            .await
            .unwrap()
    }

    pub fn granted(&self) -> usize {
        self.streams.lock().unwrap().len()
    }
}

#[async_trait]
impl MediaDevices for FakeMedia {
    async fn acquire_microphone(
        &self,
        _constraints: &AudioConstraints,
    ) -> Result<MicrophoneStream, VoiceError> {
        let n = {
            let mut count = self.acquisitions.lock().unwrap();
            *count += 1;
            *count
        };
        if let Some(delay) = self.acquire_delay {
            tokio::time::sleep(delay).await;
        }
        if self.deny {
            return Err(VoiceError::PermissionDenied("user dismissed the prompt".to_string()));
        }
        let stream = MicrophoneStream::new(
            format!("mic-{}", n),
            vec![MediaTrack::new("audio", "Built-in Microphone")],
        );
        self.streams.lock().unwrap().push(stream.clone());
        Ok(stream)
    }

    fn level_meter(
        &self,
        _stream: &MicrophoneStream,
    ) -> Result<Arc<dyn AudioLevelMeter>, VoiceError> {
        Ok(Arc::new(FixedMeter(0.42)))
    }

    fn release_all(&self) -> usize {
        *self.release_all_calls.lock().unwrap() += 1;
        self.streams
            .lock()
            .unwrap()
            .iter()
            .map(MicrophoneStream::stop)
            .sum()
    }
}

pub fn settings() -> CoordinatorSettings {
    CoordinatorSettings::default()
}

pub fn coordinator(
    remote_agent_id: Option<&str>,
    client: &Arc<FakeVoiceClient>,
    media: &Arc<FakeMedia>,
) -> CallSessionCoordinator {
    CallSessionCoordinator::new(
        remote_agent_id.map(str::to_string),
        client.clone(),
        media.clone(),
        Arc::new(StaticCredentials::new("xi-test-key")),
        settings(),
    )
}

/// Lets spawned workers drain pending events. Time is paused in these
/// tests, so this advances the clock only by a millisecond.
pub async fn settle() {
    tokio::time::sleep(Duration::from_millis(1)).await;
}
