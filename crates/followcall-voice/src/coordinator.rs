//! Lifecycle of one real-time voice call.
//!
//! [`CallSessionCoordinator`] is a cheap-to-clone handle around shared state.
//! All state lives behind one mutex that is only ever held for synchronous
//! bookkeeping, never across an `.await`. Background workers (event pump,
//! status poller, level sampler, duration ticker) hold a `Weak` reference and
//! an *epoch*: every teardown bumps the epoch, so a worker or an in-flight
//! `connect` that wakes up under a stale epoch backs out instead of
//! resurrecting the call.
//!
//! ```text
//!   Idle ──connect()──▶ Connecting ──status=connected──▶ Connected
//!    ▲                     │  │                              │
//!    │        failure ─────┘  └──disconnect()─┐  disconnect()│
//!    │                                         ▼              ▼
//!    └──────────── close settled ─────────── TearingDown ◀───┘
//! ```

use crate::config::CoordinatorSettings;
use crate::credentials::{CredentialProvider, Credentials};
use crate::error::VoiceError;
use crate::media::{AudioLevelMeter, MediaDevices, MicrophoneStream};
use crate::session::{RemoteSession, RemoteStatus, SessionEvent, SessionHandle, VoiceSessionClient};
use crate::transcript::{Transcript, TranscriptMessage};
use serde::Serialize;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

/// Authoritative connection state of the coordinator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionPhase {
    Idle,
    Connecting,
    Connected,
    TearingDown,
}

/// Read-only view of the coordinator, published on every state change.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSnapshot {
    pub phase: SessionPhase,
    pub is_connected: bool,
    pub is_connecting: bool,
    /// Connected and not muted.
    pub is_recording: bool,
    pub transcript: String,
    /// Whole seconds spent in `Connected`.
    pub duration_secs: u64,
    pub error: Option<String>,
    pub mic_muted: bool,
    pub credentials_ready: bool,
    /// Input amplitude for metering, 0 when unavailable.
    pub audio_level: f32,
}

/// What a `connect` request did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectOutcome {
    /// A new session was opened; watch the snapshot for `Connected`.
    Started,
    /// A session is already connecting or connected.
    AlreadyActive,
    /// A teardown is in progress.
    TeardownPending,
    /// The coordinator has been disposed.
    Disposed,
    /// A teardown arrived while the request was in flight; everything it
    /// acquired has been released.
    Aborted,
    /// `auto_connect` already ran for this coordinator.
    AlreadyAttempted,
}

struct Inner {
    phase: SessionPhase,
    /// Bumped by every teardown. Async work tagged with an older epoch is
    /// stale.
    epoch: u64,
    /// Teardowns that have started but not yet settled.
    pending_teardowns: u32,
    disposed: bool,
    auto_connect_attempted: bool,
    credentials: Option<Credentials>,
    transcript: Transcript,
    duration_secs: u64,
    connected_at: Option<Instant>,
    error: Option<String>,
    muted: bool,
    audio_level: f32,
    microphone: Option<MicrophoneStream>,
    session: Option<SessionHandle>,
    ticker: Option<JoinHandle<()>>,
    workers: Vec<JoinHandle<()>>,
}

impl Inner {
    fn new() -> Self {
        Self {
            phase: SessionPhase::Idle,
            epoch: 0,
            pending_teardowns: 0,
            disposed: false,
            auto_connect_attempted: false,
            credentials: None,
            transcript: Transcript::new(),
            duration_secs: 0,
            connected_at: None,
            error: None,
            muted: false,
            audio_level: 0.0,
            microphone: None,
            session: None,
            ticker: None,
            workers: Vec::new(),
        }
    }

    fn teardown_requested(&self) -> bool {
        self.pending_teardowns > 0
    }

    fn is_current(&self, epoch: u64) -> bool {
        self.epoch == epoch && !self.teardown_requested() && !self.disposed
    }

    fn stop_ticker(&mut self) {
        if let Some(ticker) = self.ticker.take() {
            ticker.abort();
        }
        self.connected_at = None;
    }

    fn abort_workers(&mut self) {
        for worker in self.workers.drain(..) {
            worker.abort();
        }
    }

    fn snapshot(&self) -> SessionSnapshot {
        let connected = self.phase == SessionPhase::Connected;
        SessionSnapshot {
            phase: self.phase,
            is_connected: connected,
            is_connecting: self.phase == SessionPhase::Connecting,
            is_recording: connected && !self.muted,
            transcript: self.transcript.text().to_string(),
            duration_secs: self.duration_secs,
            error: self.error.clone(),
            mic_muted: self.muted,
            credentials_ready: self.credentials.is_some(),
            audio_level: self.audio_level,
        }
    }
}

struct Shared {
    remote_agent_id: Option<String>,
    settings: CoordinatorSettings,
    client: Arc<dyn VoiceSessionClient>,
    media: Arc<dyn MediaDevices>,
    credential_provider: Arc<dyn CredentialProvider>,
    inner: Mutex<Inner>,
    snapshot_tx: watch::Sender<SessionSnapshot>,
}

/// Coordinates a single voice call.
///
/// Construct one per call and [`dispose`](Self::dispose) it when the call's
/// owner goes away. Clones share the same call.
#[derive(Clone)]
pub struct CallSessionCoordinator {
    shared: Arc<Shared>,
}

impl CallSessionCoordinator {
    /// Creates an idle coordinator for `remote_agent_id`. A missing id is
    /// accepted here and reported by `connect`.
    pub fn new(
        remote_agent_id: Option<String>,
        client: Arc<dyn VoiceSessionClient>,
        media: Arc<dyn MediaDevices>,
        credential_provider: Arc<dyn CredentialProvider>,
        settings: CoordinatorSettings,
    ) -> Self {
        let inner = Inner::new();
        let (snapshot_tx, _) = watch::channel(inner.snapshot());
        Self {
            shared: Arc::new(Shared {
                remote_agent_id: remote_agent_id.filter(|id| !id.trim().is_empty()),
                settings,
                client,
                media,
                credential_provider,
                inner: Mutex::new(inner),
                snapshot_tx,
            }),
        }
    }

    pub fn remote_agent_id(&self) -> Option<&str> {
        self.shared.remote_agent_id.as_deref()
    }

    /// The latest published state.
    pub fn snapshot(&self) -> SessionSnapshot {
        self.shared.snapshot_tx.borrow().clone()
    }

    /// Subscribes to state changes. Snapshots are published in the order
    /// the underlying events were applied.
    pub fn subscribe(&self) -> watch::Receiver<SessionSnapshot> {
        self.shared.snapshot_tx.subscribe()
    }

    /// The individual turns behind the current transcript.
    pub fn messages(&self) -> Vec<TranscriptMessage> {
        self.shared.lock().transcript.messages().to_vec()
    }

    /// Fetches session credentials once. Failures are also recorded in the
    /// snapshot's error field.
    pub async fn load_credentials(&self) -> Result<(), VoiceError> {
        if self.shared.lock().credentials.is_some() {
            return Ok(());
        }

        match self.shared.credential_provider.fetch().await {
            Ok(credentials) => {
                let mut inner = self.shared.lock();
                inner.credentials = Some(credentials);
                self.shared.publish(&inner);
                info!("voice credentials loaded");
                Ok(())
            }
            Err(e) => {
                let mut inner = self.shared.lock();
                inner.error = Some(format!("failed to load voice credentials: {}", e));
                self.shared.publish(&inner);
                warn!(error = %e, "failed to load voice credentials");
                Err(e)
            }
        }
    }

    /// Requests a session. Idempotent: while a session is connecting or
    /// connected, or a teardown is pending, this does nothing.
    ///
    /// Precondition failures and acquisition failures are returned *and*
    /// recorded in the snapshot's error field; the phase is left at `Idle`.
    pub async fn connect(&self) -> Result<ConnectOutcome, VoiceError> {
        let shared = &self.shared;

        let (epoch, remote_agent_id, credentials) = {
            let mut inner = shared.lock();
            if inner.disposed {
                debug!("connect ignored: coordinator disposed");
                return Ok(ConnectOutcome::Disposed);
            }

            let Some(remote_agent_id) = shared.remote_agent_id.clone() else {
                let err = VoiceError::Configuration(
                    "no remote agent identifier was provided".to_string(),
                );
                inner.error = Some(err.to_string());
                shared.publish(&inner);
                return Err(err);
            };

            let Some(credentials) = inner.credentials.clone() else {
                let err = VoiceError::NotReady("waiting for voice credentials".to_string());
                inner.error = Some(err.to_string());
                shared.publish(&inner);
                return Err(err);
            };

            match inner.phase {
                SessionPhase::Connecting | SessionPhase::Connected => {
                    debug!(phase = ?inner.phase, "connect ignored: session already active");
                    return Ok(ConnectOutcome::AlreadyActive);
                }
                SessionPhase::TearingDown => return Ok(ConnectOutcome::TeardownPending),
                SessionPhase::Idle => {}
            }
            if inner.teardown_requested() {
                return Ok(ConnectOutcome::TeardownPending);
            }

            inner.phase = SessionPhase::Connecting;
            inner.transcript.clear();
            inner.duration_secs = 0;
            inner.error = None;
            shared.publish(&inner);
            (inner.epoch, remote_agent_id, credentials)
        };

        info!(remote_agent_id = %remote_agent_id, "connecting call session");

        let microphone = match shared.media.acquire_microphone(&shared.settings.audio).await {
            Ok(stream) => stream,
            Err(e) => return Err(shared.fail_connect(epoch, e)),
        };

        let keep = {
            let mut inner = shared.lock();
            let current = inner.is_current(epoch);
            if current {
                inner.microphone = Some(microphone.clone());
            }
            current
        };
        if !keep {
            let stopped = microphone.stop();
            info!(stopped, "teardown requested during microphone prompt; released tracks");
            return Ok(ConnectOutcome::Aborted);
        }
        shared.start_level_meter(epoch, &microphone);

        let RemoteSession { handle, events } =
            match shared.client.open_session(&remote_agent_id, &credentials).await {
                Ok(session) => session,
                Err(e) => {
                    let err = match e {
                        VoiceError::RemoteSession(_) => e,
                        other => VoiceError::RemoteSession(other.to_string()),
                    };
                    return Err(shared.fail_connect(epoch, err));
                }
            };

        let keep = {
            let mut inner = shared.lock();
            let current = inner.is_current(epoch);
            if current {
                inner.session = Some(handle.clone());
                inner.transcript.clear();
                if inner.muted {
                    shared.client.set_muted(&handle, true);
                }
                let pump = tokio::spawn(event_pump(Arc::downgrade(shared), epoch, events));
                let poller = tokio::spawn(status_poller(
                    Arc::downgrade(shared),
                    epoch,
                    handle.clone(),
                    shared.settings.status_poll_interval,
                ));
                inner.workers.push(pump);
                inner.workers.push(poller);
                shared.publish(&inner);
            }
            current
        };
        if !keep {
            microphone.stop();
            if let Err(e) = shared.client.close_session(&handle).await {
                warn!(session = %handle, error = %e, "failed to close session opened during teardown");
            }
            info!(session = %handle, "teardown requested while opening session; closed it");
            return Ok(ConnectOutcome::Aborted);
        }

        info!(session = %handle, "remote session opened");
        Ok(ConnectOutcome::Started)
    }

    /// Ends the call. Safe to call at any time and any number of times.
    ///
    /// The snapshot flips to not-connected with zero duration before anything
    /// is awaited. Local capture tracks are released before the remote close
    /// is attempted, and a failed close is logged, never returned. Resolves
    /// once the close attempt has settled.
    pub async fn disconnect(&self) {
        let shared = &self.shared;

        let (microphone, session, previous) = {
            let mut inner = shared.lock();
            inner.pending_teardowns += 1;
            inner.epoch += 1;
            inner.auto_connect_attempted = false;
            let previous = inner.phase;
            inner.phase = SessionPhase::TearingDown;
            inner.stop_ticker();
            inner.abort_workers();
            inner.transcript.clear();
            inner.duration_secs = 0;
            inner.audio_level = 0.0;
            inner.error = None;
            shared.publish(&inner);
            (inner.microphone.take(), inner.session.take(), previous)
        };

        if previous != SessionPhase::Idle {
            info!(previous = ?previous, "disconnecting call session");
        }

        let mut stopped = microphone.map(|m| m.stop()).unwrap_or(0);
        // Also sweep tracks a previous failed teardown may have orphaned.
        stopped += shared.media.release_all();
        if stopped > 0 {
            debug!(stopped, "released capture tracks");
        }

        if let Some(handle) = session {
            match shared.client.close_session(&handle).await {
                Ok(()) => info!(session = %handle, "remote session closed"),
                Err(e) => warn!(session = %handle, error = %e, "failed to close remote session"),
            }
        }

        let mut inner = shared.lock();
        inner.pending_teardowns = inner.pending_teardowns.saturating_sub(1);
        if inner.pending_teardowns == 0 {
            inner.phase = SessionPhase::Idle;
            shared.publish(&inner);
        }
    }

    /// Final teardown. After this no connection, automatic or explicit, is
    /// ever made again by this coordinator.
    pub async fn dispose(&self) {
        {
            let mut inner = self.shared.lock();
            inner.disposed = true;
        }
        self.disconnect().await;
    }

    pub fn is_disposed(&self) -> bool {
        self.shared.lock().disposed
    }

    /// Toggles transmission of captured audio without ending the session.
    pub fn set_muted(&self, muted: bool) {
        let handle = {
            let mut inner = self.shared.lock();
            if inner.muted == muted {
                return;
            }
            inner.muted = muted;
            self.shared.publish(&inner);
            inner.session.clone()
        };
        if let Some(handle) = handle {
            self.shared.client.set_muted(&handle, muted);
        }
    }

    /// Loads credentials, waits the configured settle delay and connects.
    ///
    /// Runs at most once per coordinator until the next `disconnect`; gives
    /// up if a teardown or disposal happens during the delay.
    pub async fn auto_connect(&self) -> Result<ConnectOutcome, VoiceError> {
        {
            let mut inner = self.shared.lock();
            if inner.disposed {
                return Ok(ConnectOutcome::Disposed);
            }
            if inner.auto_connect_attempted {
                return Ok(ConnectOutcome::AlreadyAttempted);
            }
            inner.auto_connect_attempted = true;
        }

        if let Err(e) = self.load_credentials().await {
            self.shared.lock().auto_connect_attempted = false;
            return Err(e);
        }

        let epoch = self.shared.lock().epoch;
        tokio::time::sleep(self.shared.settings.auto_connect_delay).await;

        let still_wanted = {
            let inner = self.shared.lock();
            inner.is_current(epoch)
        };
        if !still_wanted {
            debug!("auto-connect abandoned: teardown requested during settle delay");
            return Ok(ConnectOutcome::Aborted);
        }
        self.connect().await
    }
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn publish(&self, inner: &Inner) {
        self.snapshot_tx.send_replace(inner.snapshot());
    }

    fn is_current(&self, epoch: u64) -> bool {
        self.lock().is_current(epoch)
    }

    /// Rolls a failed `connect` back to `Idle`, unless a teardown already
    /// took ownership of the cleanup.
    fn fail_connect(&self, epoch: u64, err: VoiceError) -> VoiceError {
        let microphone = {
            let mut inner = self.lock();
            if inner.is_current(epoch) && inner.phase == SessionPhase::Connecting {
                inner.phase = SessionPhase::Idle;
                inner.error = Some(err.to_string());
                inner.abort_workers();
                inner.audio_level = 0.0;
                self.publish(&inner);
                inner.microphone.take()
            } else {
                None
            }
        };
        if let Some(microphone) = microphone {
            microphone.stop();
        }
        warn!(error = %err, "call session connect failed");
        err
    }

    fn start_level_meter(self: &Arc<Self>, epoch: u64, microphone: &MicrophoneStream) {
        let meter = match self.media.level_meter(microphone) {
            Ok(meter) => meter,
            Err(e) => {
                debug!(error = %e, "audio level metering unavailable");
                return;
            }
        };

        let sampler = tokio::spawn(level_sampler(
            Arc::downgrade(self),
            epoch,
            meter,
            self.settings.level_sample_interval,
        ));

        let mut inner = self.lock();
        if inner.is_current(epoch) {
            inner.workers.push(sampler);
        } else {
            sampler.abort();
        }
    }

    fn start_ticker(self: &Arc<Self>, inner: &mut Inner, epoch: u64) {
        if inner.ticker.is_some() {
            return;
        }
        let started = Instant::now();
        let period = self.settings.duration_tick_interval;
        inner.connected_at = Some(started);
        inner.duration_secs = 0;

        let weak = Arc::downgrade(self);
        inner.ticker = Some(tokio::spawn(async move {
            let mut ticker = tokio::time::interval_at(started + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                let Some(shared) = weak.upgrade() else {
                    return;
                };
                if !shared.tick_duration(epoch) {
                    return;
                }
            }
        }));
    }

    fn tick_duration(&self, epoch: u64) -> bool {
        let mut inner = self.lock();
        if !inner.is_current(epoch) || inner.phase != SessionPhase::Connected {
            return false;
        }
        if let Some(connected_at) = inner.connected_at {
            let elapsed = connected_at.elapsed().as_secs();
            if elapsed > inner.duration_secs {
                inner.duration_secs = elapsed;
                self.publish(&inner);
            }
        }
        true
    }

    fn record_level(&self, epoch: u64, level: f32) -> bool {
        let mut inner = self.lock();
        if !inner.is_current(epoch) {
            return false;
        }
        let active = matches!(
            inner.phase,
            SessionPhase::Connecting | SessionPhase::Connected
        );
        if active && (inner.audio_level - level).abs() > f32::EPSILON {
            inner.audio_level = level;
            self.publish(&inner);
        }
        true
    }

    /// Applies one remote event. Returns false once the event stream is no
    /// longer relevant.
    fn apply_event(self: &Arc<Self>, epoch: u64, event: SessionEvent) -> bool {
        match event {
            SessionEvent::Turn { role, text } => {
                let mut inner = self.lock();
                if !inner.is_current(epoch) {
                    return false;
                }
                if inner.transcript.push(role, &text) {
                    self.publish(&inner);
                }
                true
            }
            SessionEvent::Status(status) => self.apply_status(epoch, status, "event"),
            SessionEvent::Error(message) => {
                let mut inner = self.lock();
                if !inner.is_current(epoch) {
                    return false;
                }
                warn!(error = %message, phase = ?inner.phase, "remote session reported an error");
                inner.error = Some(if message.trim().is_empty() {
                    "conversation error".to_string()
                } else {
                    message
                });
                self.publish(&inner);
                true
            }
        }
    }

    /// Feeds a status hint into the state machine. Both the event stream
    /// and the poller call this; every transition is guarded by the current
    /// phase, so duplicate hints are no-ops.
    fn apply_status(self: &Arc<Self>, epoch: u64, status: RemoteStatus, source: &str) -> bool {
        let microphone = {
            let mut inner = self.lock();
            if !inner.is_current(epoch) {
                return false;
            }
            debug!(?status, source, phase = ?inner.phase, "remote status hint");

            if !status.is_down() {
                if status == RemoteStatus::Connected && inner.phase == SessionPhase::Connecting {
                    inner.phase = SessionPhase::Connected;
                    inner.error = None;
                    self.start_ticker(&mut inner, epoch);
                    self.publish(&inner);
                    info!(source, "call session connected");
                }
                return true;
            }

            let live = matches!(
                inner.phase,
                SessionPhase::Connecting | SessionPhase::Connected
            );
            if !live || inner.session.is_none() {
                return true;
            }
            info!(source, phase = ?inner.phase, "remote side ended the session");
            inner.epoch += 1;
            inner.phase = SessionPhase::Idle;
            inner.stop_ticker();
            inner.abort_workers();
            inner.audio_level = 0.0;
            inner.session = None;
            self.publish(&inner);
            inner.microphone.take()
        };

        if let Some(microphone) = microphone {
            microphone.stop();
        }
        false
    }
}

impl Drop for Shared {
    fn drop(&mut self) {
        let inner = self.inner.get_mut().unwrap_or_else(PoisonError::into_inner);
        inner.stop_ticker();
        inner.abort_workers();
        if let Some(microphone) = inner.microphone.take() {
            microphone.stop();
        }
        if let Some(handle) = inner.session.take() {
            warn!(session = %handle, "coordinator dropped with an open session; closing in background");
            if let Ok(runtime) = tokio::runtime::Handle::try_current() {
                let client = Arc::clone(&self.client);
                runtime.spawn(async move {
                    if let Err(e) = client.close_session(&handle).await {
                        warn!(session = %handle, error = %e, "background session close failed");
                    }
                });
            }
        }
    }
}

async fn event_pump(
    shared: Weak<Shared>,
    epoch: u64,
    mut events: mpsc::UnboundedReceiver<SessionEvent>,
) {
    while let Some(event) = events.recv().await {
        let Some(shared) = shared.upgrade() else {
            return;
        };
        if !shared.apply_event(epoch, event) {
            return;
        }
    }
    if let Some(shared) = shared.upgrade() {
        shared.apply_status(epoch, RemoteStatus::Disconnected, "event-stream-closed");
    }
}

async fn status_poller(
    shared: Weak<Shared>,
    epoch: u64,
    handle: SessionHandle,
    period: Duration,
) {
    let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    loop {
        ticker.tick().await;
        let Some(shared) = shared.upgrade() else {
            return;
        };
        if !shared.is_current(epoch) {
            return;
        }
        let status = shared.client.status(&handle);
        if !shared.apply_status(epoch, status, "poll") {
            return;
        }
    }
}

async fn level_sampler(
    shared: Weak<Shared>,
    epoch: u64,
    meter: Arc<dyn AudioLevelMeter>,
    period: Duration,
) {
    let mut ticker = tokio::time::interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    loop {
        ticker.tick().await;
        let Some(shared) = shared.upgrade() else {
            return;
        };
        if !shared.record_level(epoch, meter.level()) {
            return;
        }
    }
}
