//! Real-time call sessions for followcall voice agents.
//!
//! The centre of this crate is [`CallSessionCoordinator`], which owns the
//! lifecycle of one voice conversation: microphone acquisition, opening the
//! duplex session against a remote conversational agent, accumulating the
//! turn-by-turn transcript, reconciling connection status reported through
//! both events and polling, metering the input level, and idempotent
//! teardown. Callers observe it through a [`SessionSnapshot`] stream and
//! express intent only through `connect`, `disconnect`, `set_muted` and
//! `dispose`.
//!
//! The coordinator talks to the outside world through three seams:
//!
//! - [`VoiceSessionClient`]: opens and closes the remote duplex session and
//!   delivers [`SessionEvent`]s.
//! - [`MediaDevices`]: grants microphone streams and releases stray tracks.
//! - [`CredentialProvider`]: supplies the secret that authorises a session.
//!
//! The crate also carries [`ElevenLabsClient`], the REST client used to
//! create and configure remote agents, and [`resolve_dial_target`], which
//! decides which remote agent a call actually dials.

pub mod config;
pub mod coordinator;
pub mod credentials;
pub mod dial;
pub mod elevenlabs;
pub mod error;
pub mod media;
pub mod session;
pub mod transcript;

pub use config::{AudioConstraints, CoordinatorSettings, ElevenLabsConfig};
pub use coordinator::{CallSessionCoordinator, ConnectOutcome, SessionPhase, SessionSnapshot};
pub use credentials::{CredentialProvider, Credentials, HttpCredentialProvider, StaticCredentials};
pub use dial::{resolve_dial_target, DialSource, DialTarget};
pub use elevenlabs::{AgentUpdate, CreateRemoteAgent, ElevenLabsClient};
pub use error::VoiceError;
pub use media::{AudioLevelMeter, MediaDevices, MediaTrack, MicrophoneStream};
pub use session::{RemoteSession, RemoteStatus, SessionEvent, SessionHandle, VoiceSessionClient};
pub use transcript::{Transcript, TranscriptMessage, TurnRole};
