//! Remote duplex session seam.

use crate::credentials::Credentials;
use crate::error::VoiceError;
use crate::transcript::TurnRole;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use tokio::sync::mpsc;

/// Connection status as reported by the remote session.
///
/// Reports arrive through both [`SessionEvent::Status`] and
/// [`VoiceSessionClient::status`]; either may repeat or lag the other, so
/// the coordinator treats them as hints.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RemoteStatus {
    Connecting,
    Connected,
    Disconnecting,
    Disconnected,
}

impl RemoteStatus {
    pub fn is_down(self) -> bool {
        matches!(self, Self::Disconnecting | Self::Disconnected)
    }
}

/// Opaque handle of an open remote session (the remote conversation id).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SessionHandle(String);

impl SessionHandle {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Something the remote session reported.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    /// A finished conversational turn.
    Turn { role: TurnRole, text: String },
    Status(RemoteStatus),
    /// A session-level failure reported after the session opened.
    Error(String),
}

/// An open session plus the ordered stream of events it emits. The stream
/// ending is equivalent to a `Disconnected` status.
#[derive(Debug)]
pub struct RemoteSession {
    pub handle: SessionHandle,
    pub events: mpsc::UnboundedReceiver<SessionEvent>,
}

/// Opens and closes real-time duplex audio sessions against a remote agent.
#[async_trait]
pub trait VoiceSessionClient: Send + Sync {
    async fn open_session(
        &self,
        remote_agent_id: &str,
        credentials: &Credentials,
    ) -> Result<RemoteSession, VoiceError>;

    /// Closes the session. Settles once the close attempt has finished,
    /// successfully or not.
    async fn close_session(&self, handle: &SessionHandle) -> Result<(), VoiceError>;

    /// Polled status property of the session.
    fn status(&self, handle: &SessionHandle) -> RemoteStatus;

    /// Toggles whether captured audio is transmitted.
    fn set_muted(&self, handle: &SessionHandle, muted: bool);
}
