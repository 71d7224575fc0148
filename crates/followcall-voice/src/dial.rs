//! Which remote agent a call actually dials.

use crate::error::VoiceError;
use followcall_types::Agent;
use serde::Serialize;
use tracing::warn;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DialSource {
    /// The agent's own remote identifier.
    Agent,
    /// An operator-configured override that replaces every agent's id.
    Override,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DialTarget {
    pub agent_id: String,
    pub source: DialSource,
}

/// Picks the remote agent to dial for `agent`.
///
/// A non-blank `dial_override` wins and is logged, since it silently routes
/// every call to the same remote agent. Otherwise the agent's own remote id
/// is used; an agent without one cannot be dialled.
pub fn resolve_dial_target(
    agent: &Agent,
    dial_override: Option<&str>,
) -> Result<DialTarget, VoiceError> {
    if let Some(id) = dial_override.map(str::trim).filter(|id| !id.is_empty()) {
        warn!(
            agent_id = %agent.id,
            override_id = %id,
            "dialling configured override instead of the agent's remote id"
        );
        return Ok(DialTarget {
            agent_id: id.to_string(),
            source: DialSource::Override,
        });
    }

    match agent.remote_agent_id.as_deref().map(str::trim) {
        Some(id) if !id.is_empty() => Ok(DialTarget {
            agent_id: id.to_string(),
            source: DialSource::Agent,
        }),
        _ => Err(VoiceError::Configuration(format!(
            "agent {} has no remote agent identifier",
            agent.id
        ))),
    }
}
