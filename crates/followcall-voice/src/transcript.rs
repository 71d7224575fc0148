//! Turn-by-turn transcript accumulation.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Separator between rendered turns: a blank line.
const TURN_SEPARATOR: &str = "\n\n";

/// Who spoke a turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TurnRole {
    User,
    #[serde(alias = "ai")]
    Agent,
}

impl TurnRole {
    /// Label used in the rendered transcript.
    pub fn label(self) -> &'static str {
        match self {
            Self::User => "Usuario",
            Self::Agent => "Agente",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TranscriptMessage {
    pub role: TurnRole,
    pub text: String,
    pub timestamp: DateTime<Utc>,
}

/// Ordered list of turns plus its rendered form.
///
/// The rendered string is rebuilt from the full message list on every
/// append, so it is always exactly `render(messages())`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Transcript {
    messages: Vec<TranscriptMessage>,
    rendered: String,
}

impl Transcript {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a turn. Text is trimmed; blank turns are ignored and return
    /// false.
    pub fn push(&mut self, role: TurnRole, text: &str) -> bool {
        let text = text.trim();
        if text.is_empty() {
            return false;
        }
        self.messages.push(TranscriptMessage {
            role,
            text: text.to_string(),
            timestamp: Utc::now(),
        });
        self.rendered = render(&self.messages);
        true
    }

    pub fn messages(&self) -> &[TranscriptMessage] {
        &self.messages
    }

    pub fn text(&self) -> &str {
        &self.rendered
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn clear(&mut self) {
        self.messages.clear();
        self.rendered.clear();
    }
}

/// Renders turns as `"{Label}: {text}"` joined by blank lines.
pub fn render(messages: &[TranscriptMessage]) -> String {
    messages
        .iter()
        .map(|m| format!("{}: {}", m.role.label(), m.text))
        .collect::<Vec<_>>()
        .join(TURN_SEPARATOR)
}
