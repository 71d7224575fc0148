//! Call records and the structured data extracted from them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Lifecycle status of a call record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CallStatus {
    /// The call is in progress; transcript and duration are still changing.
    Active,
    /// The call finished normally.
    Completed,
    /// The call was abandoned without a normal completion.
    Ended,
}

/// A single question/answer pair identified in the transcript.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnswerEntry {
    pub question: String,
    pub answer: String,
    pub category: String,
}

/// Result of post-processing a transcript against an agent's data schema.
///
/// `metrics` only ever contains keys from the schema, and only for fields
/// that were evidenced in the transcript; missing fields are absent rather
/// than `null`.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StructuredCallData {
    #[serde(default)]
    pub answers: Vec<AnswerEntry>,
    #[serde(default)]
    pub metrics: Map<String, Value>,
    #[serde(default)]
    pub observations: String,
    #[serde(default)]
    pub recommended_actions: Vec<String>,
    #[serde(default)]
    pub summary: String,
}

/// A persisted call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Call {
    pub id: String,
    pub agent_id: String,
    #[serde(default)]
    pub transcript: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub structured_data: Option<StructuredCallData>,
    /// Elapsed connected time in whole seconds.
    #[serde(default)]
    pub duration: u64,
    pub started_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ended_at: Option<DateTime<Utc>>,
    pub status: CallStatus,
}

impl Call {
    /// A fresh `active` call with an empty transcript.
    pub fn start(agent_id: impl Into<String>) -> Self {
        Self {
            id: crate::generate_id(),
            agent_id: agent_id.into(),
            transcript: String::new(),
            structured_data: None,
            duration: 0,
            started_at: crate::now(),
            ended_at: None,
            status: CallStatus::Active,
        }
    }

    /// Marks the call completed, stamping the end time. The transcript is
    /// kept as-is.
    pub fn complete(mut self) -> Self {
        self.status = CallStatus::Completed;
        self.ended_at = Some(crate::now());
        self
    }

    pub fn is_active(&self) -> bool {
        self.status == CallStatus::Active
    }
}

/// A single prescribed medication in [`MockData`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Medication {
    pub name: String,
    pub dose: String,
    pub frequency: String,
}

/// Realistic sample data used to personalise a test call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MockData {
    pub patient_name: String,
    pub procedure_type: String,
    /// `YYYY-MM-DD`.
    pub procedure_date: String,
    pub medications: Vec<Medication>,
    pub contextual_info: String,
}
