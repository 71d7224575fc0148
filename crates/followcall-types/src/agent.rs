//! Agent records and the data-collection schema.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use thiserror::Error;

/// Errors raised when a [`DataSchema`] is malformed.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SchemaError {
    /// A field has an empty name.
    #[error("field at position {0} has an empty name")]
    EmptyFieldName(usize),

    /// Two fields share the same name.
    #[error("duplicate field name: {0}")]
    DuplicateField(String),
}

/// Primitive type tag of a schema field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    String,
    Number,
    Boolean,
    /// An array of strings.
    Array,
}

impl FieldType {
    /// Returns true if `value` has the JSON shape this tag describes.
    ///
    /// `null` never matches: an absent value is expressed by omitting the key.
    pub fn matches(self, value: &serde_json::Value) -> bool {
        use serde_json::Value;
        match (self, value) {
            (Self::String, Value::String(_)) => true,
            (Self::Number, Value::Number(_)) => true,
            (Self::Boolean, Value::Bool(_)) => true,
            (Self::Array, Value::Array(items)) => items.iter().all(Value::is_string),
            _ => false,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::String => "string",
            Self::Number => "number",
            Self::Boolean => "boolean",
            Self::Array => "array",
        }
    }
}

/// One named, typed field the agent is expected to collect during a call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataField {
    /// Field name, unique within its schema (camelCase by convention).
    pub name: String,
    #[serde(rename = "type")]
    pub field_type: FieldType,
    /// Human description, also used when prompting the language model.
    pub description: String,
    pub required: bool,
}

/// Ordered list of fields. Field names are the contract for which metric
/// keys the transcript post-processor may populate.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataSchema {
    pub fields: Vec<DataField>,
}

impl DataSchema {
    pub fn new(fields: Vec<DataField>) -> Self {
        Self { fields }
    }

    /// Checks that every field has a non-empty name and that names are unique.
    pub fn validate(&self) -> Result<(), SchemaError> {
        let mut seen = HashSet::new();
        for (idx, field) in self.fields.iter().enumerate() {
            if field.name.trim().is_empty() {
                return Err(SchemaError::EmptyFieldName(idx));
            }
            if !seen.insert(field.name.as_str()) {
                return Err(SchemaError::DuplicateField(field.name.clone()));
            }
        }
        Ok(())
    }

    /// Looks up a field by name.
    pub fn field(&self, name: &str) -> Option<&DataField> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|f| f.name.as_str())
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

/// A configured follow-up call agent.
///
/// `id` is assigned once at creation and never changes; `updated_at` moves
/// forward on every mutation (see `followcall_db::save_agent`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Agent {
    pub id: String,
    pub name: String,
    pub objective: String,
    pub system_prompt: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub first_message: Option<String>,
    /// Voice personality identifier on the remote voice platform.
    pub voice_id: String,
    /// BCP-47-ish language tag, e.g. `es`.
    pub language: String,
    /// Identifier of the linked remote conversational agent, once created.
    #[serde(
        default,
        rename = "elevenLabsAgentId",
        skip_serializing_if = "Option::is_none"
    )]
    pub remote_agent_id: Option<String>,
    pub data_schema: DataSchema,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// The user-supplied part of an [`Agent`], before an id and timestamps are
/// assigned.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewAgent {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub objective: String,
    #[serde(default)]
    pub system_prompt: String,
    #[serde(default)]
    pub first_message: Option<String>,
    #[serde(default)]
    pub voice_id: String,
    #[serde(default = "default_language")]
    pub language: String,
    #[serde(default)]
    pub data_schema: DataSchema,
}

fn default_language() -> String {
    "es".to_string()
}

impl NewAgent {
    /// Builds a full agent with a fresh id and matching created/updated
    /// timestamps.
    pub fn into_agent(self, remote_agent_id: Option<String>) -> Agent {
        let now = crate::now();
        Agent {
            id: crate::generate_id(),
            name: self.name,
            objective: self.objective,
            system_prompt: self.system_prompt,
            first_message: self.first_message.filter(|m| !m.trim().is_empty()),
            voice_id: self.voice_id,
            language: self.language,
            remote_agent_id,
            data_schema: self.data_schema,
            created_at: now,
            updated_at: now,
        }
    }
}
