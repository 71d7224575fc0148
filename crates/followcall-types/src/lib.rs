//! Shared data model for the followcall workspace.
//!
//! This crate holds the persisted entities (agents and calls), the
//! user-defined data-collection schema that ties a call's transcript to the
//! structured fields extracted from it, and the validation errors for those
//! types.
//!
//! Every other crate depends on `followcall-types` for these definitions and
//! nothing else, which keeps the dependency graph acyclic.

mod agent;
mod call;

pub use agent::{Agent, DataField, DataSchema, FieldType, NewAgent, SchemaError};
pub use call::{AnswerEntry, Call, CallStatus, Medication, MockData, StructuredCallData};

/// Generates a new opaque record identifier.
pub fn generate_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// Current UTC time, truncated to whole milliseconds so that timestamps
/// survive a JSON round-trip unchanged.
pub fn now() -> chrono::DateTime<chrono::Utc> {
    use chrono::{SubsecRound, Utc};
    Utc::now().trunc_subsecs(3)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_ids_are_unique() {
        let a = generate_id();
        let b = generate_id();
        assert_ne!(a, b);
        assert_eq!(a.len(), 36);
    }
}
