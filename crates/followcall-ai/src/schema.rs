//! JSON Schemas sent to the model, and enforcement of what comes back.

use followcall_types::{DataField, DataSchema, FieldType};
use serde_json::{json, Map, Value};
use tracing::debug;

fn field_schema(field: &DataField) -> Value {
    let mut schema = match field.field_type {
        FieldType::String => json!({ "type": "string" }),
        FieldType::Number => json!({ "type": "number" }),
        FieldType::Boolean => json!({ "type": "boolean" }),
        FieldType::Array => json!({ "type": "array", "items": { "type": "string" } }),
    };
    if !field.description.is_empty() {
        schema["description"] = Value::String(field.description.clone());
    }
    schema
}

/// Object schema with exactly the data schema's fields, none required.
pub fn metrics_schema(schema: &DataSchema) -> Value {
    let properties: Map<String, Value> = schema
        .fields
        .iter()
        .map(|f| (f.name.clone(), field_schema(f)))
        .collect();

    json!({
        "type": "object",
        "properties": properties,
        "additionalProperties": false
    })
}

/// Schema for the full post-processing result.
pub fn transcript_schema(schema: &DataSchema) -> Value {
    json!({
        "type": "object",
        "properties": {
            "answers": {
                "type": "array",
                "items": {
                    "type": "object",
                    "properties": {
                        "question": { "type": "string" },
                        "answer": { "type": "string" },
                        "category": { "type": "string" }
                    },
                    "required": ["question", "answer", "category"],
                    "additionalProperties": false
                }
            },
            "metrics": metrics_schema(schema),
            "observations": { "type": "string" },
            "recommendedActions": { "type": "array", "items": { "type": "string" } },
            "summary": { "type": "string" }
        },
        "required": ["answers", "metrics", "observations", "recommendedActions", "summary"],
        "additionalProperties": false
    })
}

/// Keeps only metrics that name a schema field and carry a value of that
/// field's type. Everything else is dropped, never coerced or defaulted.
pub fn sanitize_metrics(raw: &Map<String, Value>, schema: &DataSchema) -> Map<String, Value> {
    let mut clean = Map::new();
    for (key, value) in raw {
        match schema.field(key) {
            Some(field) if field.field_type.matches(value) => {
                clean.insert(key.clone(), value.clone());
            }
            Some(field) => {
                debug!(field = %key, expected = field.field_type.as_str(), "dropping mistyped metric");
            }
            None => debug!(field = %key, "dropping metric outside the data schema"),
        }
    }
    clean
}
