//! Turns a finished call's transcript into [`StructuredCallData`].

use crate::error::AiError;
use crate::generator::StructuredGenerator;
use crate::schema::{sanitize_metrics, transcript_schema};
use async_trait::async_trait;
use followcall_types::{DataSchema, StructuredCallData};
use serde_json::{Map, Value};
use std::sync::Arc;
use tracing::info;

/// Converts a raw transcript into schema-constrained structured data.
///
/// Implementations must only populate metric keys named by `schema`, and
/// must omit fields the transcript gives no evidence for.
#[async_trait]
pub trait TranscriptPostProcessor: Send + Sync {
    async fn process(
        &self,
        transcript: &str,
        schema: &DataSchema,
        system_prompt: &str,
    ) -> Result<StructuredCallData, AiError>;
}

/// Post-processor backed by a [`StructuredGenerator`].
pub struct LlmTranscriptParser {
    generator: Arc<dyn StructuredGenerator>,
}

impl LlmTranscriptParser {
    pub fn new(generator: Arc<dyn StructuredGenerator>) -> Self {
        Self { generator }
    }
}

fn build_prompt(transcript: &str, schema: &DataSchema, system_prompt: &str) -> Result<String, AiError> {
    let schema_json = serde_json::to_string_pretty(schema)?;
    Ok(format!(
        "Analiza la transcripción de esta llamada de seguimiento y extrae información estructurada.\n\n\
         Instrucciones del agente:\n{system_prompt}\n\n\
         Campos de datos a extraer:\n{schema_json}\n\n\
         Transcripción:\n{transcript}\n\n\
         Devuelve:\n\
         1. Preguntas clave y sus respuestas, con una categoría.\n\
         2. Métricas: solo los campos definidos arriba. Omite cualquier campo que la conversación no respalde; no inventes valores.\n\
         3. Observaciones relevantes.\n\
         4. Acciones recomendadas.\n\
         5. Un resumen breve de la llamada."
    ))
}

/// Builds [`StructuredCallData`] from the model's answer, enforcing the
/// schema on the metrics.
fn decode(mut object: Value, schema: &DataSchema) -> Result<StructuredCallData, AiError> {
    let map = object
        .as_object_mut()
        .ok_or_else(|| AiError::InvalidResponse("expected a JSON object".to_string()))?;

    let raw_metrics = match map.remove("metrics") {
        Some(Value::Object(metrics)) => metrics,
        _ => Map::new(),
    };

    let mut data: StructuredCallData = serde_json::from_value(object)?;
    data.metrics = sanitize_metrics(&raw_metrics, schema);
    Ok(data)
}

#[async_trait]
impl TranscriptPostProcessor for LlmTranscriptParser {
    async fn process(
        &self,
        transcript: &str,
        schema: &DataSchema,
        system_prompt: &str,
    ) -> Result<StructuredCallData, AiError> {
        schema.validate()?;

        let prompt = build_prompt(transcript, schema, system_prompt)?;
        let object = self
            .generator
            .generate_object("call_analysis", &transcript_schema(schema), &prompt)
            .await?;

        let data = decode(object, schema)?;
        info!(
            answers = data.answers.len(),
            metrics = data.metrics.len(),
            "transcript post-processed"
        );
        Ok(data)
    }
}
