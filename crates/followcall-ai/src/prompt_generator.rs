//! Generates an agent's system prompt and data schema from its objective.

use crate::error::AiError;
use crate::generator::StructuredGenerator;
use followcall_types::DataSchema;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::info;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PromptGeneration {
    pub system_prompt: String,
    pub data_schema: DataSchema,
}

fn generation_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "systemPrompt": {
                "type": "string",
                "description": "System prompt for the voice agent, in Spanish"
            },
            "dataSchema": {
                "type": "object",
                "properties": {
                    "fields": {
                        "type": "array",
                        "items": {
                            "type": "object",
                            "properties": {
                                "name": { "type": "string" },
                                "type": { "type": "string", "enum": ["string", "number", "boolean", "array"] },
                                "description": { "type": "string" },
                                "required": { "type": "boolean" }
                            },
                            "required": ["name", "type", "description", "required"],
                            "additionalProperties": false
                        }
                    }
                },
                "required": ["fields"],
                "additionalProperties": false
            }
        },
        "required": ["systemPrompt", "dataSchema"],
        "additionalProperties": false
    })
}

fn build_prompt(objective: &str) -> String {
    format!(
        "Escribe un system prompt breve para un agente de voz que hace llamadas de seguimiento con este objetivo:\n\n\
         \"{objective}\"\n\n\
         El prompt debe tener como máximo cinco oraciones, en español, en texto plano y con tono conversacional, \
         y debe mencionar qué información recoger durante la llamada.\n\n\
         Define además entre 3 y 4 campos de datos a recoger. Cada campo lleva un nombre en camelCase \
         (por ejemplo nombrePaciente), un tipo (string, number, boolean o array) y una descripción de una línea."
    )
}

/// Joins items as `a`, `a y b` or `a, b, y c`.
fn natural_list(items: &[String]) -> String {
    match items {
        [] => String::new(),
        [only] => only.clone(),
        [first, second] => format!("{} y {}", first, second),
        [init @ .., last] => format!("{}, y {}", init.join(", "), last),
    }
}

/// Appends an explicit "collect this" sentence when the prompt does not
/// already mention any of the schema's fields.
///
/// A field counts as mentioned when the first word of its lower-cased
/// description occurs anywhere in the lower-cased prompt.
pub fn enhance_system_prompt(system_prompt: &str, schema: &DataSchema) -> String {
    let descriptions: Vec<String> = schema
        .fields
        .iter()
        .map(|f| {
            let lower = f.description.to_lowercase();
            lower.strip_suffix('.').unwrap_or(&lower).to_string()
        })
        .collect();

    let to_collect = natural_list(&descriptions);
    if to_collect.is_empty() {
        return system_prompt.to_string();
    }

    let prompt_lower = system_prompt.to_lowercase();
    let mentioned = descriptions.iter().any(|d| {
        let first_word = d.split(' ').next().unwrap_or("");
        prompt_lower.contains(first_word)
    });

    if mentioned {
        system_prompt.to_string()
    } else {
        format!(
            "{} Asegúrate de obtener información sobre: {}.",
            system_prompt, to_collect
        )
    }
}

pub async fn generate_prompt_and_schema(
    generator: &dyn StructuredGenerator,
    objective: &str,
) -> Result<PromptGeneration, AiError> {
    let object = generator
        .generate_object("agent_prompt", &generation_schema(), &build_prompt(objective))
        .await?;

    let mut generated: PromptGeneration = serde_json::from_value(object)?;
    generated.data_schema.validate()?;
    generated.system_prompt = enhance_system_prompt(&generated.system_prompt, &generated.data_schema);

    info!(
        prompt_len = generated.system_prompt.len(),
        fields = generated.data_schema.fields.len(),
        "generated agent prompt"
    );
    Ok(generated)
}

#[cfg(test)]
mod tests {
    use super::*;
    use followcall_types::{DataField, FieldType};

    fn schema(descriptions: &[&str]) -> DataSchema {
        DataSchema::new(
            descriptions
                .iter()
                .enumerate()
                .map(|(i, d)| DataField {
                    name: format!("campo{}", i),
                    field_type: FieldType::String,
                    description: d.to_string(),
                    required: false,
                })
                .collect(),
        )
    }

    #[test]
    fn joins_lists_naturally() {
        let items = |v: &[&str]| v.iter().map(|s| s.to_string()).collect::<Vec<_>>();
        assert_eq!(natural_list(&items(&["a"])), "a");
        assert_eq!(natural_list(&items(&["a", "b"])), "a y b");
        assert_eq!(natural_list(&items(&["a", "b", "c"])), "a, b, y c");
    }

    #[test]
    fn appends_fields_when_none_are_mentioned() {
        let prompt = "Llama al paciente para saludar.";
        let enhanced = enhance_system_prompt(
            prompt,
            &schema(&["Frecuencia de síntomas.", "Dolor reportado", "Comentarios adicionales"]),
        );
        assert_eq!(
            enhanced,
            "Llama al paciente para saludar. Asegúrate de obtener información sobre: \
             frecuencia de síntomas, dolor reportado, y comentarios adicionales."
        );
    }

    #[test]
    fn leaves_prompt_alone_when_a_field_is_mentioned() {
        let prompt = "Pregunta por la FRECUENCIA de los síntomas.";
        let enhanced = enhance_system_prompt(prompt, &schema(&["Frecuencia de síntomas", "Dolor"]));
        assert_eq!(enhanced, prompt);
    }

    #[test]
    fn empty_schema_is_a_no_op() {
        assert_eq!(enhance_system_prompt("Hola.", &DataSchema::default()), "Hola.");
    }
}
