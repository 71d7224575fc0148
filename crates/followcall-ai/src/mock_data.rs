use crate::error::AiError;
use crate::generator::StructuredGenerator;
use followcall_types::MockData;
use serde_json::{json, Value};

fn mock_data_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "patientName": { "type": "string" },
            "procedureType": { "type": "string" },
            "procedureDate": { "type": "string", "description": "YYYY-MM-DD" },
            "medications": {
                "type": "array",
                "items": {
                    "type": "object",
                    "properties": {
                        "name": { "type": "string" },
                        "dose": { "type": "string" },
                        "frequency": { "type": "string" }
                    },
                    "required": ["name", "dose", "frequency"],
                    "additionalProperties": false
                }
            },
            "contextualInfo": { "type": "string" }
        },
        "required": ["patientName", "procedureType", "procedureDate", "medications", "contextualInfo"],
        "additionalProperties": false
    })
}

/// Generates realistic sample patient data for a test call.
pub async fn generate_mock_data(
    generator: &dyn StructuredGenerator,
    agent_type: &str,
    objective: &str,
) -> Result<MockData, AiError> {
    let prompt = format!(
        "Genera datos de ejemplo realistas para probar un agente de tipo \"{agent_type}\".\n\n\
         Objetivo del agente: {objective}\n\n\
         Incluye nombre y apellido del paciente en español, el procedimiento o tratamiento, \
         la fecha del procedimiento (YYYY-MM-DD), los medicamentos recetados con dosis y frecuencia, \
         e información de contexto útil para personalizar la conversación."
    );

    let object = generator
        .generate_object("mock_data", &mock_data_schema(), &prompt)
        .await?;
    Ok(serde_json::from_value(object)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;

    struct Fixed(Value);

    #[async_trait]
    impl StructuredGenerator for Fixed {
        async fn generate_object(&self, name: &str, _: &Value, prompt: &str) -> Result<Value, AiError> {
            assert_eq!(name, "mock_data");
            assert!(prompt.contains("post-operatorio"));
            Ok(self.0.clone())
        }
    }

    #[tokio::test]
    async fn decodes_generated_object() {
        let generator = Fixed(json!({
            "patientName": "Lucía Fernández",
            "procedureType": "Artroscopia de rodilla",
            "procedureDate": "2026-09-30",
            "medications": [{ "name": "Ibuprofeno", "dose": "400 mg", "frequency": "cada 8 horas" }],
            "contextualInfo": "Vive sola."
        }));

        let data = generate_mock_data(&generator, "post-operatorio", "Seguimiento")
            .await
            .unwrap();
        assert_eq!(data.patient_name, "Lucía Fernández");
        assert_eq!(data.medications[0].dose, "400 mg");
    }

    #[tokio::test]
    async fn incomplete_object_is_an_error() {
        let generator = Fixed(json!({ "patientName": "X" }));
        let err = generate_mock_data(&generator, "post-operatorio", "Seguimiento")
            .await
            .unwrap_err();
        assert!(matches!(err, AiError::Serialization(_)));
    }
}
