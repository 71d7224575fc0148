use crate::error::AiError;
use async_trait::async_trait;
use serde_json::Value;

/// Produces a JSON object that conforms to a JSON Schema.
#[async_trait]
pub trait StructuredGenerator: Send + Sync {
    /// Asks the model to answer `prompt` with an object matching `schema`.
    /// `name` labels the schema in the request.
    async fn generate_object(
        &self,
        name: &str,
        schema: &Value,
        prompt: &str,
    ) -> Result<Value, AiError>;
}
