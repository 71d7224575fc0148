//! LLM-backed helpers for followcall.
//!
//! Everything here goes through [`StructuredGenerator`]: ask a model for a
//! JSON object matching a JSON Schema, get a `serde_json::Value` back. On top
//! of that seam sit the transcript post-processor, the prompt/schema
//! generator and the mock data generator. [`OpenAiClient`] is the
//! production generator.

pub mod error;
pub mod generator;
pub mod mock_data;
pub mod openai;
pub mod prompt_generator;
pub mod schema;
pub mod transcript_parser;

pub use error::AiError;
pub use generator::StructuredGenerator;
pub use mock_data::generate_mock_data;
pub use openai::{OpenAiClient, OpenAiConfig};
pub use prompt_generator::{enhance_system_prompt, generate_prompt_and_schema, PromptGeneration};
pub use schema::{metrics_schema, sanitize_metrics, transcript_schema};
pub use transcript_parser::{LlmTranscriptParser, TranscriptPostProcessor};
