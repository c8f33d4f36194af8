//! Generative model access
//!
//! The resolver depends on the [`GenerativeModel`] trait only. [`GeminiClient`]
//! is the production implementation; it exists only when an API key is
//! configured, which the resolver sees as an `Option`.

mod gemini;

pub use gemini::GeminiClient;

use async_trait::async_trait;
use thiserror::Error;

/// One single-turn generation call
#[derive(Debug, Clone, PartialEq)]
pub struct GenerateRequest {
    pub prompt: String,
    pub temperature: f64,
    pub max_output_tokens: u32,
    /// Requested response format, e.g. `application/json`
    pub response_mime_type: Option<String>,
}

impl GenerateRequest {
    /// JSON-only request with the configured sampling settings
    pub fn json(prompt: impl Into<String>, config: &crate::ModelConfig) -> Self {
        Self {
            prompt: prompt.into(),
            temperature: config.temperature,
            max_output_tokens: config.max_output_tokens,
            response_mime_type: Some("application/json".to_string()),
        }
    }
}

#[async_trait]
pub trait GenerativeModel: Send + Sync {
    /// Human-readable backend name for logs
    fn name(&self) -> &str;

    /// Return the model's text output
    async fn generate(&self, request: GenerateRequest) -> Result<String, ModelError>;
}

#[derive(Error, Debug)]
pub enum ModelError {
    #[error("Missing API key: {0}")]
    MissingApiKey(String),

    #[error("HTTP error: {0}")]
    Http(String),

    #[error("Model API returned status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Prompt blocked by model: {0}")]
    Blocked(String),

    #[error("Model returned no text")]
    EmptyResponse,

    #[error("Failed to decode model response: {0}")]
    Decode(String),
}

impl From<reqwest::Error> for ModelError {
    fn from(err: reqwest::Error) -> Self {
        ModelError::Http(err.to_string())
    }
}
