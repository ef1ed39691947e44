use async_trait::async_trait;
use serde_json::{Map, Value};
use thiserror::Error;

use crate::models::StructuredKind;

/// Output shape a stage expects from the model
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputShape {
    /// Free text
    Text,
    /// Free text that will be parsed into a list locally
    List,
    /// Schema-validated object produced by the provider
    Structured(StructuredKind),
}

impl OutputShape {
    /// Whether a value already has this shape
    pub fn conforms(self, value: &Value) -> bool {
        match self {
            OutputShape::Text => value.is_string(),
            OutputShape::List => value.is_array(),
            OutputShape::Structured(kind) => kind.conforms(value),
        }
    }
}

/// A single language-model turn
#[derive(Debug, Clone)]
pub struct GenerationRequest {
    /// Fixed per-stage system instruction
    pub system: String,
    /// Rendered user prompt
    pub prompt: String,
    pub shape: OutputShape,
}

/// Metadata a provider may attach to a response
#[derive(Debug, Clone, Default)]
pub struct ResponseMetadata {
    /// Dedicated thinking text
    pub thinking: Option<String>,
    /// Provider-specific side channel (e.g. `reasoning_content`)
    pub provider_details: Map<String, Value>,
}

/// Raw result of a generation call
#[derive(Debug, Clone)]
pub struct Generation {
    /// Text, structured value, or an envelope holding one under an accessor key
    pub output: Value,
    pub metadata: ResponseMetadata,
}

impl Generation {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            output: Value::String(text.into()),
            metadata: ResponseMetadata::default(),
        }
    }

    pub fn with_thinking(mut self, thinking: impl Into<String>) -> Self {
        self.metadata.thinking = Some(thinking.into());
        self
    }

    pub fn with_provider_detail(mut self, key: impl Into<String>, value: Value) -> Self {
        self.metadata.provider_details.insert(key.into(), value);
        self
    }
}

/// Failures of the language-model collaborator
#[derive(Debug, Error)]
pub enum LlmError {
    #[error("transport error: {0}")]
    Transport(String),
    #[error("request timed out: {0}")]
    Timeout(String),
    #[error("provider error: {status} - {body}")]
    Provider { status: u16, body: String },
    #[error("provider returned no choices")]
    EmptyResponse,
    #[error("malformed structured output: {0}")]
    MalformedOutput(String),
}

impl LlmError {
    /// The model refused or mis-formatted, as opposed to a transport failure
    pub fn is_malformed_output(&self) -> bool {
        matches!(self, LlmError::MalformedOutput(_))
    }
}

impl From<reqwest::Error> for LlmError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            LlmError::Timeout(err.to_string())
        } else if err.is_decode() {
            LlmError::MalformedOutput(err.to_string())
        } else {
            LlmError::Transport(err.to_string())
        }
    }
}

/// Capability to run one language-model turn
#[async_trait]
pub trait Generator: Send + Sync {
    async fn generate(&self, request: &GenerationRequest) -> Result<Generation, LlmError>;
}

#[async_trait]
impl<G: Generator + ?Sized> Generator for std::sync::Arc<G> {
    async fn generate(&self, request: &GenerationRequest) -> Result<Generation, LlmError> {
        (**self).generate(request).await
    }
}
