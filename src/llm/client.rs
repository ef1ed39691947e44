use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use super::{Generation, GenerationRequest, Generator, LlmError, OutputShape, ResponseMetadata};
use crate::config::Settings;

/// Client for OpenAI-compatible chat completion endpoints
pub struct OpenAiClient {
    client: Client,
    settings: Settings,
    model: String,
}

impl OpenAiClient {
    /// Build a client for the given model; the timeout comes from settings
    pub fn new(settings: Settings, model: impl Into<String>) -> Result<Self, LlmError> {
        let client = Client::builder().timeout(settings.timeout).build()?;
        Ok(Self {
            client,
            settings,
            model: model.into(),
        })
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/chat/completions",
            self.settings.base_url.trim_end_matches('/')
        )
    }

    fn build_request(&self, request: &GenerationRequest) -> ChatRequest {
        let response_format = match request.shape {
            OutputShape::Structured(kind) => Some(ResponseFormat {
                format_type: "json_schema".to_string(),
                json_schema: JsonSchemaFormat {
                    name: kind.name().to_string(),
                    schema: kind.schema(),
                    strict: true,
                },
            }),
            OutputShape::Text | OutputShape::List => None,
        };

        ChatRequest {
            model: self.model.clone(),
            messages: vec![
                Message {
                    role: "system".to_string(),
                    content: request.system.clone(),
                },
                Message {
                    role: "user".to_string(),
                    content: request.prompt.clone(),
                },
            ],
            response_format,
        }
    }
}

#[async_trait]
impl Generator for OpenAiClient {
    async fn generate(&self, request: &GenerationRequest) -> Result<Generation, LlmError> {
        let body = self.build_request(request);
        debug!(model = %self.model, shape = ?request.shape, "sending chat completion");

        let response = self
            .client
            .post(self.endpoint())
            .bearer_auth(&self.settings.api_key)
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(LlmError::Provider { status, body });
        }

        let response: ChatResponse = response.json().await?;
        parse_choice(response, request.shape)
    }
}

/// Turn the first choice into a generation
fn parse_choice(response: ChatResponse, shape: OutputShape) -> Result<Generation, LlmError> {
    let message = response
        .choices
        .into_iter()
        .next()
        .ok_or(LlmError::EmptyResponse)?
        .message;

    let mut metadata = ResponseMetadata::default();
    if let Some(reasoning) = message.reasoning_content {
        metadata
            .provider_details
            .insert("reasoning_content".to_string(), Value::String(reasoning));
    }
    if let Some(reasoning) = message.reasoning {
        metadata
            .provider_details
            .insert("reasoning".to_string(), Value::String(reasoning));
    }

    let content = message.content.unwrap_or_default();

    let output = match shape {
        OutputShape::Structured(kind) => {
            if let Some(refusal) = message.refusal.filter(|r| !r.trim().is_empty()) {
                return Err(LlmError::MalformedOutput(format!(
                    "model refused {}: {}",
                    kind.name(),
                    refusal
                )));
            }
            serde_json::from_str(&content).map_err(|e| {
                LlmError::MalformedOutput(format!("{} is not valid JSON: {}", kind.name(), e))
            })?
        }
        OutputShape::Text | OutputShape::List => Value::String(content),
    };

    Ok(Generation { output, metadata })
}

#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<Message>,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<ResponseFormat>,
}

#[derive(Debug, Serialize)]
struct Message {
    role: String,
    content: String,
}

#[derive(Debug, Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    format_type: String,
    json_schema: JsonSchemaFormat,
}

#[derive(Debug, Serialize)]
struct JsonSchemaFormat {
    name: String,
    schema: Value,
    strict: bool,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    refusal: Option<String>,
    #[serde(default)]
    reasoning_content: Option<String>,
    #[serde(default)]
    reasoning: Option<String>,
}
