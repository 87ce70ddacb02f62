//! Text-generation backends consumed by the analysis pipeline.

use std::time::Duration;

use async_trait::async_trait;
use serde_json::{Value, json};
use thiserror::Error;
use tracing::{debug, warn};

use crate::infra::config::BackendConfig;

/// One structured generation call: a rendered prompt plus the JSON schema the
/// answer must follow.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationRequest {
    /// Name of the flow issuing the request, forwarded as the schema name.
    pub flow: String,
    pub prompt: String,
    pub output_schema: Value,
}

/// Failures of the generation backend itself.
#[derive(Debug, Error)]
pub enum BackendError {
    #[error("backend request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("backend returned status {status}: {body}")]
    Status { status: u16, body: String },
    #[error("backend response carried no message content")]
    MissingContent,
    #[error("backend content is not valid JSON: {0}")]
    MalformedContent(#[source] serde_json::Error),
}

/// An opaque structured text generator.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait GenerationBackend: Send + Sync {
    /// Produce a JSON value for `request`. Makes exactly one attempt.
    async fn generate(&self, request: GenerationRequest) -> Result<Value, BackendError>;
}

/// Backend speaking the OpenAI-compatible chat-completions protocol with
/// `json_schema` response formatting.
#[derive(Debug, Clone)]
pub struct OpenAiBackend {
    client: reqwest::Client,
    endpoint: String,
    model: String,
    api_key: Option<String>,
    temperature: Option<f32>,
}

impl OpenAiBackend {
    pub fn from_config(config: &BackendConfig) -> Result<Self, BackendError> {
        let api_key = std::env::var(&config.api_key_env)
            .ok()
            .filter(|key| !key.trim().is_empty());
        if api_key.is_none() {
            warn!(
                env = %config.api_key_env,
                "no API key found; sending unauthenticated requests"
            );
        }

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs.max(1)))
            .build()?;

        Ok(Self {
            client,
            endpoint: config.endpoint.clone(),
            model: config.model.clone(),
            api_key,
            temperature: config.temperature,
        })
    }

    fn request_body(&self, request: &GenerationRequest) -> Value {
        let mut body = json!({
            "model": self.model,
            "messages": [
                { "role": "user", "content": request.prompt }
            ],
            "response_format": {
                "type": "json_schema",
                "json_schema": {
                    "name": request.flow,
                    "schema": request.output_schema,
                }
            }
        });
        if let Some(temperature) = self.temperature {
            body["temperature"] = json!(temperature);
        }
        body
    }
}

#[async_trait]
impl GenerationBackend for OpenAiBackend {
    async fn generate(&self, request: GenerationRequest) -> Result<Value, BackendError> {
        debug!(
            flow = %request.flow,
            endpoint = %self.endpoint,
            model = %self.model,
            "calling backend"
        );

        let mut call = self.client.post(&self.endpoint).json(&self.request_body(&request));
        if let Some(key) = &self.api_key {
            call = call.bearer_auth(key);
        }

        let response = call.send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(BackendError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let payload: Value = response.json().await?;
        parse_completion(&payload)
    }
}

/// Pull the structured answer out of a chat-completions response body.
pub fn parse_completion(payload: &Value) -> Result<Value, BackendError> {
    let content = payload
        .pointer("/choices/0/message/content")
        .and_then(Value::as_str)
        .ok_or(BackendError::MissingContent)?;
    serde_json::from_str(strip_code_fence(content)).map_err(BackendError::MalformedContent)
}

/// Models occasionally wrap JSON in a fenced block despite the response format.
fn strip_code_fence(content: &str) -> &str {
    let trimmed = content.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let rest = rest.strip_prefix("json").unwrap_or(rest);
    rest.strip_suffix("```").unwrap_or(rest).trim()
}
