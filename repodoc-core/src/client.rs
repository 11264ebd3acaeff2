//! Documentation requests against an OpenAI-compatible chat-completions API.
//!
//! One call is one attempt. Failure classification happens here, the decision
//! to continue, abort or retry does not.

use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::time::Duration;
use tracing::{debug, error, info};

use crate::contract::{DocClient, DocRequest};
use crate::error::{DocgenError, Result};

/// Model parameters sent with every request of a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    pub model: String,
    pub temperature: f64,
    pub max_output_tokens: u32,
}

impl Default for ModelConfig {
    fn default() -> Self {
        ModelConfig {
            model: "gpt-3.5-turbo".to_string(),
            temperature: 0.7,
            max_output_tokens: 1000,
        }
    }
}

/// Instruction used when no override is given.
pub fn default_instruction(path: &str) -> String {
    format!("Generate detailed documentation for the following source code file: {path}")
}

/// The instruction for one file. A non-blank override replaces the default; it is never appended.
pub fn build_prompt(path: &str, instruction: Option<&str>) -> String {
    match instruction.map(str::trim) {
        Some(text) if !text.is_empty() => text.to_string(),
        _ => default_instruction(path),
    }
}

/// Request body for the chat-completions endpoint.
pub fn request_body(req: &DocRequest) -> Value {
    let prompt = build_prompt(&req.path, req.instruction.as_deref());
    json!({
        "model": req.model.model,
        "messages": [
            { "role": "user", "content": format!("{prompt}\n\n{}", req.content) }
        ],
        "temperature": req.model.temperature,
        "max_tokens": req.model.max_output_tokens,
    })
}

/// Map a non-success backend status to an error.
pub fn classify_status(status: StatusCode, body: &str) -> DocgenError {
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => DocgenError::Auth {
            status: status.as_u16(),
            message: body.to_string(),
        },
        StatusCode::TOO_MANY_REQUESTS => DocgenError::RateLimited {
            status: status.as_u16(),
            message: body.to_string(),
        },
        other => DocgenError::BadResponse(format!("status {other}: {body}")),
    }
}

/// Pull the generated text out of a response body.
///
/// Accepts both the chat shape (`choices[0].message.content`) and the legacy
/// completions shape (`choices[0].text`).
pub fn extract_text(body: &Value) -> Result<String> {
    let choice = body
        .get("choices")
        .and_then(Value::as_array)
        .and_then(|choices| choices.first())
        .ok_or_else(|| DocgenError::BadResponse("response has no choices".to_string()))?;

    choice
        .pointer("/message/content")
        .or_else(|| choice.get("text"))
        .and_then(Value::as_str)
        .map(|text| text.trim().to_string())
        .ok_or_else(|| DocgenError::BadResponse("choice has no generated text".to_string()))
}

/// Connection settings for [`OpenAiClient`].
#[derive(Debug, Clone)]
pub struct OpenAiConfig {
    pub endpoint: String,
    pub api_key: String,
    /// Per-request timeout; expiry surfaces as a transport error.
    pub timeout: Duration,
}

impl OpenAiConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        OpenAiConfig {
            endpoint: "https://api.openai.com/v1/chat/completions".to_string(),
            api_key: api_key.into(),
            timeout: Duration::from_secs(120),
        }
    }
}

/// [`DocClient`] speaking the OpenAI chat-completions protocol.
pub struct OpenAiClient {
    config: OpenAiConfig,
    http: Client,
}

impl OpenAiClient {
    pub fn new(config: OpenAiConfig) -> Result<Self> {
        if config.api_key.trim().is_empty() {
            return Err(DocgenError::Auth {
                status: 0,
                message: "missing API key".to_string(),
            });
        }
        let http = Client::builder().timeout(config.timeout).build()?;
        info!(endpoint = %config.endpoint, "Initialised documentation client");
        Ok(OpenAiClient { config, http })
    }
}

#[async_trait::async_trait]
impl DocClient for OpenAiClient {
    async fn request(&self, req: &DocRequest) -> std::result::Result<String, DocgenError> {
        let body = request_body(req);
        debug!(path = %req.path, model = %req.model.model, "Sending documentation request");

        let response = self
            .http
            .post(&self.config.endpoint)
            .header(CONTENT_TYPE, "application/json")
            .header(AUTHORIZATION, format!("Bearer {}", self.config.api_key))
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                error!(path = %req.path, error = ?e, "Documentation request failed in transport");
                DocgenError::Transport(e.to_string())
            })?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| DocgenError::Transport(e.to_string()))?;

        if !status.is_success() {
            let err = classify_status(status, &text);
            error!(path = %req.path, status = %status, error = %err, "Documentation backend returned error");
            return Err(err);
        }

        let value: Value = serde_json::from_str(&text)?;
        extract_text(&value)
    }
}
