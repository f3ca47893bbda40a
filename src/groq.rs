use async_trait::async_trait;
use log::{debug, error, info};
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::DEFAULT_BASE_URL;

const CHAT_COMPLETIONS_PATH: &str = "/openai/v1/chat/completions";

/// One role-tagged turn in a chat-completion request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GroqMessage {
    pub role: String,
    pub content: String,
}

impl GroqMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".to_string(),
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }
}

#[derive(Serialize)]
struct GroqRequest<'a> {
    model: &'a str,
    messages: &'a [GroqMessage],
    #[serde(rename = "response_format", skip_serializing_if = "Option::is_none")]
    response_format: Option<ResponseFormat>,
}

#[derive(Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    kind: &'static str,
}

#[derive(Deserialize)]
struct GroqResponse {
    choices: Vec<GroqChoice>,
}

#[derive(Deserialize)]
struct GroqChoice {
    message: GroqMessage,
}

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("Groq API error {status}: {body}")]
    Status { status: StatusCode, body: String },
    #[error("no response choices returned")]
    NoChoices,
}

/// The completion seam the interview engine depends on. The production
/// implementation is [`GroqClient`]; tests substitute scripted backends.
#[async_trait]
pub trait ChatBackend: Send + Sync {
    /// Sends one chat-completion request and returns the first choice's
    /// message content. No retry, no streaming.
    async fn complete(
        &self,
        messages: Vec<GroqMessage>,
        model: &str,
        force_json: bool,
    ) -> Result<String, GatewayError>;
}

#[derive(Clone)]
pub struct GroqClient {
    client: Client,
    base_url: String,
    api_key: String,
}

impl GroqClient {
    /// The `reqwest::Client` is injected so the embedding shell owns its
    /// lifetime and connection pool.
    pub fn new(client: Client, api_key: impl Into<String>) -> Self {
        Self {
            client,
            base_url: DEFAULT_BASE_URL.to_string(),
            api_key: api_key.into(),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }
}

#[async_trait]
impl ChatBackend for GroqClient {
    async fn complete(
        &self,
        messages: Vec<GroqMessage>,
        model: &str,
        force_json: bool,
    ) -> Result<String, GatewayError> {
        let request = GroqRequest {
            model,
            messages: &messages,
            response_format: force_json.then_some(ResponseFormat {
                kind: "json_object",
            }),
        };

        info!(
            "Sending chat completion request with model: {} ({} messages)",
            model,
            messages.len()
        );

        let response = self
            .client
            .post(format!("{}{}", self.base_url, CHAT_COMPLETIONS_PATH))
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            error!("Groq API error {}: {}", status, body);
            return Err(GatewayError::Status { status, body });
        }

        let parsed: GroqResponse = response.json().await?;
        let choice = parsed
            .choices
            .into_iter()
            .next()
            .ok_or(GatewayError::NoChoices)?;

        debug!("Received completion ({} chars)", choice.message.content.len());
        Ok(choice.message.content)
    }
}
