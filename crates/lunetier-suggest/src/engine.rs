//! Completion engines able to answer styling prompts.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::error::{SuggestError, SuggestResult};

const OPENROUTER_URL: &str = "https://openrouter.ai/api/v1/chat/completions";

/// Low temperature keeps the reply close to the requested JSON shape.
const TEMPERATURE: f64 = 0.6;
const MAX_TOKENS: u32 = 300;
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Backend able to complete a system/user prompt pair into assistant text.
#[async_trait]
pub trait SuggestionEngine: Send + Sync {
    /// Run one completion and return the raw assistant reply.
    ///
    /// # Errors
    ///
    /// Returns an error if the completion endpoint is unreachable, rejects
    /// the request, or answers without content.
    async fn complete(&self, system: &str, user: &str) -> SuggestResult<String>;
}

/// Connection settings for the hosted completion endpoint.
#[derive(Clone)]
pub struct OpenRouterSettings {
    /// Bearer token authorising the request.
    pub api_key: String,
    /// Model identifier routed by the endpoint.
    pub model: String,
    /// Referer URL attributed to the calling site.
    pub referer: String,
    /// Display title attributed to the calling site.
    pub title: String,
}

/// `OpenRouter` chat-completions client.
pub struct OpenRouterClient {
    client: Client,
    endpoint: String,
    settings: OpenRouterSettings,
}

impl OpenRouterClient {
    /// Build a client with a freshly configured HTTP transport.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying HTTP client cannot be constructed.
    pub fn new(settings: OpenRouterSettings) -> SuggestResult<Self> {
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|source| SuggestError::Upstream { source })?;
        Ok(Self::with_client(client, settings))
    }

    /// Build a client reusing an existing HTTP transport.
    #[must_use]
    pub fn with_client(client: Client, settings: OpenRouterSettings) -> Self {
        Self {
            client,
            endpoint: OPENROUTER_URL.to_string(),
            settings,
        }
    }

    #[cfg(test)]
    fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }
}

#[async_trait]
impl SuggestionEngine for OpenRouterClient {
    async fn complete(&self, system: &str, user: &str) -> SuggestResult<String> {
        let body = ChatRequest {
            model: &self.settings.model,
            temperature: TEMPERATURE,
            max_tokens: MAX_TOKENS,
            messages: [
                ChatMessage {
                    role: "system",
                    content: system,
                },
                ChatMessage {
                    role: "user",
                    content: user,
                },
            ],
        };
        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.settings.api_key)
            .header("HTTP-Referer", &self.settings.referer)
            .header("X-Title", &self.settings.title)
            .json(&body)
            .send()
            .await
            .map_err(|source| SuggestError::Upstream { source })?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            tracing::error!(
                status = status.as_u16(),
                detail = %detail,
                "completion endpoint rejected the request"
            );
            return Err(SuggestError::Rejected {
                status: status.as_u16(),
            });
        }

        let payload: ChatResponse = response
            .json()
            .await
            .map_err(|source| SuggestError::Upstream { source })?;
        payload
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message)
            .and_then(|message| message.content)
            .filter(|content| !content.is_empty())
            .ok_or(SuggestError::EmptyReply)
    }
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    temperature: f64,
    max_tokens: u32,
    messages: [ChatMessage<'a>; 2],
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    #[serde(default)]
    message: Option<AssistantMessage>,
}

#[derive(Deserialize)]
struct AssistantMessage {
    #[serde(default)]
    content: Option<String>,
}
