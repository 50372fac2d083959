//! Live adapter for the `LlmClient` port using the Anthropic messages API.

use std::env;

use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::ports::llm::{CompletionRequest, CompletionResponse, LlmClient, LlmFuture};
use crate::ports::PortError;

const DEFAULT_BASE_URL: &str = "https://api.anthropic.com";
const ANTHROPIC_VERSION: &str = "2023-06-01";

/// Environment variable holding the API key.
pub const API_KEY_VAR: &str = "ANTHROPIC_API_KEY";
/// Environment variable overriding the API base URL.
pub const BASE_URL_VAR: &str = "ANTHROPIC_BASE_URL";

/// Calls the Anthropic messages API with a key captured at construction.
pub struct LiveLlmClient {
    client: Client,
    api_key: String,
    endpoint: String,
}

impl LiveLlmClient {
    /// Creates a client for `base_url` (without the `/v1/messages` suffix).
    #[must_use]
    pub fn new(api_key: impl Into<String>, base_url: &str) -> Self {
        Self {
            client: Client::new(),
            api_key: api_key.into(),
            endpoint: format!("{}/v1/messages", base_url.trim_end_matches('/')),
        }
    }

    /// Builds a client from the environment; `None` when no API key is set.
    #[must_use]
    pub fn from_env() -> Option<Self> {
        let api_key = env::var(API_KEY_VAR).ok().filter(|k| !k.trim().is_empty())?;
        let base_url = env::var(BASE_URL_VAR).unwrap_or_else(|_| DEFAULT_BASE_URL.to_string());
        Some(Self::new(api_key, &base_url))
    }
}

#[derive(Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    messages: [Message<'a>; 1],
}

#[derive(Serialize)]
struct Message<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct MessagesResponse {
    content: Vec<ContentBlock>,
    usage: Usage,
}

/// Only text blocks carry `text`; other block kinds are skipped.
#[derive(Deserialize)]
struct ContentBlock {
    #[serde(default)]
    text: Option<String>,
}

#[derive(Deserialize)]
struct Usage {
    input_tokens: u32,
    output_tokens: u32,
}

#[derive(Deserialize)]
struct ApiError {
    error: ApiErrorDetail,
}

#[derive(Deserialize)]
struct ApiErrorDetail {
    message: String,
}

impl LlmClient for LiveLlmClient {
    fn complete(&self, request: &CompletionRequest) -> LlmFuture<'_> {
        let request = request.clone();

        Box::pin(async move {
            let body = MessagesRequest {
                model: &request.model,
                max_tokens: request.max_tokens,
                messages: [Message { role: "user", content: &request.prompt }],
            };

            let response = self
                .client
                .post(&self.endpoint)
                .header("x-api-key", &self.api_key)
                .header("anthropic-version", ANTHROPIC_VERSION)
                .json(&body)
                .send()
                .await
                .map_err(|e| -> PortError { format!("Anthropic API request failed: {e}").into() })?;

            let status = response.status();
            let text = response
                .text()
                .await
                .map_err(|e| -> PortError {
                    format!("failed to read Anthropic API response: {e}").into()
                })?;

            if !status.is_success() {
                let message = serde_json::from_str::<ApiError>(&text)
                    .map(|e| e.error.message)
                    .unwrap_or(text);
                return Err(format!("Anthropic API error ({}): {message}", status.as_u16()).into());
            }

            let parsed: MessagesResponse = serde_json::from_str(&text)
                .map_err(|e| -> PortError {
                    format!("failed to parse Anthropic API response: {e}").into()
                })?;

            Ok(CompletionResponse {
                text: parsed.content.into_iter().filter_map(|block| block.text).collect(),
                prompt_tokens: parsed.usage.input_tokens,
                completion_tokens: parsed.usage.output_tokens,
            })
        })
    }
}
