//! LLM client port for language-model completions.

use std::future::Future;
use std::pin::Pin;

use serde::{Deserialize, Serialize};

use super::PortError;

/// Boxed future returned by [`LlmClient::complete`], keeping the trait dyn-compatible.
pub type LlmFuture<'a> =
    Pin<Box<dyn Future<Output = Result<CompletionResponse, PortError>> + Send + 'a>>;

/// A single-prompt completion request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompletionRequest {
    /// The model identifier (e.g. `"claude-sonnet-4-5"`).
    pub model: String,
    /// The prompt text.
    pub prompt: String,
    /// Maximum number of tokens to generate.
    pub max_tokens: u32,
}

/// The response from an LLM completion call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompletionResponse {
    /// The generated text.
    pub text: String,
    /// Number of prompt tokens consumed.
    pub prompt_tokens: u32,
    /// Number of completion tokens generated.
    pub completion_tokens: u32,
}

/// Sends completion requests to a language model.
pub trait LlmClient: Send + Sync {
    /// Generates a completion for the given request.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails (network, auth, rate-limit, etc.).
    fn complete(&self, request: &CompletionRequest) -> LlmFuture<'_>;
}
