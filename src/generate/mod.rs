//! The generation collaborator: classification and flowchart generation on
//! top of the [`LlmClient`] port.

pub mod prompt;

use std::time::Duration;

use thiserror::Error;

use crate::changes::semantic::parse_classification;
use crate::changes::{ChangeRecord, ExtractError};
use crate::config::LlmConfig;
use crate::ports::{CompletionRequest, LlmClient};

pub use prompt::PipelineMetadata;

/// Failures talking to the model or reading its flowchart answer.
#[derive(Debug, Error)]
pub enum GenerationError {
    /// Transport, auth or API failure.
    #[error("LLM request failed: {0}")]
    Llm(String),
    /// No answer within the configured timeout.
    #[error("LLM request timed out after {0}s")]
    Timeout(u64),
    /// The answer contained no flowchart header.
    #[error("response contains no flowchart: {0}")]
    NoFlowchart(String),
}

/// Wraps an [`LlmClient`] with the configured model, token limit and timeout.
pub struct Generator<'a> {
    llm: &'a dyn LlmClient,
    config: &'a LlmConfig,
}

impl<'a> Generator<'a> {
    /// Creates a generator.
    #[must_use]
    pub fn new(llm: &'a dyn LlmClient, config: &'a LlmConfig) -> Self {
        Self { llm, config }
    }

    /// Sends `prompt` and returns the raw answer text.
    ///
    /// # Errors
    ///
    /// Returns [`GenerationError::Llm`] or [`GenerationError::Timeout`].
    pub async fn complete(&self, prompt: String) -> Result<String, GenerationError> {
        let request = CompletionRequest {
            model: self.config.model.clone(),
            prompt,
            max_tokens: self.config.max_tokens,
        };
        log::debug!(
            model = request.model.as_str(),
            chars = request.prompt.len();
            "sending completion request"
        );
        let limit = Duration::from_secs(self.config.timeout_secs);
        let response = tokio::time::timeout(limit, self.llm.complete(&request))
            .await
            .map_err(|_| GenerationError::Timeout(self.config.timeout_secs))?
            .map_err(|e| GenerationError::Llm(e.to_string()))?;
        log::debug!(
            prompt_tokens = response.prompt_tokens,
            completion_tokens = response.completion_tokens;
            "completion received"
        );
        Ok(response.text)
    }

    /// Classifies a diff into change records.
    ///
    /// # Errors
    ///
    /// Returns [`ExtractError::Generation`] when the model is unreachable and
    /// [`ExtractError::Classification`] when its answer is unusable.
    pub async fn classify(&self, diff: &str) -> Result<Vec<ChangeRecord>, ExtractError> {
        let raw = self.complete(prompt::classification(diff)).await?;
        parse_classification(&raw)
    }

    /// Sends a generation prompt and returns the flowchart text of the answer.
    ///
    /// # Errors
    ///
    /// Returns [`GenerationError`] if the request fails or the answer holds
    /// no flowchart.
    pub async fn generate(&self, prompt: String) -> Result<String, GenerationError> {
        let raw = self.complete(prompt).await?;
        flowchart_text(&raw)
    }
}

/// Removes a surrounding markdown code fence, if any, and trims.
#[must_use]
pub fn strip_code_fences(text: &str) -> String {
    let trimmed = text.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed.to_string();
    };
    // Drop the info string (`mermaid`, `json`, ...).
    let body = rest.split_once('\n').map_or("", |(_, body)| body);
    let body = body.trim_end();
    body.strip_suffix("```").unwrap_or(body).trim().to_string()
}

/// The answer from its first `flowchart`/`graph` line onward.
fn flowchart_text(raw: &str) -> Result<String, GenerationError> {
    let body = strip_code_fences(raw);
    let mut offset = 0;
    for line in body.split_inclusive('\n') {
        let head = line.trim_start();
        if head.starts_with("flowchart") || head.starts_with("graph ") {
            let chart = body[offset..].trim();
            // A trailing fence survives when the model wrote prose before it.
            let chart = chart.strip_suffix("```").unwrap_or(chart).trim_end();
            return Ok(format!("{chart}\n"));
        }
        offset += line.len();
    }
    Err(GenerationError::NoFlowchart(raw.chars().take(200).collect()))
}
