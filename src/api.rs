//! Language model access.
//!
//! # Architecture
//!
//! - [`AskAsync`]: the seam every prompt-driven stage talks to
//! - [`ChatCompletionClient`]: an OpenAI-compatible `/v1/chat/completions`
//!   implementation sending a single user message
//!
//! Failures of any kind surface as [`NewsletterError::Model`]; there is no
//! retry, a failed completion fails the run.

use std::time::Instant;

use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, warn};

use crate::config::Config;
use crate::error::{NewsletterError, Result};
use crate::utils::truncate_for_log;

/// Trait for async LLM interaction.
///
/// Implementors send one prompt to a model and hand back the text of its
/// first answer.
pub trait AskAsync {
    /// Send a prompt and wait for the answer.
    ///
    /// # Arguments
    ///
    /// * `prompt` - The complete user message
    ///
    /// # Returns
    ///
    /// The text of the first choice, or [`NewsletterError::Model`] if the
    /// request failed or the answer carried no text.
    async fn ask(&self, prompt: &str) -> Result<String>;
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    error: ApiErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ApiErrorDetail {
    message: String,
}

/// Chat completion client for OpenAI-compatible endpoints.
#[derive(Debug, Clone)]
pub struct ChatCompletionClient {
    http: Client,
    base_url: String,
    api_key: String,
    model: String,
}

impl ChatCompletionClient {
    pub fn new(http: Client, base_url: &str, api_key: &str, model: &str) -> Self {
        Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            model: model.to_string(),
        }
    }

    pub fn from_config(http: Client, config: &Config) -> Self {
        Self::new(
            http,
            &config.settings.endpoints.openai,
            &config.openai_api_key,
            &config.settings.model,
        )
    }
}

impl AskAsync for ChatCompletionClient {
    #[instrument(level = "info", skip_all, fields(model = %self.model, prompt_bytes = prompt.len()))]
    async fn ask(&self, prompt: &str) -> Result<String> {
        let t0 = Instant::now();
        let request = ChatRequest {
            model: &self.model,
            messages: vec![ChatMessage {
                role: "user",
                content: prompt,
            }],
        };

        let response = self
            .http
            .post(format!("{}/v1/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| NewsletterError::Model(format!("completion request failed: {}", e)))?;
        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| NewsletterError::Model(format!("reading completion failed: {}", e)))?;

        if !status.is_success() {
            let detail = serde_json::from_str::<ApiErrorBody>(&body)
                .map(|b| b.error.message)
                .unwrap_or_else(|_| truncate_for_log(&body, 300));
            warn!(%status, elapsed_ms = t0.elapsed().as_millis() as u64, "Completion API error");
            return Err(NewsletterError::Model(format!("HTTP {}: {}", status, detail)));
        }

        let parsed: ChatResponse = serde_json::from_str(&body)
            .map_err(|e| NewsletterError::Model(format!("malformed completion: {}", e)))?;
        let content = parsed
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| NewsletterError::Model("completion returned no choices".to_string()))?
            .message
            .content
            .ok_or_else(|| NewsletterError::Model("first choice has no content".to_string()))?;

        info!(
            elapsed_ms = t0.elapsed().as_millis() as u64,
            bytes = content.len(),
            "Completion received"
        );
        debug!(preview = %truncate_for_log(&content, 300), "Completion text");
        Ok(content)
    }
}
