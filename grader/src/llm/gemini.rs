//! # Gemini Provider
//!
//! [`LlmProvider`] implementation for Google's Gemini `generateContent` REST API.
//!
//! ## Environment
//!
//! - `GEMINI_API_KEY` must be set; `GEMINI_MODEL` selects the model
//!   (default `gemini-2.5-flash`).
//!
//! Thinking is disabled (`thinking_budget = 0`) so calls stay fast and the whole
//! token budget goes to the visible answer.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;
use util::config::AppConfig;

use super::{GenerationOptions, LlmProvider, status_error};
use crate::error::GenerationError;

const BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta/models";

/// Request body for the Gemini API.
#[derive(Serialize)]
struct GeminiRequest {
    /// The content to send to the LLM.
    contents: Vec<Content>,
    generation_config: GenerationConfig,
}

/// Content wrapper for the Gemini API request.
#[derive(Serialize)]
struct Content {
    parts: Vec<Part>,
}

#[derive(Serialize)]
struct Part {
    text: String,
}

/// Response from the Gemini API.
#[derive(Deserialize)]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Deserialize)]
struct Candidate {
    content: Option<ContentResponse>,
}

#[derive(Deserialize)]
struct ContentResponse {
    #[serde(default)]
    parts: Vec<PartResponse>,
}

#[derive(Deserialize)]
struct PartResponse {
    #[serde(default)]
    text: String,
}

/// Sampling settings for one request.
#[derive(Serialize)]
struct GenerationConfig {
    temperature: f32,
    max_output_tokens: u32,
    thinking_config: ThinkingConfig,
}

/// Configuration for the LLM's thinking process.
#[derive(Serialize)]
struct ThinkingConfig {
    /// Set to 0 to disable thinking for faster requests.
    thinking_budget: u32,
}

/// Gemini-backed text generation.
pub struct GeminiProvider {
    client: reqwest::Client,
    api_key: String,
    model: String,
    base_url: String,
}

impl GeminiProvider {
    /// Creates a provider for the given key and model.
    ///
    /// # Errors
    ///
    /// [`GenerationError::MissingApiKey`] for a blank key, [`GenerationError::Transport`]
    /// when the HTTP client cannot be built.
    pub fn new(api_key: impl Into<String>, model: impl Into<String>, timeout: Duration) -> Result<Self, GenerationError> {
        let api_key = api_key.into();
        if api_key.trim().is_empty() {
            return Err(GenerationError::MissingApiKey("gemini".to_string()));
        }
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| GenerationError::Transport(e.to_string()))?;

        Ok(Self {
            client,
            api_key,
            model: model.into(),
            base_url: BASE_URL.to_string(),
        })
    }

    pub fn from_config(config: &AppConfig) -> Result<Self, GenerationError> {
        Self::new(
            config.gemini_api_key.clone(),
            config.gemini_model.clone(),
            Duration::from_secs(config.llm_timeout_secs),
        )
    }

    /// Points the provider at a different endpoint root (proxies, tests).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    fn extract_text(response: GeminiResponse) -> Result<String, GenerationError> {
        let text: String = response
            .candidates
            .into_iter()
            .next()
            .and_then(|candidate| candidate.content)
            .map(|content| content.parts.into_iter().map(|p| p.text).collect())
            .unwrap_or_default();

        if text.trim().is_empty() {
            Err(GenerationError::EmptyResponse)
        } else {
            Ok(text)
        }
    }
}

#[async_trait]
impl LlmProvider for GeminiProvider {
    fn name(&self) -> &str {
        "gemini"
    }

    fn model(&self) -> &str {
        &self.model
    }

    async fn generate(&self, prompt: &str, options: &GenerationOptions) -> Result<String, GenerationError> {
        let request_body = GeminiRequest {
            contents: vec![Content {
                parts: vec![Part {
                    text: prompt.to_string(),
                }],
            }],
            generation_config: GenerationConfig {
                temperature: options.temperature,
                max_output_tokens: options.max_tokens,
                thinking_config: ThinkingConfig { thinking_budget: 0 },
            },
        };

        let response = self
            .client
            .post(format!("{}/{}:generateContent?key={}", self.base_url, self.model, self.api_key))
            .json(&request_body)
            .send()
            .await
            .map_err(|e| GenerationError::Transport(e.to_string()))?;

        let status = response.status();
        let response_text = response
            .text()
            .await
            .map_err(|e| GenerationError::Transport(e.to_string()))?;

        if !status.is_success() {
            return Err(status_error(status.as_u16(), &response_text, self.name()));
        }
        debug!(model = %self.model, bytes = response_text.len(), "gemini response received");

        let response = serde_json::from_str::<GeminiResponse>(&response_text).map_err(|e| {
            GenerationError::InvalidResponse(format!(
                "error decoding response body: {}. Full response: {}",
                e, response_text
            ))
        })?;
        Self::extract_text(response)
    }
}
