//! # Text Generation
//!
//! Access to the external text generation service used by the normalization and
//! feedback phases.
//!
//! - [`LlmProvider`] is the seam: one `generate` round-trip per call. Implementations
//!   exist for Google Gemini ([`gemini::GeminiProvider`]), OpenAI-compatible chat APIs
//!   ([`openai::OpenAiProvider`]) and offline tests ([`scripted::ScriptedProvider`]).
//! - [`gateway::GenerationGateway`] wraps a provider for one grading run. It adds the
//!   per-run call log, chained prompts and the rate-limit pause between steps.
//! - [`decode`] holds the tolerant parsers used to read structured answers.
//!
//! Providers are selected from configuration with [`provider_from_config`].

pub mod decode;
pub mod gateway;
pub mod gemini;
pub mod openai;
pub mod scripted;

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use util::config::AppConfig;

use crate::error::GenerationError;

pub use gateway::{GenerationGateway, GenerationLogEntry, GenerationLogSummary};
pub use gemini::GeminiProvider;
pub use openai::OpenAiProvider;
pub use scripted::ScriptedProvider;

/// Per-call generation settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationOptions {
    pub temperature: f32,
    pub max_tokens: u32,
    /// Human-readable name of the pipeline step issuing the call.
    pub step_label: String,
}

impl Default for GenerationOptions {
    fn default() -> Self {
        Self {
            temperature: 0.1,
            max_tokens: 2000,
            step_label: "generation".to_string(),
        }
    }
}

impl GenerationOptions {
    pub fn new(temperature: f32, max_tokens: u32) -> Self {
        Self {
            temperature,
            max_tokens,
            ..Default::default()
        }
    }

    /// Same settings, relabelled for another step.
    pub fn labelled(&self, step_label: impl Into<String>) -> Self {
        Self {
            step_label: step_label.into(),
            ..self.clone()
        }
    }
}

/// A text generation backend.
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Short provider identifier, e.g. `gemini`.
    fn name(&self) -> &str;

    /// Model identifier sent with each request.
    fn model(&self) -> &str;

    /// Performs one generation round-trip.
    ///
    /// # Errors
    ///
    /// Returns a [`GenerationError`] on transport failure, a non-success status, or a
    /// body without usable text.
    async fn generate(&self, prompt: &str, options: &GenerationOptions) -> Result<String, GenerationError>;
}

/// Maps a non-success HTTP status and body to a [`GenerationError`].
pub fn status_error(status: u16, body: &str, provider: &str) -> GenerationError {
    match status {
        401 => GenerationError::Provider {
            status,
            message: format!("{provider}: invalid API key"),
        },
        403 => GenerationError::Provider {
            status,
            message: format!("{provider}: access denied"),
        },
        429 => GenerationError::RateLimited(body.to_string()),
        _ => GenerationError::Provider {
            status,
            message: body.to_string(),
        },
    }
}

/// Builds the provider named by `llm_provider` in the configuration.
///
/// # Errors
///
/// Returns [`GenerationError::MissingApiKey`] when the selected provider has no key,
/// or [`GenerationError::Transport`] when the HTTP client cannot be built.
pub fn provider_from_config(config: &AppConfig) -> Result<Arc<dyn LlmProvider>, GenerationError> {
    match config.llm_provider.as_str() {
        "openai" => Ok(Arc::new(OpenAiProvider::from_config(config)?)),
        _ => Ok(Arc::new(GeminiProvider::from_config(config)?)),
    }
}
