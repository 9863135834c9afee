//! # Generation Gateway
//!
//! A [`GenerationGateway`] is the only way the grading phases talk to a provider.
//! One gateway is created per grading run and passed explicitly down the call
//! chain, so its call log never mixes entries from concurrent runs.
//!
//! Besides single calls it offers [`GenerationGateway::chain`], which runs prompts
//! strictly in order and feeds each step's output into the next prompt, and
//! [`GenerationGateway::pause`], the rate-limit delay between dependent calls.

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{info, warn};

use super::{GenerationOptions, LlmProvider};
use crate::error::GenerationError;

/// One logged round-trip.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GenerationLogEntry {
    pub timestamp: DateTime<Utc>,
    pub step_label: String,
    pub prompt: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub latency_ms: u64,
    pub model: String,
    pub temperature: f32,
}

impl GenerationLogEntry {
    pub fn succeeded(&self) -> bool {
        self.error.is_none()
    }
}

/// Aggregate view over a gateway's log.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct GenerationLogSummary {
    pub total_calls: usize,
    pub successful_calls: usize,
    pub failed_calls: usize,
    pub total_latency_ms: u64,
    pub average_latency_ms: f64,
    /// Step labels in call order, repeated for retried steps.
    pub steps: Vec<String>,
}

pub struct GenerationGateway {
    provider: Arc<dyn LlmProvider>,
    step_delay: Duration,
    logs: Vec<GenerationLogEntry>,
}

impl GenerationGateway {
    /// Creates a gateway.
    ///
    /// # Arguments
    ///
    /// * `provider` - The backend that performs the round-trips.
    /// * `step_delay` - Pause inserted between dependent calls to respect the
    ///   provider's requests-per-minute budget. Zero disables pausing.
    pub fn new(provider: Arc<dyn LlmProvider>, step_delay: Duration) -> Self {
        Self {
            provider,
            step_delay,
            logs: Vec::new(),
        }
    }

    pub fn provider_name(&self) -> &str {
        self.provider.name()
    }

    pub fn model(&self) -> &str {
        self.provider.model()
    }

    pub fn step_delay(&self) -> Duration {
        self.step_delay
    }

    /// Sleeps for the configured step delay.
    pub async fn pause(&self) {
        if !self.step_delay.is_zero() {
            tokio::time::sleep(self.step_delay).await;
        }
    }

    /// Sleeps for an arbitrary delay (retry backoff).
    pub async fn pause_for(&self, delay: Duration) {
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
    }

    /// One generation round-trip, logged whether it succeeds or not.
    pub async fn generate(&mut self, prompt: &str, options: &GenerationOptions) -> Result<String, GenerationError> {
        let started = Instant::now();
        let timestamp = Utc::now();
        let result = self.provider.generate(prompt, options).await;
        let latency_ms = started.elapsed().as_millis() as u64;

        match &result {
            Ok(text) => info!(
                step = %options.step_label,
                latency_ms,
                chars = text.len(),
                model = %self.provider.model(),
                "generation succeeded"
            ),
            Err(e) => warn!(step = %options.step_label, latency_ms, error = %e, "generation failed"),
        }

        self.logs.push(GenerationLogEntry {
            timestamp,
            step_label: options.step_label.clone(),
            prompt: prompt.to_string(),
            response: result.as_ref().ok().cloned(),
            error: result.as_ref().err().map(|e| e.to_string()),
            latency_ms,
            model: self.provider.model().to_string(),
            temperature: options.temperature,
        });

        result
    }

    /// Runs `prompts` in order, each seeing the previous output and the growing context.
    ///
    /// The step delay is inserted between steps. The first failing step aborts
    /// the chain and its error is returned.
    ///
    /// # Returns
    ///
    /// One output per prompt, in order.
    pub async fn chain(
        &mut self,
        prompts: &[String],
        shared_context: &str,
        options: &GenerationOptions,
    ) -> Result<Vec<String>, GenerationError> {
        let mut outputs: Vec<String> = Vec::with_capacity(prompts.len());
        let mut context = shared_context.trim().to_string();

        for (index, prompt) in prompts.iter().enumerate() {
            if index > 0 {
                self.pause().await;
            }

            let mut full_prompt = prompt.clone();
            if let Some(previous) = outputs.last() {
                full_prompt.push_str("\n\nPREVIOUS STEP OUTPUT:\n");
                full_prompt.push_str(previous);
            }
            if !context.is_empty() {
                full_prompt.push_str("\n\nCONTEXT:\n");
                full_prompt.push_str(&context);
            }

            let step_options =
                options.labelled(format!("{} ({}/{})", options.step_label, index + 1, prompts.len()));
            let output = self.generate(&full_prompt, &step_options).await?;

            context.push_str(&format!("\n\nStep {} output:\n{}", index + 1, output));
            outputs.push(output);
        }

        Ok(outputs)
    }

    pub fn logs(&self) -> &[GenerationLogEntry] {
        &self.logs
    }

    pub fn clear_logs(&mut self) {
        self.logs.clear();
    }

    /// Hands the log over to the caller, leaving the gateway's log empty.
    pub fn take_logs(&mut self) -> Vec<GenerationLogEntry> {
        std::mem::take(&mut self.logs)
    }

    pub fn logs_summary(&self) -> GenerationLogSummary {
        let total_calls = self.logs.len();
        let successful_calls = self.logs.iter().filter(|e| e.succeeded()).count();
        let total_latency_ms: u64 = self.logs.iter().map(|e| e.latency_ms).sum();

        GenerationLogSummary {
            total_calls,
            successful_calls,
            failed_calls: total_calls - successful_calls,
            total_latency_ms,
            average_latency_ms: if total_calls == 0 {
                0.0
            } else {
                total_latency_ms as f64 / total_calls as f64
            },
            steps: self.logs.iter().map(|e| e.step_label.clone()).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::ScriptedProvider;

    fn gateway(provider: ScriptedProvider) -> (GenerationGateway, Arc<ScriptedProvider>) {
        let provider = Arc::new(provider);
        (GenerationGateway::new(provider.clone(), Duration::ZERO), provider)
    }

    #[tokio::test]
    async fn test_generate_logs_success_and_failure() {
        let scripted = ScriptedProvider::with_responses(["hello"]);
        let (mut gw, _) = gateway(scripted);
        let options = GenerationOptions::default().labelled("Step A");

        assert_eq!(gw.generate("p1", &options).await.unwrap(), "hello");
        assert!(gw.generate("p2", &options).await.is_err());

        let logs = gw.logs();
        assert_eq!(logs.len(), 2);
        assert_eq!(logs[0].response.as_deref(), Some("hello"));
        assert!(logs[0].succeeded());
        assert_eq!(logs[1].error.as_deref(), Some("no scripted responses left"));
        assert_eq!(logs[1].model, "scripted-model");

        let summary = gw.logs_summary();
        assert_eq!(summary.total_calls, 2);
        assert_eq!(summary.failed_calls, 1);
        assert_eq!(summary.steps, vec!["Step A", "Step A"]);

        gw.clear_logs();
        assert!(gw.logs().is_empty());
    }

    #[tokio::test]
    async fn test_chain_feeds_previous_output_forward() {
        let (mut gw, provider) = gateway(ScriptedProvider::with_responses(["one", "two"]));
        let prompts = vec!["first prompt".to_string(), "second prompt".to_string()];
        let outputs = gw
            .chain(&prompts, "shared", &GenerationOptions::default().labelled("Chain"))
            .await
            .unwrap();

        assert_eq!(outputs, vec!["one", "two"]);
        let calls = provider.calls();
        assert!(calls[0].prompt.contains("CONTEXT:\nshared"));
        assert!(!calls[0].prompt.contains("PREVIOUS STEP OUTPUT"));
        assert!(calls[1].prompt.contains("PREVIOUS STEP OUTPUT:\none"));
        assert!(calls[1].prompt.contains("Step 1 output:\none"));
        assert_eq!(calls[1].step_label, "Chain (2/2)");
    }

    #[tokio::test]
    async fn test_chain_aborts_on_first_failure() {
        let scripted = ScriptedProvider::new();
        scripted.push_err(GenerationError::Transport("down".into()));
        scripted.push_ok("never used");
        let (mut gw, provider) = gateway(scripted);

        let prompts = vec!["a".to_string(), "b".to_string()];
        let result = gw.chain(&prompts, "", &GenerationOptions::default()).await;
        assert!(matches!(result, Err(GenerationError::Transport(_))));
        assert_eq!(provider.call_count(), 1);
    }

    #[tokio::test]
    async fn test_independent_gateways_keep_separate_logs() {
        let provider: Arc<dyn LlmProvider> = Arc::new(ScriptedProvider::from_fn(|p, _| Ok(p.to_uppercase())));
        let mut first = GenerationGateway::new(provider.clone(), Duration::ZERO);
        let mut second = GenerationGateway::new(provider, Duration::ZERO);

        first.generate("a", &GenerationOptions::default()).await.unwrap();
        second.generate("b", &GenerationOptions::default()).await.unwrap();
        second.generate("c", &GenerationOptions::default()).await.unwrap();

        assert_eq!(first.logs().len(), 1);
        assert_eq!(second.logs().len(), 2);
        assert_eq!(first.take_logs()[0].response.as_deref(), Some("A"));
        assert!(first.logs().is_empty());
    }
}
