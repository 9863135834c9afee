//! Offline provider that replays canned answers.
//!
//! Queued responses are served first, in order. Once the queue is empty the
//! optional responder closure answers; without one the provider fails with
//! [`GenerationError::Exhausted`]. Every call is recorded so tests can inspect
//! the prompts a phase produced.

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;

use super::{GenerationOptions, LlmProvider};
use crate::error::GenerationError;

type Responder = Box<dyn Fn(&str, &GenerationOptions) -> Result<String, GenerationError> + Send + Sync>;

/// One recorded round-trip.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedCall {
    pub step_label: String,
    pub prompt: String,
    pub temperature: f32,
}

pub struct ScriptedProvider {
    queue: Mutex<VecDeque<Result<String, GenerationError>>>,
    responder: Option<Responder>,
    calls: Mutex<Vec<RecordedCall>>,
}

impl Default for ScriptedProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl ScriptedProvider {
    pub fn new() -> Self {
        Self {
            queue: Mutex::new(VecDeque::new()),
            responder: None,
            calls: Mutex::new(Vec::new()),
        }
    }

    /// A provider that serves `responses` in order.
    pub fn with_responses<I, S>(responses: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let provider = Self::new();
        for response in responses {
            provider.push_ok(response);
        }
        provider
    }

    /// A provider that answers every call through `responder`.
    pub fn from_fn<F>(responder: F) -> Self
    where
        F: Fn(&str, &GenerationOptions) -> Result<String, GenerationError> + Send + Sync + 'static,
    {
        Self {
            responder: Some(Box::new(responder)),
            ..Self::new()
        }
    }

    /// A provider whose every call fails with `error`.
    pub fn failing(error: GenerationError) -> Self {
        Self::from_fn(move |_, _| Err(error.clone()))
    }

    pub fn push_ok(&self, response: impl Into<String>) {
        self.lock_queue().push_back(Ok(response.into()));
    }

    pub fn push_err(&self, error: GenerationError) {
        self.lock_queue().push_back(Err(error));
    }

    /// All calls received so far.
    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap_or_else(|poisoned| poisoned.into_inner()).len()
    }

    fn lock_queue(&self) -> std::sync::MutexGuard<'_, VecDeque<Result<String, GenerationError>>> {
        self.queue.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[async_trait]
impl LlmProvider for ScriptedProvider {
    fn name(&self) -> &str {
        "scripted"
    }

    fn model(&self) -> &str {
        "scripted-model"
    }

    async fn generate(&self, prompt: &str, options: &GenerationOptions) -> Result<String, GenerationError> {
        self.calls
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(RecordedCall {
                step_label: options.step_label.clone(),
                prompt: prompt.to_string(),
                temperature: options.temperature,
            });

        if let Some(next) = self.lock_queue().pop_front() {
            return next;
        }
        match &self.responder {
            Some(responder) => responder(prompt, options),
            None => Err(GenerationError::Exhausted),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_queue_then_exhausted() {
        let provider = ScriptedProvider::with_responses(["first", "second"]);
        let options = GenerationOptions::default();
        assert_eq!(provider.generate("a", &options).await.unwrap(), "first");
        assert_eq!(provider.generate("b", &options).await.unwrap(), "second");
        assert_eq!(provider.generate("c", &options).await, Err(GenerationError::Exhausted));
        assert_eq!(provider.call_count(), 3);
        assert_eq!(provider.calls()[1].prompt, "b");
    }

    #[tokio::test]
    async fn test_responder_sees_step_label() {
        let provider = ScriptedProvider::from_fn(|_, options| Ok(options.step_label.clone()));
        let options = GenerationOptions::default().labelled("Step X");
        assert_eq!(provider.generate("p", &options).await.unwrap(), "Step X");
    }

    #[tokio::test]
    async fn test_queued_errors_are_returned() {
        let provider = ScriptedProvider::new();
        provider.push_err(GenerationError::RateLimited("busy".into()));
        let result = provider.generate("p", &GenerationOptions::default()).await;
        assert!(matches!(result, Err(GenerationError::RateLimited(_))));
    }

    #[tokio::test]
    async fn test_failing_provider() {
        let provider = ScriptedProvider::failing(GenerationError::Transport("offline".into()));
        for _ in 0..3 {
            assert!(provider.generate("p", &GenerationOptions::default()).await.is_err());
        }
    }
}
