//! Grader Error Types
//!
//! This module defines the two error enums used across the grader:
//!
//! - [`GenerationError`] covers everything that can go wrong during a single round-trip
//!   to a text generation provider (missing credentials, transport failures, non-2xx
//!   statuses, empty or undecodable bodies).
//! - [`GradingError`] covers the few failures that abort a grading run outright
//!   (blank inputs, unknown or unsupported diagram types).
//!
//! Malformed structured output from a provider is *not* an error: phases decode it
//! tolerantly and fall back to heuristics (see [`crate::llm::decode::Decoded`]).
//!
//! # Example
//!
//! ```rust
//! use grader::error::GradingError;
//!
//! fn require(text: &str) -> Result<(), GradingError> {
//!     if text.trim().is_empty() {
//!         return Err(GradingError::EmptyInput("student_text".to_string()));
//!     }
//!     Ok(())
//! }
//! ```

use thiserror::Error;

use crate::diagrams::DiagramType;

/// Failure of a single generation round-trip.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum GenerationError {
    /// No API key is configured for the selected provider.
    #[error("missing API key for provider '{0}'")]
    MissingApiKey(String),
    /// The request never produced an HTTP response (DNS, connect, timeout, ...).
    #[error("transport error: {0}")]
    Transport(String),
    /// The provider answered with a non-success status.
    #[error("provider returned status {status}: {message}")]
    Provider { status: u16, message: String },
    /// The provider rejected the call because of its rate limit.
    #[error("rate limited by provider: {0}")]
    RateLimited(String),
    /// The body could not be decoded into the provider's response shape.
    #[error("invalid response body: {0}")]
    InvalidResponse(String),
    /// The response decoded but contained no text.
    #[error("provider returned an empty response")]
    EmptyResponse,
    /// A scripted provider ran out of canned responses.
    #[error("no scripted responses left")]
    Exhausted,
}

/// Failures that abort a grading run.
#[derive(Debug, Error)]
pub enum GradingError {
    /// A required text input was blank.
    #[error("input '{0}' must not be empty")]
    EmptyInput(String),
    /// A diagram type name could not be recognised.
    #[error("invalid diagram type: {0}")]
    InvalidDiagramType(String),
    /// The type is known but no parser is registered for it.
    #[error("unsupported diagram type: {0}")]
    UnsupportedDiagramType(DiagramType),
    #[error(transparent)]
    Generation(#[from] GenerationError),
}
