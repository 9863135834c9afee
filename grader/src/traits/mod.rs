//!
//! Traits Module
//!
//! Core traits used at the seams of the grader.
//!
//! - [`parser`]: Converts diagram source text into a typed [`crate::diagrams::Diagram`].
//!
//! The generation provider seam lives with its implementations in [`crate::llm`].

pub mod parser;
