//! Diagram Parser Trait
//!
//! This module defines the [`DiagramParser`] trait, the common interface of the
//! per-kind diagram parsers. Implementations convert diagram source text into a
//! typed [`Diagram`] of their kind.
//!
//! Parsing is lenient: lines that match none of a parser's patterns are skipped,
//! so a parser never fails and always yields a (possibly empty) diagram.
//!
//! # Example
//!
//! ```rust
//! use grader::diagrams::{Diagram, DiagramType};
//! use grader::traits::parser::DiagramParser;
//!
//! struct EmptyParser;
//!
//! impl DiagramParser for EmptyParser {
//!     fn diagram_type(&self) -> DiagramType {
//!         DiagramType::UseCase
//!     }
//!
//!     fn parse(&self, _text: &str) -> Diagram {
//!         Diagram::empty(DiagramType::UseCase)
//!     }
//! }
//!
//! assert!(EmptyParser.parse("@startuml\n@enduml").is_empty());
//! ```

use crate::diagrams::{Diagram, DiagramType};

/// Converts diagram source text into a typed [`Diagram`].
pub trait DiagramParser: Send + Sync {
    /// The kind of diagram this parser produces.
    fn diagram_type(&self) -> DiagramType;

    /// Parse diagram source text.
    ///
    /// # Arguments
    ///
    /// * `text` - Raw diagram source, including any `@startuml`/`@enduml` markers.
    ///
    /// # Returns
    ///
    /// A diagram of [`DiagramParser::diagram_type`]. Unrecognised lines are ignored.
    fn parse(&self, text: &str) -> Diagram;
}
