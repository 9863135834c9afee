//! # Diagram Model
//!
//! Typed representations of the three supported UML diagram kinds, plus the
//! keyword heuristic used to guess a diagram's kind from its source text.
//!
//! - [`use_case`]: actors, use cases and their relationships.
//! - [`class`]: classes with attributes and methods, and class relationships.
//! - [`sequence`]: participants and the messages exchanged between them.
//!
//! Diagrams are plain values. They are built fresh for every grading run by the
//! parsers in [`crate::parsers`] and never shared between runs.

pub mod class;
pub mod sequence;
pub mod use_case;

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::GradingError;

pub use class::{ClassAttribute, ClassDiagram, ClassMethod, ClassRelationship, RelationshipType, UmlClass, Visibility};
pub use sequence::{Message, MessageType, Participant, SequenceDiagram};
pub use use_case::{Actor, Relationship, UseCase, UseCaseDiagram};

/// The supported UML diagram kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiagramType {
    UseCase,
    Class,
    Sequence,
}

/// Keywords that suggest a sequence diagram.
const SEQUENCE_INDICATORS: &[&str] = &[
    "participant", "actor", "boundary", "control", "entity", "->", "->>", "<--", "activate",
    "deactivate",
];

/// Keywords that suggest a class diagram.
const CLASS_INDICATORS: &[&str] = &[
    "class", "interface", "abstract", "enum", "--|>", "*--", "o--", "+", "-", "#", "~",
];

/// Keywords that suggest a use-case diagram.
const USE_CASE_INDICATORS: &[&str] = &["usecase", "actor", "-->", "<<include>>", "<<extend>>"];

impl DiagramType {
    /// Canonical snake_case name, identical to the serde representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            DiagramType::UseCase => "use_case",
            DiagramType::Class => "class",
            DiagramType::Sequence => "sequence",
        }
    }

    /// All supported types, in tie-break priority order.
    pub fn all() -> [DiagramType; 3] {
        [DiagramType::Sequence, DiagramType::Class, DiagramType::UseCase]
    }

    fn indicators(&self) -> &'static [&'static str] {
        match self {
            DiagramType::Sequence => SEQUENCE_INDICATORS,
            DiagramType::Class => CLASS_INDICATORS,
            DiagramType::UseCase => USE_CASE_INDICATORS,
        }
    }
}

impl fmt::Display for DiagramType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DiagramType {
    type Err = GradingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "use_case" | "usecase" | "use case" => Ok(DiagramType::UseCase),
            "class" | "class_diagram" => Ok(DiagramType::Class),
            "sequence" | "sequence_diagram" => Ok(DiagramType::Sequence),
            _ => Err(GradingError::InvalidDiagramType(s.to_string())),
        }
    }
}

/// Guesses the diagram kind of a piece of diagram source.
///
/// Each indicator keyword scores one point when it occurs anywhere in the
/// lowercased text. The highest score wins; ties go to sequence, then class,
/// then use-case. Text with no indicators at all is treated as a use-case
/// diagram.
pub fn detect_type(text: &str) -> DiagramType {
    let lowered = text.to_lowercase();

    let mut best = DiagramType::UseCase;
    let mut best_score = 0usize;
    for kind in DiagramType::all() {
        let score = kind
            .indicators()
            .iter()
            .filter(|indicator| lowered.contains(*indicator))
            .count();
        // strict comparison keeps the earlier (higher priority) type on ties
        if score > best_score {
            best = kind;
            best_score = score;
        }
    }
    best
}

/// A parsed diagram of any supported kind.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "diagram_type", rename_all = "snake_case")]
pub enum Diagram {
    UseCase(UseCaseDiagram),
    Class(ClassDiagram),
    Sequence(SequenceDiagram),
}

impl Diagram {
    /// Builds an empty diagram of the given kind.
    pub fn empty(kind: DiagramType) -> Self {
        match kind {
            DiagramType::UseCase => Diagram::UseCase(UseCaseDiagram::default()),
            DiagramType::Class => Diagram::Class(ClassDiagram::default()),
            DiagramType::Sequence => Diagram::Sequence(SequenceDiagram::default()),
        }
    }

    /// Builds an empty diagram from a type name such as `"class_diagram"`.
    ///
    /// # Errors
    ///
    /// Returns [`GradingError::InvalidDiagramType`] when the name is not recognised.
    pub fn create(type_name: &str) -> Result<Self, GradingError> {
        Ok(Diagram::empty(type_name.parse()?))
    }

    pub fn diagram_type(&self) -> DiagramType {
        match self {
            Diagram::UseCase(_) => DiagramType::UseCase,
            Diagram::Class(_) => DiagramType::Class,
            Diagram::Sequence(_) => DiagramType::Sequence,
        }
    }

    pub fn title(&self) -> Option<&str> {
        match self {
            Diagram::UseCase(d) => d.title.as_deref(),
            Diagram::Class(d) => d.title.as_deref(),
            Diagram::Sequence(d) => d.title.as_deref(),
        }
    }

    pub fn is_empty(&self) -> bool {
        match self {
            Diagram::UseCase(d) => {
                d.actors.is_empty() && d.use_cases.is_empty() && d.relationships.is_empty()
            }
            Diagram::Class(d) => d.classes.is_empty() && d.relationships.is_empty(),
            Diagram::Sequence(d) => d.participants.is_empty() && d.messages.is_empty(),
        }
    }

    /// Compact listing of the diagram's contents, one entity group per line.
    ///
    /// Used to give generation prompts a structured view alongside raw source.
    pub fn summary(&self) -> String {
        let mut lines = vec![format!("Diagram type: {}", self.diagram_type())];
        if let Some(title) = self.title() {
            lines.push(format!("Title: {title}"));
        }

        match self {
            Diagram::UseCase(d) => {
                lines.push(format!("Actors: {}", join_or_none(d.actor_names())));
                lines.push(format!("Use cases: {}", join_or_none(d.use_case_names())));
                for rel in &d.relationships {
                    lines.push(format!("  {} -> {} ({})", rel.source, rel.target, rel.relationship_type));
                }
            }
            Diagram::Class(d) => {
                for class in &d.classes {
                    lines.push(format!(
                        "Class {}: attributes [{}], methods [{}]",
                        class.name,
                        class.attribute_names().join(", "),
                        class.method_names().join(", ")
                    ));
                }
                for rel in &d.relationships {
                    lines.push(format!("  {rel}"));
                }
            }
            Diagram::Sequence(d) => {
                lines.push(format!("Participants: {}", join_or_none(d.participant_names())));
                for message in &d.messages {
                    lines.push(format!("  {message}"));
                }
            }
        }

        lines.join("\n")
    }
}

fn join_or_none(items: Vec<&str>) -> String {
    if items.is_empty() {
        "(none)".to_string()
    } else {
        items.join(", ")
    }
}
