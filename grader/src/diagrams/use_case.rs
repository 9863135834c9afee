//! Use-case diagram entities.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Actor {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stereotype: Option<String>,
}

impl Actor {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            stereotype: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UseCase {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl UseCase {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: None,
        }
    }
}

/// A link between two named use-case diagram elements.
///
/// `relationship_type` is one of `association`, `include`, `extend`,
/// `generalization` or `dependency`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Relationship {
    pub source: String,
    pub target: String,
    pub relationship_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
}

impl Relationship {
    /// Comparison key used by the metrics engine.
    pub fn key(&self) -> String {
        format!("{}->{}:{}", self.source, self.target, self.relationship_type)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UseCaseDiagram {
    pub actors: Vec<Actor>,
    pub use_cases: Vec<UseCase>,
    pub relationships: Vec<Relationship>,
    pub title: Option<String>,
}

impl UseCaseDiagram {
    pub fn actor_names(&self) -> Vec<&str> {
        self.actors.iter().map(|a| a.name.as_str()).collect()
    }

    pub fn use_case_names(&self) -> Vec<&str> {
        self.use_cases.iter().map(|u| u.name.as_str()).collect()
    }

    pub fn has_element(&self, name: &str) -> bool {
        self.actors.iter().any(|a| a.name == name) || self.use_cases.iter().any(|u| u.name == name)
    }
}
