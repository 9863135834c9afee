//! Template-based improvement suggestions.
//!
//! Templates are looked up by diagram type and error category, falling back to
//! a generic template for the category. Categories with no template produce no
//! suggestion.

use std::collections::BTreeMap;

use serde::Serialize;

use super::error_analyzer::{ErrorAnalysisResult, ErrorCategory, INCORRECT_RELATIONSHIPS, MISSING_COMPONENTS};
use crate::diagrams::DiagramType;
use crate::metrics::DiagramMetrics;
use crate::types::Severity;

/// Priority of a suggestion, also used for estimated impact.
///
/// Declaration order is the presentation order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Level {
    High,
    Medium,
    Low,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Suggestion {
    pub category: String,
    pub priority: Level,
    pub title: String,
    pub description: String,
    pub action_steps: Vec<String>,
    pub examples: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SuggestionResult {
    pub diagram_type: DiagramType,
    pub suggestions: Vec<Suggestion>,
    /// Suggestion titles, high priority first.
    pub priority_order: Vec<String>,
    pub estimated_impact: BTreeMap<String, Level>,
}

struct Template {
    title: &'static str,
    /// May contain `{count}` and `{examples}`.
    description: &'static str,
    action_steps: &'static [&'static str],
    examples: &'static [&'static str],
}

const USE_CASE_MISSING: &[Template] = &[
    Template {
        title: "Add Missing Actors",
        description: "Your diagram is missing {count} essential actors. Examples: {examples}",
        action_steps: &[
            "Review the problem requirements to identify all user types",
            "Add actor declarations using 'actor ActorName' syntax",
            "Ensure actor names use PascalCase convention",
            "Connect actors to relevant use cases with associations",
        ],
        examples: &["actor Administrator", "actor Customer"],
    },
    Template {
        title: "Add Missing Use Cases",
        description: "Your diagram is missing {count} important use cases. Examples: {examples}",
        action_steps: &[
            "Identify all system functions from the requirements",
            "Add use case declarations using 'usecase \"Name\" as UC1' syntax",
            "Use descriptive names that clearly indicate the function",
            "Group related use cases logically",
        ],
        examples: &["usecase \"Manage Users\" as UC1", "usecase \"Generate Reports\" as UC2"],
    },
];

const USE_CASE_RELATIONSHIPS: &[Template] = &[Template {
    title: "Fix Actor-Use Case Relationships",
    description: "Found {count} incorrect relationships between actors and use cases",
    action_steps: &[
        "Review which actors should interact with which use cases",
        "Use simple arrows: Actor --> UseCase",
        "Ensure all primary actors are connected to their use cases",
        "Add secondary actors where appropriate",
    ],
    examples: &["User --> UC1", "Administrator --> UC2"],
}];

const USE_CASE_NAMING: &[Template] = &[Template {
    title: "Improve Naming Conventions",
    description: "Found {count} naming convention issues in your diagram",
    action_steps: &[
        "Use PascalCase for actor names (e.g., 'User', not 'user')",
        "Use descriptive phrases for use cases (e.g., 'Login to System')",
        "Be consistent with naming throughout the diagram",
        "Avoid abbreviations unless they're well-known",
    ],
    examples: &["actor User", "usecase \"Login to System\""],
}];

const CLASS_MISSING: &[Template] = &[Template {
    title: "Add Missing Classes",
    description: "Your diagram is missing {count} essential classes. Examples: {examples}",
    action_steps: &[
        "Identify all entities from the problem domain",
        "Add class declarations using 'class ClassName' syntax",
        "Include attributes and methods for each class",
        "Consider inheritance and composition relationships",
    ],
    examples: &["class User", "class Product"],
}];

const CLASS_RELATIONSHIPS: &[Template] = &[Template {
    title: "Fix Class Relationships",
    description: "Found {count} incorrect relationships between classes",
    action_steps: &[
        "Use appropriate relationship types (inheritance: --|>, composition: *--, aggregation: o--)",
        "Ensure relationship directions are correct",
        "Add multiplicity where appropriate",
        "Consider the semantic meaning of each relationship",
    ],
    examples: &["User --|> Person", "Order *-- OrderItem"],
}];

const GENERIC_MISSING: &[Template] = &[Template {
    title: "Add Missing Components",
    description: "Your diagram is missing {count} essential components",
    action_steps: &[
        "Review the problem requirements carefully",
        "Identify all necessary components for your diagram type",
        "Add missing components using proper syntax",
        "Ensure all components serve a purpose in the system",
    ],
    examples: &[],
}];

const GENERIC_RELATIONSHIPS: &[Template] = &[Template {
    title: "Fix Relationships",
    description: "Found {count} incorrect relationships in your diagram",
    action_steps: &[
        "Review the semantic meaning of each relationship",
        "Use appropriate relationship syntax for your diagram type",
        "Ensure relationships reflect the actual system design",
        "Check relationship directions and multiplicities",
    ],
    examples: &[],
}];

const GENERIC_NAMING: &[Template] = &[Template {
    title: "Improve Naming Conventions",
    description: "Found {count} naming issues in your diagram",
    action_steps: &[
        "Use consistent naming conventions throughout",
        "Choose descriptive, meaningful names",
        "Follow standard conventions for your diagram type",
        "Avoid abbreviations and unclear terms",
    ],
    examples: &[],
}];

const GENERIC_STRUCTURE: &[Template] = &[Template {
    title: "Fix Structural Issues",
    description: "Your diagram has {count} structural problems",
    action_steps: &[
        "Review the overall organization of your diagram",
        "Ensure proper grouping of related elements",
        "Check for missing or redundant components",
        "Verify that the structure matches the requirements",
    ],
    examples: &[],
}];

fn templates(kind: DiagramType, category: &str) -> &'static [Template] {
    let specific: &'static [Template] = match (kind, category) {
        (DiagramType::UseCase, MISSING_COMPONENTS) => USE_CASE_MISSING,
        (DiagramType::UseCase, INCORRECT_RELATIONSHIPS) => USE_CASE_RELATIONSHIPS,
        (DiagramType::UseCase, "naming_issues") => USE_CASE_NAMING,
        (DiagramType::Class, MISSING_COMPONENTS) => CLASS_MISSING,
        (DiagramType::Class, INCORRECT_RELATIONSHIPS) => CLASS_RELATIONSHIPS,
        _ => &[],
    };
    if !specific.is_empty() {
        return specific;
    }

    match category {
        MISSING_COMPONENTS => GENERIC_MISSING,
        INCORRECT_RELATIONSHIPS => GENERIC_RELATIONSHIPS,
        "naming_issues" => GENERIC_NAMING,
        "structural_problems" => GENERIC_STRUCTURE,
        _ => &[],
    }
}

/// Critical, or high with more than two occurrences, is high priority.
pub fn priority(severity: Severity, count: usize) -> Level {
    match severity {
        Severity::Critical => Level::High,
        Severity::High if count > 2 => Level::High,
        Severity::High => Level::Medium,
        Severity::Medium if count > 3 => Level::Medium,
        _ => Level::Low,
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SuggestionEngine;

impl SuggestionEngine {
    pub fn new() -> Self {
        Self
    }

    pub fn generate(&self, errors: &ErrorAnalysisResult, metrics: &DiagramMetrics) -> SuggestionResult {
        let suggestions: Vec<Suggestion> = errors
            .error_categories
            .iter()
            .flat_map(|category| Self::for_category(category, errors.diagram_type))
            .collect();

        let mut ranked: Vec<&Suggestion> = suggestions.iter().collect();
        ranked.sort_by_key(|s| s.priority);
        let priority_order = ranked.into_iter().map(|s| s.title.clone()).collect();

        let f1 = metrics.overall_metrics.f1_score;
        let mut estimated_impact = BTreeMap::new();
        for suggestion in &suggestions {
            estimated_impact
                .entry(suggestion.category.clone())
                .or_insert_with(|| match suggestion.category.as_str() {
                    MISSING_COMPONENTS | INCORRECT_RELATIONSHIPS if f1 < 0.5 => Level::High,
                    MISSING_COMPONENTS | INCORRECT_RELATIONSHIPS if f1 < 0.8 => Level::Medium,
                    MISSING_COMPONENTS | INCORRECT_RELATIONSHIPS => Level::Low,
                    _ => Level::Medium,
                });
        }

        SuggestionResult {
            diagram_type: errors.diagram_type,
            suggestions,
            priority_order,
            estimated_impact,
        }
    }

    fn for_category(category: &ErrorCategory, kind: DiagramType) -> Vec<Suggestion> {
        let examples = category
            .examples
            .iter()
            .take(2)
            .map(String::as_str)
            .collect::<Vec<_>>()
            .join(", ");

        templates(kind, &category.category)
            .iter()
            .map(|template| Suggestion {
                category: category.category.clone(),
                priority: priority(category.severity, category.count),
                title: template.title.to_string(),
                description: template
                    .description
                    .replace("{count}", &category.count.to_string())
                    .replace("{examples}", &examples),
                action_steps: template.action_steps.iter().map(|s| s.to_string()).collect(),
                examples: template.examples.iter().map(|s| s.to_string()).collect(),
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::MetricsEngine;
    use crate::parsers::parser_for;

    fn category(name: &str, severity: Severity, count: usize, examples: &[&str]) -> ErrorCategory {
        ErrorCategory {
            category: name.to_string(),
            severity,
            count,
            description: String::new(),
            examples: examples.iter().map(|e| e.to_string()).collect(),
        }
    }

    fn analysis(kind: DiagramType, categories: Vec<ErrorCategory>) -> ErrorAnalysisResult {
        ErrorAnalysisResult {
            diagram_type: kind,
            total_errors: categories.len(),
            error_categories: categories,
            severity_breakdown: BTreeMap::new(),
            primary_issues: Vec::new(),
            confidence: 0.8,
        }
    }

    fn metrics(kind: DiagramType, teacher: &str, student: &str) -> DiagramMetrics {
        let parser = parser_for(kind);
        MetricsEngine::default()
            .compare(&parser.parse(teacher), &parser.parse(student), kind)
            .unwrap()
    }

    #[test]
    fn test_priority_rules() {
        assert_eq!(priority(Severity::Critical, 1), Level::High);
        assert_eq!(priority(Severity::High, 3), Level::High);
        assert_eq!(priority(Severity::High, 2), Level::Medium);
        assert_eq!(priority(Severity::Medium, 4), Level::Medium);
        assert_eq!(priority(Severity::Medium, 3), Level::Low);
        assert_eq!(priority(Severity::Low, 10), Level::Low);
    }

    #[test]
    fn test_use_case_templates_and_ordering() {
        let errors = analysis(
            DiagramType::UseCase,
            vec![
                category("naming_issues", Severity::Low, 1, &[]),
                category(MISSING_COMPONENTS, Severity::Critical, 2, &["Admin", "Guest", "Auditor"]),
                category("semantic_errors", Severity::High, 5, &[]),
            ],
        );
        let m = metrics(
            DiagramType::UseCase,
            "@startuml\nactor User\nactor Admin\n@enduml",
            "@startuml\nactor Guest\n@enduml",
        );
        let result = SuggestionEngine::new().generate(&errors, &m);

        assert_eq!(result.suggestions.len(), 3);
        assert_eq!(
            result.suggestions[1].description,
            "Your diagram is missing 2 essential actors. Examples: Admin, Guest"
        );
        assert_eq!(
            result.priority_order,
            vec!["Add Missing Actors", "Add Missing Use Cases", "Improve Naming Conventions"]
        );
        assert_eq!(result.estimated_impact[MISSING_COMPONENTS], Level::High);
        assert_eq!(result.estimated_impact["naming_issues"], Level::Medium);
        assert!(!result.estimated_impact.contains_key("semantic_errors"));
    }

    #[test]
    fn test_generic_fallback_for_sequence() {
        let errors = analysis(
            DiagramType::Sequence,
            vec![category(INCORRECT_RELATIONSHIPS, Severity::Medium, 2, &[])],
        );
        let text = "@startuml\nparticipant A\nparticipant B\nA -> B : ping\n@enduml";
        let m = metrics(DiagramType::Sequence, text, text);
        let result = SuggestionEngine::new().generate(&errors, &m);

        assert_eq!(result.suggestions.len(), 1);
        assert_eq!(result.suggestions[0].title, "Fix Relationships");
        assert_eq!(result.suggestions[0].description, "Found 2 incorrect relationships in your diagram");
        assert!(result.suggestions[0].examples.is_empty());
        assert_eq!(result.estimated_impact[INCORRECT_RELATIONSHIPS], Level::Low);
    }
}
