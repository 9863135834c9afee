//! # Phase 2: Extraction and Metrics
//!
//! Parses the reference and the (normalized) submission with the parser
//! registered for the diagram kind, then compares them with the
//! [`MetricsEngine`]. Everything here is deterministic and synchronous.
//!
//! Besides the metrics, the extractor derives a per-category view of what is
//! missing or extra ([`ComponentDifferences`]) for the feedback phase, and a
//! standalone 0-10 score ([`PhaseTwoExtractor::fallback_score`]) used when
//! feedback and scoring cannot run.

use std::collections::{BTreeMap, HashMap};
use std::time::Instant;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::diagrams::{Diagram, DiagramType};
use crate::error::GradingError;
use crate::metrics::{Category, DiagramMetrics, MetricsEngine};
use crate::parsers;
use crate::traits::parser::DiagramParser;
use crate::types::{round2, Severity};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExtractionResult {
    pub diagram_type: DiagramType,
    pub teacher_diagram: Diagram,
    pub student_diagram: Diagram,
    pub metrics: DiagramMetrics,
    pub processing_time_ms: u64,
    pub warnings: Vec<String>,
}

/// Missing or extra items of one category.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ComponentGap {
    pub category: Category,
    pub count: usize,
    pub severity: Severity,
    pub items: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct CategoryScores {
    pub precision: f64,
    pub recall: f64,
    pub f1_score: f64,
}

/// What differs between reference and submission, category by category.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ComponentDifferences {
    pub missing_components: Vec<ComponentGap>,
    pub extra_components: Vec<ComponentGap>,
    /// Reference relationship keys the submission does not contain.
    pub incorrect_relationships: Vec<String>,
    pub component_details: BTreeMap<Category, CategoryScores>,
}

impl ComponentDifferences {
    /// `true` when a missing-components entry is high or critical.
    pub fn has_severe_missing(&self) -> bool {
        self.missing_components.iter().any(|gap| gap.severity.is_severe())
    }
}

/// Weights of the standalone fallback score.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FallbackWeights {
    pub precision: f64,
    pub recall: f64,
    pub f1_score: f64,
}

impl Default for FallbackWeights {
    fn default() -> Self {
        Self {
            precision: 0.3,
            recall: 0.3,
            f1_score: 0.4,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExtractionStatus {
    pub service: &'static str,
    pub phase: &'static str,
    pub capabilities: Vec<&'static str>,
    pub supported_diagrams: Vec<DiagramType>,
    pub metrics_calculated: Vec<&'static str>,
    pub similarity_threshold: f64,
}

pub struct PhaseTwoExtractor {
    parsers: HashMap<DiagramType, Box<dyn DiagramParser>>,
    engine: MetricsEngine,
}

impl PhaseTwoExtractor {
    /// An extractor with a parser registered for every supported kind.
    pub fn new(similarity_threshold: f64) -> Self {
        let parsers = DiagramType::all()
            .into_iter()
            .map(|kind| (kind, parsers::parser_for(kind)))
            .collect();
        Self {
            parsers,
            engine: MetricsEngine::new(similarity_threshold),
        }
    }

    /// Registers (or replaces) the parser for its diagram kind.
    pub fn register(&mut self, parser: Box<dyn DiagramParser>) {
        self.parsers.insert(parser.diagram_type(), parser);
    }

    /// Drops the parser for `kind`, making that kind unsupported.
    pub fn without_parser(mut self, kind: DiagramType) -> Self {
        self.parsers.remove(&kind);
        self
    }

    pub fn supports(&self, kind: DiagramType) -> bool {
        self.parsers.contains_key(&kind)
    }

    pub fn similarity_threshold(&self) -> f64 {
        self.engine.similarity_threshold()
    }

    /// Parses both diagrams and computes their metrics.
    ///
    /// # Errors
    ///
    /// [`GradingError::UnsupportedDiagramType`] when no parser is registered for
    /// `diagram_type`. Unparseable or empty diagrams are not errors.
    pub fn extract(
        &self,
        student_text: &str,
        teacher_text: &str,
        diagram_type: DiagramType,
    ) -> Result<ExtractionResult, GradingError> {
        let started = Instant::now();
        info!(%diagram_type, "starting code-based extraction");

        let parser = self
            .parsers
            .get(&diagram_type)
            .ok_or(GradingError::UnsupportedDiagramType(diagram_type))?;

        let teacher_diagram = parser.parse(teacher_text);
        let student_diagram = parser.parse(student_text);

        let mut warnings = Vec::new();
        if teacher_diagram.is_empty() {
            warn!("reference diagram produced no components");
            warnings.push("Teacher diagram contains no recognisable components".to_string());
        }
        if student_diagram.is_empty() {
            warn!("submitted diagram produced no components");
            warnings.push("Student diagram contains no recognisable components".to_string());
        }

        let metrics = self.engine.compare(&teacher_diagram, &student_diagram, diagram_type)?;
        info!(
            f1 = metrics.overall_metrics.f1_score,
            precision = metrics.overall_metrics.precision,
            recall = metrics.overall_metrics.recall,
            similarity = metrics.similarity_score,
            "metrics calculated"
        );

        Ok(ExtractionResult {
            diagram_type,
            teacher_diagram,
            student_diagram,
            metrics,
            processing_time_ms: started.elapsed().as_millis() as u64,
            warnings,
        })
    }

    /// Missing and extra items per category.
    ///
    /// Missing classes, use cases and participants are `high`; every other gap is `medium`.
    pub fn component_differences(metrics: &DiagramMetrics) -> ComponentDifferences {
        let mut differences = ComponentDifferences::default();

        for (category, m) in &metrics.component_metrics {
            let unmatched = metrics.unmatched.get(category);

            if m.false_negatives > 0 {
                let items = unmatched.map(|u| u.missing.clone()).unwrap_or_default();
                if *category == Category::Relationship {
                    differences.incorrect_relationships.extend(items.iter().cloned());
                }
                differences.missing_components.push(ComponentGap {
                    category: *category,
                    count: m.false_negatives,
                    severity: if category.is_core() { Severity::High } else { Severity::Medium },
                    items,
                });
            }

            if m.false_positives > 0 {
                differences.extra_components.push(ComponentGap {
                    category: *category,
                    count: m.false_positives,
                    severity: Severity::Medium,
                    items: unmatched.map(|u| u.extra.clone()).unwrap_or_default(),
                });
            }

            differences.component_details.insert(
                *category,
                CategoryScores {
                    precision: m.precision,
                    recall: m.recall,
                    f1_score: m.f1_score,
                },
            );
        }

        differences
    }

    /// Score on a 0-10 scale from the aggregate metrics alone, rounded to two decimals.
    ///
    /// A similarity below 0.5 costs a flat 20%.
    pub fn fallback_score(metrics: &DiagramMetrics, weights: Option<FallbackWeights>) -> f64 {
        let weights = weights.unwrap_or_default();
        let overall = &metrics.overall_metrics;

        let weighted = overall.precision * weights.precision
            + overall.recall * weights.recall
            + overall.f1_score * weights.f1_score;
        let mut score = weighted * 10.0;
        if metrics.similarity_score < 0.5 {
            score *= 0.8;
        }
        round2(score)
    }

    pub fn status(&self) -> ExtractionStatus {
        ExtractionStatus {
            service: "PhaseTwoExtractor",
            phase: "Phase 2 - Code-based Extraction and Metrics",
            capabilities: vec![
                "PlantUML parsing",
                "Component extraction",
                "Quantitative metrics calculation",
                "Semantic similarity matching",
            ],
            supported_diagrams: DiagramType::all()
                .into_iter()
                .filter(|kind| self.supports(*kind))
                .collect(),
            metrics_calculated: vec!["Precision", "Recall", "F1-Score", "Accuracy"],
            similarity_threshold: self.similarity_threshold(),
        }
    }
}

impl Default for PhaseTwoExtractor {
    fn default() -> Self {
        Self::new(crate::metrics::DEFAULT_SIMILARITY_THRESHOLD)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TEACHER: &str = "@startuml\nactor User\nactor Admin\nusecase \"Login\" as UC1\nUser --> UC1\n@enduml";

    #[test]
    fn test_identical_diagrams_score_ten() {
        let extractor = PhaseTwoExtractor::default();
        let result = extractor.extract(TEACHER, TEACHER, DiagramType::UseCase).unwrap();

        assert_eq!(result.metrics.similarity_score, 1.0);
        assert_eq!(PhaseTwoExtractor::fallback_score(&result.metrics, None), 10.0);
        assert!(result.warnings.is_empty());

        let differences = PhaseTwoExtractor::component_differences(&result.metrics);
        assert!(differences.missing_components.is_empty());
        assert!(differences.extra_components.is_empty());
        assert_eq!(differences.component_details.len(), 3);
    }

    #[test]
    fn test_missing_actor_and_extra_actor() {
        let student = "@startuml\nactor User\nactor Guest\nusecase \"Login\" as UC1\nUser --> UC1\n@enduml";
        let result = PhaseTwoExtractor::default()
            .extract(student, TEACHER, DiagramType::UseCase)
            .unwrap();

        let actors = result.metrics.category(Category::Actor).unwrap();
        assert_eq!((actors.true_positives, actors.false_positives, actors.false_negatives), (1, 1, 1));

        let differences = PhaseTwoExtractor::component_differences(&result.metrics);
        assert_eq!(differences.missing_components[0].category, Category::Actor);
        assert_eq!(differences.missing_components[0].severity, Severity::Medium);
        assert_eq!(differences.missing_components[0].items, vec!["Admin"]);
        assert_eq!(differences.extra_components[0].items, vec!["Guest"]);
        assert!(!differences.has_severe_missing());
    }

    #[test]
    fn test_missing_core_component_is_high() {
        let teacher = "@startuml\nclass Order\nclass Customer\n@enduml";
        let student = "@startuml\nclass Order\n@enduml";
        let result = PhaseTwoExtractor::default()
            .extract(student, teacher, DiagramType::Class)
            .unwrap();
        let differences = PhaseTwoExtractor::component_differences(&result.metrics);
        assert_eq!(differences.missing_components[0].severity, Severity::High);
        assert!(differences.has_severe_missing());
    }

    #[test]
    fn test_incorrect_relationships_list_reference_keys() {
        let teacher = "@startuml\nclass Order\nclass Customer\nCustomer --> Order\n@enduml";
        let student = "@startuml\nclass Order\nclass Customer\n@enduml";
        let result = PhaseTwoExtractor::default()
            .extract(student, teacher, DiagramType::Class)
            .unwrap();
        let differences = PhaseTwoExtractor::component_differences(&result.metrics);
        assert_eq!(differences.incorrect_relationships, vec!["Customer->Order:association"]);
    }

    #[test]
    fn test_empty_student_is_not_an_error() {
        let result = PhaseTwoExtractor::default()
            .extract("@startuml\n@enduml", TEACHER, DiagramType::UseCase)
            .unwrap();
        assert_eq!(result.metrics.overall_metrics.true_positives, 0);
        assert_eq!(result.warnings, vec!["Student diagram contains no recognisable components"]);
        assert_eq!(PhaseTwoExtractor::fallback_score(&result.metrics, None), 0.0);
    }

    #[test]
    fn test_unsupported_type_fails() {
        let extractor = PhaseTwoExtractor::default().without_parser(DiagramType::Sequence);
        let err = extractor
            .extract("A -> B", "A -> B", DiagramType::Sequence)
            .unwrap_err();
        assert!(matches!(err, GradingError::UnsupportedDiagramType(DiagramType::Sequence)));
        assert_eq!(extractor.status().supported_diagrams, vec![DiagramType::Class, DiagramType::UseCase]);
    }

    #[test]
    fn test_fallback_score_low_similarity_penalty() {
        let teacher = "@startuml\nactor A1\nactor B1\nactor C1\nactor D1\n@enduml";
        let student = "@startuml\nactor A1\nactor Zed\nactor Yak\nactor Xen\n@enduml";
        let result = PhaseTwoExtractor::default()
            .extract(student, teacher, DiagramType::UseCase)
            .unwrap();
        // actors: tp 1, fp 3, fn 3 -> p = r = f1 = 0.25; empty categories pull similarity down
        assert!(result.metrics.similarity_score < 0.5);
        assert_eq!(PhaseTwoExtractor::fallback_score(&result.metrics, None), 2.0);
    }
}
