//! # Metrics Engine
//!
//! Compares a reference diagram with a submitted diagram category by category
//! (actors, use cases, classes, attributes, methods, participants, messages and
//! relationships) and reports precision, recall, F1 and accuracy.
//!
//! Items are compared through string keys:
//!
//! - simple entities: their name,
//! - relationships: `source->target:type`,
//! - class members: `Owner.member`,
//! - messages: `source->target:label`.
//!
//! Keys are matched with [`similarity::semantic_match`], so near misses and known
//! bilingual variants still count as matches.
//!
//! The aggregate ("overall") metrics are micro-averaged: true/false positive and
//! false negative counts are summed over all categories before the ratios are
//! computed. `similarity_score` is the plain mean of the per-category F1 scores.

pub mod similarity;

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::diagrams::{Diagram, DiagramType};
use crate::error::GradingError;

/// Default minimum similarity for two keys to count as the same item.
pub const DEFAULT_SIMILARITY_THRESHOLD: f64 = 0.85;

/// A counted kind of diagram component.
///
/// Declaration order is the reporting order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    Actor,
    UseCase,
    Class,
    Attribute,
    Method,
    Participant,
    Message,
    Relationship,
}

impl Category {
    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Actor => "actor",
            Category::UseCase => "use_case",
            Category::Class => "class",
            Category::Attribute => "attribute",
            Category::Method => "method",
            Category::Participant => "participant",
            Category::Message => "message",
            Category::Relationship => "relationship",
        }
    }

    /// Categories whose absence undermines the whole diagram.
    pub fn is_core(&self) -> bool {
        matches!(self, Category::Class | Category::UseCase | Category::Participant)
    }

    /// Categories compared for a diagram kind, in reporting order.
    pub fn for_type(kind: DiagramType) -> &'static [Category] {
        match kind {
            DiagramType::UseCase => &[Category::Actor, Category::UseCase, Category::Relationship],
            DiagramType::Class => &[
                Category::Class,
                Category::Attribute,
                Category::Method,
                Category::Relationship,
            ],
            DiagramType::Sequence => &[Category::Participant, Category::Message],
        }
    }
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Confusion counts and derived ratios for one category.
///
/// Every ratio is `0.0` when its denominator is zero.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ComponentMetrics {
    pub true_positives: usize,
    pub false_positives: usize,
    pub false_negatives: usize,
    pub precision: f64,
    pub recall: f64,
    pub f1_score: f64,
    pub accuracy: f64,
}

fn ratio(numerator: usize, denominator: usize) -> f64 {
    if denominator == 0 {
        0.0
    } else {
        numerator as f64 / denominator as f64
    }
}

impl ComponentMetrics {
    pub fn from_counts(tp: usize, fp: usize, fn_: usize) -> Self {
        let precision = ratio(tp, tp + fp);
        let recall = ratio(tp, tp + fn_);
        let f1_score = if precision + recall > 0.0 {
            2.0 * precision * recall / (precision + recall)
        } else {
            0.0
        };

        Self {
            true_positives: tp,
            false_positives: fp,
            false_negatives: fn_,
            precision,
            recall,
            f1_score,
            accuracy: ratio(tp, tp + fp + fn_),
        }
    }

    /// Micro-average: sums the counts, then recomputes the ratios.
    pub fn aggregate<'a>(metrics: impl IntoIterator<Item = &'a ComponentMetrics>) -> Self {
        let (tp, fp, fn_) = metrics.into_iter().fold((0, 0, 0), |(tp, fp, fn_), m| {
            (tp + m.true_positives, fp + m.false_positives, fn_ + m.false_negatives)
        });
        Self::from_counts(tp, fp, fn_)
    }
}

/// Items left unmatched on either side of a category comparison.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Unmatched {
    /// Reference items with no counterpart in the submission.
    pub missing: Vec<String>,
    /// Submitted items with no counterpart in the reference.
    pub extra: Vec<String>,
}

/// Full comparison result for one diagram pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiagramMetrics {
    pub diagram_type: DiagramType,
    pub component_metrics: BTreeMap<Category, ComponentMetrics>,
    pub overall_metrics: ComponentMetrics,
    pub similarity_score: f64,
    pub total_expected: usize,
    pub total_actual: usize,
    pub total_matched: usize,
    pub unmatched: BTreeMap<Category, Unmatched>,
}

impl DiagramMetrics {
    pub fn category(&self, category: Category) -> Option<&ComponentMetrics> {
        self.component_metrics.get(&category)
    }

    /// Number of categories compared perfectly (F1 of exactly `1.0`).
    pub fn perfect_categories(&self) -> usize {
        self.component_metrics
            .values()
            .filter(|m| m.f1_score == 1.0)
            .count()
    }
}

/// Comparison keys per category, de-duplicated in first-seen order.
pub fn category_keys(diagram: &Diagram) -> Vec<(Category, Vec<String>)> {
    let keyed = match diagram {
        Diagram::UseCase(d) => vec![
            (Category::Actor, d.actors.iter().map(|a| a.name.clone()).collect()),
            (Category::UseCase, d.use_cases.iter().map(|u| u.name.clone()).collect()),
            (Category::Relationship, d.relationships.iter().map(|r| r.key()).collect()),
        ],
        Diagram::Class(d) => vec![
            (Category::Class, d.classes.iter().map(|c| c.name.clone()).collect()),
            (Category::Attribute, d.attribute_keys()),
            (Category::Method, d.method_keys()),
            (Category::Relationship, d.relationships.iter().map(|r| r.key()).collect()),
        ],
        Diagram::Sequence(d) => vec![
            (Category::Participant, d.participants.iter().map(|p| p.name.clone()).collect()),
            (Category::Message, d.messages.iter().map(|m| m.key()).collect()),
        ],
    };

    keyed
        .into_iter()
        .map(|(category, keys): (Category, Vec<String>)| {
            let mut unique: Vec<String> = Vec::with_capacity(keys.len());
            for key in keys {
                if !unique.contains(&key) {
                    unique.push(key);
                }
            }
            (category, unique)
        })
        .collect()
}

/// Computes [`DiagramMetrics`] for a reference/submission pair.
#[derive(Debug, Clone, Copy)]
pub struct MetricsEngine {
    similarity_threshold: f64,
}

impl Default for MetricsEngine {
    fn default() -> Self {
        Self::new(DEFAULT_SIMILARITY_THRESHOLD)
    }
}

impl MetricsEngine {
    pub fn new(similarity_threshold: f64) -> Self {
        Self { similarity_threshold }
    }

    pub fn similarity_threshold(&self) -> f64 {
        self.similarity_threshold
    }

    /// Metrics for a single category from its expected and actual keys.
    pub fn compare_keys(&self, expected: &[String], actual: &[String]) -> (ComponentMetrics, Unmatched) {
        let pairs = similarity::semantic_match(expected, actual, self.similarity_threshold);
        let tp = pairs.len();
        let metrics = ComponentMetrics::from_counts(tp, actual.len() - tp, expected.len() - tp);

        let unmatched = Unmatched {
            missing: expected
                .iter()
                .filter(|e| !pairs.iter().any(|(m, _)| m == *e))
                .cloned()
                .collect(),
            extra: actual
                .iter()
                .filter(|a| !pairs.iter().any(|(_, m)| m == *a))
                .cloned()
                .collect(),
        };
        (metrics, unmatched)
    }

    /// Compares two diagrams of the given kind.
    ///
    /// # Arguments
    ///
    /// * `expected` - The reference diagram.
    /// * `actual` - The submitted diagram.
    /// * `kind` - The kind both diagrams are expected to be.
    ///
    /// # Errors
    ///
    /// Returns [`GradingError::UnsupportedDiagramType`] when either diagram is not
    /// of `kind`. Empty diagrams are not an error; they produce all-zero metrics.
    pub fn compare(
        &self,
        expected: &Diagram,
        actual: &Diagram,
        kind: DiagramType,
    ) -> Result<DiagramMetrics, GradingError> {
        if expected.diagram_type() != kind || actual.diagram_type() != kind {
            return Err(GradingError::UnsupportedDiagramType(kind));
        }

        let expected_keys = category_keys(expected);
        let actual_keys = category_keys(actual);

        let mut component_metrics = BTreeMap::new();
        let mut unmatched = BTreeMap::new();
        let (mut total_expected, mut total_actual) = (0, 0);

        for ((category, exp), (_, act)) in expected_keys.iter().zip(actual_keys.iter()) {
            let (metrics, left_over) = self.compare_keys(exp, act);
            debug!(
                category = %category,
                tp = metrics.true_positives,
                fp = metrics.false_positives,
                fn_ = metrics.false_negatives,
                "category compared"
            );
            total_expected += exp.len();
            total_actual += act.len();
            component_metrics.insert(*category, metrics);
            unmatched.insert(*category, left_over);
        }

        let overall_metrics = ComponentMetrics::aggregate(component_metrics.values());
        let similarity_score = if component_metrics.is_empty() {
            0.0
        } else {
            component_metrics.values().map(|m| m.f1_score).sum::<f64>() / component_metrics.len() as f64
        };

        Ok(DiagramMetrics {
            diagram_type: kind,
            total_matched: overall_metrics.true_positives,
            component_metrics,
            overall_metrics,
            similarity_score,
            total_expected,
            total_actual,
            unmatched,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagrams::{Actor, UseCaseDiagram};
    use crate::parsers::parser_for;

    fn actors(names: &[&str]) -> Diagram {
        Diagram::UseCase(UseCaseDiagram {
            actors: names.iter().map(|n| Actor::new(*n)).collect(),
            ..Default::default()
        })
    }

    #[test]
    fn test_ratios_are_zero_with_empty_denominators() {
        let m = ComponentMetrics::from_counts(0, 0, 0);
        assert_eq!(m, ComponentMetrics::default());
    }

    #[test]
    fn test_identical_actor_sets() {
        let engine = MetricsEngine::default();
        let metrics = engine
            .compare(&actors(&["User", "Admin"]), &actors(&["User", "Admin"]), DiagramType::UseCase)
            .unwrap();
        let actor = metrics.category(Category::Actor).unwrap();
        assert_eq!(*actor, ComponentMetrics::from_counts(2, 0, 0));
        assert_eq!(actor.precision, 1.0);
        assert_eq!(actor.recall, 1.0);
        assert_eq!(actor.f1_score, 1.0);
        assert_eq!(actor.accuracy, 1.0);
    }

    #[test]
    fn test_partially_matching_actor_sets() {
        let engine = MetricsEngine::default();
        let metrics = engine
            .compare(&actors(&["User", "Admin"]), &actors(&["User", "Guest"]), DiagramType::UseCase)
            .unwrap();
        let actor = metrics.category(Category::Actor).unwrap();
        assert_eq!((actor.true_positives, actor.false_positives, actor.false_negatives), (1, 1, 1));
        assert_eq!(actor.precision, 0.5);
        assert_eq!(actor.recall, 0.5);
        assert_eq!(actor.f1_score, 0.5);
        assert!((actor.accuracy - 1.0 / 3.0).abs() < 1e-9);

        let left_over = &metrics.unmatched[&Category::Actor];
        assert_eq!(left_over.missing, vec!["Admin".to_string()]);
        assert_eq!(left_over.extra, vec!["Guest".to_string()]);
    }

    #[test]
    fn test_aggregate_is_micro_averaged() {
        let a = ComponentMetrics::from_counts(3, 1, 0);
        let b = ComponentMetrics::from_counts(1, 0, 3);
        let overall = ComponentMetrics::aggregate([&a, &b]);
        assert_eq!(overall.true_positives, 4);
        assert_eq!(overall.precision, 0.8);
        assert!((overall.recall - 4.0 / 7.0).abs() < 1e-9);
    }

    #[test]
    fn test_empty_diagrams_yield_zero_metrics() {
        let empty = Diagram::empty(DiagramType::Class);
        let metrics = MetricsEngine::default()
            .compare(&empty, &empty, DiagramType::Class)
            .unwrap();
        assert_eq!(metrics.component_metrics.len(), 4);
        assert_eq!(metrics.similarity_score, 0.0);
        assert_eq!(metrics.total_expected, 0);
        assert_eq!(metrics.overall_metrics, ComponentMetrics::default());
    }

    #[test]
    fn test_mismatched_kind_is_unsupported() {
        let result = MetricsEngine::default().compare(
            &Diagram::empty(DiagramType::UseCase),
            &Diagram::empty(DiagramType::UseCase),
            DiagramType::Sequence,
        );
        assert!(matches!(result, Err(GradingError::UnsupportedDiagramType(DiagramType::Sequence))));
    }

    #[test]
    fn test_identical_class_diagrams_score_one() {
        let text = "@startuml\nclass User {\n  -name: String\n  +login(): bool\n}\nclass Admin\nAdmin --|> User\n@enduml";
        let parser = parser_for(DiagramType::Class);
        let diagram = parser.parse(text);
        let metrics = MetricsEngine::default()
            .compare(&diagram, &diagram, DiagramType::Class)
            .unwrap();
        assert_eq!(metrics.similarity_score, 1.0);
        assert_eq!(metrics.perfect_categories(), 4);
        assert_eq!(metrics.total_matched, metrics.total_expected);
        let categories: Vec<Category> = metrics.component_metrics.keys().copied().collect();
        assert_eq!(
            categories,
            vec![Category::Class, Category::Attribute, Category::Method, Category::Relationship]
        );
    }

    #[test]
    fn test_ratios_stay_in_unit_interval() {
        for tp in 0..4 {
            for fp in 0..4 {
                for fn_ in 0..4 {
                    let m = ComponentMetrics::from_counts(tp, fp, fn_);
                    for value in [m.precision, m.recall, m.f1_score, m.accuracy] {
                        assert!((0.0..=1.0).contains(&value));
                    }
                    if m.precision + m.recall == 0.0 {
                        assert_eq!(m.f1_score, 0.0);
                    }
                }
            }
        }
    }
}
