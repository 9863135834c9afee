//! Deterministic 0-10 scoring.
//!
//! The base score is a weighted sum of the overall metrics scaled to ten.
//! Penalties come from the error analysis, bonuses from the metrics and the
//! generated feedback. The result is clamped to `[0, 10]` and rounded to two
//! decimals. The base score is carried at full precision until then; the
//! rounded `base_score` in the breakdown is for display.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::error_analyzer::ErrorAnalysisResult;
use super::feedback_generator::FeedbackGenerationResult;
use crate::diagrams::DiagramType;
use crate::metrics::DiagramMetrics;
use crate::types::{round2, Severity};

pub const MAX_SCORE: f64 = 10.0;

/// Weights of the overall metrics in the base score.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringWeights {
    pub precision: f64,
    pub recall: f64,
    pub f1_score: f64,
    pub accuracy: f64,
}

impl Default for ScoringWeights {
    fn default() -> Self {
        Self {
            precision: 0.25,
            recall: 0.25,
            f1_score: 0.35,
            accuracy: 0.15,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Penalty {
    TotalErrors,
    SeverityBased,
    LowConfidence,
    CriticalMissing,
}

impl Penalty {
    pub fn description(&self) -> &'static str {
        match self {
            Penalty::TotalErrors => "Multiple errors found",
            Penalty::SeverityBased => "High-severity errors",
            Penalty::LowConfidence => "Uncertain analysis",
            Penalty::CriticalMissing => "Missing essential components",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Bonus {
    HighSimilarity,
    GoodSimilarity,
    IdentifiedStrengths,
    PerfectComponents,
    HighPrecision,
}

impl Bonus {
    pub fn description(&self) -> &'static str {
        match self {
            Bonus::HighSimilarity => "Excellent similarity to reference",
            Bonus::GoodSimilarity => "Good similarity to reference",
            Bonus::IdentifiedStrengths => "Multiple strengths identified",
            Bonus::PerfectComponents => "Perfect component matching",
            Bonus::HighPrecision => "Very precise diagram",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoreBreakdown {
    pub base_score: f64,
    pub penalties: BTreeMap<Penalty, f64>,
    pub bonuses: BTreeMap<Bonus, f64>,
    pub final_score: f64,
    pub max_score: f64,
    pub grade_letter: char,
    pub explanation: String,
}

impl ScoreBreakdown {
    pub fn total_penalties(&self) -> f64 {
        self.penalties.values().sum()
    }

    pub fn total_bonuses(&self) -> f64 {
        self.bonuses.values().sum()
    }
}

/// `A` from 9, `B` from 8, `C` from 7, `D` from 6, else `F`.
pub fn grade_letter(score: f64) -> char {
    match score {
        s if s >= 9.0 => 'A',
        s if s >= 8.0 => 'B',
        s if s >= 7.0 => 'C',
        s if s >= 6.0 => 'D',
        _ => 'F',
    }
}

fn severity_factor(severity: Severity) -> f64 {
    match severity {
        Severity::Critical => 2.0,
        Severity::High => 1.5,
        Severity::Medium => 1.0,
        Severity::Low => 0.5,
    }
}

fn interpretation(score: f64) -> &'static str {
    match score {
        s if s >= 9.0 => "Excellent work! Your diagram demonstrates strong understanding of UML concepts.",
        s if s >= 8.0 => "Good work! Your diagram shows solid understanding with room for minor improvements.",
        s if s >= 7.0 => "Satisfactory work. Your diagram captures the main concepts but needs some improvements.",
        s if s >= 6.0 => "Your diagram shows basic understanding but requires significant improvements.",
        _ => "Your diagram needs substantial revision. Please review the feedback carefully.",
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ScoreCalculator {
    weights: ScoringWeights,
}

impl ScoreCalculator {
    pub fn new(weights: ScoringWeights) -> Self {
        Self { weights }
    }

    pub fn weights(&self) -> ScoringWeights {
        self.weights
    }

    /// Scores a submission. `weights` overrides the calculator's own weights for this call.
    pub fn calculate(
        &self,
        metrics: &DiagramMetrics,
        errors: &ErrorAnalysisResult,
        feedback: &FeedbackGenerationResult,
        weights: Option<ScoringWeights>,
    ) -> ScoreBreakdown {
        let weights = weights.unwrap_or(self.weights);
        let base_score = Self::base_score(metrics, &weights);
        let penalties = Self::penalties(errors);
        let bonuses = Self::bonuses(metrics, feedback);

        let raw = base_score - penalties.values().sum::<f64>() + bonuses.values().sum::<f64>();
        let final_score = round2(raw.clamp(0.0, MAX_SCORE));
        debug!(base_score, final_score, "score calculated");

        let mut breakdown = ScoreBreakdown {
            base_score: round2(base_score),
            penalties,
            bonuses,
            final_score,
            max_score: MAX_SCORE,
            grade_letter: grade_letter(final_score),
            explanation: String::new(),
        };
        breakdown.explanation = Self::explain(&breakdown, metrics.diagram_type);
        breakdown
    }

    fn base_score(metrics: &DiagramMetrics, weights: &ScoringWeights) -> f64 {
        let overall = &metrics.overall_metrics;
        MAX_SCORE
            * (weights.precision * overall.precision
                + weights.recall * overall.recall
                + weights.f1_score * overall.f1_score
                + weights.accuracy * overall.accuracy)
    }

    fn penalties(errors: &ErrorAnalysisResult) -> BTreeMap<Penalty, f64> {
        let mut penalties = BTreeMap::new();

        if errors.total_errors > 0 {
            penalties.insert(Penalty::TotalErrors, (0.2 * errors.total_errors as f64).min(2.0));
        }

        let weighted: f64 = errors
            .severity_breakdown
            .iter()
            .map(|(severity, count)| *count as f64 * severity_factor(*severity) * 0.1)
            .sum();
        if weighted > 0.0 {
            penalties.insert(Penalty::SeverityBased, weighted.min(3.0));
        }

        if errors.confidence < 0.7 {
            penalties.insert(Penalty::LowConfidence, 0.5);
        }

        if errors.has_critical_missing() {
            penalties.insert(Penalty::CriticalMissing, 1.0);
        }

        penalties
    }

    fn bonuses(metrics: &DiagramMetrics, feedback: &FeedbackGenerationResult) -> BTreeMap<Bonus, f64> {
        let mut bonuses = BTreeMap::new();

        if metrics.similarity_score > 0.9 {
            bonuses.insert(Bonus::HighSimilarity, 0.5);
        } else if metrics.similarity_score > 0.8 {
            bonuses.insert(Bonus::GoodSimilarity, 0.3);
        }

        if feedback.strengths.len() >= 2 {
            bonuses.insert(Bonus::IdentifiedStrengths, 0.3);
        }

        let perfect = metrics.perfect_categories();
        if perfect > 0 {
            bonuses.insert(Bonus::PerfectComponents, 0.2 * perfect as f64);
        }

        if metrics.overall_metrics.precision > 0.95 {
            bonuses.insert(Bonus::HighPrecision, 0.3);
        }

        bonuses
    }

    fn explain(breakdown: &ScoreBreakdown, kind: DiagramType) -> String {
        let mut lines = vec![
            format!("Score Calculation for {} Diagram:", Title(kind)),
            format!("Base Score (from metrics): {:.2}/10", breakdown.base_score),
        ];

        if !breakdown.penalties.is_empty() {
            lines.push("\nPenalties Applied:".to_string());
            for (penalty, amount) in &breakdown.penalties {
                lines.push(format!("- {}: -{:.2}", penalty.description(), amount));
            }
        }

        if !breakdown.bonuses.is_empty() {
            lines.push("\nBonuses Applied:".to_string());
            for (bonus, amount) in &breakdown.bonuses {
                lines.push(format!("- {}: +{:.2}", bonus.description(), amount));
            }
        }

        lines.push(format!("\nFinal Score: {:.2}/10", breakdown.final_score));
        lines.push(interpretation(breakdown.final_score).to_string());
        lines.join("\n")
    }
}

/// `use_case` -> `Use Case`.
struct Title(DiagramType);

impl fmt::Display for Title {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&super::error_analyzer::title_case(self.0.as_str()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feedback::error_analyzer::{histogram, ErrorCategory};
    use crate::metrics::MetricsEngine;
    use crate::parsers::parser_for;

    fn metrics(teacher: &str, student: &str) -> DiagramMetrics {
        let parser = parser_for(DiagramType::UseCase);
        MetricsEngine::default()
            .compare(&parser.parse(teacher), &parser.parse(student), DiagramType::UseCase)
            .unwrap()
    }

    fn errors(categories: Vec<ErrorCategory>, confidence: f64) -> ErrorAnalysisResult {
        ErrorAnalysisResult {
            diagram_type: DiagramType::UseCase,
            total_errors: categories.iter().map(|c| c.count).sum(),
            severity_breakdown: histogram(&categories),
            error_categories: categories,
            primary_issues: Vec::new(),
            confidence,
        }
    }

    fn feedback(strengths: usize) -> FeedbackGenerationResult {
        FeedbackGenerationResult {
            diagram_type: DiagramType::UseCase,
            feedback_items: Vec::new(),
            summary: String::new(),
            strengths: (0..strengths).map(|i| format!("strength {i}")).collect(),
            areas_for_improvement: Vec::new(),
            confidence: 0.9,
        }
    }

    const FULL: &str = "@startuml\nactor User\nactor Admin\nusecase (Login)\nUser --> (Login)\n@enduml";

    #[test]
    fn test_perfect_submission_clamps_to_ten() {
        let m = metrics(FULL, FULL);
        let breakdown = ScoreCalculator::default().calculate(&m, &errors(vec![], 0.95), &feedback(2), None);

        assert_eq!(breakdown.base_score, 10.0);
        assert!(breakdown.penalties.is_empty());
        assert_eq!(breakdown.bonuses[&Bonus::HighSimilarity], 0.5);
        assert_eq!(breakdown.bonuses[&Bonus::IdentifiedStrengths], 0.3);
        assert_eq!(breakdown.bonuses[&Bonus::HighPrecision], 0.3);
        assert_eq!(breakdown.final_score, 10.0);
        assert_eq!(breakdown.grade_letter, 'A');
        assert!(breakdown.explanation.starts_with("Score Calculation for Use Case Diagram:"));
        assert!(breakdown.explanation.ends_with(
            "Final Score: 10.00/10\nExcellent work! Your diagram demonstrates strong understanding of UML concepts."
        ));
    }

    #[test]
    fn test_penalties() {
        let m = metrics(FULL, FULL);
        let categories = vec![
            ErrorCategory {
                category: "missing_components".into(),
                severity: Severity::High,
                count: 2,
                description: String::new(),
                examples: Vec::new(),
            },
            ErrorCategory {
                category: "naming_issues".into(),
                severity: Severity::Low,
                count: 1,
                description: String::new(),
                examples: Vec::new(),
            },
        ];
        let breakdown = ScoreCalculator::default().calculate(&m, &errors(categories, 0.5), &feedback(0), None);

        assert!((breakdown.penalties[&Penalty::TotalErrors] - 0.6).abs() < 1e-9);
        assert!((breakdown.penalties[&Penalty::SeverityBased] - 0.35).abs() < 1e-9);
        assert_eq!(breakdown.penalties[&Penalty::LowConfidence], 0.5);
        assert_eq!(breakdown.penalties[&Penalty::CriticalMissing], 1.0);
        assert!(breakdown.explanation.contains("\nPenalties Applied:\n- Multiple errors found: -0.60"));
        assert!(breakdown.explanation.contains("- Missing essential components: -1.00"));
    }

    #[test]
    fn test_severity_penalty_follows_reported_histogram() {
        let m = metrics(FULL, FULL);
        let categories = vec![ErrorCategory {
            category: "missing_components".into(),
            severity: Severity::High,
            count: 2,
            description: String::new(),
            examples: Vec::new(),
        }];
        let mut analysis = errors(categories, 0.9);
        analysis.severity_breakdown = BTreeMap::from([(Severity::Medium, 1), (Severity::High, 2)]);

        let breakdown = ScoreCalculator::default().calculate(&m, &analysis, &feedback(0), None);
        assert!((breakdown.penalties[&Penalty::SeverityBased] - 0.4).abs() < 1e-9);
    }

    #[test]
    fn test_base_score_keeps_precision_until_final() {
        let m = metrics(FULL, FULL);
        let weights = ScoringWeights {
            precision: 0.8996,
            recall: 0.0,
            f1_score: 0.0,
            accuracy: 0.0,
        };
        let categories = vec![ErrorCategory {
            category: "missing_components".into(),
            severity: Severity::Critical,
            count: 20,
            description: String::new(),
            examples: Vec::new(),
        }];
        let breakdown =
            ScoreCalculator::default().calculate(&m, &errors(categories, 0.5), &feedback(0), Some(weights));

        let raw_base = MAX_SCORE * (0.8996 * m.overall_metrics.precision);
        assert_eq!(breakdown.base_score, round2(raw_base));
        let expected = raw_base - breakdown.total_penalties() + breakdown.total_bonuses();
        assert_eq!(breakdown.final_score, round2(expected.clamp(0.0, MAX_SCORE)));
    }

    #[test]
    fn test_penalties_are_capped() {
        let m = metrics(FULL, FULL);
        let categories = vec![ErrorCategory {
            category: "semantic_errors".into(),
            severity: Severity::Critical,
            count: 20,
            description: String::new(),
            examples: Vec::new(),
        }];
        let breakdown = ScoreCalculator::default().calculate(&m, &errors(categories, 0.9), &feedback(0), None);
        assert_eq!(breakdown.penalties[&Penalty::TotalErrors], 2.0);
        assert_eq!(breakdown.penalties[&Penalty::SeverityBased], 3.0);
    }

    #[test]
    fn test_empty_student_scores_zero() {
        let m = metrics(FULL, "@startuml\n@enduml");
        let breakdown = ScoreCalculator::default().calculate(&m, &errors(vec![], 0.3), &feedback(0), None);
        assert_eq!(breakdown.base_score, 0.0);
        assert_eq!(breakdown.final_score, 0.0);
        assert_eq!(breakdown.grade_letter, 'F');
        assert!(breakdown.bonuses.is_empty());
    }

    #[test]
    fn test_custom_weights() {
        let m = metrics(FULL, "@startuml\nactor User\nactor Admin\n@enduml");
        let recall_only = ScoringWeights {
            precision: 0.0,
            recall: 1.0,
            f1_score: 0.0,
            accuracy: 0.0,
        };
        let breakdown = ScoreCalculator::default().calculate(&m, &errors(vec![], 0.9), &feedback(0), Some(recall_only));
        assert_eq!(breakdown.base_score, round2(10.0 * m.overall_metrics.recall));
    }

    #[test]
    fn test_grade_letters() {
        assert_eq!(grade_letter(9.0), 'A');
        assert_eq!(grade_letter(8.99), 'B');
        assert_eq!(grade_letter(7.0), 'C');
        assert_eq!(grade_letter(6.5), 'D');
        assert_eq!(grade_letter(0.0), 'F');
    }
}
