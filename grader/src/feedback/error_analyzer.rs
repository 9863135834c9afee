//! Step 1 of Phase 3: categorises what is wrong with the submission.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::diagrams::{Diagram, DiagramType};
use crate::error::GenerationError;
use crate::llm::decode::{self, Decoded};
use crate::llm::{GenerationGateway, GenerationOptions};
use crate::metrics::DiagramMetrics;
use crate::types::{histogram_from_labels, Severity};

pub const MISSING_COMPONENTS: &str = "missing_components";
pub const INCORRECT_RELATIONSHIPS: &str = "incorrect_relationships";

/// A group of related errors.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorCategory {
    /// e.g. `missing_components`, `incorrect_relationships`, `naming_issues`.
    pub category: String,
    #[serde(default)]
    pub severity: Severity,
    #[serde(default = "one")]
    pub count: usize,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub examples: Vec<String>,
}

fn one() -> usize {
    1
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ErrorAnalysisResult {
    pub diagram_type: DiagramType,
    pub total_errors: usize,
    pub error_categories: Vec<ErrorCategory>,
    pub severity_breakdown: BTreeMap<Severity, usize>,
    /// The most important issues, most important first.
    pub primary_issues: Vec<String>,
    pub confidence: f64,
}

impl ErrorAnalysisResult {
    /// `true` when a `missing_components` category is high or critical.
    pub fn has_critical_missing(&self) -> bool {
        self.error_categories
            .iter()
            .any(|c| c.category == MISSING_COMPONENTS && c.severity.is_severe())
    }

    pub fn format_for_prompt(&self) -> String {
        if self.error_categories.is_empty() {
            return "No significant errors detected.".to_string();
        }

        let mut lines = vec![format!("Total Errors: {}", self.total_errors), String::new()];
        for category in &self.error_categories {
            lines.push(format!("{} ({} severity):", title_case(&category.category), category.severity));
            lines.push(format!("  Count: {}", category.count));
            lines.push(format!("  Description: {}", category.description));
            if !category.examples.is_empty() {
                lines.push(format!("  Examples: {}", category.examples.join(", ")));
            }
            lines.push(String::new());
        }
        if !self.primary_issues.is_empty() {
            lines.push("Primary Issues:".to_string());
            lines.extend(self.primary_issues.iter().map(|issue| format!("- {issue}")));
        }
        lines.join("\n")
    }
}

/// `missing_components` -> `Missing Components`.
pub(crate) fn title_case(snake: &str) -> String {
    snake
        .split('_')
        .filter(|word| !word.is_empty())
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<String>>()
        .join(" ")
}

pub(crate) fn histogram(categories: &[ErrorCategory]) -> BTreeMap<Severity, usize> {
    let mut breakdown: BTreeMap<Severity, usize> = Severity::all().into_iter().map(|s| (s, 0)).collect();
    for category in categories {
        *breakdown.entry(category.severity).or_default() += category.count;
    }
    breakdown
}

/// Human-readable overview of the metrics for prompts.
pub fn format_metrics(metrics: &DiagramMetrics) -> String {
    let overall = &metrics.overall_metrics;
    let mut lines = vec![
        format!("Overall Precision: {:.3}", overall.precision),
        format!("Overall Recall: {:.3}", overall.recall),
        format!("Overall F1-Score: {:.3}", overall.f1_score),
        format!("Similarity Score: {:.3}", metrics.similarity_score),
        String::new(),
        "Component-wise Metrics:".to_string(),
    ];
    for (category, m) in &metrics.component_metrics {
        lines.push(format!(
            "- {}: P={:.3}, R={:.3}, F1={:.3}",
            title_case(category.as_str()),
            m.precision,
            m.recall,
            m.f1_score
        ));
        if m.false_positives > 0 || m.false_negatives > 0 {
            lines.push(format!("  Errors: {} missing, {} extra", m.false_negatives, m.false_positives));
        }
    }
    lines.join("\n")
}

#[derive(Deserialize)]
struct RawAnalysis {
    total_errors: Option<usize>,
    #[serde(default)]
    error_categories: Vec<ErrorCategory>,
    #[serde(default)]
    severity_breakdown: BTreeMap<String, usize>,
    #[serde(default)]
    primary_issues: Vec<String>,
    #[serde(default = "default_confidence")]
    confidence: f64,
}

fn default_confidence() -> f64 {
    0.5
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ErrorAnalyzer;

impl ErrorAnalyzer {
    pub fn new() -> Self {
        Self
    }

    pub async fn analyze(
        &self,
        gateway: &mut GenerationGateway,
        teacher: &Diagram,
        student: &Diagram,
        metrics: &DiagramMetrics,
        problem_text: &str,
        options: &GenerationOptions,
    ) -> Result<Decoded<ErrorAnalysisResult>, GenerationError> {
        info!(diagram_type = %metrics.diagram_type, "analyzing errors");
        let prompt = self.build_prompt(teacher, student, metrics, problem_text);
        let response = gateway.generate(&prompt, options).await?;
        Ok(self.parse_response(&response, metrics.diagram_type))
    }

    pub fn build_prompt(&self, teacher: &Diagram, student: &Diagram, metrics: &DiagramMetrics, problem_text: &str) -> String {
        format!(
            r#"You are a senior UML expert and software engineering educator with deep expertise in {kind} diagrams. Compare the student's work against the reference solution and analyse every error.

ASSIGNMENT CONTEXT:
Problem: {problem_text}
Diagram Type: {kind}

QUANTITATIVE ANALYSIS RESULTS:
{metrics}

REFERENCE SOLUTION (Teacher's Diagram):
{teacher}

STUDENT SUBMISSION:
{student}

ERROR CATEGORIES:
1. missing_components: required elements that are absent
2. incorrect_components: elements present with the wrong type or properties
3. extra_components: elements that do not belong
4. incorrect_relationships: missing, wrong or badly defined relationships
5. naming_issues: inconsistent or incorrect names
6. structural_problems: poor grouping or hierarchy
7. semantic_errors: technically valid but conceptually wrong elements
8. syntax_errors: PlantUML or UML notation mistakes

Respond in JSON:
{{
    "total_errors": 3,
    "error_categories": [
        {{
            "category": "missing_components",
            "severity": "high",
            "count": 2,
            "description": "Essential components are missing from the diagram",
            "examples": ["Missing Actor: Administrator"]
        }}
    ],
    "severity_breakdown": {{"low": 0, "medium": 1, "high": 2, "critical": 0}},
    "primary_issues": ["Missing essential actors from the system"],
    "confidence": 0.95
}}

Focus on errors that help the student learn UML concepts.
"#,
            kind = metrics.diagram_type,
            metrics = format_metrics(metrics),
            teacher = teacher.summary(),
            student = student.summary(),
        )
    }

    pub fn parse_response(&self, response: &str, diagram_type: DiagramType) -> Decoded<ErrorAnalysisResult> {
        decode::decode_or_else(
            response,
            "error analysis",
            |raw: RawAnalysis| {
                let severity_breakdown = if raw.severity_breakdown.is_empty() {
                    histogram(&raw.error_categories)
                } else {
                    histogram_from_labels(raw.severity_breakdown)
                };
                let total_errors = raw
                    .total_errors
                    .unwrap_or_else(|| raw.error_categories.iter().map(|c| c.count).sum());
                ErrorAnalysisResult {
                    diagram_type,
                    total_errors,
                    error_categories: raw.error_categories,
                    severity_breakdown,
                    primary_issues: raw.primary_issues,
                    confidence: decode::clamp_unit(raw.confidence),
                }
            },
            |text| Self::fallback(text, diagram_type),
        )
    }

    fn fallback(response: &str, diagram_type: DiagramType) -> ErrorAnalysisResult {
        let lowered = response.to_lowercase();
        let mut error_categories = Vec::new();

        if lowered.contains("missing") {
            error_categories.push(ErrorCategory {
                category: MISSING_COMPONENTS.to_string(),
                severity: Severity::Medium,
                count: 1,
                description: "Some components appear to be missing".to_string(),
                examples: vec!["Components missing from diagram".to_string()],
            });
        }
        if lowered.contains("incorrect") || lowered.contains("wrong") {
            error_categories.push(ErrorCategory {
                category: INCORRECT_RELATIONSHIPS.to_string(),
                severity: Severity::Medium,
                count: 1,
                description: "Some relationships appear to be incorrect".to_string(),
                examples: vec!["Relationship issues detected".to_string()],
            });
        }

        ErrorAnalysisResult {
            diagram_type,
            total_errors: error_categories.len(),
            severity_breakdown: histogram(&error_categories),
            error_categories,
            primary_issues: vec!["General diagram issues detected".to_string()],
            confidence: 0.3,
        }
    }
}
