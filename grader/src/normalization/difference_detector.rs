//! Step 2: compares the student's diagram with the reference conventions.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::info;

use super::convention_analyzer::ConventionAnalysisResult;
use crate::diagrams::DiagramType;
use crate::error::GenerationError;
use crate::llm::decode::{self, Decoded};
use crate::llm::{GenerationGateway, GenerationOptions};
use crate::types::{histogram_from_labels, Severity};

/// A place where the student departs from a reference convention.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConventionDifference {
    /// `naming`, `structure` or `style`.
    #[serde(default)]
    pub difference_type: String,
    /// Finer grouping such as `actor_naming`.
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub teacher_convention: String,
    #[serde(default)]
    pub student_convention: String,
    #[serde(default)]
    pub examples: Vec<String>,
    #[serde(default)]
    pub severity: Severity,
    #[serde(default = "default_confidence")]
    pub confidence: f64,
}

fn default_confidence() -> f64 {
    0.5
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DifferenceDetectionResult {
    pub diagram_type: DiagramType,
    pub differences: Vec<ConventionDifference>,
    pub total_differences: usize,
    pub severity_breakdown: BTreeMap<Severity, usize>,
    pub overall_confidence: f64,
}

impl DifferenceDetectionResult {
    pub fn empty(diagram_type: DiagramType) -> Self {
        Self::from_differences(diagram_type, Vec::new(), 0.0)
    }

    /// Builds a result whose totals are counted from `differences`.
    pub fn from_differences(diagram_type: DiagramType, differences: Vec<ConventionDifference>, confidence: f64) -> Self {
        Self {
            diagram_type,
            total_differences: differences.len(),
            severity_breakdown: severity_histogram(&differences),
            differences,
            overall_confidence: confidence,
        }
    }

    pub fn format_for_prompt(&self) -> String {
        if self.differences.is_empty() {
            return "No significant differences detected.".to_string();
        }

        let mut lines = Vec::new();
        for diff in &self.differences {
            lines.push(format!("- {} ({} severity):", diff.category, diff.severity));
            lines.push(format!("  Teacher uses: {}", diff.teacher_convention));
            lines.push(format!("  Student uses: {}", diff.student_convention));
            if !diff.examples.is_empty() {
                lines.push(format!("  Examples to fix: {}", diff.examples.join(", ")));
            }
        }
        lines.join("\n")
    }
}

fn severity_histogram(differences: &[ConventionDifference]) -> BTreeMap<Severity, usize> {
    let mut histogram: BTreeMap<Severity, usize> = [Severity::Low, Severity::Medium, Severity::High]
        .into_iter()
        .map(|s| (s, 0))
        .collect();
    for diff in differences {
        *histogram.entry(diff.severity).or_default() += 1;
    }
    histogram
}

#[derive(Deserialize)]
struct RawDetection {
    #[serde(default)]
    differences: Vec<ConventionDifference>,
    total_differences: Option<usize>,
    #[serde(default)]
    severity_breakdown: BTreeMap<String, usize>,
    #[serde(default = "default_confidence")]
    overall_confidence: f64,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct DifferenceDetector;

impl DifferenceDetector {
    pub fn new() -> Self {
        Self
    }

    /// Runs the comparison round-trip against the step-1 conventions.
    pub async fn detect(
        &self,
        gateway: &mut GenerationGateway,
        student_text: &str,
        conventions: &ConventionAnalysisResult,
        problem_text: &str,
        options: &GenerationOptions,
    ) -> Result<Decoded<DifferenceDetectionResult>, GenerationError> {
        info!(diagram_type = %conventions.diagram_type, "detecting convention differences");
        let prompt = self.build_prompt(student_text, conventions, problem_text);
        let response = gateway.generate(&prompt, options).await?;
        Ok(self.parse_response(&response, conventions.diagram_type))
    }

    pub fn build_prompt(&self, student_text: &str, conventions: &ConventionAnalysisResult, problem_text: &str) -> String {
        format!(
            r#"You are an expert UML diagram analyzer. Compare the student's {kind} diagram with the teacher's established conventions and identify all differences.

PROBLEM DESCRIPTION:
{problem_text}

TEACHER'S CONVENTIONS:
{conventions}

STUDENT'S PLANTUML CODE:
{student_text}

Identify every difference in:
1. NAMING: naming patterns, missing prefixes or suffixes, capitalization, spaces and special characters.
2. STRUCTURE: relationship types, hierarchy organisation, missing or extra structural elements, syntax approach.
3. STYLE: quotes, aliases, labels, formatting, stereotypes and annotations.

For each difference give a severity ("low" cosmetic, "medium" affects readability, "high" affects meaning) and a confidence between 0.0 and 1.0.

Respond with JSON:
{{
    "differences": [
        {{
            "difference_type": "naming|structure|style",
            "category": "specific_category_name",
            "teacher_convention": "How teacher does it",
            "student_convention": "How student does it",
            "examples": ["example from student"],
            "severity": "low|medium|high",
            "confidence": 0.95
        }}
    ],
    "total_differences": 1,
    "severity_breakdown": {{"low": 0, "medium": 1, "high": 0}},
    "overall_confidence": 0.90
}}

Focus on meaningful differences that would benefit from normalization.
"#,
            kind = conventions.diagram_type,
            conventions = conventions.format_for_prompt(true),
        )
    }

    pub fn parse_response(&self, response: &str, diagram_type: DiagramType) -> Decoded<DifferenceDetectionResult> {
        decode::decode_or_else(
            response,
            "difference detection",
            |raw: RawDetection| {
                let severity_breakdown = if raw.severity_breakdown.is_empty() {
                    severity_histogram(&raw.differences)
                } else {
                    histogram_from_labels(raw.severity_breakdown)
                };
                DifferenceDetectionResult {
                    diagram_type,
                    total_differences: raw.total_differences.unwrap_or(raw.differences.len()),
                    differences: raw.differences,
                    severity_breakdown,
                    overall_confidence: decode::clamp_unit(raw.overall_confidence),
                }
            },
            |text| Self::fallback(text, diagram_type),
        )
    }

    fn fallback(response: &str, diagram_type: DiagramType) -> DifferenceDetectionResult {
        let mut differences = Vec::new();
        if response.to_lowercase().contains("naming") {
            differences.push(ConventionDifference {
                difference_type: "naming".to_string(),
                category: "general_naming".to_string(),
                teacher_convention: "Consistent naming pattern".to_string(),
                student_convention: "Inconsistent naming pattern".to_string(),
                examples: vec!["Various naming inconsistencies found".to_string()],
                severity: Severity::Medium,
                confidence: 0.6,
            });
        }
        DifferenceDetectionResult::from_differences(diagram_type, differences, 0.5)
    }
}
