//! Step 2 of Phase 3: turns the error analysis into student-facing feedback.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Deserializer, Serialize};
use tracing::info;

use super::error_analyzer::{format_metrics, ErrorAnalysisResult};
use crate::diagrams::DiagramType;
use crate::error::GenerationError;
use crate::llm::decode::{self, Decoded};
use crate::llm::{GenerationGateway, GenerationOptions};
use crate::metrics::DiagramMetrics;
use crate::types::Severity;

/// Maximum number of feedback items recovered from unstructured prose.
const MAX_PROSE_ITEMS: usize = 5;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FeedbackType {
    Error,
    #[default]
    Suggestion,
    Praise,
    Warning,
}

impl FeedbackType {
    /// Unknown labels read as [`FeedbackType::Suggestion`].
    pub fn from_label(label: &str) -> Self {
        match label.trim().to_lowercase().as_str() {
            "error" => FeedbackType::Error,
            "praise" | "strength" => FeedbackType::Praise,
            "warning" => FeedbackType::Warning,
            _ => FeedbackType::Suggestion,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            FeedbackType::Error => "error",
            FeedbackType::Suggestion => "suggestion",
            FeedbackType::Praise => "praise",
            FeedbackType::Warning => "warning",
        }
    }
}

impl fmt::Display for FeedbackType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for FeedbackType {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let label = String::deserialize(deserializer)?;
        Ok(FeedbackType::from_label(&label))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeedbackItem {
    #[serde(rename = "type", default)]
    pub feedback_type: FeedbackType,
    #[serde(default = "general")]
    pub category: String,
    pub message: String,
    #[serde(default)]
    pub severity: Severity,
    #[serde(default = "yes")]
    pub actionable: bool,
    #[serde(default)]
    pub examples: Vec<String>,
}

fn general() -> String {
    "general".to_string()
}

fn yes() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FeedbackGenerationResult {
    pub diagram_type: DiagramType,
    pub feedback_items: Vec<FeedbackItem>,
    pub summary: String,
    pub strengths: Vec<String>,
    pub areas_for_improvement: Vec<String>,
    pub confidence: f64,
}

/// Counts over a [`FeedbackGenerationResult`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FeedbackStatistics {
    pub total_feedback_items: usize,
    pub actionable_items: usize,
    pub feedback_by_type: BTreeMap<FeedbackType, usize>,
    pub feedback_by_severity: BTreeMap<Severity, usize>,
    pub strengths_identified: usize,
    pub improvement_areas: usize,
    pub confidence: f64,
}

impl FeedbackGenerationResult {
    pub fn statistics(&self) -> FeedbackStatistics {
        let mut feedback_by_type = BTreeMap::new();
        let mut feedback_by_severity = BTreeMap::new();
        for item in &self.feedback_items {
            *feedback_by_type.entry(item.feedback_type).or_insert(0) += 1;
            *feedback_by_severity.entry(item.severity).or_insert(0) += 1;
        }

        FeedbackStatistics {
            total_feedback_items: self.feedback_items.len(),
            actionable_items: self.feedback_items.iter().filter(|i| i.actionable).count(),
            feedback_by_type,
            feedback_by_severity,
            strengths_identified: self.strengths.len(),
            improvement_areas: self.areas_for_improvement.len(),
            confidence: self.confidence,
        }
    }
}

#[derive(Deserialize)]
struct RawFeedback {
    #[serde(default)]
    feedback_items: Vec<FeedbackItem>,
    #[serde(default = "default_summary")]
    summary: String,
    #[serde(default)]
    strengths: Vec<String>,
    #[serde(default)]
    areas_for_improvement: Vec<String>,
    #[serde(default = "default_confidence")]
    confidence: f64,
}

fn default_summary() -> String {
    "Feedback generated for your diagram.".to_string()
}

fn default_confidence() -> f64 {
    0.7
}

#[derive(Debug, Clone, Copy, Default)]
pub struct FeedbackGenerator;

impl FeedbackGenerator {
    pub fn new() -> Self {
        Self
    }

    pub async fn generate(
        &self,
        gateway: &mut GenerationGateway,
        errors: &ErrorAnalysisResult,
        metrics: &DiagramMetrics,
        problem_text: &str,
        options: &GenerationOptions,
    ) -> Result<Decoded<FeedbackGenerationResult>, GenerationError> {
        info!(total_errors = errors.total_errors, "generating feedback");
        let prompt = self.build_prompt(errors, metrics, problem_text);
        let response = gateway.generate(&prompt, options).await?;
        Ok(self.parse_response(&response, errors.diagram_type))
    }

    pub fn build_prompt(&self, errors: &ErrorAnalysisResult, metrics: &DiagramMetrics, problem_text: &str) -> String {
        format!(
            r#"You are an experienced software engineering instructor giving feedback on a student's {kind} diagram. Be constructive and educational.

PROBLEM CONTEXT:
{problem_text}

PERFORMANCE METRICS:
{metrics}

IDENTIFIED ERRORS:
{errors}

FEEDBACK GUIDELINES:
1. Start with positive aspects.
2. Explain errors clearly and why they matter.
3. Give specific, actionable suggestions.
4. Use encouraging language.
5. Prioritise the most important issues first.

FEEDBACK TYPES: "error", "suggestion", "praise", "warning".

Respond in JSON:
{{
    "feedback_items": [
        {{
            "type": "praise",
            "category": "structure",
            "message": "The actors are clearly named and well separated.",
            "severity": "low",
            "actionable": false,
            "examples": []
        }}
    ],
    "summary": "Overall assessment in 2-3 sentences",
    "strengths": ["Clear actor identification"],
    "areas_for_improvement": ["Add the missing use cases"],
    "confidence": 0.85
}}
"#,
            kind = errors.diagram_type,
            metrics = format_metrics(metrics),
            errors = errors.format_for_prompt(),
        )
    }

    pub fn parse_response(&self, response: &str, diagram_type: DiagramType) -> Decoded<FeedbackGenerationResult> {
        decode::decode_or_else(
            response,
            "feedback generation",
            |raw: RawFeedback| FeedbackGenerationResult {
                diagram_type,
                feedback_items: raw.feedback_items,
                summary: raw.summary,
                strengths: raw.strengths,
                areas_for_improvement: raw.areas_for_improvement,
                confidence: decode::clamp_unit(raw.confidence),
            },
            |text| Self::fallback(text, diagram_type),
        )
    }

    /// Uses the first sentences of a prose answer as general suggestions.
    fn fallback(response: &str, diagram_type: DiagramType) -> FeedbackGenerationResult {
        let feedback_items = response
            .split('.')
            .take(MAX_PROSE_ITEMS)
            .map(str::trim)
            .filter(|sentence| sentence.len() > 20)
            .map(|sentence| FeedbackItem {
                feedback_type: FeedbackType::Suggestion,
                category: general(),
                message: sentence.to_string(),
                severity: Severity::Medium,
                actionable: true,
                examples: Vec::new(),
            })
            .collect();

        FeedbackGenerationResult {
            diagram_type,
            feedback_items,
            summary: "Feedback has been generated for your diagram. Please review the suggestions for improvement."
                .to_string(),
            strengths: vec!["Your diagram shows understanding of basic UML concepts".to_string()],
            areas_for_improvement: vec!["Consider reviewing the feedback items for specific improvements".to_string()],
            confidence: 0.5,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parses_feedback_json() {
        let answer = r#"Here you go:
```json
{
    "feedback_items": [
        {"type": "praise", "category": "structure", "message": "Clear actors", "severity": "low", "actionable": false},
        {"type": "error", "category": "missing_components", "message": "Admin is missing", "severity": "high"},
        {"type": "nitpick", "message": "Consider a title"}
    ],
    "summary": "A solid start.",
    "strengths": ["Clear actors", "Tidy layout"],
    "confidence": 0.8
}
```"#;
        let decoded = FeedbackGenerator::new().parse_response(answer, DiagramType::UseCase);
        assert!(!decoded.is_fallback());
        let result = decoded.into_inner();

        assert_eq!(result.feedback_items.len(), 3);
        assert_eq!(result.feedback_items[2].feedback_type, FeedbackType::Suggestion);
        assert_eq!(result.feedback_items[2].category, "general");
        assert!(result.feedback_items[1].actionable);
        assert_eq!(result.summary, "A solid start.");
        assert_eq!(result.confidence, 0.8);

        let stats = result.statistics();
        assert_eq!(stats.total_feedback_items, 3);
        assert_eq!(stats.actionable_items, 2);
        assert_eq!(stats.feedback_by_type[&FeedbackType::Praise], 1);
        assert_eq!(stats.feedback_by_severity[&Severity::Medium], 1);
        assert_eq!(stats.strengths_identified, 2);
        assert_eq!(stats.improvement_areas, 0);
    }

    #[test]
    fn test_missing_fields_use_defaults() {
        let result = FeedbackGenerator::new()
            .parse_response("{}", DiagramType::Class)
            .into_inner();
        assert_eq!(result.summary, "Feedback generated for your diagram.");
        assert_eq!(result.confidence, 0.7);
        assert!(result.feedback_items.is_empty());
    }

    #[test]
    fn test_prose_fallback() {
        let prose = "Your diagram is missing the administrator actor entirely. Good. \
                     The relationship between Customer and Checkout should be an include. Short one.";
        let decoded = FeedbackGenerator::new().parse_response(prose, DiagramType::UseCase);
        assert!(decoded.is_fallback());
        let result = decoded.into_inner();

        assert_eq!(result.feedback_items.len(), 2);
        assert!(result.feedback_items.iter().all(|i| i.feedback_type == FeedbackType::Suggestion));
        assert_eq!(result.confidence, 0.5);
        assert_eq!(result.strengths, vec!["Your diagram shows understanding of basic UML concepts"]);
    }

    #[test]
    fn test_feedback_type_labels() {
        assert_eq!(FeedbackType::from_label("ERROR"), FeedbackType::Error);
        assert_eq!(FeedbackType::from_label("strength"), FeedbackType::Praise);
        assert_eq!(FeedbackType::from_label("hint"), FeedbackType::Suggestion);
        assert_eq!(FeedbackType::Warning.to_string(), "warning");
    }
}
