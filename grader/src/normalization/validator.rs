//! Step 4: checks the rewritten diagram.
//!
//! Validation has two halves. Local syntax checks run without any generation
//! call; a single round-trip then judges whether the rewrite preserved the
//! student's logic and matched the reference conventions.

use serde::Serialize;
use tracing::{info, warn};

use super::code_normalizer::CodeNormalizationResult;
use super::convention_analyzer::ConventionAnalysisResult;
use crate::error::GenerationError;
use crate::llm::decode::{self, Decoded};
use crate::llm::{GenerationGateway, GenerationOptions};
use crate::types::Severity;

const DEFAULT_CONFIDENCE: f64 = 0.8;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ValidationIssue {
    /// `syntax`, `logic`, `convention` or `validation`.
    pub issue_type: String,
    pub severity: Severity,
    pub description: String,
    pub location: String,
    pub suggestion: String,
}

impl ValidationIssue {
    fn syntax(severity: Severity, description: &str, location: impl Into<String>, suggestion: &str) -> Self {
        Self {
            issue_type: "syntax".to_string(),
            severity,
            description: description.to_string(),
            location: location.into(),
            suggestion: suggestion.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ValidationResult {
    pub is_valid: bool,
    pub validated_text: String,
    pub issues: Vec<ValidationIssue>,
    pub syntax_valid: bool,
    pub logic_preserved: bool,
    pub conventions_matched: bool,
    pub confidence: f64,
}

impl ValidationResult {
    /// Result reported when the chain never reached validation.
    pub fn not_run(text: &str) -> Self {
        Self {
            is_valid: false,
            validated_text: text.to_string(),
            issues: Vec::new(),
            syntax_valid: false,
            logic_preserved: true,
            conventions_matched: false,
            confidence: 0.0,
        }
    }

    pub fn severe_issues(&self) -> impl Iterator<Item = &ValidationIssue> {
        self.issues.iter().filter(|issue| issue.severity.is_severe())
    }
}

/// What the generation round-trip said about the rewrite.
#[derive(Debug, Clone, PartialEq)]
pub struct ReviewVerdict {
    pub logic_preserved: bool,
    pub conventions_matched: bool,
    pub confidence: f64,
    pub issues: Vec<ValidationIssue>,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct NormalizationValidator;

impl NormalizationValidator {
    pub fn new() -> Self {
        Self
    }

    /// Validates `normalization` against the student's original text.
    ///
    /// # Errors
    ///
    /// Only generation failures are returned.
    pub async fn validate(
        &self,
        gateway: &mut GenerationGateway,
        original_text: &str,
        normalization: &CodeNormalizationResult,
        conventions: &ConventionAnalysisResult,
        problem_text: &str,
        options: &GenerationOptions,
    ) -> Result<Decoded<ValidationResult>, GenerationError> {
        let syntax_issues = self.check_syntax(&normalization.normalized_text);
        info!(syntax_issues = syntax_issues.len(), "validating normalized diagram");

        let prompt = self.build_prompt(original_text, normalization, conventions, problem_text);
        let response = gateway.generate(&prompt, options).await?;
        let verdict = self.parse_response(&response);

        let combine = |verdict: ReviewVerdict| Self::combine(&normalization.normalized_text, syntax_issues, verdict);
        Ok(match verdict {
            Decoded::Parsed(verdict) => Decoded::Parsed(combine(verdict)),
            Decoded::Fallback { value, reason } => Decoded::Fallback {
                value: combine(value),
                reason,
            },
        })
    }

    /// Merges local syntax findings with the review verdict.
    pub fn combine(text: &str, syntax_issues: Vec<ValidationIssue>, verdict: ReviewVerdict) -> ValidationResult {
        let syntax_valid = syntax_issues.is_empty();
        let mut issues = syntax_issues;
        issues.extend(verdict.issues);
        let no_severe = !issues.iter().any(|issue| issue.severity.is_severe());

        ValidationResult {
            is_valid: syntax_valid && verdict.logic_preserved && verdict.conventions_matched && no_severe,
            validated_text: text.to_string(),
            issues,
            syntax_valid,
            logic_preserved: verdict.logic_preserved,
            conventions_matched: verdict.conventions_matched,
            confidence: verdict.confidence,
        }
    }

    /// Deterministic checks: start and end markers, balanced quotes, one arrow per line.
    pub fn check_syntax(&self, text: &str) -> Vec<ValidationIssue> {
        let mut issues = Vec::new();
        let trimmed = text.trim();

        if !trimmed.starts_with("@start") {
            issues.push(ValidationIssue::syntax(
                Severity::High,
                "PlantUML code should start with @startuml",
                "beginning",
                "Add @startuml at the beginning",
            ));
        }
        if !trimmed.ends_with("@enduml") {
            issues.push(ValidationIssue::syntax(
                Severity::High,
                "PlantUML code should end with @enduml",
                "end",
                "Add @enduml at the end",
            ));
        }

        let starts = trimmed.lines().filter(|l| l.trim_start().starts_with("@start")).count();
        let ends = trimmed.lines().filter(|l| l.trim_start().starts_with("@end")).count();
        if starts != ends && starts > 0 && ends > 0 {
            issues.push(ValidationIssue::syntax(
                Severity::High,
                "Unbalanced @start/@end markers",
                "throughout",
                "Pair every @startuml with an @enduml",
            ));
        }

        if trimmed.matches('"').count() % 2 != 0 {
            issues.push(ValidationIssue::syntax(
                Severity::Medium,
                "Unmatched quotes detected",
                "throughout",
                "Ensure all quotes are properly closed",
            ));
        }

        for (number, line) in trimmed.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('\'') {
                continue;
            }
            if line.matches("-->").count() + line.matches("--|>").count() > 1 {
                issues.push(ValidationIssue::syntax(
                    Severity::Medium,
                    "Multiple relationship arrows in single line",
                    format!("line {}", number + 1),
                    "Split into separate relationship lines",
                ));
            }
        }

        issues
    }

    pub fn build_prompt(
        &self,
        original_text: &str,
        normalization: &CodeNormalizationResult,
        conventions: &ConventionAnalysisResult,
        problem_text: &str,
    ) -> String {
        let changes = normalization
            .changes_made
            .iter()
            .map(|change| format!("- {change}"))
            .collect::<Vec<_>>()
            .join("\n");

        format!(
            r#"You are an expert PlantUML validator. Validate that the normalized {kind} diagram preserves the original student's intent while matching the teacher's conventions.

PROBLEM DESCRIPTION:
{problem_text}

TEACHER'S CONVENTIONS:
{conventions}

ORIGINAL STUDENT CODE:
{original_text}

NORMALIZED CODE:
{normalized}

CHANGES MADE:
{changes}

Answer in this format:

LOGIC_PRESERVED: [true/false]
CONVENTIONS_MATCHED: [true/false]
CONFIDENCE: [0.0-1.0]

ISSUES_FOUND:
[List issues, or "None"]
- <type> <severity> <description>

VALIDATION_SUMMARY:
[Brief summary]

Check that every original actor, class or participant and every relationship is still present, that naming follows the teacher's style, and that the syntax is correct.
"#,
            kind = conventions.diagram_type,
            conventions = conventions.format_for_prompt(false),
            normalized = normalization.normalized_text,
        )
    }

    /// Reads the labelled verdict.
    ///
    /// Missing booleans default to `true`, a missing confidence to `0.8`. An answer
    /// carrying none of the labels is a fallback with a single medium issue.
    pub fn parse_response(&self, response: &str) -> Decoded<ReviewVerdict> {
        let logic = decode::labeled_bool(response, "LOGIC_PRESERVED");
        let conventions = decode::labeled_bool(response, "CONVENTIONS_MATCHED");
        let confidence = decode::confidence(response);

        if logic.is_none() && conventions.is_none() && confidence.is_none() {
            let reason = "validation answer had no recognised fields".to_string();
            warn!(%reason, "validation fell back to defaults");
            return Decoded::Fallback {
                value: ReviewVerdict {
                    logic_preserved: true,
                    conventions_matched: true,
                    confidence: 0.5,
                    issues: vec![ValidationIssue {
                        issue_type: "validation".to_string(),
                        severity: Severity::Medium,
                        description: format!("Validation parsing failed: {reason}"),
                        location: "unknown".to_string(),
                        suggestion: "Manual review recommended".to_string(),
                    }],
                },
                reason,
            };
        }

        Decoded::Parsed(ReviewVerdict {
            logic_preserved: logic.unwrap_or(true),
            conventions_matched: conventions.unwrap_or(true),
            confidence: confidence.unwrap_or(DEFAULT_CONFIDENCE),
            issues: Self::parse_issues(response),
        })
    }

    fn parse_issues(response: &str) -> Vec<ValidationIssue> {
        let Some(body) = decode::section(response, "ISSUES_FOUND", &["VALIDATION_SUMMARY"]) else {
            return Vec::new();
        };
        if body.eq_ignore_ascii_case("none") {
            return Vec::new();
        }

        body.lines()
            .filter_map(|line| line.trim().strip_prefix('-'))
            .filter_map(|item| {
                let item = item.trim();
                // tolerate the "Issue 1:" prefix from the prompt template
                let item = match item.split_once(':') {
                    Some((head, rest)) if head.to_ascii_lowercase().starts_with("issue") => rest.trim(),
                    _ => item,
                };
                let mut parts = item.splitn(3, ' ');
                let issue_type = parts.next()?.trim_matches(|c| c == '[' || c == ']');
                let severity = parts.next()?;
                let description = parts.next()?.trim();
                Some(ValidationIssue {
                    issue_type: issue_type.to_string(),
                    severity: Severity::from_label(severity),
                    description: description.to_string(),
                    location: "unknown".to_string(),
                    suggestion: "Review manually".to_string(),
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn verdict(logic: bool, conventions: bool, issues: Vec<ValidationIssue>) -> ReviewVerdict {
        ReviewVerdict {
            logic_preserved: logic,
            conventions_matched: conventions,
            confidence: 0.9,
            issues,
        }
    }

    #[test]
    fn test_clean_source_has_no_syntax_issues() {
        let text = "@startuml\nactor User\nUser --> (Login)\n@enduml";
        assert!(NormalizationValidator::new().check_syntax(text).is_empty());
    }

    #[test]
    fn test_syntax_problems_are_reported() {
        let validator = NormalizationValidator::new();
        let issues = validator.check_syntax("actor \"User\nA --> B --> C");
        let descriptions: Vec<&str> = issues.iter().map(|i| i.description.as_str()).collect();
        assert_eq!(
            descriptions,
            vec![
                "PlantUML code should start with @startuml",
                "PlantUML code should end with @enduml",
                "Unmatched quotes detected",
                "Multiple relationship arrows in single line",
            ]
        );
        assert_eq!(issues[3].location, "line 2");

        let unbalanced = validator.check_syntax("@startuml\nA -> B\n@startuml\n@enduml");
        assert!(unbalanced.iter().any(|i| i.description.starts_with("Unbalanced")));
    }

    #[test]
    fn test_parse_verdict_and_issues() {
        let answer = "LOGIC_PRESERVED: true\nCONVENTIONS_MATCHED: false\nCONFIDENCE: 0.65\n\nISSUES_FOUND:\n- Issue 1: naming high Actor renamed incorrectly\n- convention weird Minor spacing\n- broken\n\nVALIDATION_SUMMARY:\nMostly fine.";
        let verdict = NormalizationValidator::new().parse_response(answer).into_inner();
        assert!(verdict.logic_preserved);
        assert!(!verdict.conventions_matched);
        assert_eq!(verdict.confidence, 0.65);
        assert_eq!(verdict.issues.len(), 2);
        assert_eq!(verdict.issues[0].issue_type, "naming");
        assert_eq!(verdict.issues[0].severity, Severity::High);
        assert_eq!(verdict.issues[0].description, "Actor renamed incorrectly");
        assert_eq!(verdict.issues[1].severity, Severity::Medium);
    }

    #[test]
    fn test_none_issues_and_defaults() {
        let verdict = NormalizationValidator::new()
            .parse_response("CONFIDENCE: 0.9\nISSUES_FOUND:\nNone")
            .into_inner();
        assert!(verdict.logic_preserved && verdict.conventions_matched);
        assert!(verdict.issues.is_empty());
    }

    #[test]
    fn test_unlabelled_answer_falls_back() {
        let decoded = NormalizationValidator::new().parse_response("Looks good to me!");
        assert!(decoded.is_fallback());
        let verdict = decoded.into_inner();
        assert_eq!(verdict.confidence, 0.5);
        assert!(verdict.issues[0].description.starts_with("Validation parsing failed"));
    }

    #[test]
    fn test_validity_requires_every_condition() {
        let text = "@startuml\n@enduml";
        assert!(NormalizationValidator::combine(text, vec![], verdict(true, true, vec![])).is_valid);
        assert!(!NormalizationValidator::combine(text, vec![], verdict(false, true, vec![])).is_valid);
        assert!(!NormalizationValidator::combine(text, vec![], verdict(true, false, vec![])).is_valid);

        let severe = ValidationIssue {
            issue_type: "logic".into(),
            severity: Severity::Critical,
            description: "lost a class".into(),
            location: "unknown".into(),
            suggestion: "restore it".into(),
        };
        let result = NormalizationValidator::combine(text, vec![], verdict(true, true, vec![severe]));
        assert!(!result.is_valid);
        assert!(result.syntax_valid);
        assert_eq!(result.severe_issues().count(), 1);

        let minor_syntax = ValidationIssue::syntax(Severity::Low, "odd spacing", "line 1", "tidy");
        let result = NormalizationValidator::combine(text, vec![minor_syntax], verdict(true, true, vec![]));
        assert!(!result.syntax_valid);
        assert!(!result.is_valid);
    }
}
