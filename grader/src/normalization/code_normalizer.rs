//! Step 3: rewrites the student's diagram in the reference conventions.
//!
//! The answer is labelled plain text rather than JSON:
//!
//! ~~~text
//! NORMALIZED_CODE:
//! ```plantuml
//! ...
//! ```
//! CHANGES_MADE:
//! - ...
//! WARNINGS:
//! - ...
//! CONFIDENCE: 0.9
//! ~~~
//!
//! The rewritten source is taken from the first `plantuml` fence, else the first
//! generic fence, else the `NORMALIZED_CODE:` section. When none is present the
//! student's original text is kept.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use tracing::{info, warn};

use super::convention_analyzer::ConventionAnalysisResult;
use super::difference_detector::DifferenceDetectionResult;
use crate::error::GenerationError;
use crate::llm::decode::{self, Decoded};
use crate::llm::{GenerationGateway, GenerationOptions};

const DEFAULT_CONFIDENCE: f64 = 0.7;

static CODE_SECTION: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?is)NORMALIZED_CODE:\s*(.*?)\s*(?:CHANGES_MADE:|WARNINGS:|CONFIDENCE:|\z)").expect("static regex")
});

static STRAY_FENCE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^```(?:plantuml)?\s*|\s*```$").expect("static regex"));

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CodeNormalizationResult {
    pub normalized_text: String,
    pub changes_made: Vec<String>,
    pub warnings: Vec<String>,
    pub confidence: f64,
}

impl CodeNormalizationResult {
    /// The untouched student text, flagged as a failed normalization.
    pub fn unchanged(original: &str) -> Self {
        Self {
            normalized_text: original.to_string(),
            changes_made: Vec::new(),
            warnings: vec!["Normalization failed".to_string()],
            confidence: 0.0,
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct CodeNormalizer;

impl CodeNormalizer {
    pub fn new() -> Self {
        Self
    }

    pub async fn normalize(
        &self,
        gateway: &mut GenerationGateway,
        student_text: &str,
        conventions: &ConventionAnalysisResult,
        differences: &DifferenceDetectionResult,
        problem_text: &str,
        options: &GenerationOptions,
    ) -> Result<Decoded<CodeNormalizationResult>, GenerationError> {
        info!(differences = differences.total_differences, "generating normalized diagram");
        let prompt = self.build_prompt(student_text, conventions, differences, problem_text);
        let response = gateway.generate(&prompt, options).await?;
        Ok(self.parse_response(&response, student_text))
    }

    pub fn build_prompt(
        &self,
        student_text: &str,
        conventions: &ConventionAnalysisResult,
        differences: &DifferenceDetectionResult,
        problem_text: &str,
    ) -> String {
        format!(
            r#"You are an expert PlantUML code normalizer. Rewrite the student's {kind} diagram to match the teacher's conventions while preserving the student's original logic and intent.

PROBLEM DESCRIPTION:
{problem_text}

TEACHER'S CONVENTIONS TO FOLLOW:
{conventions}

IDENTIFIED DIFFERENCES TO FIX:
{differences}

STUDENT'S ORIGINAL PLANTUML CODE:
{student_text}

NORMALIZATION REQUIREMENTS:
1. PRESERVE LOGIC: keep every original component, relationship and the logical structure.
2. MATCH CONVENTIONS: apply the teacher's naming, structural and style conventions.
3. FIX DIFFERENCES: address each identified difference.
4. MAINTAIN VALIDITY: the result must be valid PlantUML.
5. BE CONSERVATIVE: change only what is needed to match the conventions.

Format your response as:
NORMALIZED_CODE:
```plantuml
[normalized PlantUML code here]
```

CHANGES_MADE:
- Description of each change

WARNINGS:
- Any potential issue

CONFIDENCE: [0.0-1.0]
"#,
            kind = conventions.diagram_type,
            conventions = conventions.format_for_prompt(true),
            differences = differences.format_for_prompt(),
        )
    }

    /// Reads the labelled answer. Missing code keeps `original`.
    pub fn parse_response(&self, response: &str, original: &str) -> Decoded<CodeNormalizationResult> {
        let changes_made = decode::section(response, "CHANGES_MADE", &["WARNINGS", "CONFIDENCE"])
            .map(decode::bullet_lines)
            .unwrap_or_default();
        let warnings = decode::section(response, "WARNINGS", &["CONFIDENCE"])
            .map(decode::bullet_lines)
            .unwrap_or_default();
        let confidence = decode::confidence(response).unwrap_or(DEFAULT_CONFIDENCE);

        match Self::extract_code(response) {
            Some(code) => Decoded::Parsed(CodeNormalizationResult {
                normalized_text: code,
                changes_made,
                warnings,
                confidence,
            }),
            None => {
                warn!("no normalized code in response, keeping the original");
                Decoded::Fallback {
                    value: CodeNormalizationResult {
                        normalized_text: original.to_string(),
                        changes_made,
                        warnings,
                        confidence,
                    },
                    reason: "no normalized code found in response".to_string(),
                }
            }
        }
    }

    fn extract_code(response: &str) -> Option<String> {
        let raw = decode::fenced_block(response, "plantuml")
            .or_else(|| decode::fenced_block(response, ""))
            .or_else(|| {
                CODE_SECTION
                    .captures(response)
                    .and_then(|caps| caps.get(1))
                    .map(|m| m.as_str())
            })?;

        let code = STRAY_FENCE.replace_all(raw.trim(), "");
        let code = code.trim();
        (!code.is_empty()).then(|| code.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ORIGINAL: &str = "@startuml\nactor customer\n@enduml";

    #[test]
    fn test_parses_full_answer() {
        let answer = "NORMALIZED_CODE:\n```plantuml\n@startuml\nactor Customer\n@enduml\n```\n\nCHANGES_MADE:\n- Renamed customer to Customer\n\nWARNINGS:\n- None expected\n\nCONFIDENCE: 0.92";
        let decoded = CodeNormalizer::new().parse_response(answer, ORIGINAL);
        assert!(!decoded.is_fallback());
        let result = decoded.into_inner();
        assert_eq!(result.normalized_text, "@startuml\nactor Customer\n@enduml");
        assert_eq!(result.changes_made, vec!["Renamed customer to Customer"]);
        assert_eq!(result.warnings, vec!["None expected"]);
        assert_eq!(result.confidence, 0.92);
    }

    #[test]
    fn test_generic_fence_and_default_confidence() {
        let answer = "```\n@startuml\nactor Customer\n@enduml\n```";
        let result = CodeNormalizer::new().parse_response(answer, ORIGINAL).into_inner();
        assert_eq!(result.normalized_text, "@startuml\nactor Customer\n@enduml");
        assert_eq!(result.confidence, 0.7);
        assert!(result.changes_made.is_empty());
    }

    #[test]
    fn test_unfenced_section() {
        let answer = "NORMALIZED_CODE:\n@startuml\nactor Customer\n@enduml\nCHANGES_MADE:\n• one change";
        let result = CodeNormalizer::new().parse_response(answer, ORIGINAL).into_inner();
        assert_eq!(result.normalized_text, "@startuml\nactor Customer\n@enduml");
        assert_eq!(result.changes_made, vec!["one change"]);
    }

    #[test]
    fn test_missing_code_keeps_original() {
        let decoded = CodeNormalizer::new().parse_response("I could not do it. CONFIDENCE: 0.2", ORIGINAL);
        assert!(decoded.is_fallback());
        let result = decoded.into_inner();
        assert_eq!(result.normalized_text, ORIGINAL);
        assert_eq!(result.confidence, 0.2);
    }

    #[test]
    fn test_unchanged_result() {
        let result = CodeNormalizationResult::unchanged(ORIGINAL);
        assert_eq!(result.normalized_text, ORIGINAL);
        assert_eq!(result.confidence, 0.0);
        assert_eq!(result.warnings, vec!["Normalization failed"]);
    }
}
