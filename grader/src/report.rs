//! # Grading Report Module
//!
//! The serializable envelope handed to callers of the grader, flattened from a
//! [`PipelineResult`].
//!
//! ## JSON Output Example
//!
//! ```json
//! {
//!   "success": true,
//!   "message": "Grading complete.",
//!   "data": {
//!     "diagram_type": "use_case",
//!     "final_score": 8.45,
//!     "grade_letter": "B",
//!     "feedback_summary": "...",
//!     "normalization_success": true,
//!     "extraction_success": true,
//!     "feedback_success": true,
//!     "metrics": { ... },
//!     "score_breakdown": { ... },
//!     "warnings": [],
//!     "errors": []
//!   }
//! }
//! ```

use serde::Serialize;

use crate::diagrams::DiagramType;
use crate::feedback::{FeedbackGenerationResult, ScoreBreakdown, SuggestionResult};
use crate::llm::GenerationLogSummary;
use crate::metrics::DiagramMetrics;
use crate::pipeline::PipelineResult;

/// Caller-facing view of one grading run.
#[derive(Debug, Serialize)]
pub struct GradingReport {
    pub diagram_type: DiagramType,
    pub final_score: f64,
    pub grade_letter: char,
    pub feedback_summary: String,
    pub processing_time_ms: u64,
    pub confidence: f64,
    pub normalization_success: bool,
    pub extraction_success: bool,
    pub feedback_success: bool,
    /// The text that was graded: normalized when Phase 1 succeeded.
    pub graded_text: Option<String>,
    pub metrics: Option<DiagramMetrics>,
    pub score_breakdown: Option<ScoreBreakdown>,
    pub feedback: Option<FeedbackGenerationResult>,
    pub suggestions: Option<SuggestionResult>,
    pub generation: GenerationLogSummary,
    pub warnings: Vec<String>,
    pub errors: Vec<String>,
}

impl From<PipelineResult> for GradingReport {
    fn from(result: PipelineResult) -> Self {
        let normalization_success = result.normalization_succeeded();
        let feedback_success = result.feedback_succeeded();
        let graded_text = result.phase_one.map(|p| p.normalized_text);
        let (score_breakdown, feedback, suggestions) = match result.phase_three {
            Some(p) => (Some(p.score_breakdown), Some(p.feedback), Some(p.suggestions)),
            None => (None, None, None),
        };

        GradingReport {
            diagram_type: result.diagram_type,
            final_score: result.final_score,
            grade_letter: result.grade_letter,
            feedback_summary: result.feedback_summary,
            processing_time_ms: result.timings.total_ms,
            confidence: result.overall_confidence,
            normalization_success,
            extraction_success: result.phase_two.is_some(),
            feedback_success,
            graded_text,
            metrics: result.phase_two.map(|p| p.metrics),
            score_breakdown,
            feedback,
            suggestions,
            generation: result.generation,
            warnings: result.warnings,
            errors: result.errors,
        }
    }
}

/// The response envelope for grading results.
///
/// - `success`: whether the pipeline produced a grade.
/// - `message`: "Grading complete." on success, otherwise the first error.
/// - `data`: the [`GradingReport`].
#[derive(Debug, Serialize)]
pub struct GradingReportResponse {
    pub success: bool,
    pub message: String,
    pub data: GradingReport,
}

impl From<PipelineResult> for GradingReportResponse {
    fn from(result: PipelineResult) -> Self {
        let success = result.success;
        let message = if success {
            "Grading complete.".to_string()
        } else {
            result
                .errors
                .first()
                .cloned()
                .unwrap_or_else(|| "Grading failed.".to_string())
        };

        GradingReportResponse {
            success,
            message,
            data: result.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::error::GenerationError;
    use crate::extraction::PhaseTwoExtractor;
    use crate::llm::ScriptedProvider;
    use crate::pipeline::{Pipeline, PipelineConfig};
    use serde_json::Value;

    const DIAGRAM: &str = "@startuml\nactor User\nusecase (Login)\nUser --> (Login)\n@enduml";

    fn offline_pipeline() -> Pipeline {
        let config = PipelineConfig {
            max_retries: 0,
            rate_limit_rpm: 0,
            ..PipelineConfig::default()
        };
        let provider = ScriptedProvider::failing(GenerationError::Transport("offline".into()));
        Pipeline::new(config, Arc::new(provider))
    }

    #[tokio::test]
    async fn test_successful_run_serialization() {
        let result = offline_pipeline()
            .run(DIAGRAM, DIAGRAM, "Login", Some(DiagramType::UseCase), None)
            .await
            .unwrap();
        let response: GradingReportResponse = result.into();
        let value: Value = serde_json::to_value(&response).unwrap();

        assert_eq!(value["success"], true);
        assert_eq!(value["message"], "Grading complete.");
        assert_eq!(value["data"]["diagram_type"], "use_case");
        assert_eq!(value["data"]["final_score"], 10.0);
        assert_eq!(value["data"]["grade_letter"], "A");
        assert_eq!(value["data"]["normalization_success"], false);
        assert_eq!(value["data"]["extraction_success"], true);
        assert_eq!(value["data"]["feedback_success"], false);
        assert_eq!(value["data"]["graded_text"], DIAGRAM);
        assert!(value["data"]["score_breakdown"].is_null());
        assert_eq!(value["data"]["metrics"]["similarity_score"], 1.0);
        assert_eq!(value["data"]["generation"]["failed_calls"], 2);
    }

    #[tokio::test]
    async fn test_failed_run_message_is_first_error() {
        let pipeline = offline_pipeline()
            .with_extractor(PhaseTwoExtractor::default().without_parser(DiagramType::UseCase));
        let result = pipeline
            .run(DIAGRAM, DIAGRAM, "Login", Some(DiagramType::UseCase), None)
            .await
            .unwrap();
        let response: GradingReportResponse = result.into();

        assert!(!response.success);
        assert_eq!(
            response.message,
            "Phase 2 extraction failed: unsupported diagram type: use_case"
        );
        assert!(response.data.metrics.is_none());
        assert_eq!(response.data.final_score, 0.0);
    }
}
