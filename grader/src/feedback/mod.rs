//! # Phase 3: Error Analysis, Feedback and Scoring
//!
//! Turns the Phase 2 metrics into something a student can act on:
//!
//! - [`error_analyzer`]: generation-backed categorisation of what is wrong.
//! - [`feedback_generator`]: generation-backed, student-facing feedback.
//! - [`score_calculator`]: deterministic 0-10 score with penalties and bonuses.
//! - [`suggestion_engine`]: deterministic, template-based next steps.
//!
//! [`PhaseThreeOrchestrator::run`] fails only when a generation round-trip
//! fails. Malformed answers are decoded heuristically and recorded in
//! `fallback_steps`.

pub mod error_analyzer;
pub mod feedback_generator;
pub mod score_calculator;
pub mod suggestion_engine;

use std::time::Instant;

use serde::Serialize;
use tracing::{info, warn};

use crate::diagrams::DiagramType;
use crate::error::GenerationError;
use crate::extraction::ExtractionResult;
use crate::llm::decode::note_fallback;
use crate::llm::{GenerationGateway, GenerationOptions};

pub use error_analyzer::{ErrorAnalysisResult, ErrorAnalyzer, ErrorCategory};
pub use feedback_generator::{FeedbackGenerationResult, FeedbackGenerator, FeedbackItem, FeedbackStatistics, FeedbackType};
pub use score_calculator::{Bonus, Penalty, ScoreBreakdown, ScoreCalculator, ScoringWeights};
pub use suggestion_engine::{Level, Suggestion, SuggestionEngine, SuggestionResult};

pub const STEP_ERROR_ANALYSIS: &str = "Phase 3 Step 1: Error Analysis";
pub const STEP_FEEDBACK_GENERATION: &str = "Phase 3 Step 2: Feedback Generation";

/// Below this, results carry a reliability warning.
pub const CONFIDENCE_WARNING_THRESHOLD: f64 = 0.7;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PhaseThreeResult {
    pub diagram_type: DiagramType,
    pub error_analysis: ErrorAnalysisResult,
    pub feedback: FeedbackGenerationResult,
    pub score_breakdown: ScoreBreakdown,
    pub suggestions: SuggestionResult,
    pub final_score: f64,
    pub grade_letter: char,
    pub summary: String,
    pub processing_time_ms: u64,
    /// Lower of the error analysis and feedback confidences.
    pub confidence: f64,
    pub warnings: Vec<String>,
    pub fallback_steps: Vec<String>,
}

/// Capability descriptor for Phase 3.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PhaseThreeStatus {
    pub service: &'static str,
    pub phase: &'static str,
    pub steps: Vec<&'static str>,
    pub capabilities: Vec<&'static str>,
    pub scoring_components: Vec<&'static str>,
    pub feedback_types: Vec<FeedbackType>,
    pub score_scale: &'static str,
    pub weights: ScoringWeights,
    pub supported_diagrams: Vec<DiagramType>,
}

pub struct PhaseThreeOrchestrator {
    analysis_options: GenerationOptions,
    feedback_options: GenerationOptions,
    analyzer: ErrorAnalyzer,
    generator: FeedbackGenerator,
    calculator: ScoreCalculator,
    suggestions: SuggestionEngine,
}

impl PhaseThreeOrchestrator {
    /// # Arguments
    ///
    /// * `analysis_options` - Sampling settings for error analysis.
    /// * `feedback_options` - Sampling settings for feedback generation.
    /// * `weights` - Default scoring weights, overridable per run.
    pub fn new(analysis_options: GenerationOptions, feedback_options: GenerationOptions, weights: ScoringWeights) -> Self {
        Self {
            analysis_options,
            feedback_options,
            analyzer: ErrorAnalyzer::new(),
            generator: FeedbackGenerator::new(),
            calculator: ScoreCalculator::new(weights),
            suggestions: SuggestionEngine::new(),
        }
    }

    pub async fn run(
        &self,
        gateway: &mut GenerationGateway,
        extraction: &ExtractionResult,
        problem_text: &str,
        weights: Option<ScoringWeights>,
    ) -> Result<PhaseThreeResult, GenerationError> {
        let started = Instant::now();
        let metrics = &extraction.metrics;
        let mut fallback_steps = Vec::new();
        info!(diagram_type = %extraction.diagram_type, "starting feedback generation and scoring");

        let error_analysis = self
            .analyzer
            .analyze(
                gateway,
                &extraction.teacher_diagram,
                &extraction.student_diagram,
                metrics,
                problem_text,
                &self.analysis_options.labelled(STEP_ERROR_ANALYSIS),
            )
            .await?;
        let error_analysis = note_fallback(error_analysis, STEP_ERROR_ANALYSIS, &mut fallback_steps);
        gateway.pause().await;

        let feedback = self
            .generator
            .generate(
                gateway,
                &error_analysis,
                metrics,
                problem_text,
                &self.feedback_options.labelled(STEP_FEEDBACK_GENERATION),
            )
            .await?;
        let feedback = note_fallback(feedback, STEP_FEEDBACK_GENERATION, &mut fallback_steps);

        let score_breakdown = self.calculator.calculate(metrics, &error_analysis, &feedback, weights);
        let suggestions = self.suggestions.generate(&error_analysis, metrics);
        let confidence = error_analysis.confidence.min(feedback.confidence);

        let mut warnings = Vec::new();
        if confidence < CONFIDENCE_WARNING_THRESHOLD {
            warnings.push("Analysis confidence is below 70% - results may be less reliable".to_string());
        }
        if error_analysis.total_errors == 0 && score_breakdown.final_score < 8.0 {
            warnings.push("No errors detected but score is low - may indicate analysis issues".to_string());
        }
        for warning in &warnings {
            warn!(warning = warning.as_str(), "phase 3 warning");
        }

        info!(
            final_score = score_breakdown.final_score,
            grade = %score_breakdown.grade_letter,
            confidence,
            "feedback generation and scoring completed"
        );

        Ok(PhaseThreeResult {
            diagram_type: extraction.diagram_type,
            final_score: score_breakdown.final_score,
            grade_letter: score_breakdown.grade_letter,
            summary: feedback.summary.clone(),
            error_analysis,
            feedback,
            score_breakdown,
            suggestions,
            processing_time_ms: started.elapsed().as_millis() as u64,
            confidence,
            warnings,
            fallback_steps,
        })
    }

    pub fn status(&self) -> PhaseThreeStatus {
        PhaseThreeStatus {
            service: "PhaseThreeOrchestrator",
            phase: "Phase 3 - AI Feedback Generation and Scoring",
            steps: vec![STEP_ERROR_ANALYSIS, STEP_FEEDBACK_GENERATION],
            capabilities: vec![
                "error_analysis",
                "feedback_generation",
                "score_calculation",
                "suggestion_generation",
            ],
            scoring_components: vec![
                "base_score_from_metrics",
                "error_penalties",
                "severity_penalties",
                "quality_bonuses",
                "confidence_adjustments",
            ],
            feedback_types: vec![
                FeedbackType::Error,
                FeedbackType::Suggestion,
                FeedbackType::Praise,
                FeedbackType::Warning,
            ],
            score_scale: "0-10",
            weights: self.calculator.weights(),
            supported_diagrams: DiagramType::all().to_vec(),
        }
    }
}
