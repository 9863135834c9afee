//! # Grading Pipeline
//!
//! Runs the three phases in order for one submission:
//!
//! 1. Convention normalization. A failure is absorbed and the original
//!    student text is graded instead.
//! 2. Extraction and metrics. A failure ends the run with a failed result.
//! 3. Error analysis, feedback and scoring. A failure is absorbed and the
//!    Phase 2 fallback score is used.
//!
//! Each run gets its own [`GenerationGateway`], so concurrent runs never share
//! a call log.

use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::Serialize;
use tracing::{error, info, warn};
use util::config::AppConfig;

use crate::diagrams::{self, DiagramType};
use crate::error::GradingError;
use crate::extraction::{ExtractionResult, PhaseTwoExtractor};
use crate::feedback::score_calculator::grade_letter;
use crate::feedback::{PhaseThreeOrchestrator, PhaseThreeResult, ScoringWeights};
use crate::llm::{GenerationGateway, GenerationLogEntry, GenerationLogSummary, GenerationOptions, LlmProvider};
use crate::normalization::{NormalizationChainResult, NormalizationOrchestrator};

/// Confidence credited to the deterministic extraction phase.
const EXTRACTION_CONFIDENCE: f64 = 0.9;

/// Settings for one [`Pipeline`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PipelineConfig {
    pub max_retries: u32,
    /// Requests-per-minute budget of the provider. Zero disables pausing.
    pub rate_limit_rpm: u32,
    pub similarity_threshold: f64,
    pub normalization_temperature: f32,
    pub feedback_temperature: f32,
    pub max_tokens: u32,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            rate_limit_rpm: 15,
            similarity_threshold: crate::metrics::DEFAULT_SIMILARITY_THRESHOLD,
            normalization_temperature: 0.1,
            feedback_temperature: 0.3,
            max_tokens: 2000,
        }
    }
}

impl From<&AppConfig> for PipelineConfig {
    fn from(config: &AppConfig) -> Self {
        Self {
            max_retries: config.max_retries,
            rate_limit_rpm: config.rate_limit_rpm,
            similarity_threshold: config.similarity_threshold,
            normalization_temperature: config.llm_temperature,
            max_tokens: config.llm_max_tokens,
            ..Self::default()
        }
    }
}

impl PipelineConfig {
    /// Pause between dependent generation calls: one minute spread over the budget.
    pub fn step_delay(&self) -> Duration {
        if self.rate_limit_rpm == 0 {
            Duration::ZERO
        } else {
            Duration::from_secs(60) / self.rate_limit_rpm
        }
    }
}

/// Wall-clock time spent per phase. `None` for phases that did not run.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PhaseTimings {
    pub phase_one_ms: Option<u64>,
    pub phase_two_ms: Option<u64>,
    pub phase_three_ms: Option<u64>,
    pub total_ms: u64,
}

/// Everything one grading run produced.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PipelineResult {
    pub success: bool,
    pub diagram_type: DiagramType,
    pub phase_one: Option<NormalizationChainResult>,
    pub phase_two: Option<ExtractionResult>,
    pub phase_three: Option<PhaseThreeResult>,
    pub final_score: f64,
    pub grade_letter: char,
    pub feedback_summary: String,
    pub overall_confidence: f64,
    pub timings: PhaseTimings,
    pub warnings: Vec<String>,
    pub errors: Vec<String>,
    pub generation: GenerationLogSummary,
    #[serde(skip_serializing)]
    pub generation_log: Vec<GenerationLogEntry>,
}

impl PipelineResult {
    pub fn normalization_succeeded(&self) -> bool {
        self.phase_one.as_ref().is_some_and(|p| p.success)
    }

    pub fn feedback_succeeded(&self) -> bool {
        self.phase_three.is_some()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PhaseDescriptor {
    pub name: &'static str,
    pub kind: &'static str,
    pub description: &'static str,
}

/// Capability descriptor for the whole pipeline.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PipelineStatus {
    pub pipeline: &'static str,
    pub phases: Vec<PhaseDescriptor>,
    pub supported_diagrams: Vec<DiagramType>,
    pub provider: String,
    pub llm_model: String,
    pub rate_limit: String,
    pub max_retries: u32,
    pub similarity_threshold: f64,
    pub scoring_scale: &'static str,
}

pub struct Pipeline {
    config: PipelineConfig,
    provider: Arc<dyn LlmProvider>,
    normalizer: NormalizationOrchestrator,
    extractor: PhaseTwoExtractor,
    feedback: PhaseThreeOrchestrator,
}

fn elapsed_ms(started: Instant) -> u64 {
    started.elapsed().as_millis() as u64
}

fn require(field: &str, text: &str) -> Result<(), GradingError> {
    if text.trim().is_empty() {
        return Err(GradingError::EmptyInput(field.to_string()));
    }
    Ok(())
}

/// Mean of the confidences of the phases that produced one.
fn overall_confidence(
    phase_one: Option<&NormalizationChainResult>,
    extracted: bool,
    phase_three: Option<&PhaseThreeResult>,
) -> f64 {
    let confidences: Vec<f64> = [
        phase_one.map(|p| p.final_confidence).filter(|c| *c > 0.0),
        extracted.then_some(EXTRACTION_CONFIDENCE),
        phase_three.map(|p| p.confidence).filter(|c| *c > 0.0),
    ]
    .into_iter()
    .flatten()
    .collect();

    if confidences.is_empty() {
        0.5
    } else {
        confidences.iter().sum::<f64>() / confidences.len() as f64
    }
}

impl Pipeline {
    /// Creates a pipeline around `provider`.
    ///
    /// # Arguments
    ///
    /// * `config` - Retry, rate-limit, matching and sampling settings.
    /// * `provider` - Generation backend shared by every run.
    pub fn new(config: PipelineConfig, provider: Arc<dyn LlmProvider>) -> Self {
        let normalization_options = GenerationOptions::new(config.normalization_temperature, config.max_tokens);
        let feedback_options = GenerationOptions::new(config.feedback_temperature, config.max_tokens);

        Self {
            normalizer: NormalizationOrchestrator::new(config.max_retries, normalization_options.clone()),
            extractor: PhaseTwoExtractor::new(config.similarity_threshold),
            feedback: PhaseThreeOrchestrator::new(normalization_options, feedback_options, ScoringWeights::default()),
            config,
            provider,
        }
    }

    /// Replaces the Phase 2 extractor, e.g. to register a custom parser.
    pub fn with_extractor(mut self, extractor: PhaseTwoExtractor) -> Self {
        self.extractor = extractor;
        self
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Like [`Pipeline::run`], taking the diagram type by name.
    ///
    /// # Errors
    ///
    /// Returns [`GradingError::InvalidDiagramType`] when `diagram_type` is not a
    /// known name, plus everything [`Pipeline::run`] returns.
    pub async fn run_named(
        &self,
        student_text: &str,
        teacher_text: &str,
        problem_text: &str,
        diagram_type: Option<&str>,
        weights: Option<ScoringWeights>,
    ) -> Result<PipelineResult, GradingError> {
        let diagram_type = diagram_type.map(str::parse::<DiagramType>).transpose()?;
        self.run(student_text, teacher_text, problem_text, diagram_type, weights)
            .await
    }

    /// Grades one submission.
    ///
    /// When `diagram_type` is `None` it is detected from the student's text.
    ///
    /// # Errors
    ///
    /// Returns [`GradingError::EmptyInput`] when any text is blank. Every other
    /// failure is reported inside the returned [`PipelineResult`].
    pub async fn run(
        &self,
        student_text: &str,
        teacher_text: &str,
        problem_text: &str,
        diagram_type: Option<DiagramType>,
        weights: Option<ScoringWeights>,
    ) -> Result<PipelineResult, GradingError> {
        require("student_text", student_text)?;
        require("teacher_text", teacher_text)?;
        require("problem_text", problem_text)?;

        let started = Instant::now();
        let mut gateway = GenerationGateway::new(self.provider.clone(), self.config.step_delay());
        let mut timings = PhaseTimings::default();
        let mut warnings = Vec::new();
        let mut errors = Vec::new();

        let diagram_type = diagram_type.unwrap_or_else(|| {
            let detected = diagrams::detect_type(student_text);
            info!(%detected, "auto-detected diagram type");
            detected
        });
        info!(%diagram_type, provider = gateway.provider_name(), "starting grading pipeline");

        // Phase 1
        let phase_started = Instant::now();
        let phase_one = self
            .normalizer
            .normalize(&mut gateway, student_text, teacher_text, problem_text, Some(diagram_type))
            .await;
        timings.phase_one_ms = Some(elapsed_ms(phase_started));

        let normalized_text = if phase_one.success {
            warnings.extend(phase_one.warnings.iter().cloned());
            info!(elapsed_ms = timings.phase_one_ms, "phase 1 completed");
            phase_one.normalized_text.clone()
        } else {
            warn!("phase 1 failed, grading the original student text");
            warnings.push("Phase 1 normalization failed - using original student text".to_string());
            warnings.extend(phase_one.warnings.iter().cloned());
            student_text.to_string()
        };

        // Phase 2
        let phase_started = Instant::now();
        let extraction = self.extractor.extract(&normalized_text, teacher_text, diagram_type);
        timings.phase_two_ms = Some(elapsed_ms(phase_started));

        let extraction = match extraction {
            Ok(extraction) => extraction,
            Err(e) => {
                error!(error = %e, "phase 2 failed, aborting pipeline");
                errors.push(format!("Phase 2 extraction failed: {e}"));
                timings.total_ms = elapsed_ms(started);
                return Ok(PipelineResult {
                    success: false,
                    diagram_type,
                    phase_one: Some(phase_one),
                    phase_two: None,
                    phase_three: None,
                    final_score: 0.0,
                    grade_letter: 'F',
                    feedback_summary: "Pipeline processing failed. Please check your diagram and try again."
                        .to_string(),
                    overall_confidence: 0.0,
                    timings,
                    warnings,
                    errors,
                    generation: gateway.logs_summary(),
                    generation_log: gateway.take_logs(),
                });
            }
        };
        warnings.extend(extraction.warnings.iter().cloned());
        info!(
            elapsed_ms = timings.phase_two_ms,
            similarity = extraction.metrics.similarity_score,
            "phase 2 completed"
        );
        gateway.pause().await;

        // Phase 3
        let phase_started = Instant::now();
        let phase_three = self.feedback.run(&mut gateway, &extraction, problem_text, weights).await;
        timings.phase_three_ms = Some(elapsed_ms(phase_started));

        let (phase_three, final_score, grade, feedback_summary) = match phase_three {
            Ok(result) => {
                warnings.extend(result.warnings.iter().cloned());
                let (score, grade, summary) = (result.final_score, result.grade_letter, result.summary.clone());
                (Some(result), score, grade, summary)
            }
            Err(e) => {
                warn!(error = %e, "phase 3 failed, using the extraction fallback score");
                errors.push(format!("Phase 3 feedback generation failed: {e}"));
                let score = PhaseTwoExtractor::fallback_score(&extraction.metrics, None);
                (
                    None,
                    score,
                    grade_letter(score),
                    "Automated feedback generation failed. Please review manually.".to_string(),
                )
            }
        };

        let overall_confidence = overall_confidence(Some(&phase_one), true, phase_three.as_ref());
        timings.total_ms = elapsed_ms(started);
        info!(
            final_score,
            grade = %grade,
            confidence = overall_confidence,
            total_ms = timings.total_ms,
            "grading pipeline completed"
        );

        Ok(PipelineResult {
            success: true,
            diagram_type,
            phase_one: Some(phase_one),
            phase_two: Some(extraction),
            phase_three,
            final_score,
            grade_letter: grade,
            feedback_summary,
            overall_confidence,
            timings,
            warnings,
            errors,
            generation: gateway.logs_summary(),
            generation_log: gateway.take_logs(),
        })
    }

    pub fn status(&self) -> PipelineStatus {
        PipelineStatus {
            pipeline: "3-Phase Automated Diagram Grading",
            phases: vec![
                PhaseDescriptor {
                    name: "Convention Normalization",
                    kind: "Multi-prompt generation chain",
                    description: "Normalizes the student diagram to match the reference conventions",
                },
                PhaseDescriptor {
                    name: "Extraction and Metrics",
                    kind: "Deterministic parsing",
                    description: "Extracts components and calculates quantitative metrics",
                },
                PhaseDescriptor {
                    name: "Feedback Generation and Scoring",
                    kind: "Generation-backed analysis",
                    description: "Generates feedback and calculates the final score",
                },
            ],
            supported_diagrams: DiagramType::all()
                .into_iter()
                .filter(|kind| self.extractor.supports(*kind))
                .collect(),
            provider: self.provider.name().to_string(),
            llm_model: self.provider.model().to_string(),
            rate_limit: format!("{} RPM", self.config.rate_limit_rpm),
            max_retries: self.config.max_retries,
            similarity_threshold: self.config.similarity_threshold,
            scoring_scale: "0-10 points with letter grades",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_step_delay() {
        let config = PipelineConfig::default();
        assert_eq!(config.step_delay(), Duration::from_secs(4));

        let unlimited = PipelineConfig {
            rate_limit_rpm: 0,
            ..PipelineConfig::default()
        };
        assert_eq!(unlimited.step_delay(), Duration::ZERO);
    }

    #[test]
    fn test_config_from_app_config() {
        let app = AppConfig {
            max_retries: 5,
            rate_limit_rpm: 30,
            llm_temperature: 0.2,
            ..AppConfig::default()
        };

        let config = PipelineConfig::from(&app);
        assert_eq!(config.max_retries, 5);
        assert_eq!(config.step_delay(), Duration::from_secs(2));
        assert_eq!(config.normalization_temperature, 0.2);
        assert_eq!(config.feedback_temperature, 0.3);
    }

    #[test]
    fn test_overall_confidence() {
        assert_eq!(overall_confidence(None, false, None), 0.5);
        assert_eq!(overall_confidence(None, true, None), 0.9);
    }
}
