//! # Phase 1: Convention Normalization
//!
//! Rewrites a student's diagram so that it follows the naming, structural and
//! style conventions of the teacher's reference diagram, without changing what
//! the student modelled. Four generation-backed steps run strictly in order:
//!
//! 1. [`convention_analyzer`] reads the reference diagram.
//! 2. [`difference_detector`] lists where the student departs from it.
//! 3. [`code_normalizer`] produces the rewritten source.
//! 4. [`validator`] checks syntax locally, then asks for a logic review.
//!
//! [`NormalizationOrchestrator`] runs the chain with the rate-limit pause between
//! steps and restarts the whole chain on a generation failure, up to
//! `max_retries` times. When every attempt fails the result carries the
//! student's original text so later phases can continue.

pub mod code_normalizer;
pub mod convention_analyzer;
pub mod difference_detector;
pub mod validator;

use std::time::{Duration, Instant};

use serde::Serialize;
use tracing::{error, info, warn};

use crate::diagrams::{self, DiagramType};
use crate::error::GenerationError;
use crate::llm::decode::note_fallback;
use crate::llm::{GenerationGateway, GenerationOptions};

pub use code_normalizer::{CodeNormalizationResult, CodeNormalizer};
pub use convention_analyzer::{ConventionAnalysisResult, ConventionAnalyzer, ConventionPattern};
pub use difference_detector::{ConventionDifference, DifferenceDetectionResult, DifferenceDetector};
pub use validator::{NormalizationValidator, ValidationIssue, ValidationResult};

pub const STEP_CONVENTION_ANALYSIS: &str = "Phase 1 Step 1: Convention Analysis";
pub const STEP_DIFFERENCE_DETECTION: &str = "Phase 1 Step 2: Difference Detection";
pub const STEP_CODE_NORMALIZATION: &str = "Phase 1 Step 3: Code Normalization";
pub const STEP_VALIDATION: &str = "Phase 1 Step 4: Validation";

/// Delay before retry number `retry` (1-based).
pub fn backoff(step_delay: Duration, retry: u32) -> Duration {
    step_delay * 2 * retry
}

/// Outcome of the whole Phase 1 chain.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NormalizationChainResult {
    pub success: bool,
    pub normalized_text: String,
    pub original_text: String,
    pub diagram_type: DiagramType,
    pub convention_analysis: ConventionAnalysisResult,
    pub difference_detection: DifferenceDetectionResult,
    pub code_normalization: CodeNormalizationResult,
    pub validation: ValidationResult,
    pub processing_time_ms: u64,
    pub retries_used: u32,
    pub final_confidence: f64,
    pub warnings: Vec<String>,
    /// Labels of the steps whose answer had to be decoded heuristically.
    pub fallback_steps: Vec<String>,
}

impl NormalizationChainResult {
    fn failed(
        student_text: &str,
        diagram_type: DiagramType,
        elapsed: Duration,
        retries_used: u32,
        warnings: Vec<String>,
    ) -> Self {
        Self {
            success: false,
            normalized_text: student_text.to_string(),
            original_text: student_text.to_string(),
            diagram_type,
            convention_analysis: ConventionAnalysisResult::empty(diagram_type),
            difference_detection: DifferenceDetectionResult::empty(diagram_type),
            code_normalization: CodeNormalizationResult::unchanged(student_text),
            validation: ValidationResult::not_run(student_text),
            processing_time_ms: elapsed.as_millis() as u64,
            retries_used,
            final_confidence: 0.0,
            warnings,
            fallback_steps: Vec::new(),
        }
    }
}

/// Capability descriptor for Phase 1.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NormalizationStatus {
    pub service: &'static str,
    pub phase: &'static str,
    pub steps: Vec<&'static str>,
    pub max_retries: u32,
    pub supported_diagrams: Vec<DiagramType>,
}

struct ChainOutput {
    convention_analysis: ConventionAnalysisResult,
    difference_detection: DifferenceDetectionResult,
    code_normalization: CodeNormalizationResult,
    validation: ValidationResult,
    fallback_steps: Vec<String>,
}

pub struct NormalizationOrchestrator {
    max_retries: u32,
    options: GenerationOptions,
    analyzer: ConventionAnalyzer,
    detector: DifferenceDetector,
    normalizer: CodeNormalizer,
    validator: NormalizationValidator,
}

impl NormalizationOrchestrator {
    /// # Arguments
    ///
    /// * `max_retries` - How many times the full chain is restarted after a failure.
    /// * `options` - Sampling settings for every step; the step label is overridden per step.
    pub fn new(max_retries: u32, options: GenerationOptions) -> Self {
        Self {
            max_retries,
            options,
            analyzer: ConventionAnalyzer::new(),
            detector: DifferenceDetector::new(),
            normalizer: CodeNormalizer::new(),
            validator: NormalizationValidator::new(),
        }
    }

    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    /// Runs the chain. Never fails: exhausted retries yield `success == false`
    /// and the original student text.
    ///
    /// When `diagram_type` is `None` it is detected from the teacher's text.
    pub async fn normalize(
        &self,
        gateway: &mut GenerationGateway,
        student_text: &str,
        teacher_text: &str,
        problem_text: &str,
        diagram_type: Option<DiagramType>,
    ) -> NormalizationChainResult {
        let started = Instant::now();
        let diagram_type = diagram_type.unwrap_or_else(|| {
            let detected = diagrams::detect_type(teacher_text);
            info!(%detected, "auto-detected diagram type");
            detected
        });

        let mut warnings: Vec<String> = Vec::new();
        let mut retries_used = 0;

        for attempt in 0..=self.max_retries {
            match self
                .run_chain(gateway, student_text, teacher_text, problem_text, diagram_type)
                .await
            {
                Ok(output) => {
                    info!(
                        attempt = attempt + 1,
                        confidence = output.validation.confidence,
                        valid = output.validation.is_valid,
                        "normalization chain completed"
                    );
                    warnings.extend(output.validation.issues.iter().map(|issue| issue.description.clone()));
                    return NormalizationChainResult {
                        success: true,
                        normalized_text: output.validation.validated_text.clone(),
                        original_text: student_text.to_string(),
                        diagram_type,
                        final_confidence: output.validation.confidence,
                        convention_analysis: output.convention_analysis,
                        difference_detection: output.difference_detection,
                        code_normalization: output.code_normalization,
                        validation: output.validation,
                        processing_time_ms: started.elapsed().as_millis() as u64,
                        retries_used,
                        warnings,
                        fallback_steps: output.fallback_steps,
                    };
                }
                Err(e) if attempt < self.max_retries => {
                    retries_used += 1;
                    warn!(attempt = attempt + 1, error = %e, "normalization attempt failed, retrying");
                    warnings.push(format!("Retry {}: {}", attempt + 1, e));
                    gateway.pause_for(backoff(gateway.step_delay(), retries_used)).await;
                }
                Err(e) => {
                    error!(attempts = attempt + 1, error = %e, "normalization chain failed");
                    warnings.push(format!("Normalization failed: {e}"));
                    return NormalizationChainResult::failed(
                        student_text,
                        diagram_type,
                        started.elapsed(),
                        retries_used,
                        warnings,
                    );
                }
            }
        }

        // zero attempts cannot happen: the range always has at least one element
        NormalizationChainResult::failed(student_text, diagram_type, started.elapsed(), retries_used, warnings)
    }

    async fn run_chain(
        &self,
        gateway: &mut GenerationGateway,
        student_text: &str,
        teacher_text: &str,
        problem_text: &str,
        diagram_type: DiagramType,
    ) -> Result<ChainOutput, GenerationError> {
        info!("starting convention normalization chain");
        let mut fallback_steps = Vec::new();

        let convention_analysis = self
            .analyzer
            .analyze(
                gateway,
                teacher_text,
                problem_text,
                diagram_type,
                &self.options.labelled(STEP_CONVENTION_ANALYSIS),
            )
            .await?;
        let convention_analysis = note_fallback(convention_analysis, STEP_CONVENTION_ANALYSIS, &mut fallback_steps);
        gateway.pause().await;

        let difference_detection = self
            .detector
            .detect(
                gateway,
                student_text,
                &convention_analysis,
                problem_text,
                &self.options.labelled(STEP_DIFFERENCE_DETECTION),
            )
            .await?;
        let difference_detection =
            note_fallback(difference_detection, STEP_DIFFERENCE_DETECTION, &mut fallback_steps);
        gateway.pause().await;

        let code_normalization = self
            .normalizer
            .normalize(
                gateway,
                student_text,
                &convention_analysis,
                &difference_detection,
                problem_text,
                &self.options.labelled(STEP_CODE_NORMALIZATION),
            )
            .await?;
        let code_normalization = note_fallback(code_normalization, STEP_CODE_NORMALIZATION, &mut fallback_steps);
        gateway.pause().await;

        let validation = self
            .validator
            .validate(
                gateway,
                student_text,
                &code_normalization,
                &convention_analysis,
                problem_text,
                &self.options.labelled(STEP_VALIDATION),
            )
            .await?;
        let validation = note_fallback(validation, STEP_VALIDATION, &mut fallback_steps);

        Ok(ChainOutput {
            convention_analysis,
            difference_detection,
            code_normalization,
            validation,
            fallback_steps,
        })
    }

    pub fn status(&self) -> NormalizationStatus {
        NormalizationStatus {
            service: "NormalizationOrchestrator",
            phase: "Phase 1 - Convention Normalization",
            steps: vec![
                STEP_CONVENTION_ANALYSIS,
                STEP_DIFFERENCE_DETECTION,
                STEP_CODE_NORMALIZATION,
                STEP_VALIDATION,
            ],
            max_retries: self.max_retries,
            supported_diagrams: DiagramType::all().to_vec(),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::llm::ScriptedProvider;

    const STUDENT: &str = "@startuml\nactor customer\ncustomer --> (place order)\n@enduml";
    const TEACHER: &str = "@startuml\nactor Customer\nCustomer --> (Place Order)\n@enduml";

    fn happy_answers() -> Vec<&'static str> {
        vec![
            r#"{"naming_conventions":[{"pattern_type":"naming","description":"PascalCase actors"}],"overall_confidence":0.9}"#,
            r#"{"differences":[{"difference_type":"naming","category":"actor_naming","severity":"medium"}],"overall_confidence":0.8}"#,
            "NORMALIZED_CODE:\n```plantuml\n@startuml\nactor Customer\nCustomer --> (Place Order)\n@enduml\n```\nCHANGES_MADE:\n- Capitalized names\nCONFIDENCE: 0.9",
            "LOGIC_PRESERVED: true\nCONVENTIONS_MATCHED: true\nCONFIDENCE: 0.88\nISSUES_FOUND:\n- naming low Use case label differs slightly\nVALIDATION_SUMMARY:\nok",
        ]
    }

    fn gateway(provider: ScriptedProvider) -> (GenerationGateway, Arc<ScriptedProvider>) {
        let provider = Arc::new(provider);
        (GenerationGateway::new(provider.clone(), Duration::ZERO), provider)
    }

    #[tokio::test]
    async fn test_successful_chain() {
        let (mut gw, provider) = gateway(ScriptedProvider::with_responses(happy_answers()));
        let orchestrator = NormalizationOrchestrator::new(3, GenerationOptions::default());

        let result = orchestrator
            .normalize(&mut gw, STUDENT, TEACHER, "Online shop", Some(DiagramType::UseCase))
            .await;

        assert!(result.success);
        assert_eq!(result.normalized_text, "@startuml\nactor Customer\nCustomer --> (Place Order)\n@enduml");
        assert_eq!(result.final_confidence, 0.88);
        assert_eq!(result.retries_used, 0);
        assert!(result.validation.is_valid);
        assert_eq!(result.warnings, vec!["Use case label differs slightly"]);
        assert!(result.fallback_steps.is_empty());

        let labels: Vec<String> = provider.calls().into_iter().map(|c| c.step_label).collect();
        assert_eq!(
            labels,
            vec![
                STEP_CONVENTION_ANALYSIS,
                STEP_DIFFERENCE_DETECTION,
                STEP_CODE_NORMALIZATION,
                STEP_VALIDATION
            ]
        );
    }

    #[tokio::test]
    async fn test_retry_restarts_chain_from_step_one() {
        let scripted = ScriptedProvider::new();
        scripted.push_ok(happy_answers()[0]);
        scripted.push_err(GenerationError::Transport("connection reset".into()));
        for answer in happy_answers() {
            scripted.push_ok(answer);
        }
        let (mut gw, provider) = gateway(scripted);
        let orchestrator = NormalizationOrchestrator::new(2, GenerationOptions::default());

        let result = orchestrator.normalize(&mut gw, STUDENT, TEACHER, "shop", None).await;

        assert!(result.success);
        assert_eq!(result.retries_used, 1);
        assert_eq!(result.diagram_type, diagrams::detect_type(TEACHER));
        assert!(result.warnings[0].starts_with("Retry 1: transport error"));
        assert_eq!(provider.call_count(), 6);
        assert_eq!(provider.calls()[2].step_label, STEP_CONVENTION_ANALYSIS);
    }

    #[tokio::test]
    async fn test_exhausted_retries_keep_original_text() {
        let (mut gw, provider) = gateway(ScriptedProvider::failing(GenerationError::RateLimited("quota".into())));
        let orchestrator = NormalizationOrchestrator::new(2, GenerationOptions::default());

        let result = orchestrator
            .normalize(&mut gw, STUDENT, TEACHER, "shop", Some(DiagramType::UseCase))
            .await;

        assert!(!result.success);
        assert_eq!(result.normalized_text, STUDENT);
        assert_eq!(result.final_confidence, 0.0);
        assert_eq!(provider.call_count(), 3);
        assert_eq!(result.warnings.len(), 3);
        assert!(result.warnings[2].starts_with("Normalization failed: rate limited"));
        assert_eq!(result.convention_analysis.pattern_count(), 0);
    }

    #[tokio::test]
    async fn test_prose_answers_are_tolerated() {
        let (mut gw, _) = gateway(ScriptedProvider::from_fn(|_, _| Ok("I am not sure what you want.".into())));
        let orchestrator = NormalizationOrchestrator::new(0, GenerationOptions::default());

        let result = orchestrator
            .normalize(&mut gw, STUDENT, TEACHER, "shop", Some(DiagramType::UseCase))
            .await;

        assert!(result.success);
        assert_eq!(result.normalized_text, STUDENT);
        assert_eq!(result.fallback_steps.len(), 4);
        assert_eq!(result.final_confidence, 0.5);
    }

    #[test]
    fn test_backoff_grows_with_retry() {
        let delay = Duration::from_secs(4);
        assert_eq!(backoff(delay, 1), Duration::from_secs(8));
        assert_eq!(backoff(delay, 3), Duration::from_secs(24));
        assert_eq!(backoff(Duration::ZERO, 5), Duration::ZERO);
    }

    #[test]
    fn test_status_lists_steps() {
        let status = NormalizationOrchestrator::new(3, GenerationOptions::default()).status();
        assert_eq!(status.phase, "Phase 1 - Convention Normalization");
        assert_eq!(status.steps.len(), 4);
        assert_eq!(status.max_retries, 3);
    }
}
