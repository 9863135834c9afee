//! # Grader Library
//!
//! Automated grading of UML diagrams written in a PlantUML-style text notation.
//! A student's diagram is compared with a teacher's reference diagram and
//! receives metrics, categorised errors, written feedback and a 0-10 score with
//! a letter grade. Use-case, class and sequence diagrams are supported.
//!
//! ## Phases
//! - **Normalization** ([`normalization`]): a four-step generation chain that
//!   rewrites the student's diagram in the teacher's conventions, with retries.
//! - **Extraction** ([`extraction`]): deterministic parsing ([`parsers`]) and
//!   set-based precision/recall/F1 with fuzzy name matching ([`metrics`]).
//! - **Feedback and scoring** ([`feedback`]): generated error analysis and
//!   feedback, then a deterministic score with penalties and bonuses.
//!
//! [`pipeline::Pipeline`] runs the phases in order and absorbs every failure
//! except blank input and a failed extraction. [`report::GradingReportResponse`]
//! is the serializable envelope handed to callers.
//!
//! ## Example
//!
//! ```rust,no_run
//! use grader::llm::provider_from_config;
//! use grader::pipeline::{Pipeline, PipelineConfig};
//! use grader::report::GradingReportResponse;
//! use util::config::AppConfig;
//!
//! # async fn grade(student: &str, teacher: &str, problem: &str) -> Result<(), Box<dyn std::error::Error>> {
//! let config = AppConfig::global().clone();
//! let pipeline = Pipeline::new(PipelineConfig::from(&config), provider_from_config(&config)?);
//! let result = pipeline.run(student, teacher, problem, None, None).await?;
//! let response = GradingReportResponse::from(result);
//! println!("{}", serde_json::to_string_pretty(&response)?);
//! # Ok(())
//! # }
//! ```

pub mod diagrams;
pub mod error;
pub mod extraction;
pub mod feedback;
pub mod llm;
pub mod metrics;
pub mod normalization;
pub mod parsers;
pub mod pipeline;
pub mod report;
pub mod traits;
pub mod types;
