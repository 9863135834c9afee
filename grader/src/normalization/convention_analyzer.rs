//! Step 1: reads the reference diagram and lists the conventions it follows.

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::diagrams::DiagramType;
use crate::error::GenerationError;
use crate::llm::decode::{self, Decoded};
use crate::llm::{GenerationGateway, GenerationOptions};

/// One observed convention.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConventionPattern {
    /// `naming`, `structure` or `style`.
    #[serde(default)]
    pub pattern_type: String,
    pub description: String,
    #[serde(default)]
    pub examples: Vec<String>,
    #[serde(default = "default_confidence")]
    pub confidence: f64,
}

impl ConventionPattern {
    fn heuristic(pattern_type: &str, description: &str, examples: &[&str]) -> Self {
        Self {
            pattern_type: pattern_type.to_string(),
            description: description.to_string(),
            examples: examples.iter().map(|e| e.to_string()).collect(),
            confidence: 0.7,
        }
    }
}

fn default_confidence() -> f64 {
    0.5
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConventionAnalysisResult {
    pub diagram_type: DiagramType,
    pub naming_conventions: Vec<ConventionPattern>,
    pub structural_patterns: Vec<ConventionPattern>,
    pub style_preferences: Vec<ConventionPattern>,
    pub overall_confidence: f64,
}

impl ConventionAnalysisResult {
    /// Analysis with no patterns and zero confidence.
    pub fn empty(diagram_type: DiagramType) -> Self {
        Self {
            diagram_type,
            naming_conventions: Vec::new(),
            structural_patterns: Vec::new(),
            style_preferences: Vec::new(),
            overall_confidence: 0.0,
        }
    }

    pub fn pattern_count(&self) -> usize {
        self.naming_conventions.len() + self.structural_patterns.len() + self.style_preferences.len()
    }

    /// Renders the conventions as a bullet list for later prompts.
    ///
    /// With `with_examples` each pattern is followed by an `Examples:` line.
    pub fn format_for_prompt(&self, with_examples: bool) -> String {
        let mut sections: Vec<String> = Vec::new();
        for (title, patterns) in [
            ("NAMING CONVENTIONS", &self.naming_conventions),
            ("STRUCTURAL PATTERNS", &self.structural_patterns),
            ("STYLE PREFERENCES", &self.style_preferences),
        ] {
            if patterns.is_empty() {
                continue;
            }
            if !sections.is_empty() {
                sections.push(String::new());
            }
            sections.push(format!("{title}:"));
            for pattern in patterns {
                sections.push(format!("- {}", pattern.description));
                if with_examples && !pattern.examples.is_empty() {
                    sections.push(format!("  Examples: {}", pattern.examples.join(", ")));
                }
            }
        }

        if sections.is_empty() {
            "No specific conventions identified.".to_string()
        } else {
            sections.join("\n")
        }
    }
}

#[derive(Deserialize)]
struct RawAnalysis {
    #[serde(default)]
    naming_conventions: Vec<ConventionPattern>,
    #[serde(default)]
    structural_patterns: Vec<ConventionPattern>,
    #[serde(default)]
    style_preferences: Vec<ConventionPattern>,
    #[serde(default = "default_confidence")]
    overall_confidence: f64,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ConventionAnalyzer;

impl ConventionAnalyzer {
    pub fn new() -> Self {
        Self
    }

    /// Runs the analysis round-trip.
    ///
    /// # Errors
    ///
    /// Only generation failures are returned. An unusable answer produces a
    /// [`Decoded::Fallback`] analysis.
    pub async fn analyze(
        &self,
        gateway: &mut GenerationGateway,
        teacher_text: &str,
        problem_text: &str,
        diagram_type: DiagramType,
        options: &GenerationOptions,
    ) -> Result<Decoded<ConventionAnalysisResult>, GenerationError> {
        info!(%diagram_type, "analyzing reference conventions");
        let prompt = self.build_prompt(teacher_text, problem_text, diagram_type);
        let response = gateway.generate(&prompt, options).await?;
        Ok(self.parse_response(&response, diagram_type))
    }

    pub fn build_prompt(&self, teacher_text: &str, problem_text: &str, diagram_type: DiagramType) -> String {
        let mut prompt = format!(
            r#"You are an expert UML diagram analyzer specializing in {kind} diagrams. Analyze the teacher's reference diagram and extract all of its conventions, patterns and style preferences.

CONTEXT:
Problem: {problem_text}
Diagram Type: {kind}

TEACHER'S REFERENCE PLANTUML CODE:
{teacher_text}

ANALYSIS REQUIREMENTS:
1. NAMING CONVENTIONS: CamelCase, snake_case or PascalCase; prefixes and suffixes; how spaces are handled; domain terminology; plural versus singular.
2. STRUCTURAL PATTERNS: relationship syntax, cardinality notation, inheritance versus composition versus aggregation, grouping, stereotypes, visibility markers.
3. STYLE PREFERENCES: quotes versus aliases, indentation, comments, styling directives, element order.

Respond with JSON in exactly this shape:
{{
    "naming_conventions": [
        {{"pattern_type": "naming", "description": "...", "examples": ["..."], "confidence": 0.95}}
    ],
    "structural_patterns": [
        {{"pattern_type": "structure", "description": "...", "examples": ["..."], "confidence": 0.90}}
    ],
    "style_preferences": [
        {{"pattern_type": "style", "description": "...", "examples": ["..."], "confidence": 0.85}}
    ],
    "overall_confidence": 0.90
}}
"#,
            kind = diagram_type,
        );

        prompt.push_str(match diagram_type {
            DiagramType::UseCase => {
                "\nSPECIFIC FOR USE CASE DIAGRAMS:\n- Actor naming patterns (User, Admin, Customer)\n- Use case naming patterns (Login, \"Manage Users\")\n- Relationship conventions (associations, includes, extends)\n"
            }
            DiagramType::Class => {
                "\nSPECIFIC FOR CLASS DIAGRAMS:\n- Class naming patterns\n- Attribute and method naming conventions\n- Visibility indicators (+, -, #, ~)\n- Relationship types (inheritance, composition, aggregation)\n"
            }
            DiagramType::Sequence => {
                "\nSPECIFIC FOR SEQUENCE DIAGRAMS:\n- Participant naming patterns\n- Message labeling conventions\n- Activation and lifeline patterns\n- Fragment usage patterns\n"
            }
        });
        prompt
    }

    /// Decodes the JSON answer, falling back to keyword spotting.
    pub fn parse_response(&self, response: &str, diagram_type: DiagramType) -> Decoded<ConventionAnalysisResult> {
        decode::decode_or_else(
            response,
            "convention analysis",
            |raw: RawAnalysis| ConventionAnalysisResult {
                diagram_type,
                naming_conventions: raw.naming_conventions,
                structural_patterns: raw.structural_patterns,
                style_preferences: raw.style_preferences,
                overall_confidence: decode::clamp_unit(raw.overall_confidence),
            },
            |text| Self::fallback(text, diagram_type),
        )
    }

    fn fallback(response: &str, diagram_type: DiagramType) -> ConventionAnalysisResult {
        let mut naming_conventions = Vec::new();
        if response.contains("CamelCase") || response.contains("camelCase") {
            naming_conventions.push(ConventionPattern::heuristic(
                "naming",
                "Uses CamelCase naming convention",
                &["UserAccount", "LoginSystem"],
            ));
        }
        if response.contains("snake_case") {
            naming_conventions.push(ConventionPattern::heuristic(
                "naming",
                "Uses snake_case naming convention",
                &["user_account", "login_system"],
            ));
        }

        ConventionAnalysisResult {
            naming_conventions,
            overall_confidence: 0.5,
            ..ConventionAnalysisResult::empty(diagram_type)
        }
    }
}
