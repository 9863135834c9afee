//! # Parsers
//!
//! Lightweight, line-based extraction of diagram structure from diagram source text.
//! There is one parser per diagram kind, each implementing
//! [`DiagramParser`](crate::traits::parser::DiagramParser):
//!
//! - [`use_case_parser`]: actors, use cases and their links.
//! - [`class_parser`]: classes, members and class relationships.
//! - [`sequence_parser`]: participants and messages.
//!
//! The parsers share the cleaning and naming helpers in this module. None of them
//! is a full grammar: lines matching no known pattern are skipped.

pub mod class_parser;
pub mod sequence_parser;
pub mod use_case_parser;

use once_cell::sync::Lazy;
use regex::Regex;

use crate::diagrams::DiagramType;
use crate::traits::parser::DiagramParser;

pub use class_parser::ClassDiagramParser;
pub use sequence_parser::SequenceDiagramParser;
pub use use_case_parser::UseCaseParser;

static BLOCK_COMMENT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)/'.*?'/").expect("static regex"));
static TITLE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)^title\s+(.+)$").expect("static regex"));
static DIRECTION_HINT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"([-.])(?:up|down|left|right|u|d|l|r)([-.])").expect("static regex")
});
static ARROW_COLOR: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\[[^\]]*\]").expect("static regex"));

/// Splits diagram source into meaningful lines.
///
/// Removes block comments (`/' ... '/`), whole-line comments (lines starting
/// with `'`), `@start...`/`@end...` markers and blank lines. Remaining lines
/// are trimmed.
pub fn clean_source(text: &str) -> Vec<String> {
    let without_blocks = BLOCK_COMMENT.replace_all(text, "");
    without_blocks
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .filter(|line| !line.starts_with('\''))
        .filter(|line| {
            let lower = line.to_lowercase();
            !lower.starts_with("@start") && !lower.starts_with("@end")
        })
        .map(str::to_string)
        .collect()
}

/// Returns the diagram title from a `title ...` line, if any.
pub fn extract_title(lines: &[String]) -> Option<String> {
    lines
        .iter()
        .find_map(|line| TITLE.captures(line))
        .map(|caps| caps[1].trim().to_string())
}

/// Canonical form of an arrow token.
///
/// Drops direction hints (`-up->` becomes `-->`), colour/style brackets
/// (`-[#red]->` becomes `-->`) and collapses long dash runs to two dashes.
pub fn normalize_arrow(token: &str) -> String {
    let uncoloured = ARROW_COLOR.replace_all(token, "");
    let mut arrow = DIRECTION_HINT.replace_all(&uncoloured, "$1$2").into_owned();
    while arrow.contains("---") {
        arrow = arrow.replace("---", "--");
    }
    while arrow.contains("...") {
        arrow = arrow.replace("...", "..");
    }
    arrow
}

/// Strips surrounding quotes, brackets and colons from an element reference.
pub fn clean_name(raw: &str) -> String {
    raw.trim()
        .trim_matches(|c| matches!(c, '"' | '(' | ')' | ':' | '[' | ']'))
        .trim()
        .to_string()
}

/// Whether a bare identifier reads like a class name.
///
/// Class names start with an uppercase letter, are alphanumeric and are not
/// written entirely in capitals (those are usually constants).
pub fn looks_like_class_name(name: &str) -> bool {
    let starts_upper = name.chars().next().is_some_and(|c| c.is_uppercase());
    let alphanumeric = !name.is_empty() && name.chars().all(char::is_alphanumeric);
    let all_caps = name.chars().filter(|c| c.is_alphabetic()).all(char::is_uppercase);
    starts_upper && alphanumeric && !all_caps
}

/// Returns the parser registered for a diagram kind.
pub fn parser_for(kind: DiagramType) -> Box<dyn DiagramParser> {
    match kind {
        DiagramType::UseCase => Box::new(UseCaseParser),
        DiagramType::Class => Box::new(ClassDiagramParser),
        DiagramType::Sequence => Box::new(SequenceDiagramParser),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clean_source_strips_markers_and_comments() {
        let text = "@startuml\n' a comment\n/' block\ncomment '/\nactor User\n\n@enduml\n";
        assert_eq!(clean_source(text), vec!["actor User".to_string()]);
    }

    #[test]
    fn test_clean_source_of_empty_diagram_is_empty() {
        assert!(clean_source("@startuml\n@enduml").is_empty());
        assert!(clean_source("").is_empty());
    }

    #[test]
    fn test_extract_title() {
        let lines = clean_source("@startuml\ntitle Library System\nactor User\n@enduml");
        assert_eq!(extract_title(&lines).as_deref(), Some("Library System"));
    }

    #[test]
    fn test_normalize_arrow() {
        assert_eq!(normalize_arrow("-up->"), "-->");
        assert_eq!(normalize_arrow("-[#red]->"), "-->");
        assert_eq!(normalize_arrow("---|>"), "--|>");
        assert_eq!(normalize_arrow("..>"), "..>");
    }

    #[test]
    fn test_clean_name() {
        assert_eq!(clean_name("(Place Order)"), "Place Order");
        assert_eq!(clean_name(":Customer:"), "Customer");
        assert_eq!(clean_name("\"Bank Clerk\""), "Bank Clerk");
    }

    #[test]
    fn test_looks_like_class_name() {
        assert!(looks_like_class_name("Order"));
        assert!(looks_like_class_name("OrderLine2"));
        assert!(!looks_like_class_name("order"));
        assert!(!looks_like_class_name("MAX"));
        assert!(!looks_like_class_name("Order_Line"));
        assert!(!looks_like_class_name(""));
    }

    #[test]
    fn test_parser_for_matches_kind() {
        for kind in DiagramType::all() {
            assert_eq!(parser_for(kind).diagram_type(), kind);
        }
    }
}
