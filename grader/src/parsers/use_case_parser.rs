//! Use-case diagram parser.
//!
//! Works in two passes over the cleaned lines. The first pass collects declared
//! actors and use cases (with their aliases). The second pass reads
//! relationship lines, resolving each endpoint to a declared element or
//! synthesizing one when the endpoint is name-shaped but was never declared.
//!
//! Recognised declarations:
//!
//! ```text
//! actor User                 actor "Bank Clerk" as BC        :Customer: as C
//! usecase Login              usecase "Place Order" as UC1    (Pay Bill) as PB
//! ```
//!
//! Relationship types come from the label first (`include`, `extend`), then from
//! the arrow (`--|>` generalization, dotted arrows dependency, anything else
//! association).

use std::collections::HashMap;

use once_cell::sync::Lazy;
use regex::Regex;
use tracing::debug;

use super::{clean_name, clean_source, extract_title, normalize_arrow};
use crate::diagrams::{Actor, Diagram, DiagramType, Relationship, UseCase, UseCaseDiagram};
use crate::traits::parser::DiagramParser;

static ACTOR_DECL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?i)^actor\s+(?:"([^"]+)"|:([^:]+):|([\w-]+))(?:\s+as\s+(\w+))?(?:\s*<<\s*([^>]+?)\s*>>)?"#)
        .expect("static regex")
});
static ACTOR_COLON: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^:([^:]+):(?:\s+as\s+(\w+))?\s*$").expect("static regex")
});
static USECASE_DECL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?i)^usecase\s+(?:"([^"]+)"|\(([^)]+)\)|([\w-]+))(?:\s+as\s+(\w+))?"#)
        .expect("static regex")
});
static USECASE_PAREN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\(([^)]+)\)(?:\s+as\s+(\w+))?\s*$").expect("static regex")
});
static RELATIONSHIP: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r#"^(:[^:]+:|\([^)]+\)|"[^"]+"|\w+)\s*(<?\|?[-.]+(?:\[[^\]]*\])?(?:(?:up|down|left|right|u|d|l|r)[-.]+)?\|?>?)\s*(:[^:]+:|\([^)]+\)|"[^"]+"|\w+)\s*(?::\s*(.*))?$"#,
    )
    .expect("static regex")
});

/// Kinds of element a relationship endpoint can refer to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ElementKind {
    Actor,
    UseCase,
}

/// Parser for use-case diagrams.
pub struct UseCaseParser;

/// Mutable state shared by both passes.
#[derive(Default)]
struct Collector {
    diagram: UseCaseDiagram,
    aliases: HashMap<String, String>,
    kinds: HashMap<String, ElementKind>,
}

impl Collector {
    fn add(&mut self, name: &str, alias: Option<&str>, kind: ElementKind) {
        let name = name.trim();
        if name.is_empty() {
            return;
        }
        if let Some(alias) = alias {
            self.aliases.insert(alias.to_string(), name.to_string());
        }
        if self.kinds.contains_key(name) {
            return;
        }
        self.kinds.insert(name.to_string(), kind);
        match kind {
            ElementKind::Actor => self.diagram.actors.push(Actor::new(name)),
            ElementKind::UseCase => self.diagram.use_cases.push(UseCase::new(name)),
        }
    }

    /// Resolves a relationship endpoint, declaring it when it is new.
    fn resolve(&mut self, raw: &str) -> Option<String> {
        let raw = raw.trim();
        let name = clean_name(raw);
        if name.is_empty() {
            return None;
        }
        if let Some(declared) = self.aliases.get(&name) {
            return Some(declared.clone());
        }
        if self.kinds.contains_key(&name) {
            return Some(name);
        }

        let kind = if raw.starts_with(':') {
            ElementKind::Actor
        } else if raw.starts_with('(') {
            ElementKind::UseCase
        } else if raw.starts_with('"') {
            if looks_like_use_case(&name) {
                ElementKind::UseCase
            } else {
                ElementKind::Actor
            }
        } else if looks_like_actor(&name) {
            ElementKind::Actor
        } else {
            return None;
        };

        debug!(name = %name, ?kind, "synthesizing undeclared use-case element");
        self.add(&name, None, kind);
        Some(name)
    }
}

impl UseCaseParser {
    fn collect_declaration(collector: &mut Collector, line: &str) -> bool {
        if let Some(caps) = ACTOR_DECL.captures(line) {
            let name = caps
                .get(1)
                .or_else(|| caps.get(2))
                .or_else(|| caps.get(3))
                .map(|m| m.as_str())
                .unwrap_or_default();
            let alias = caps.get(4).map(|m| m.as_str());
            collector.add(name, alias, ElementKind::Actor);
            if let (Some(stereotype), Some(actor)) = (caps.get(5), collector.diagram.actors.last_mut()) {
                if actor.name == name.trim() {
                    actor.stereotype = Some(stereotype.as_str().to_string());
                }
            }
            return true;
        }
        if let Some(caps) = ACTOR_COLON.captures(line) {
            collector.add(&caps[1], caps.get(2).map(|m| m.as_str()), ElementKind::Actor);
            return true;
        }
        if let Some(caps) = USECASE_DECL.captures(line) {
            let name = caps
                .get(1)
                .or_else(|| caps.get(2))
                .or_else(|| caps.get(3))
                .map(|m| m.as_str())
                .unwrap_or_default();
            collector.add(name, caps.get(4).map(|m| m.as_str()), ElementKind::UseCase);
            return true;
        }
        if let Some(caps) = USECASE_PAREN.captures(line) {
            collector.add(&caps[1], caps.get(2).map(|m| m.as_str()), ElementKind::UseCase);
            return true;
        }
        false
    }

    fn collect_relationship(collector: &mut Collector, line: &str) {
        let Some(caps) = RELATIONSHIP.captures(line) else {
            return;
        };
        let arrow = normalize_arrow(&caps[2]);
        if !arrow.contains('-') && !arrow.contains("..") {
            return;
        }
        let label = caps
            .get(4)
            .map(|m| m.as_str().trim().to_string())
            .filter(|l| !l.is_empty());

        let (Some(mut source), Some(mut target)) =
            (collector.resolve(&caps[1]), collector.resolve(&caps[3]))
        else {
            return;
        };
        if arrow.starts_with('<') {
            std::mem::swap(&mut source, &mut target);
        }

        collector.diagram.relationships.push(Relationship {
            relationship_type: relationship_type(&arrow, label.as_deref()).to_string(),
            source,
            target,
            label,
        });
    }
}

impl DiagramParser for UseCaseParser {
    fn diagram_type(&self) -> DiagramType {
        DiagramType::UseCase
    }

    fn parse(&self, text: &str) -> Diagram {
        let lines = clean_source(text);
        let mut collector = Collector::default();
        collector.diagram.title = extract_title(&lines);

        let mut pending = Vec::new();
        for line in &lines {
            if !Self::collect_declaration(&mut collector, line) {
                pending.push(line.as_str());
            }
        }
        for line in pending {
            Self::collect_relationship(&mut collector, line);
        }

        debug!(
            actors = collector.diagram.actors.len(),
            use_cases = collector.diagram.use_cases.len(),
            relationships = collector.diagram.relationships.len(),
            "parsed use-case diagram"
        );
        Diagram::UseCase(collector.diagram)
    }
}

/// Relationship type from the label, falling back to the arrow shape.
fn relationship_type(arrow: &str, label: Option<&str>) -> &'static str {
    if let Some(label) = label.map(str::to_lowercase) {
        if label.contains("include") {
            return "include";
        }
        if label.contains("extend") {
            return "extend";
        }
    }
    if arrow.contains('|') {
        "generalization"
    } else if arrow.contains("..") {
        "dependency"
    } else {
        "association"
    }
}

/// Bare names in relationships are treated as actors when they read like one.
fn looks_like_actor(name: &str) -> bool {
    const KEYWORDS: &[&str] = &["user", "admin", "customer", "client", "system", "manager", "operator"];
    let lower = name.to_lowercase();
    name.split_whitespace().count() <= 2
        || KEYWORDS.iter().any(|k| lower.contains(k))
        || lower.ends_with("er")
        || lower.ends_with("or")
}

/// Quoted names in relationships are use cases when they read like an action.
fn looks_like_use_case(name: &str) -> bool {
    const KEYWORDS: &[&str] = &[
        "login", "create", "delete", "update", "manage", "view", "search", "add", "remove",
    ];
    let lower = name.to_lowercase();
    name.split_whitespace().count() >= 2 || KEYWORDS.iter().any(|k| lower.contains(k))
}
