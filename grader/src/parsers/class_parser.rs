//! Class diagram parser.
//!
//! Reads class-like declarations (`class`, `abstract class`, `interface`, `enum`),
//! their member bodies, `Owner : member` one-liners and relationship lines.
//!
//! Members: a line containing both `(` and `)` is a method, anything else is an
//! attribute. Visibility prefixes `+ - # ~` map to public/private/protected/package;
//! `{static}` and `{abstract}` toggle the matching flags.
//!
//! Relationship arrows are looked up in a fixed table. Reversed arrows such as
//! `<|--` swap the endpoints so the stored relationship always points from the
//! specific to the general side. Undeclared endpoints that look like class names
//! are added as bare classes; other relationships with unknown endpoints are dropped.

use once_cell::sync::Lazy;
use regex::Regex;
use tracing::debug;

use super::{clean_source, extract_title, looks_like_class_name, normalize_arrow};
use crate::diagrams::{
    ClassAttribute, ClassDiagram, ClassMethod, ClassRelationship, Diagram, DiagramType,
    RelationshipType, UmlClass, Visibility,
};
use crate::traits::parser::DiagramParser;

static CLASS_DECL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r#"(?i)^(abstract\s+class|abstract|class|interface|enum)\s+(?:"([^"]+)"|(\w+))(?:\s+as\s+(\w+))?(?:<[^>]*>)?(?:\s*<<\s*([^>]+?)\s*>>)?[^{}]*(\{)?\s*(\})?\s*$"#,
    )
    .expect("static regex")
});
static ATTRIBUTE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^([+\-#~])?(\{static\}\s*)?(\w+)(?:\s*:\s*(\w+))?(?:\s*=\s*(.+))?")
        .expect("static regex")
});
static METHOD: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"^([+\-#~])?(\{static\}\s*)?(\{abstract\}\s*)?(\w+)\(([^)]*)\)(?:\s*:\s*(\w+))?",
    )
    .expect("static regex")
});
static RELATIONSHIP: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"^(\w+)\s*(?:"([^"]*)"\s*)?(\S+?)\s*(?:"([^"]*)"\s*)?(\w+)\s*(?::\s*(.+))?$"#)
        .expect("static regex")
});
static MEMBER_LINE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(\w+)\s*:\s*(.+)$").expect("static regex"));

/// Arrow token, relationship kind, and whether the endpoints are written reversed.
const ARROWS: &[(&str, RelationshipType, bool)] = &[
    ("--|>", RelationshipType::Inheritance, false),
    ("<|--", RelationshipType::Inheritance, true),
    ("..|>", RelationshipType::Realization, false),
    ("<|..", RelationshipType::Realization, true),
    ("*--", RelationshipType::Composition, false),
    ("--*", RelationshipType::Composition, true),
    ("o--", RelationshipType::Aggregation, false),
    ("--o", RelationshipType::Aggregation, true),
    ("..>", RelationshipType::Dependency, false),
    ("<..", RelationshipType::Dependency, true),
    ("..", RelationshipType::Dependency, false),
    ("-->", RelationshipType::Association, false),
    ("<--", RelationshipType::Association, true),
    ("--", RelationshipType::Association, false),
    ("->", RelationshipType::Association, false),
    ("<-", RelationshipType::Association, true),
];

fn lookup_arrow(token: &str) -> Option<(RelationshipType, bool)> {
    let token = normalize_arrow(token);
    ARROWS
        .iter()
        .find(|(arrow, _, _)| *arrow == token)
        .map(|(_, kind, reversed)| (*kind, *reversed))
}

/// Parser for class diagrams.
pub struct ClassDiagramParser;

impl ClassDiagramParser {
    /// Parses a single member line into the class it belongs to.
    fn add_member(class: &mut UmlClass, line: &str) {
        let line = line.trim().trim_end_matches(';');
        if line.is_empty() || is_separator(line) {
            return;
        }

        if line.contains('(') && line.contains(')') {
            if let Some(method) = parse_method(line) {
                if method.is_abstract && !class.is_abstract {
                    debug!(class = %class.name, method = %method.name, "abstract member on concrete class");
                }
                class.methods.push(method);
            }
        } else if let Some(attribute) = parse_attribute(line) {
            class.attributes.push(attribute);
        }
    }

    fn declare(diagram: &mut ClassDiagram, name: &str) -> usize {
        if let Some(index) = diagram.classes.iter().position(|c| c.name == name) {
            return index;
        }
        diagram.classes.push(UmlClass::new(name));
        diagram.classes.len() - 1
    }

    fn relationship_from(line: &str) -> Option<(String, String, RelationshipType, ClassRelationship)> {
        let caps = RELATIONSHIP.captures(line)?;
        let (kind, reversed) = lookup_arrow(&caps[3])?;

        let (mut source, mut target) = (caps[1].to_string(), caps[5].to_string());
        let (mut source_mult, mut target_mult) = (
            caps.get(2).map(|m| m.as_str().to_string()),
            caps.get(4).map(|m| m.as_str().to_string()),
        );
        if reversed {
            std::mem::swap(&mut source, &mut target);
            std::mem::swap(&mut source_mult, &mut target_mult);
        }

        let mut relationship = ClassRelationship::new(source.clone(), target.clone(), kind);
        relationship.label = caps
            .get(6)
            .map(|m| m.as_str().trim().to_string())
            .filter(|l| !l.is_empty());
        relationship.multiplicity_source = source_mult;
        relationship.multiplicity_target = target_mult;
        Some((source, target, kind, relationship))
    }
}

impl DiagramParser for ClassDiagramParser {
    fn diagram_type(&self) -> DiagramType {
        DiagramType::Class
    }

    fn parse(&self, text: &str) -> Diagram {
        let lines = clean_source(text);
        let mut diagram = ClassDiagram {
            title: extract_title(&lines),
            ..Default::default()
        };

        let mut open_body: Option<usize> = None;
        let mut pending_relationships = Vec::new();
        let mut pending_members = Vec::new();

        for line in &lines {
            if let Some(index) = open_body {
                if line.starts_with('}') {
                    open_body = None;
                } else {
                    Self::add_member(&mut diagram.classes[index], line);
                }
                continue;
            }

            if let Some(caps) = CLASS_DECL.captures(line) {
                let keyword = caps[1].to_lowercase();
                let Some(name) = caps.get(2).or_else(|| caps.get(3)).map(|m| m.as_str().trim().to_string())
                else {
                    continue;
                };
                let index = Self::declare(&mut diagram, &name);
                let class = &mut diagram.classes[index];
                class.is_abstract |= keyword.starts_with("abstract");
                if keyword == "interface" || keyword == "enum" {
                    class.stereotype = Some(keyword.clone());
                }
                if let Some(stereotype) = caps.get(5) {
                    class.stereotype = Some(stereotype.as_str().to_string());
                }
                if caps.get(6).is_some() && caps.get(7).is_none() {
                    open_body = Some(index);
                }
                continue;
            }

            if Self::relationship_from(line).is_some() {
                pending_relationships.push(line.as_str());
                continue;
            }
            if MEMBER_LINE.is_match(line) {
                pending_members.push(line.as_str());
            }
        }

        for line in pending_relationships {
            let Some((source, target, kind, relationship)) = Self::relationship_from(line) else {
                continue;
            };
            for endpoint in [&source, &target] {
                if diagram.find_class(endpoint).is_none() && looks_like_class_name(endpoint) {
                    debug!(class = %endpoint, "synthesizing class from relationship endpoint");
                    diagram.classes.push(UmlClass::new(endpoint.as_str()));
                }
            }
            if diagram.find_class(&source).is_some() && diagram.find_class(&target).is_some() {
                debug!(%source, %target, kind = %kind, "class relationship");
                diagram.relationships.push(relationship);
            }
        }

        for line in pending_members {
            if let Some(caps) = MEMBER_LINE.captures(line) {
                if let Some(class) = diagram.find_class_mut(&caps[1]) {
                    Self::add_member(class, &caps[2]);
                }
            }
        }

        debug!(
            classes = diagram.classes.len(),
            relationships = diagram.relationships.len(),
            "parsed class diagram"
        );
        Diagram::Class(diagram)
    }
}

fn is_separator(line: &str) -> bool {
    ["--", "..", "==", "__"].iter().any(|sep| line.starts_with(sep))
}

fn visibility(symbol: Option<regex::Match<'_>>) -> Visibility {
    symbol
        .and_then(|m| Visibility::from_symbol(m.as_str()))
        .unwrap_or_default()
}

fn parse_attribute(line: &str) -> Option<ClassAttribute> {
    let caps = ATTRIBUTE.captures(line)?;
    Some(ClassAttribute {
        name: caps[3].to_string(),
        type_name: caps.get(4).map(|m| m.as_str().to_string()),
        visibility: visibility(caps.get(1)),
        is_static: caps.get(2).is_some(),
        default_value: caps.get(5).map(|m| m.as_str().trim().to_string()),
    })
}

fn parse_method(line: &str) -> Option<ClassMethod> {
    let caps = METHOD.captures(line)?;
    let parameters = caps[5]
        .split(',')
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .map(str::to_string)
        .collect();
    Some(ClassMethod {
        name: caps[4].to_string(),
        parameters,
        return_type: caps.get(6).map(|m| m.as_str().to_string()),
        visibility: visibility(caps.get(1)),
        is_static: caps.get(2).is_some(),
        is_abstract: caps.get(3).is_some(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(text: &str) -> ClassDiagram {
        match ClassDiagramParser.parse(text) {
            Diagram::Class(d) => d,
            other => panic!("expected a class diagram, got {:?}", other.diagram_type()),
        }
    }

    const SHAPES: &str = r#"@startuml
title Shapes
abstract class Shape {
  -name: String
  #{static} count: int = 0
  +{abstract} area(): double
  +describe(prefix: String, verbose: bool): String
}
class Circle {
  -radius: double
  +area(): double
}
interface Drawable
Circle --|> Shape
Circle ..|> Drawable
@enduml"#;

    #[test]
    fn test_empty_diagram() {
        let d = parse("@startuml\n@enduml");
        assert!(d.classes.is_empty());
        assert!(d.relationships.is_empty());
    }

    #[test]
    fn test_classes_and_members() {
        let d = parse(SHAPES);
        assert_eq!(d.title.as_deref(), Some("Shapes"));
        assert_eq!(d.class_names(), vec!["Shape", "Circle", "Drawable"]);

        let shape = d.find_class("Shape").unwrap();
        assert!(shape.is_abstract);
        assert_eq!(shape.attribute_names(), vec!["name", "count"]);
        assert_eq!(shape.method_names(), vec!["area", "describe"]);

        let count = &shape.attributes[1];
        assert_eq!(count.visibility, Visibility::Protected);
        assert!(count.is_static);
        assert_eq!(count.type_name.as_deref(), Some("int"));
        assert_eq!(count.default_value.as_deref(), Some("0"));

        let area = &shape.methods[0];
        assert!(area.is_abstract);
        assert_eq!(area.return_type.as_deref(), Some("double"));
        assert_eq!(shape.methods[1].parameters, vec!["prefix: String", "verbose: bool"]);

        assert_eq!(d.find_class("Drawable").unwrap().stereotype.as_deref(), Some("interface"));
    }

    #[test]
    fn test_relationship_kinds() {
        let d = parse(SHAPES);
        let keys: Vec<String> = d.relationships.iter().map(|r| r.key()).collect();
        assert_eq!(keys, vec!["Circle->Shape:inheritance", "Circle->Drawable:realization"]);
    }

    #[test]
    fn test_reverse_inheritance_swaps_endpoints() {
        let d = parse("@startuml\nclass Animal\nclass Dog\nAnimal <|-- Dog\n@enduml");
        assert_eq!(d.relationships[0].key(), "Dog->Animal:inheritance");
    }

    #[test]
    fn test_composition_aggregation_and_multiplicity() {
        let d = parse(
            "@startuml\nclass Order\nclass Line\nclass Customer\nOrder \"1\" *-- \"many\" Line : contains\nCustomer o-- Order\n@enduml",
        );
        assert_eq!(d.relationships.len(), 2);
        let composition = &d.relationships[0];
        assert_eq!(composition.relationship_type, RelationshipType::Composition);
        assert_eq!(composition.multiplicity_source.as_deref(), Some("1"));
        assert_eq!(composition.multiplicity_target.as_deref(), Some("many"));
        assert_eq!(composition.label.as_deref(), Some("contains"));
        assert_eq!(d.relationships[1].relationship_type, RelationshipType::Aggregation);
    }

    #[test]
    fn test_undeclared_endpoints_are_synthesized_when_class_shaped() {
        let d = parse("@startuml\nInvoice --> Payment\nInvoice --> MAX_ITEMS\n@enduml");
        assert_eq!(d.class_names(), vec!["Invoice", "Payment"]);
        assert_eq!(d.relationships.len(), 1);
    }

    #[test]
    fn test_member_one_liners() {
        let d = parse("@startuml\nclass Account\nAccount : -balance: double\nAccount : +deposit(amount: double)\n@enduml");
        let account = d.find_class("Account").unwrap();
        assert_eq!(account.attribute_names(), vec!["balance"]);
        assert_eq!(account.method_names(), vec!["deposit"]);
        assert_eq!(account.attributes[0].visibility, Visibility::Private);
    }

    #[test]
    fn test_enum_constants_become_attributes() {
        let d = parse("@startuml\nenum Color {\n  RED\n  GREEN\n}\n@enduml");
        let color = d.find_class("Color").unwrap();
        assert_eq!(color.stereotype.as_deref(), Some("enum"));
        assert_eq!(color.attribute_names(), vec!["RED", "GREEN"]);
    }
}
