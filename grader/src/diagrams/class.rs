//! Class diagram entities.
//!
//! The [`std::fmt::Display`] impls render members and relationships back into
//! diagram source syntax, e.g. `-{static} count: int = 0` or
//! `Dog --|> Animal : is a`.

use std::fmt;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Visibility {
    #[default]
    Public,
    Private,
    Protected,
    Package,
}

impl Visibility {
    /// Maps a source prefix (`+`, `-`, `#`, `~`) to a visibility.
    pub fn from_symbol(symbol: &str) -> Option<Self> {
        match symbol {
            "+" => Some(Visibility::Public),
            "-" => Some(Visibility::Private),
            "#" => Some(Visibility::Protected),
            "~" => Some(Visibility::Package),
            _ => None,
        }
    }

    pub fn symbol(&self) -> char {
        match self {
            Visibility::Public => '+',
            Visibility::Private => '-',
            Visibility::Protected => '#',
            Visibility::Package => '~',
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassAttribute {
    pub name: String,
    #[serde(rename = "type")]
    pub type_name: Option<String>,
    pub visibility: Visibility,
    pub is_static: bool,
    pub default_value: Option<String>,
}

impl fmt::Display for ClassAttribute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.visibility.symbol())?;
        if self.is_static {
            f.write_str("{static} ")?;
        }
        f.write_str(&self.name)?;
        if let Some(type_name) = &self.type_name {
            write!(f, ": {type_name}")?;
        }
        if let Some(default) = &self.default_value {
            write!(f, " = {default}")?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassMethod {
    pub name: String,
    pub parameters: Vec<String>,
    pub return_type: Option<String>,
    pub visibility: Visibility,
    pub is_static: bool,
    pub is_abstract: bool,
}

impl fmt::Display for ClassMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.visibility.symbol())?;
        if self.is_static {
            f.write_str("{static} ")?;
        }
        if self.is_abstract {
            f.write_str("{abstract} ")?;
        }
        write!(f, "{}({})", self.name, self.parameters.join(", "))?;
        if let Some(ret) = &self.return_type {
            write!(f, ": {ret}")?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RelationshipType {
    Inheritance,
    Composition,
    Aggregation,
    Association,
    Dependency,
    Realization,
}

impl RelationshipType {
    pub fn as_str(&self) -> &'static str {
        match self {
            RelationshipType::Inheritance => "inheritance",
            RelationshipType::Composition => "composition",
            RelationshipType::Aggregation => "aggregation",
            RelationshipType::Association => "association",
            RelationshipType::Dependency => "dependency",
            RelationshipType::Realization => "realization",
        }
    }

    /// Arrow token used when rendering the relationship as source.
    pub fn symbol(&self) -> &'static str {
        match self {
            RelationshipType::Inheritance => "--|>",
            RelationshipType::Composition => "*--",
            RelationshipType::Aggregation => "o--",
            RelationshipType::Association => "--",
            RelationshipType::Dependency => "..>",
            RelationshipType::Realization => "..|>",
        }
    }
}

impl fmt::Display for RelationshipType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassRelationship {
    pub source: String,
    pub target: String,
    pub relationship_type: RelationshipType,
    pub label: Option<String>,
    pub multiplicity_source: Option<String>,
    pub multiplicity_target: Option<String>,
}

impl ClassRelationship {
    pub fn new(source: impl Into<String>, target: impl Into<String>, kind: RelationshipType) -> Self {
        Self {
            source: source.into(),
            target: target.into(),
            relationship_type: kind,
            label: None,
            multiplicity_source: None,
            multiplicity_target: None,
        }
    }

    pub fn key(&self) -> String {
        format!("{}->{}:{}", self.source, self.target, self.relationship_type)
    }
}

impl fmt::Display for ClassRelationship {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {}", self.source, self.relationship_type.symbol(), self.target)?;
        if let Some(label) = &self.label {
            write!(f, " : {label}")?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UmlClass {
    pub name: String,
    pub attributes: Vec<ClassAttribute>,
    pub methods: Vec<ClassMethod>,
    /// `interface`, `enum` or a `<<...>>` stereotype when declared.
    pub stereotype: Option<String>,
    pub is_abstract: bool,
}

impl UmlClass {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn attribute_names(&self) -> Vec<&str> {
        self.attributes.iter().map(|a| a.name.as_str()).collect()
    }

    pub fn method_names(&self) -> Vec<&str> {
        self.methods.iter().map(|m| m.name.as_str()).collect()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ClassDiagram {
    pub classes: Vec<UmlClass>,
    pub relationships: Vec<ClassRelationship>,
    pub title: Option<String>,
}

impl ClassDiagram {
    pub fn class_names(&self) -> Vec<&str> {
        self.classes.iter().map(|c| c.name.as_str()).collect()
    }

    pub fn find_class(&self, name: &str) -> Option<&UmlClass> {
        self.classes.iter().find(|c| c.name == name)
    }

    pub fn find_class_mut(&mut self, name: &str) -> Option<&mut UmlClass> {
        self.classes.iter_mut().find(|c| c.name == name)
    }

    /// `Owner.attribute` keys for every attribute in the diagram.
    pub fn attribute_keys(&self) -> Vec<String> {
        self.classes
            .iter()
            .flat_map(|c| c.attributes.iter().map(move |a| format!("{}.{}", c.name, a.name)))
            .collect()
    }

    /// `Owner.method` keys for every method in the diagram.
    pub fn method_keys(&self) -> Vec<String> {
        self.classes
            .iter()
            .flat_map(|c| c.methods.iter().map(move |m| format!("{}.{}", c.name, m.name)))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_attribute_display() {
        let attr = ClassAttribute {
            name: "count".into(),
            type_name: Some("int".into()),
            visibility: Visibility::Private,
            is_static: true,
            default_value: Some("0".into()),
        };
        assert_eq!(attr.to_string(), "-{static} count: int = 0");
    }

    #[test]
    fn test_method_display() {
        let method = ClassMethod {
            name: "area".into(),
            parameters: vec!["scale: double".into()],
            return_type: Some("double".into()),
            visibility: Visibility::Public,
            is_static: false,
            is_abstract: true,
        };
        assert_eq!(method.to_string(), "+{abstract} area(scale: double): double");
    }

    #[test]
    fn test_relationship_display_and_key() {
        let mut rel = ClassRelationship::new("Dog", "Animal", RelationshipType::Inheritance);
        rel.label = Some("is a".into());
        assert_eq!(rel.to_string(), "Dog --|> Animal : is a");
        assert_eq!(rel.key(), "Dog->Animal:inheritance");
    }

    #[test]
    fn test_member_keys_are_owner_qualified() {
        let mut class = UmlClass::new("User");
        class.attributes.push(ClassAttribute {
            name: "email".into(),
            type_name: None,
            visibility: Visibility::Public,
            is_static: false,
            default_value: None,
        });
        let diagram = ClassDiagram {
            classes: vec![class],
            ..Default::default()
        };
        assert_eq!(diagram.attribute_keys(), vec!["User.email".to_string()]);
        assert!(diagram.method_keys().is_empty());
        assert!(diagram.find_class("User").is_some());
        assert!(diagram.find_class("Admin").is_none());
    }
}
