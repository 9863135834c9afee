//! Sequence diagram parser.
//!
//! Participants come from declaration lines (`participant`, `actor`, `boundary`,
//! `control`, `entity`, `database`, `collections`, `queue`), optionally quoted
//! and aliased. Messages come from `A -> B : label` lines. Aliases resolve to
//! the declared name and undeclared endpoints become participants in order of
//! first appearance.

use std::collections::HashMap;

use once_cell::sync::Lazy;
use regex::Regex;
use tracing::debug;

use super::{clean_source, extract_title, normalize_arrow};
use crate::diagrams::{Diagram, DiagramType, Message, MessageType, Participant, SequenceDiagram};
use crate::traits::parser::DiagramParser;

static PARTICIPANT_DECL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r#"(?i)^(participant|actor|boundary|control|entity|database|collections|queue)\s+(?:"([^"]+)"|(\w+))(?:\s+as\s+(\w+))?"#,
    )
    .expect("static regex")
});
static MESSAGE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"^("[^"]+"|\w+)\s*(\S+?)\s*("[^"]+"|\w+)\s*(?::\s*(.*))?$"#)
        .expect("static regex")
});

/// Arrow token, message kind, and whether the endpoints are written reversed.
const ARROWS: &[(&str, MessageType, bool)] = &[
    ("->", MessageType::Synchronous, false),
    ("->>", MessageType::Asynchronous, false),
    ("-\\", MessageType::Asynchronous, false),
    ("-->", MessageType::Return, false),
    ("-->>", MessageType::Return, false),
    ("<-", MessageType::Synchronous, true),
    ("<<-", MessageType::Asynchronous, true),
    ("<--", MessageType::Return, true),
    ("<<--", MessageType::Return, true),
];

fn lookup_arrow(token: &str) -> Option<(MessageType, bool)> {
    let token = normalize_arrow(token);
    // lost/found message decorations do not change the kind
    let token = token.trim_end_matches(['x', 'o']).trim_start_matches(['x', 'o']);
    ARROWS
        .iter()
        .find(|(arrow, _, _)| *arrow == token)
        .map(|(_, kind, reversed)| (*kind, *reversed))
}

/// Parser for sequence diagrams.
pub struct SequenceDiagramParser;

#[derive(Default)]
struct Collector {
    diagram: SequenceDiagram,
    aliases: HashMap<String, String>,
}

impl Collector {
    fn declare(&mut self, name: &str, kind: Option<&str>, alias: Option<&str>) {
        if let Some(alias) = alias {
            self.aliases.insert(alias.to_string(), name.to_string());
        }
        if self.diagram.participants.iter().any(|p| p.name == name) {
            return;
        }
        self.diagram.participants.push(Participant {
            name: name.to_string(),
            kind: kind.map(str::to_lowercase),
            alias: alias.map(str::to_string),
        });
    }

    fn resolve(&mut self, raw: &str) -> String {
        let name = raw.trim().trim_matches('"').trim().to_string();
        if let Some(declared) = self.aliases.get(&name) {
            return declared.clone();
        }
        if !self.diagram.participants.iter().any(|p| p.name == name) {
            debug!(participant = %name, "synthesizing undeclared participant");
            self.declare(&name, None, None);
        }
        name
    }
}

impl DiagramParser for SequenceDiagramParser {
    fn diagram_type(&self) -> DiagramType {
        DiagramType::Sequence
    }

    fn parse(&self, text: &str) -> Diagram {
        let lines = clean_source(text);
        let mut collector = Collector::default();
        collector.diagram.title = extract_title(&lines);

        for line in &lines {
            if let Some(caps) = PARTICIPANT_DECL.captures(line) {
                let Some(name) = caps.get(2).or_else(|| caps.get(3)) else {
                    continue;
                };
                collector.declare(name.as_str(), Some(&caps[1]), caps.get(4).map(|m| m.as_str()));
                continue;
            }

            let Some(caps) = MESSAGE.captures(line) else {
                continue;
            };
            let Some((mut kind, reversed)) = lookup_arrow(&caps[2]) else {
                continue;
            };

            let mut source = collector.resolve(&caps[1]);
            let mut target = collector.resolve(&caps[3]);
            if reversed {
                std::mem::swap(&mut source, &mut target);
            }
            if source == target && kind == MessageType::Synchronous {
                kind = MessageType::SelfCall;
            }

            let sequence_number = collector.diagram.messages.len() + 1;
            collector.diagram.messages.push(Message {
                source,
                target,
                message_type: kind,
                label: caps.get(4).map(|m| m.as_str().trim().to_string()).unwrap_or_default(),
                sequence_number,
            });
        }

        debug!(
            participants = collector.diagram.participants.len(),
            messages = collector.diagram.messages.len(),
            "parsed sequence diagram"
        );
        Diagram::Sequence(collector.diagram)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(text: &str) -> SequenceDiagram {
        match SequenceDiagramParser.parse(text) {
            Diagram::Sequence(d) => d,
            other => panic!("expected a sequence diagram, got {:?}", other.diagram_type()),
        }
    }

    #[test]
    fn test_empty_diagram() {
        let d = parse("@startuml\n@enduml");
        assert!(d.participants.is_empty());
        assert!(d.messages.is_empty());
    }

    #[test]
    fn test_participants_and_messages() {
        let d = parse(
            r#"@startuml
actor User
participant "Web Server" as WS
database DB
User -> WS : login(user, pass)
activate WS
WS ->> DB : query
DB --> WS : rows
WS -> WS : validate
deactivate WS
@enduml"#,
        );
        assert_eq!(d.participant_names(), vec!["User", "Web Server", "DB"]);
        assert_eq!(d.participants[0].kind.as_deref(), Some("actor"));
        assert_eq!(d.find_participant("WS").unwrap().name, "Web Server");

        let kinds: Vec<MessageType> = d.messages.iter().map(|m| m.message_type).collect();
        assert_eq!(
            kinds,
            vec![
                MessageType::Synchronous,
                MessageType::Asynchronous,
                MessageType::Return,
                MessageType::SelfCall
            ]
        );
        assert_eq!(d.messages[0].key(), "User->Web Server:login(user, pass)");
        assert_eq!(d.messages[3].sequence_number, 4);
    }

    #[test]
    fn test_reverse_arrow_swaps_endpoints() {
        let d = parse("@startuml\nAlice <-- Bob : ack\n@enduml");
        assert_eq!(d.messages[0].source, "Bob");
        assert_eq!(d.messages[0].target, "Alice");
        assert_eq!(d.messages[0].message_type, MessageType::Return);
    }

    #[test]
    fn test_undeclared_participants_in_order_of_appearance() {
        let d = parse("@startuml\nClient -> Server : ping\nServer -> Cache : get\n@enduml");
        assert_eq!(d.participant_names(), vec!["Client", "Server", "Cache"]);
    }

    #[test]
    fn test_unlabelled_and_coloured_messages() {
        let d = parse("@startuml\nA -[#red]> B\n@enduml");
        assert_eq!(d.messages.len(), 1);
        assert_eq!(d.messages[0].label, "");
        assert_eq!(d.messages[0].message_type, MessageType::Synchronous);
    }

    #[test]
    fn test_control_lines_are_not_messages() {
        let d = parse("@startuml\nparticipant A\nalt success\nnote over A : hi\nend\nautonumber\n@enduml");
        assert!(d.messages.is_empty());
        assert_eq!(d.participant_names(), vec!["A"]);
    }
}
