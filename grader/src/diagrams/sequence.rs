//! Sequence diagram entities.

use std::fmt;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageType {
    Synchronous,
    Asynchronous,
    Return,
    #[serde(rename = "self")]
    SelfCall,
}

impl MessageType {
    pub fn symbol(&self) -> &'static str {
        match self {
            MessageType::Asynchronous => "->>",
            MessageType::Return => "-->",
            MessageType::Synchronous | MessageType::SelfCall => "->",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Participant {
    pub name: String,
    /// Declaration keyword: `participant`, `actor`, `boundary`, ...
    pub kind: Option<String>,
    pub alias: Option<String>,
}

impl Participant {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: None,
            alias: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub source: String,
    pub target: String,
    pub message_type: MessageType,
    pub label: String,
    /// 1-based position in the diagram.
    pub sequence_number: usize,
}

impl Message {
    pub fn key(&self) -> String {
        format!("{}->{}:{}", self.source, self.target, self.label)
    }
}

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {}", self.source, self.message_type.symbol(), self.target)?;
        if !self.label.is_empty() {
            write!(f, " : {}", self.label)?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SequenceDiagram {
    pub participants: Vec<Participant>,
    pub messages: Vec<Message>,
    pub title: Option<String>,
}

impl SequenceDiagram {
    pub fn participant_names(&self) -> Vec<&str> {
        self.participants.iter().map(|p| p.name.as_str()).collect()
    }

    /// Finds a participant by declared name or alias.
    pub fn find_participant(&self, name: &str) -> Option<&Participant> {
        self.participants
            .iter()
            .find(|p| p.name == name || p.alias.as_deref() == Some(name))
    }

    pub fn messages_from(&self, participant: &str) -> Vec<&Message> {
        self.messages.iter().filter(|m| m.source == participant).collect()
    }

    pub fn messages_to(&self, participant: &str) -> Vec<&Message> {
        self.messages.iter().filter(|m| m.target == participant).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn message(source: &str, target: &str, label: &str, n: usize) -> Message {
        Message {
            source: source.into(),
            target: target.into(),
            message_type: MessageType::Synchronous,
            label: label.into(),
            sequence_number: n,
        }
    }

    #[test]
    fn test_message_display_and_key() {
        let msg = message("Client", "Server", "login()", 1);
        assert_eq!(msg.to_string(), "Client -> Server : login()");
        assert_eq!(msg.key(), "Client->Server:login()");
    }

    #[test]
    fn test_message_filters() {
        let diagram = SequenceDiagram {
            participants: vec![Participant::new("A"), Participant::new("B")],
            messages: vec![message("A", "B", "ping", 1), message("B", "A", "pong", 2)],
            title: None,
        };
        assert_eq!(diagram.messages_from("A").len(), 1);
        assert_eq!(diagram.messages_to("A")[0].label, "pong");
    }

    #[test]
    fn test_find_participant_by_alias() {
        let mut participant = Participant::new("Web Server");
        participant.alias = Some("WS".into());
        let diagram = SequenceDiagram {
            participants: vec![participant],
            ..Default::default()
        };
        assert_eq!(diagram.find_participant("WS").map(|p| p.name.as_str()), Some("Web Server"));
    }
}
