use serde::{Deserialize, Serialize};

/// A message in a room's history. Append-only once delivered: messages are
/// never edited or reordered after they land.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub id: String,
    pub author: String,
    pub content: String,
    pub timestamp: chrono::DateTime<chrono::Utc>,
    pub kind: MessageKind,
}

/// Who produced a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageKind {
    Human,
    Agent,
    System,
}

impl ChatMessage {
    fn new(author: &str, content: impl Into<String>, kind: MessageKind) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            author: author.to_string(),
            content: content.into(),
            timestamp: chrono::Utc::now(),
            kind,
        }
    }

    /// Create a human-authored message with current timestamp.
    pub fn human(author: &str, content: impl Into<String>) -> Self {
        Self::new(author, content, MessageKind::Human)
    }

    /// Create an agent-authored message. `author` is the persona id.
    pub fn agent(author: &str, content: impl Into<String>) -> Self {
        Self::new(author, content, MessageKind::Agent)
    }

    /// Create a system message.
    pub fn system(content: impl Into<String>) -> Self {
        Self::new("system", content, MessageKind::System)
    }

    pub fn is_agent(&self) -> bool {
        self.kind == MessageKind::Agent
    }
}
