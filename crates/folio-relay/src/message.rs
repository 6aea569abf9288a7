use folio_common::{ChatMessage, Role};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A chat message as shown in the transcript
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Message {
    pub role: Role,
    pub content: String,
    /// Random UUIDv4, stable while the message grows
    pub id: String,
}

impl Message {
    /// Message with a fresh id
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            id: Uuid::new_v4().to_string(),
        }
    }

    /// Message typed by the visitor
    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    /// Reply text from the assistant
    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }

    /// Whether deltas extend this message
    pub fn is_assistant(&self) -> bool {
        self.role == Role::Assistant
    }
}

impl From<&Message> for ChatMessage {
    fn from(message: &Message) -> Self {
        ChatMessage {
            role: message.role,
            content: message.content.clone(),
        }
    }
}

/// Request body for the chat relay: the transcript without ids
pub fn to_history(messages: &[Message]) -> Vec<ChatMessage> {
    messages.iter().map(ChatMessage::from).collect()
}
