use std::fmt;

use chrono::{DateTime, Local, Utc};
use quill_bridge::AgentMessage;
use uuid::Uuid;

/// Opaque identifier for one chat message, unique within a session's log.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MessageId(pub String);

impl MessageId {
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    /// Creates a fresh random identifier.
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Chat speaker role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatMessage {
    pub id: MessageId,
    pub role: Role,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

impl ChatMessage {
    pub fn new(
        id: MessageId,
        role: Role,
        content: impl Into<String>,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            role,
            content: content.into(),
            created_at,
        }
    }

    pub fn user(id: MessageId, content: impl Into<String>, created_at: DateTime<Utc>) -> Self {
        Self::new(id, Role::User, content, created_at)
    }

    pub fn assistant(
        id: MessageId,
        content: impl Into<String>,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self::new(id, Role::Assistant, content, created_at)
    }

    /// Local wall-clock time shown under the bubble.
    pub fn time_label(&self) -> String {
        self.created_at
            .with_timezone(&Local)
            .format("%-I:%M:%S %p")
            .to_string()
    }

    /// Host-shaped copy of this message: one text item, creation time in seconds.
    pub fn to_agent_message(&self) -> AgentMessage {
        match self.role {
            Role::User => AgentMessage::user_text(
                self.id.as_str(),
                self.content.clone(),
                self.created_at.timestamp(),
            ),
            Role::Assistant => AgentMessage::assistant_text(
                self.id.as_str(),
                self.content.clone(),
                self.created_at.timestamp(),
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use quill_bridge::MessageRole;

    #[test]
    fn user_message_maps_to_host_shape() {
        let created_at = Utc.timestamp_opt(1_700_000_000, 0).unwrap();
        let message = ChatMessage::user(MessageId::new("m1"), "Hello", created_at);

        let agent = message.to_agent_message();
        assert_eq!(agent.id.as_deref(), Some("m1"));
        assert_eq!(agent.role, MessageRole::User);
        assert_eq!(agent.created, 1_700_000_000);
        assert_eq!(agent.text(), "Hello");
        assert!(agent.metadata.user_visible && agent.metadata.agent_visible);
    }

    #[test]
    fn generated_ids_are_distinct() {
        assert_ne!(MessageId::generate(), MessageId::generate());
    }
}
