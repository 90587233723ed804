use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Channel carrying streamed agent events (`{type, message?}` payloads).
pub const AGENT_EVENT_CHANNEL: &str = "agent-event";
/// Channel carrying a turn failure as a plain string payload.
pub const AGENT_ERROR_CHANNEL: &str = "agent-error";
/// Turn ceiling sent with every reply request.
pub const DEFAULT_MAX_TURNS: u32 = 1000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionType {
    #[default]
    User,
    Scheduled,
    SubAgent,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateSessionRequest {
    pub working_dir: PathBuf,
    pub name: String,
    #[serde(default)]
    pub session_type: SessionType,
}

impl CreateSessionRequest {
    pub fn new(working_dir: impl Into<PathBuf>, name: impl Into<String>) -> Self {
        Self {
            working_dir: working_dir.into(),
            name: name.into(),
            session_type: SessionType::User,
        }
    }
}

/// Backend-tracked conversation context.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub id: String,
    #[serde(default)]
    pub working_dir: PathBuf,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub session_type: SessionType,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionConfig {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_turns: Option<u32>,
}

impl SessionConfig {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            max_turns: Some(DEFAULT_MAX_TURNS),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    User,
    Assistant,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageMetadata {
    #[serde(default = "visible")]
    pub user_visible: bool,
    #[serde(default = "visible")]
    pub agent_visible: bool,
}

impl Default for MessageMetadata {
    fn default() -> Self {
        Self {
            user_visible: true,
            agent_visible: true,
        }
    }
}

fn visible() -> bool {
    true
}

/// One item of a message body.
///
/// Hosts emit text either as `{"type":"text","text":...}` or as
/// `{"Text":{"text":...}}`. Any other item (tool requests, images, ...) is kept
/// as raw JSON so the surrounding message still decodes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MessageContent {
    Tagged(TaggedContent),
    Wrapped(WrappedText),
    Other(Value),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TaggedContent {
    Text {
        #[serde(default)]
        text: String,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WrappedText {
    #[serde(rename = "Text")]
    pub inner: TextBody,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TextBody {
    #[serde(default)]
    pub text: String,
}

impl MessageContent {
    pub fn text(text: impl Into<String>) -> Self {
        Self::Tagged(TaggedContent::Text { text: text.into() })
    }

    /// Returns the text this item contributes, if it is a text item.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Tagged(TaggedContent::Text { text }) => Some(text),
            Self::Wrapped(wrapped) => Some(&wrapped.inner.text),
            Self::Other(_) => None,
        }
    }
}

/// Message shape shared by the UI and agent hosts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentMessage {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub role: MessageRole,
    #[serde(default)]
    pub content: Vec<MessageContent>,
    /// Unix timestamp in seconds.
    #[serde(default)]
    pub created: i64,
    #[serde(default)]
    pub metadata: MessageMetadata,
}

impl AgentMessage {
    pub fn user_text(id: impl Into<String>, text: impl Into<String>, created: i64) -> Self {
        Self {
            id: Some(id.into()),
            role: MessageRole::User,
            content: vec![MessageContent::text(text)],
            created,
            metadata: MessageMetadata::default(),
        }
    }

    pub fn assistant_text(id: impl Into<String>, text: impl Into<String>, created: i64) -> Self {
        Self {
            id: Some(id.into()),
            role: MessageRole::Assistant,
            content: vec![MessageContent::text(text)],
            created,
            metadata: MessageMetadata::default(),
        }
    }

    /// Concatenates every text item in order.
    pub fn text(&self) -> String {
        self.content
            .iter()
            .filter_map(MessageContent::as_text)
            .collect()
    }
}

/// Payload of the `agent-event` channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AgentEvent {
    Message {
        message: AgentMessage,
    },
    McpNotification {
        id: String,
        notification: Value,
    },
    ModelChange {
        model: String,
        mode: String,
    },
    HistoryReplaced {
        conversation: Value,
    },
}

impl AgentEvent {
    /// Decodes a raw channel payload; anything that does not match the contract yields `None`.
    pub fn decode(payload: &Value) -> Option<Self> {
        match serde_json::from_value(payload.clone()) {
            Ok(event) => Some(event),
            Err(error) => {
                tracing::trace!(error = %error, "ignoring undecodable agent event payload");
                None
            }
        }
    }

    pub fn to_payload(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}
