use std::fmt::Display;

use chrono::{DateTime, Utc};
use quill_bridge::{AgentMessage, SessionConfig};
use serde_json::Value;

use crate::chat::events::decode_assistant_delta;
use crate::chat::log::{AssistantUpdate, MessageLog};
use crate::chat::message::{ChatMessage, MessageId};

/// Why a send was dropped before reaching the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendRejection {
    EmptyContent,
    NoSession,
}

/// A user turn that has been appended locally and is ready for `agent_reply`.
#[derive(Debug, Clone, PartialEq)]
pub struct PreparedSend {
    pub message_id: MessageId,
    pub user_message: AgentMessage,
    pub session_config: SessionConfig,
}

/// Conversation state owned by one chat session: the host session id and the log.
#[derive(Debug, Clone, Default)]
pub struct ChatState {
    session_id: Option<String>,
    log: MessageLog,
}

impl ChatState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn session_id(&self) -> Option<&str> {
        self.session_id.as_deref()
    }

    pub fn set_session_id(&mut self, session_id: impl Into<String>) {
        self.session_id = Some(session_id.into());
    }

    pub fn log(&self) -> &MessageLog {
        &self.log
    }

    /// Validates and records a user send.
    ///
    /// On success the user message is already in the log and the streaming
    /// tracker is cleared; the caller only has to deliver the returned turn.
    pub fn prepare_send(
        &mut self,
        content: &str,
        now: DateTime<Utc>,
    ) -> Result<PreparedSend, SendRejection> {
        if content.trim().is_empty() {
            return Err(SendRejection::EmptyContent);
        }
        let Some(session_id) = self.session_id.clone() else {
            return Err(SendRejection::NoSession);
        };

        let message = ChatMessage::user(MessageId::generate(), content, now);
        let prepared = PreparedSend {
            message_id: message.id.clone(),
            user_message: message.to_agent_message(),
            session_config: SessionConfig::new(session_id),
        };
        self.log.push_user(message);

        Ok(prepared)
    }

    /// Feeds one raw `agent-event` payload into the log.
    pub fn apply_event(&mut self, payload: &Value, now: DateTime<Utc>) -> AssistantUpdate {
        match decode_assistant_delta(payload) {
            Some(delta) => self
                .log
                .apply_assistant_text(delta.id.as_deref(), &delta.text, now),
            None => AssistantUpdate::Ignored,
        }
    }

    pub fn record_send_failure(&mut self, detail: impl Display, now: DateTime<Utc>) -> MessageId {
        self.log.push_error(detail, now)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chat::message::Role;
    use quill_bridge::{BridgeError, DEFAULT_MAX_TURNS, MessageRole};
    use serde_json::json;

    fn with_session() -> ChatState {
        let mut state = ChatState::new();
        state.set_session_id("s1");
        state
    }

    fn assistant_event(id: &str, text: &str) -> Value {
        json!({
            "type": "message",
            "message": {"id": id, "role": "assistant", "content": [{"type": "text", "text": text}]}
        })
    }

    #[test]
    fn blank_content_is_rejected_without_touching_the_log() {
        let mut state = with_session();
        for content in ["", "   ", "\n\t"] {
            assert_eq!(
                state.prepare_send(content, Utc::now()),
                Err(SendRejection::EmptyContent)
            );
        }
        assert!(state.log().is_empty());
    }

    #[test]
    fn send_before_session_is_rejected_without_touching_the_log() {
        let mut state = ChatState::new();
        assert_eq!(
            state.prepare_send("Hello", Utc::now()),
            Err(SendRejection::NoSession)
        );
        assert!(state.log().is_empty());
    }

    #[test]
    fn prepared_turn_carries_host_shapes() {
        let mut state = with_session();
        let prepared = state.prepare_send("Hello", Utc::now()).unwrap();

        assert_eq!(prepared.user_message.role, MessageRole::User);
        assert_eq!(prepared.user_message.text(), "Hello");
        assert_eq!(
            prepared.user_message.id.as_deref(),
            Some(prepared.message_id.as_str())
        );
        assert_eq!(prepared.session_config.id, "s1");
        assert_eq!(prepared.session_config.max_turns, Some(DEFAULT_MAX_TURNS));
    }

    #[test]
    fn hello_then_two_deltas_yields_one_assistant_bubble() {
        let mut state = with_session();
        state.prepare_send("Hello", Utc::now()).unwrap();

        let log = state.log().messages();
        assert_eq!(log.len(), 1);
        assert_eq!(log[0].role, Role::User);
        assert_eq!(log[0].content, "Hello");

        state.apply_event(&assistant_event("a1", "Hi"), Utc::now());
        state.apply_event(&assistant_event("a1", " there"), Utc::now());

        let log = state.log().messages();
        assert_eq!(log.len(), 2);
        assert_eq!(log[1].role, Role::Assistant);
        assert_eq!(log[1].id, MessageId::new("a1"));
        assert_eq!(log[1].content, "Hi there");
    }

    #[test]
    fn rejected_send_surfaces_as_error_bubble() {
        let mut state = with_session();
        state.prepare_send("Hello", Utc::now()).unwrap();

        let error = BridgeError::Remote {
            stage: "agent-response",
            message: "network down".to_string(),
        };
        state.record_send_failure(&error, Utc::now());

        let log = state.log().messages();
        assert_eq!(log.len(), 2);
        assert_eq!(log[0].content, "Hello");
        assert_eq!(log[1].role, Role::Assistant);
        assert_eq!(log[1].content, "Error: network down");
    }

    #[test]
    fn next_send_starts_a_new_bubble_even_with_the_same_event_id() {
        let mut state = with_session();
        state.prepare_send("one", Utc::now()).unwrap();
        state.apply_event(&assistant_event("a1", "first"), Utc::now());
        state.prepare_send("two", Utc::now()).unwrap();
        state.apply_event(&assistant_event("a1", "second"), Utc::now());

        let contents = state
            .log()
            .messages()
            .iter()
            .map(|message| message.content.as_str())
            .collect::<Vec<_>>();
        assert_eq!(contents, vec!["one", "first", "two", "second"]);
    }

    #[test]
    fn undecodable_events_are_ignored() {
        let mut state = with_session();
        let update = state.apply_event(&json!({"type": "mcp_notification"}), Utc::now());
        assert_eq!(update, AssistantUpdate::Ignored);
        assert!(state.log().is_empty());
    }
}
