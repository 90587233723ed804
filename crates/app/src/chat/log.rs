use std::fmt::Display;

use chrono::{DateTime, Utc};

use crate::chat::message::{ChatMessage, MessageId, Role};

/// Outcome of feeding one assistant text increment into the log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AssistantUpdate {
    /// Text was appended to the bubble currently being streamed.
    Appended(MessageId),
    /// A new assistant bubble was started and is now the streaming target.
    Started(MessageId),
    Ignored,
}

/// Ordered chat transcript plus the id of the assistant message being streamed.
///
/// Entries are only ever appended; the single exception is the streamed
/// assistant tail, whose content grows in place.
#[derive(Debug, Clone, Default)]
pub struct MessageLog {
    messages: Vec<ChatMessage>,
    streaming_id: Option<MessageId>,
}

impl MessageLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn last(&self) -> Option<&ChatMessage> {
        self.messages.last()
    }

    pub fn streaming_id(&self) -> Option<&MessageId> {
        self.streaming_id.as_ref()
    }

    pub fn contains(&self, id: &MessageId) -> bool {
        self.messages.iter().any(|message| &message.id == id)
    }

    /// Appends a user message and clears the streaming tracker in one step,
    /// so the next assistant text always opens a new bubble.
    pub fn push_user(&mut self, message: ChatMessage) {
        self.messages.push(message);
        self.streaming_id = None;
    }

    /// Merges streamed assistant text into the log.
    pub fn apply_assistant_text(
        &mut self,
        payload_id: Option<&str>,
        text: &str,
        now: DateTime<Utc>,
    ) -> AssistantUpdate {
        if text.is_empty() {
            return AssistantUpdate::Ignored;
        }

        if let (Some(streaming_id), Some(last)) = (&self.streaming_id, self.messages.last_mut())
            && last.role == Role::Assistant
            && &last.id == streaming_id
        {
            last.content.push_str(text);
            return AssistantUpdate::Appended(last.id.clone());
        }

        let id = self.fresh_id(payload_id);
        self.messages
            .push(ChatMessage::assistant(id.clone(), text, now));
        self.streaming_id = Some(id.clone());
        AssistantUpdate::Started(id)
    }

    /// Appends the inline bubble shown when a send fails.
    pub fn push_error(&mut self, detail: impl Display, now: DateTime<Utc>) -> MessageId {
        let id = MessageId::generate();
        self.messages
            .push(ChatMessage::assistant(id.clone(), format!("Error: {detail}"), now));
        id
    }

    fn fresh_id(&self, payload_id: Option<&str>) -> MessageId {
        match payload_id.map(str::trim).filter(|id| !id.is_empty()) {
            Some(id) if !self.contains(&MessageId::new(id)) => MessageId::new(id),
            _ => MessageId::generate(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn now() -> DateTime<Utc> {
        Utc::now()
    }

    fn user(log: &mut MessageLog, id: &str, text: &str) {
        log.push_user(ChatMessage::user(MessageId::new(id), text, now()));
    }

    #[test]
    fn deltas_sharing_an_id_collapse_into_one_bubble() {
        let mut log = MessageLog::new();
        user(&mut log, "u1", "Hello");

        assert_eq!(
            log.apply_assistant_text(Some("a1"), "Hi", now()),
            AssistantUpdate::Started(MessageId::new("a1"))
        );
        assert_eq!(
            log.apply_assistant_text(Some("a1"), " there", now()),
            AssistantUpdate::Appended(MessageId::new("a1"))
        );

        assert_eq!(log.len(), 2);
        let last = log.last().unwrap();
        assert_eq!(last.role, Role::Assistant);
        assert_eq!(last.id, MessageId::new("a1"));
        assert_eq!(last.content, "Hi there");
    }

    #[test]
    fn appending_preserves_id_and_timestamp() {
        let mut log = MessageLog::new();
        let started_at = now();
        log.apply_assistant_text(Some("a1"), "one", started_at);
        log.apply_assistant_text(Some("a1"), " two", started_at + chrono::Duration::seconds(5));

        let last = log.last().unwrap();
        assert_eq!(last.created_at, started_at);
        assert_eq!(last.content, "one two");
    }

    #[test]
    fn many_deltas_concatenate_in_arrival_order() {
        let mut log = MessageLog::new();
        let parts = ["The", " quick", " brown", " fox", ""];
        for part in parts {
            log.apply_assistant_text(None, part, now());
        }

        assert_eq!(log.len(), 1);
        assert_eq!(log.last().unwrap().content, "The quick brown fox");
    }

    #[test]
    fn user_send_resets_the_tracker() {
        let mut log = MessageLog::new();
        user(&mut log, "u1", "first");
        log.apply_assistant_text(None, "reply one", now());
        assert!(log.streaming_id().is_some());

        user(&mut log, "u2", "second");
        assert_eq!(log.streaming_id(), None);

        log.apply_assistant_text(None, "reply two", now());
        let contents = log
            .messages()
            .iter()
            .map(|message| message.content.as_str())
            .collect::<Vec<_>>();
        assert_eq!(contents, vec!["first", "reply one", "second", "reply two"]);
    }

    #[test]
    fn reused_payload_id_gets_a_fresh_identifier() {
        let mut log = MessageLog::new();
        log.apply_assistant_text(Some("a1"), "turn one", now());
        user(&mut log, "u1", "again");

        let update = log.apply_assistant_text(Some("a1"), "turn two", now());
        let AssistantUpdate::Started(id) = update else {
            panic!("expected a new bubble, got {update:?}");
        };
        assert_ne!(id, MessageId::new("a1"));
        assert_eq!(log.streaming_id(), Some(&id));
    }

    #[test]
    fn error_bubble_embeds_the_detail_verbatim() {
        let mut log = MessageLog::new();
        user(&mut log, "u1", "Hello");
        log.push_error("network down", now());

        let last = log.last().unwrap();
        assert_eq!(last.role, Role::Assistant);
        assert_eq!(last.content, "Error: network down");
        assert_eq!(log.len(), 2);
    }

    #[test]
    fn text_after_an_error_bubble_starts_a_new_bubble() {
        let mut log = MessageLog::new();
        log.apply_assistant_text(Some("a1"), "partial", now());
        log.push_error("stream reset", now());

        log.apply_assistant_text(Some("a1"), " more", now());
        assert_eq!(log.len(), 3);
        assert_eq!(log.last().unwrap().content, " more");
    }
}
