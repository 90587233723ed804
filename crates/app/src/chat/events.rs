use quill_bridge::{AgentEvent, MessageRole};
use serde_json::Value;

/// Emitted by the input box when the user submits a prompt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Submit {
    pub content: String,
}

impl Submit {
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
        }
    }
}

/// Assistant text carried by one `agent-event` payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssistantDelta {
    pub id: Option<String>,
    pub text: String,
}

/// Extracts assistant text from a raw `agent-event` payload.
///
/// Only `message` events with an assistant role and non-empty text qualify;
/// everything else yields `None`.
pub fn decode_assistant_delta(payload: &Value) -> Option<AssistantDelta> {
    let AgentEvent::Message { message } = AgentEvent::decode(payload)? else {
        return None;
    };

    if message.role != MessageRole::Assistant {
        return None;
    }

    let text = message.text();
    if text.is_empty() {
        return None;
    }

    Some(AssistantDelta {
        id: message.id,
        text,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn assistant_text_is_extracted_from_both_item_shapes() {
        let delta = decode_assistant_delta(&json!({
            "type": "message",
            "message": {
                "id": "a1",
                "role": "assistant",
                "content": [{"type": "text", "text": "Hi"}, {"Text": {"text": " there"}}]
            }
        }))
        .unwrap();

        assert_eq!(delta.id.as_deref(), Some("a1"));
        assert_eq!(delta.text, "Hi there");
    }

    #[test]
    fn irrelevant_payloads_are_ignored() {
        let ignored = [
            json!({"type": "message", "message": {"role": "user", "content": [{"type": "text", "text": "echo"}]}}),
            json!({"type": "message", "message": {"role": "assistant", "content": [{"type": "toolRequest", "id": "t1"}]}}),
            json!({"type": "message", "message": {"role": "assistant", "content": [{"type": "text", "text": ""}]}}),
            json!({"type": "model_change", "model": "gpt-4o", "mode": "auto"}),
            json!({"type": "history_replaced", "conversation": []}),
            json!({"message": "no type"}),
            json!(42),
        ];

        for payload in ignored {
            assert_eq!(decode_assistant_delta(&payload), None, "payload: {payload}");
        }
    }

    #[test]
    fn missing_id_is_allowed() {
        let delta = decode_assistant_delta(&json!({
            "type": "message",
            "message": {"role": "assistant", "content": [{"type": "text", "text": "ok"}]}
        }))
        .unwrap();
        assert_eq!(delta.id, None);
    }
}
