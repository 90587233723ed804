use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use chrono::Utc;
use gpui::*;
use gpui_tokio_bridge::Tokio;
use quill_bridge::{
    AGENT_EVENT_CHANNEL, AgentMessage, CreateSessionRequest, HostBridge, Session, SessionConfig,
};
use serde_json::Value;

use crate::chat::log::AssistantUpdate;
use crate::chat::message::ChatMessage;
use crate::chat::state::{ChatState, PreparedSend, SendRejection};

pub const SESSION_NAME: &str = "Chat Session";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChatSessionEvent {
    /// The host accepted the session and sends are now possible.
    Ready,
    LogChanged,
}

/// Owns one host conversation: the session id, the transcript, the event
/// listener and every in-flight call. Dropping the entity drops the tasks,
/// which releases the event subscription.
pub struct ChatSession {
    bridge: Option<Arc<dyn HostBridge>>,
    host_error: Option<String>,
    state: ChatState,
    bootstrap_task: Option<Task<()>>,
    listener_task: Option<Task<()>>,
    send_tasks: HashMap<u64, Task<()>>,
    next_send_id: u64,
}

impl EventEmitter<ChatSessionEvent> for ChatSession {}

impl ChatSession {
    pub fn new(bridge: Result<Arc<dyn HostBridge>, String>, cx: &mut Context<Self>) -> Self {
        let (bridge, host_error) = match bridge {
            Ok(bridge) => (Some(bridge), None),
            Err(error) => (None, Some(error)),
        };

        let mut this = Self {
            bridge: bridge.clone(),
            host_error,
            state: ChatState::new(),
            bootstrap_task: None,
            listener_task: None,
            send_tasks: HashMap::new(),
            next_send_id: 1,
        };

        match bridge {
            Some(bridge) => {
                // Listen before the session exists so no early event is missed.
                this.start_listener(&bridge, cx);
                this.bootstrap(bridge, cx);
            }
            None => {
                tracing::error!(
                    error = this.host_error.as_deref().unwrap_or_default(),
                    "agent host unavailable; chat stays inert"
                );
            }
        }

        this
    }

    pub fn messages(&self) -> &[ChatMessage] {
        self.state.log().messages()
    }

    pub fn session_id(&self) -> Option<&str> {
        self.state.session_id()
    }

    pub fn host_error(&self) -> Option<&str> {
        self.host_error.as_deref()
    }

    fn bootstrap(&mut self, bridge: Arc<dyn HostBridge>, cx: &mut Context<Self>) {
        tracing::debug!(host = bridge.name(), "creating chat session");
        let create = Tokio::spawn(cx, open_session(bridge, default_working_dir()));

        self.bootstrap_task = Some(cx.spawn(async move |this, cx| {
            let outcome = match create.await {
                Ok(outcome) => outcome,
                Err(error) => Err(error.to_string()),
            };

            let _ = this.update(cx, |this, cx| {
                this.finish_bootstrap(outcome, cx);
            });
        }));
    }

    fn finish_bootstrap(&mut self, outcome: Result<Session, String>, cx: &mut Context<Self>) {
        self.bootstrap_task = None;

        match outcome {
            Ok(session) => {
                tracing::info!(
                    session_id = %session.id,
                    working_dir = %session.working_dir.display(),
                    "chat session established"
                );
                self.state.set_session_id(session.id);
                cx.emit(ChatSessionEvent::Ready);
                cx.notify();
            }
            Err(error) => {
                tracing::error!(error = %error, "failed to create chat session");
            }
        }
    }

    fn start_listener(&mut self, bridge: &Arc<dyn HostBridge>, cx: &mut Context<Self>) {
        let mut subscription = bridge.listen(AGENT_EVENT_CHANNEL);

        self.listener_task = Some(cx.spawn(async move |this, cx| {
            while let Some(payload) = subscription.recv().await {
                let delivered = this.update(cx, |this, cx| {
                    this.handle_agent_event(payload, cx);
                });
                if delivered.is_err() {
                    break;
                }
            }
            tracing::debug!(channel = subscription.channel(), "agent event listener stopped");
        }));
    }

    fn handle_agent_event(&mut self, payload: Value, cx: &mut Context<Self>) {
        match self.state.apply_event(&payload, Utc::now()) {
            AssistantUpdate::Ignored => {}
            AssistantUpdate::Started(id) => {
                tracing::debug!(message_id = %id, "assistant message started");
                cx.emit(ChatSessionEvent::LogChanged);
                cx.notify();
            }
            AssistantUpdate::Appended(_) => {
                cx.emit(ChatSessionEvent::LogChanged);
                cx.notify();
            }
        }
    }

    /// Appends the user message and asks the host for a reply.
    ///
    /// Assistant text arrives through the event listener, never through the
    /// reply call itself.
    pub fn send_message(&mut self, content: &str, cx: &mut Context<Self>) {
        let prepared = match self.state.prepare_send(content, Utc::now()) {
            Ok(prepared) => prepared,
            Err(SendRejection::EmptyContent) => return,
            Err(SendRejection::NoSession) => {
                tracing::error!("cannot send a message before the chat session is established");
                return;
            }
        };
        cx.emit(ChatSessionEvent::LogChanged);
        cx.notify();

        let Some(bridge) = self.bridge.clone() else {
            tracing::error!("session exists without an agent host");
            return;
        };

        let PreparedSend {
            message_id,
            user_message,
            session_config,
        } = prepared;
        tracing::debug!(
            message_id = %message_id,
            session_id = %session_config.id,
            "requesting agent reply"
        );

        let send_id = self.next_send_id;
        self.next_send_id = self.next_send_id.saturating_add(1);

        let reply = Tokio::spawn(cx, deliver_turn(bridge, user_message, session_config));
        let task = cx.spawn(async move |this, cx| {
            let outcome = match reply.await {
                Ok(outcome) => outcome,
                Err(error) => Err(error.to_string()),
            };

            let _ = this.update(cx, |this, cx| {
                this.finish_send(send_id, outcome, cx);
            });
        });
        self.send_tasks.insert(send_id, task);
    }

    fn finish_send(&mut self, send_id: u64, outcome: Result<(), String>, cx: &mut Context<Self>) {
        self.send_tasks.remove(&send_id);

        if let Err(error) = outcome {
            tracing::warn!(error = %error, "agent reply failed");
            self.state.record_send_failure(error, Utc::now());
            cx.emit(ChatSessionEvent::LogChanged);
            cx.notify();
        }
    }
}

fn default_working_dir() -> PathBuf {
    dirs::home_dir().unwrap_or_else(|| PathBuf::from("."))
}

async fn open_session(
    bridge: Arc<dyn HostBridge>,
    working_dir: PathBuf,
) -> Result<Session, String> {
    bridge
        .create_session(CreateSessionRequest::new(working_dir, SESSION_NAME))
        .await
        .map_err(|error| error.to_string())
}

async fn deliver_turn(
    bridge: Arc<dyn HostBridge>,
    user_message: AgentMessage,
    session_config: SessionConfig,
) -> Result<(), String> {
    bridge
        .agent_reply(user_message, session_config)
        .await
        .map_err(|error| error.to_string())
}
