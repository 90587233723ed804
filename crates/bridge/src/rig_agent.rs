use std::collections::HashMap;
use std::time::{SystemTime, UNIX_EPOCH};

use futures::StreamExt;
use rig::completion::{CompletionModel, Message as RigMessage};
use rig::prelude::CompletionClient;
use rig::providers::openai;
use rig::streaming::StreamedAssistantContent;
use serde_json::Value;
use snafu::{OptionExt, ResultExt, ensure};
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::contract::{
    AGENT_ERROR_CHANNEL, AGENT_EVENT_CHANNEL, AgentEvent, AgentMessage, CreateSessionRequest,
    MessageRole, Session, SessionConfig,
};
use crate::error::{
    BridgeError, BridgeResult, CompletionsFailedSnafu, EmptyPromptSnafu, HttpClientSnafu,
    MissingApiKeySnafu, TurnLimitReachedSnafu, UnknownSessionSnafu,
};
use crate::events::{EventHub, EventSubscription};
use crate::host::{BoxFuture, HostBridge, ProviderConfig};

pub const RIG_HOST_NAME: &str = "rig";
pub const DEFAULT_MODEL: &str = "gpt-4o-mini";
pub const DEFAULT_ENDPOINT: &str = "https://api.openai.com/v1";

type RigStreamingResponse = rig::streaming::StreamingCompletionResponse<
    rig::providers::openai::responses_api::streaming::StreamingCompletionResponse,
>;

#[derive(Debug, Clone, PartialEq, Eq)]
struct TurnText {
    role: MessageRole,
    text: String,
}

struct SessionRecord {
    session: Session,
    history: Vec<TurnText>,
}

/// In-process agent host: sessions live in memory, turns stream from an
/// OpenAI-compatible completion endpoint through rig.
pub struct RigAgentBridge {
    config: ProviderConfig,
    hub: EventHub,
    sessions: RwLock<HashMap<String, SessionRecord>>,
}

impl RigAgentBridge {
    pub fn new(config: ProviderConfig) -> BridgeResult<Self> {
        ensure!(
            !config.api_key.is_empty(),
            MissingApiKeySnafu {
                stage: "rig-agent-new",
                host: RIG_HOST_NAME.to_string(),
            }
        );

        Ok(Self {
            config,
            hub: EventHub::default(),
            sessions: RwLock::new(HashMap::new()),
        })
    }

    fn model_id(&self) -> &str {
        if self.config.model.is_empty() {
            DEFAULT_MODEL
        } else {
            &self.config.model
        }
    }

    fn build_client(config: &ProviderConfig) -> BridgeResult<openai::Client> {
        let mut builder = openai::Client::builder().api_key(config.api_key.as_str());
        if !config.endpoint.is_empty() {
            builder = builder.base_url(config.endpoint.as_str());
        }
        builder.build().context(HttpClientSnafu {
            stage: "build-client",
        })
    }

    fn to_rig_message(turn: &TurnText) -> RigMessage {
        match turn.role {
            MessageRole::User => RigMessage::user(turn.text.clone()),
            MessageRole::Assistant => RigMessage::assistant(turn.text.clone()),
        }
    }

    async fn open_stream(
        &self,
        history: &[TurnText],
        prompt: &str,
    ) -> BridgeResult<RigStreamingResponse> {
        let client = Self::build_client(&self.config)?;
        let model = client.completion_model(self.model_id().to_string());
        let messages = history.iter().map(Self::to_rig_message).collect::<Vec<_>>();

        let mut builder = model
            .completion_request(RigMessage::user(prompt.to_string()))
            .messages(messages);

        if let Some(preamble) = &self.config.preamble
            && !preamble.trim().is_empty()
        {
            builder = builder.preamble(preamble.clone());
        }

        builder.stream().await.context(CompletionsFailedSnafu {
            stage: "open-stream",
        })
    }

    fn text_delta<R>(item: StreamedAssistantContent<R>) -> Option<String>
    where
        R: Clone + Unpin,
    {
        match item {
            StreamedAssistantContent::Text(text) if !text.text.is_empty() => Some(text.text),
            _ => None,
        }
    }

    fn emit_delta(&self, assistant_id: &str, text: String) {
        let event = AgentEvent::Message {
            message: AgentMessage::assistant_text(assistant_id, text, unix_now()),
        };
        self.hub.emit(AGENT_EVENT_CHANNEL, event.to_payload());
    }

    fn emit_failure(&self, error: &BridgeError) {
        self.hub
            .emit(AGENT_ERROR_CHANNEL, Value::String(error.to_string()));
    }

    async fn run_turn(&self, session_id: &str, prompt: String) -> BridgeResult<()> {
        let history = {
            let sessions = self.sessions.read().await;
            let record = sessions.get(session_id).context(UnknownSessionSnafu {
                stage: "agent-reply-lookup",
                session_id: session_id.to_string(),
            })?;
            record.history.clone()
        };

        let mut stream = match self.open_stream(&history, &prompt).await {
            Ok(stream) => stream,
            Err(error) => {
                tracing::error!(
                    session_id = %session_id,
                    model_id = %self.model_id(),
                    error = %error,
                    "failed to open completion stream"
                );
                self.emit_failure(&error);
                return Err(error);
            }
        };

        let assistant_id = Uuid::new_v4().to_string();
        let mut reply = String::new();

        while let Some(item) = stream.next().await {
            match item {
                Ok(item) => {
                    if let Some(delta) = Self::text_delta(item) {
                        reply.push_str(&delta);
                        self.emit_delta(&assistant_id, delta);
                    }
                }
                Err(source) => {
                    tracing::warn!(
                        session_id = %session_id,
                        error = %source,
                        "completion stream emitted an error chunk"
                    );
                    let error = BridgeError::CompletionsFailed {
                        stage: "stream-chunk",
                        source,
                    };
                    self.emit_failure(&error);
                    return Err(error);
                }
            }
        }

        let mut sessions = self.sessions.write().await;
        if let Some(record) = sessions.get_mut(session_id) {
            record.history.push(TurnText {
                role: MessageRole::User,
                text: prompt,
            });
            record.history.push(TurnText {
                role: MessageRole::Assistant,
                text: reply,
            });
        }

        tracing::debug!(session_id = %session_id, "agent turn completed");
        Ok(())
    }
}

impl HostBridge for RigAgentBridge {
    fn name(&self) -> &str {
        RIG_HOST_NAME
    }

    fn create_session(&self, request: CreateSessionRequest) -> BoxFuture<'_, BridgeResult<Session>> {
        Box::pin(async move {
            let session = Session {
                id: Uuid::new_v4().to_string(),
                working_dir: request.working_dir,
                name: request.name,
                session_type: request.session_type,
            };

            self.sessions.write().await.insert(
                session.id.clone(),
                SessionRecord {
                    session: session.clone(),
                    history: Vec::new(),
                },
            );

            tracing::info!(session_id = %session.id, name = %session.name, "created session");
            Ok(session)
        })
    }

    fn agent_reply(
        &self,
        user_message: AgentMessage,
        session_config: SessionConfig,
    ) -> BoxFuture<'_, BridgeResult<()>> {
        Box::pin(async move {
            ensure!(
                session_config.max_turns != Some(0),
                TurnLimitReachedSnafu {
                    stage: "agent-reply-turn-limit",
                    session_id: session_config.id.clone(),
                }
            );

            let prompt = user_message.text();
            ensure!(
                !prompt.trim().is_empty(),
                EmptyPromptSnafu {
                    stage: "agent-reply-prompt",
                    session_id: session_config.id.clone(),
                }
            );

            self.run_turn(&session_config.id, prompt).await
        })
    }

    fn listen(&self, channel: &str) -> EventSubscription {
        self.hub.listen(channel)
    }
}

impl RigAgentBridge {
    /// Returns the stored session, if any.
    pub async fn session(&self, session_id: &str) -> Option<Session> {
        self.sessions
            .read()
            .await
            .get(session_id)
            .map(|record| record.session.clone())
    }
}

pub(crate) fn unix_now() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_secs() as i64)
        .unwrap_or_default()
}
