use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use crate::contract::{AgentMessage, CreateSessionRequest, Session, SessionConfig};
use crate::error::BridgeResult;
use crate::events::EventSubscription;

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;
/// Long-running background future a host needs polled on the tokio runtime.
pub type BridgeWorker = Pin<Box<dyn Future<Output = ()> + Send + 'static>>;

/// Calls the UI makes into an agent host.
pub trait HostBridge: Send + Sync {
    fn name(&self) -> &str;

    fn create_session(&self, request: CreateSessionRequest) -> BoxFuture<'_, BridgeResult<Session>>;

    /// Runs one agent turn. Assistant output is delivered on the event
    /// channel, not through the return value.
    fn agent_reply(
        &self,
        user_message: AgentMessage,
        session_config: SessionConfig,
    ) -> BoxFuture<'_, BridgeResult<()>>;

    fn listen(&self, channel: &str) -> EventSubscription;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum HostKind {
    /// In-process agent backed by an OpenAI-compatible completion API.
    #[default]
    Rig,
    /// External agent process spoken to over stdio.
    Process,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderConfig {
    pub api_key: String,
    pub endpoint: String,
    pub model: String,
    pub preamble: Option<String>,
}

impl ProviderConfig {
    pub fn new(
        api_key: impl Into<String>,
        endpoint: impl Into<String>,
        model: impl Into<String>,
    ) -> Self {
        Self {
            api_key: api_key.into().trim().to_string(),
            endpoint: endpoint.into().trim().to_string(),
            model: model.into().trim().to_string(),
            preamble: None,
        }
    }

    pub fn with_preamble(mut self, preamble: impl Into<String>) -> Self {
        self.preamble = Some(preamble.into());
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgentCommand {
    pub program: String,
    pub args: Vec<String>,
}

impl AgentCommand {
    /// Splits a whitespace-separated command line into program and arguments.
    pub fn parse(command_line: &str) -> Option<Self> {
        let mut parts = command_line.split_whitespace().map(str::to_string);
        let program = parts.next()?;
        Some(Self {
            program,
            args: parts.collect(),
        })
    }

    pub fn display(&self) -> String {
        std::iter::once(self.program.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BridgeConfig {
    pub kind: HostKind,
    pub provider: ProviderConfig,
    pub agent_command: Option<AgentCommand>,
}

pub struct BridgeHandle {
    pub bridge: Arc<dyn HostBridge>,
    pub worker: Option<BridgeWorker>,
}
