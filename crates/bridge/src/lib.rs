//! Agent host boundary for the desktop client.
//!
//! The UI only sees [`HostBridge`]: create a session, ask for a reply, listen
//! on a named event channel. Two hosts implement it, an in-process rig agent
//! and an external process spoken to over stdio.

pub mod contract;
pub mod error;
pub mod events;
pub mod host;
pub mod process;
pub mod rig_agent;

use std::sync::Arc;

use snafu::OptionExt;

pub use contract::{
    AGENT_ERROR_CHANNEL, AGENT_EVENT_CHANNEL, AgentEvent, AgentMessage, CreateSessionRequest,
    DEFAULT_MAX_TURNS, MessageContent, MessageMetadata, MessageRole, Session, SessionConfig,
    SessionType,
};
pub use error::{BridgeError, BridgeResult};
pub use events::{EventHub, EventSubscription};
pub use host::{
    AgentCommand, BoxFuture, BridgeConfig, BridgeHandle, BridgeWorker, HostBridge, HostKind,
    ProviderConfig,
};
pub use process::ProcessBridge;
pub use rig_agent::RigAgentBridge;

use error::MissingAgentCommandSnafu;

/// Builds the host selected by `config`.
///
/// The returned worker, when present, must be driven on the tokio runtime for
/// the bridge to make progress.
pub fn create_bridge(config: BridgeConfig) -> BridgeResult<BridgeHandle> {
    match config.kind {
        HostKind::Rig => {
            let bridge = RigAgentBridge::new(config.provider)?;
            tracing::info!(host = rig_agent::RIG_HOST_NAME, "agent host ready");
            Ok(BridgeHandle {
                bridge: Arc::new(bridge),
                worker: None,
            })
        }
        HostKind::Process => {
            let command = config.agent_command.context(MissingAgentCommandSnafu {
                stage: "create-bridge",
            })?;
            tracing::info!(
                host = process::PROCESS_HOST_NAME,
                command = %command.display(),
                "agent host ready"
            );
            let (bridge, worker) = ProcessBridge::spawn(command);
            Ok(BridgeHandle {
                bridge: Arc::new(bridge),
                worker: Some(worker),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(kind: HostKind) -> BridgeConfig {
        BridgeConfig {
            kind,
            provider: ProviderConfig::new("sk-test", "", ""),
            agent_command: None,
        }
    }

    #[test]
    fn rig_host_needs_no_worker() {
        let handle = create_bridge(config(HostKind::Rig)).unwrap();
        assert_eq!(handle.bridge.name(), "rig");
        assert!(handle.worker.is_none());
    }

    #[test]
    fn process_host_requires_a_command() {
        let result = create_bridge(config(HostKind::Process));
        assert!(matches!(result, Err(BridgeError::MissingAgentCommand { .. })));

        let mut with_command = config(HostKind::Process);
        with_command.agent_command = AgentCommand::parse("goose-agent --stdio");
        let handle = create_bridge(with_command).unwrap();
        assert_eq!(handle.bridge.name(), "process");
        assert!(handle.worker.is_some());
    }
}
