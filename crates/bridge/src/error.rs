use snafu::Snafu;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum BridgeError {
    #[snafu(display("missing API key for agent host '{host}'"))]
    MissingApiKey {
        stage: &'static str,
        host: String,
    },
    #[snafu(display("no agent command configured for the process host"))]
    MissingAgentCommand { stage: &'static str },
    #[snafu(display("session '{session_id}' does not exist"))]
    UnknownSession {
        stage: &'static str,
        session_id: String,
    },
    #[snafu(display("session '{session_id}' has no turns left"))]
    TurnLimitReached {
        stage: &'static str,
        session_id: String,
    },
    #[snafu(display("user message for session '{session_id}' has no text"))]
    EmptyPrompt {
        stage: &'static str,
        session_id: String,
    },
    #[snafu(display("http client failed on `{stage}`, {source}"))]
    HttpClient {
        stage: &'static str,
        source: rig::http_client::Error,
    },
    #[snafu(display("completions failed on `{stage}`, {source}"))]
    CompletionsFailed {
        stage: &'static str,
        source: rig::completion::CompletionError,
    },
    #[snafu(display("failed to spawn agent process `{command}`: {source}"))]
    SpawnAgent {
        stage: &'static str,
        command: String,
        source: std::io::Error,
    },
    #[snafu(display("agent process io failed on `{stage}`: {source}"))]
    AgentIo {
        stage: &'static str,
        source: std::io::Error,
    },
    #[snafu(display("failed to encode bridge payload on `{stage}`: {source}"))]
    EncodePayload {
        stage: &'static str,
        source: serde_json::Error,
    },
    #[snafu(display("failed to decode bridge payload on `{stage}`: {source}"))]
    DecodePayload {
        stage: &'static str,
        source: serde_json::Error,
    },
    #[snafu(display("{message}"))]
    Remote {
        stage: &'static str,
        message: String,
    },
    #[snafu(display("agent process is not running"))]
    AgentUnavailable { stage: &'static str },
}

pub type BridgeResult<T> = Result<T, BridgeError>;
