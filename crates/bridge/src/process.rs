//! Agent host running as a child process.
//!
//! The child speaks newline-delimited JSON on stdio. Requests carry an `id`
//! that the matching response echoes back; event frames carry a channel name
//! and are re-emitted on the local [`EventHub`]. Stderr is left to the child
//! for diagnostics.

use std::collections::HashMap;
use std::process::Stdio;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use snafu::{ResultExt, ensure};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::process::Command;
use tokio::sync::{mpsc, oneshot};

use crate::contract::{
    AGENT_ERROR_CHANNEL, AgentMessage, CreateSessionRequest, Session, SessionConfig,
};
use crate::error::{
    AgentUnavailableSnafu, BridgeError, BridgeResult, DecodePayloadSnafu, EncodePayloadSnafu,
    SpawnAgentSnafu, TurnLimitReachedSnafu,
};
use crate::events::{EventHub, EventSubscription};
use crate::host::{AgentCommand, BoxFuture, BridgeWorker, HostBridge};

pub const PROCESS_HOST_NAME: &str = "process";
pub const CREATE_SESSION_COMMAND: &str = "create_session";
pub const AGENT_REPLY_COMMAND: &str = "agent_reply";

/// Request channel capacity between the bridge and its IO worker.
const REQUEST_CAPACITY: usize = 64;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestFrame {
    pub id: u64,
    pub command: String,
    #[serde(default)]
    pub payload: Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponseFrame {
    pub id: u64,
    pub ok: bool,
    #[serde(default)]
    pub result: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventFrame {
    pub event: String,
    #[serde(default)]
    pub payload: Value,
}

/// Any line the agent process may write.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum IncomingFrame {
    Response(ResponseFrame),
    Event(EventFrame),
}

struct Outbound {
    frame: RequestFrame,
    reply: oneshot::Sender<BridgeResult<Value>>,
}

type Pending = HashMap<u64, oneshot::Sender<BridgeResult<Value>>>;

pub struct ProcessBridge {
    requests: mpsc::Sender<Outbound>,
    hub: EventHub,
    next_id: AtomicU64,
}

impl ProcessBridge {
    /// Builds a bridge for `command`. The process is started when the
    /// returned worker is first polled, which must happen on a tokio runtime.
    pub fn spawn(command: AgentCommand) -> (Self, BridgeWorker) {
        let (bridge, requests) = Self::detached();
        let hub = bridge.hub.clone();
        let worker = Box::pin(run_child(command, requests, hub));
        (bridge, worker)
    }

    /// Builds a bridge over an already-open transport.
    pub fn connect<R, W>(reader: R, writer: W) -> (Self, BridgeWorker)
    where
        R: AsyncBufRead + Unpin + Send + 'static,
        W: AsyncWrite + Unpin + Send + 'static,
    {
        let (bridge, requests) = Self::detached();
        let hub = bridge.hub.clone();
        let worker = Box::pin(async move {
            run_io(reader, writer, requests, hub).await;
        });
        (bridge, worker)
    }

    fn detached() -> (Self, mpsc::Receiver<Outbound>) {
        let (requests, receiver) = mpsc::channel(REQUEST_CAPACITY);
        let bridge = Self {
            requests,
            hub: EventHub::default(),
            next_id: AtomicU64::new(1),
        };
        (bridge, receiver)
    }

    async fn call(&self, command: &str, payload: Value) -> BridgeResult<Value> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (reply, response) = oneshot::channel();
        let outbound = Outbound {
            frame: RequestFrame {
                id,
                command: command.to_string(),
                payload,
            },
            reply,
        };

        if self.requests.send(outbound).await.is_err() {
            return AgentUnavailableSnafu {
                stage: "send-request",
            }
            .fail();
        }

        match response.await {
            Ok(result) => result,
            Err(_) => AgentUnavailableSnafu {
                stage: "await-response",
            }
            .fail(),
        }
    }
}

impl HostBridge for ProcessBridge {
    fn name(&self) -> &str {
        PROCESS_HOST_NAME
    }

    fn create_session(&self, request: CreateSessionRequest) -> BoxFuture<'_, BridgeResult<Session>> {
        Box::pin(async move {
            let payload = serde_json::to_value(&request).context(EncodePayloadSnafu {
                stage: "create-session-request",
            })?;
            let result = self.call(CREATE_SESSION_COMMAND, payload).await?;
            serde_json::from_value(result).context(DecodePayloadSnafu {
                stage: "create-session-response",
            })
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

            let payload = serde_json::to_value(AgentReplyPayload {
                user_message: &user_message,
                session_config: &session_config,
            })
            .context(EncodePayloadSnafu {
                stage: "agent-reply-request",
            })?;

            self.call(AGENT_REPLY_COMMAND, payload).await.map(|_| ())
        })
    }

    fn listen(&self, channel: &str) -> EventSubscription {
        self.hub.listen(channel)
    }
}

#[derive(Serialize)]
struct AgentReplyPayload<'a> {
    user_message: &'a AgentMessage,
    session_config: &'a SessionConfig,
}

async fn run_child(command: AgentCommand, requests: mpsc::Receiver<Outbound>, hub: EventHub) {
    let spawned = Command::new(&command.program)
        .args(&command.args)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::inherit())
        .kill_on_drop(true)
        .spawn()
        .context(SpawnAgentSnafu {
            stage: "spawn-agent",
            command: command.display(),
        });

    let mut child = match spawned {
        Ok(child) => child,
        Err(error) => {
            tracing::error!(error = %error, "failed to start agent process");
            hub.emit(AGENT_ERROR_CHANNEL, Value::String(error.to_string()));
            return;
        }
    };

    let (Some(stdin), Some(stdout)) = (child.stdin.take(), child.stdout.take()) else {
        tracing::error!(command = %command.display(), "agent process has no piped stdio");
        return;
    };

    tracing::info!(command = %command.display(), pid = ?child.id(), "agent process started");
    run_io(BufReader::new(stdout), stdin, requests, hub).await;

    match child.try_wait() {
        Ok(Some(status)) => tracing::info!(%status, "agent process exited"),
        Ok(None) => {
            if let Err(error) = child.kill().await {
                tracing::warn!(error = %error, "failed to stop agent process");
            }
        }
        Err(error) => tracing::warn!(error = %error, "failed to query agent process status"),
    }
}

/// Pumps requests out and frames in until either side closes.
async fn run_io<R, W>(
    reader: R,
    mut writer: W,
    mut requests: mpsc::Receiver<Outbound>,
    hub: EventHub,
) where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut lines = reader.lines();
    let mut pending = Pending::new();

    loop {
        tokio::select! {
            outbound = requests.recv() => {
                let Some(Outbound { frame, reply }) = outbound else {
                    tracing::debug!("bridge dropped; stopping agent io");
                    break;
                };
                match write_frame(&mut writer, &frame).await {
                    Ok(()) => {
                        pending.insert(frame.id, reply);
                    }
                    Err(error) => {
                        tracing::warn!(id = frame.id, error = %error, "failed to write request frame");
                        let _ = reply.send(Err(error));
                        break;
                    }
                }
            }
            line = lines.next_line() => {
                match line {
                    Ok(Some(line)) => dispatch_line(&line, &mut pending, &hub),
                    Ok(None) => {
                        tracing::info!("agent process closed stdout");
                        break;
                    }
                    Err(error) => {
                        tracing::warn!(error = %error, "failed to read from agent process");
                        break;
                    }
                }
            }
        }
    }

    for (id, reply) in pending.drain() {
        tracing::debug!(id, "failing request left pending at shutdown");
        let _ = reply.send(AgentUnavailableSnafu { stage: "shutdown" }.fail());
    }
}

async fn write_frame<W>(writer: &mut W, frame: &RequestFrame) -> BridgeResult<()>
where
    W: AsyncWrite + Unpin,
{
    let mut json = serde_json::to_string(frame).context(EncodePayloadSnafu {
        stage: "write-frame",
    })?;
    json.push('\n');

    let io = async {
        writer.write_all(json.as_bytes()).await?;
        writer.flush().await
    };
    io.await.map_err(|source| BridgeError::AgentIo {
        stage: "write-frame",
        source,
    })
}

fn dispatch_line(line: &str, pending: &mut Pending, hub: &EventHub) {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        return;
    }

    let frame = match serde_json::from_str::<IncomingFrame>(trimmed) {
        Ok(frame) => frame,
        Err(error) => {
            tracing::warn!(error = %error, raw_line = %trimmed, "ignoring malformed agent frame");
            return;
        }
    };

    match frame {
        IncomingFrame::Response(response) => {
            let Some(reply) = pending.remove(&response.id) else {
                tracing::warn!(id = response.id, "response for unknown request");
                return;
            };
            let result = if response.ok {
                Ok(response.result)
            } else {
                Err(BridgeError::Remote {
                    stage: "agent-response",
                    message: response
                        .error
                        .unwrap_or_else(|| "agent request failed".to_string()),
                })
            };
            let _ = reply.send(result);
        }
        IncomingFrame::Event(event) => {
            hub.emit(&event.event, event.payload);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::contract::AGENT_EVENT_CHANNEL;
    use serde_json::json;
    use tokio::io::{DuplexStream, ReadHalf, WriteHalf};

    struct FakeAgent {
        lines: tokio::io::Lines<BufReader<ReadHalf<DuplexStream>>>,
        writer: WriteHalf<DuplexStream>,
    }

    impl FakeAgent {
        async fn next_request(&mut self) -> RequestFrame {
            let line = self.lines.next_line().await.unwrap().unwrap();
            serde_json::from_str(&line).unwrap()
        }

        async fn send(&mut self, value: Value) {
            let mut line = value.to_string();
            line.push('\n');
            self.writer.write_all(line.as_bytes()).await.unwrap();
            self.writer.flush().await.unwrap();
        }
    }

    fn connected() -> (ProcessBridge, FakeAgent) {
        let (client_io, agent_io) = tokio::io::duplex(4096);
        let (client_read, client_write) = tokio::io::split(client_io);
        let (agent_read, agent_write) = tokio::io::split(agent_io);

        let (bridge, worker) = ProcessBridge::connect(BufReader::new(client_read), client_write);
        tokio::spawn(worker);

        let agent = FakeAgent {
            lines: BufReader::new(agent_read).lines(),
            writer: agent_write,
        };
        (bridge, agent)
    }

    #[test]
    fn incoming_frames_are_told_apart() {
        let response: IncomingFrame =
            serde_json::from_str(r#"{"id":3,"ok":true,"result":{"id":"s1"}}"#).unwrap();
        assert!(matches!(response, IncomingFrame::Response(ResponseFrame { id: 3, ok: true, .. })));

        let event: IncomingFrame =
            serde_json::from_str(r#"{"event":"agent-event","payload":{"type":"message"}}"#)
                .unwrap();
        assert!(matches!(event, IncomingFrame::Event(EventFrame { .. })));
    }

    #[tokio::test]
    async fn create_session_round_trips_over_stdio() {
        let (bridge, mut agent) = connected();

        let responder = tokio::spawn(async move {
            let request = agent.next_request().await;
            assert_eq!(request.command, CREATE_SESSION_COMMAND);
            assert_eq!(request.payload["name"], "Chat Session");
            assert_eq!(request.payload["session_type"], "user");
            agent
                .send(json!({
                    "id": request.id,
                    "ok": true,
                    "result": {"id": "20250101_1", "name": "Chat Session"}
                }))
                .await;
            agent
        });

        let session = bridge
            .create_session(CreateSessionRequest::new("/home/me", "Chat Session"))
            .await
            .unwrap();
        assert_eq!(session.id, "20250101_1");
        responder.await.unwrap();
    }

    #[tokio::test]
    async fn event_frames_reach_listeners_and_errors_surface() {
        let (bridge, mut agent) = connected();
        let mut events = bridge.listen(AGENT_EVENT_CHANNEL);

        let responder = tokio::spawn(async move {
            let request = agent.next_request().await;
            assert_eq!(request.command, AGENT_REPLY_COMMAND);
            assert_eq!(request.payload["session_config"]["max_turns"], 1000);
            agent
                .send(json!({
                    "event": "agent-event",
                    "payload": {"type": "message", "message": {"id": "a1", "role": "assistant", "content": []}}
                }))
                .await;
            agent
                .send(json!({"id": request.id, "ok": false, "error": "provider offline"}))
                .await;
            agent
        });

        let result = bridge
            .agent_reply(
                AgentMessage::user_text("m1", "Hello", 0),
                SessionConfig::new("s1"),
            )
            .await;

        let payload = events.recv().await.unwrap();
        assert_eq!(payload["message"]["id"], "a1");
        match result {
            Err(BridgeError::Remote { message, .. }) => assert_eq!(message, "provider offline"),
            other => panic!("expected remote error, got {other:?}"),
        }
        responder.await.unwrap();
    }

    #[tokio::test]
    async fn closed_agent_fails_pending_and_later_requests() {
        let (bridge, mut agent) = connected();

        let closer = tokio::spawn(async move {
            let _ = agent.next_request().await;
            drop(agent);
        });

        let first = bridge
            .create_session(CreateSessionRequest::new("/", "Chat Session"))
            .await;
        assert!(matches!(first, Err(BridgeError::AgentUnavailable { .. })));
        closer.await.unwrap();

        let second = bridge
            .create_session(CreateSessionRequest::new("/", "Chat Session"))
            .await;
        assert!(matches!(second, Err(BridgeError::AgentUnavailable { .. })));
    }
}
