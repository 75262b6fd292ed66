//! Shared SDK types: the error taxonomy, the live-connection handle, and
//! the lifecycle callback signatures.

use std::sync::Arc;

use tokio::sync::mpsc;

use arinova_protocol::Frame;

/// Errors surfaced by the SDK, both as the result of
/// [`run`](crate::AgentClient::run) and through the `on_error` callback.
///
/// Only [`AuthRejected`](AgentError::AuthRejected) is permanent; every
/// other variant is recovered from by the reconnect loop or scoped to a
/// single task.
#[derive(thiserror::Error, Debug)]
pub enum AgentError {
    /// The builder was given an unusable configuration.
    #[error("config: {0}")]
    Config(String),

    /// Could not reach the server, or an established connection broke.
    #[error("transport: {0}")]
    Transport(String),

    /// The auth exchange did not produce a usable reply in time.
    #[error("handshake: {0}")]
    Handshake(String),

    /// The server rejected the bot token. The reconnect loop halts and
    /// `run` returns this error.
    #[error("authentication rejected: {0}")]
    AuthRejected(String),

    /// A task handler returned an error or panicked.
    #[error("task {task_id}: {message}")]
    Task { task_id: String, message: String },
}

impl AgentError {
    /// Whether this failure must halt the reconnect loop.
    pub fn is_permanent(&self) -> bool {
        matches!(self, AgentError::AuthRejected(_))
    }
}

/// Handle to a live, authenticated connection, handed to the
/// `on_connected` callback.
///
/// The handle can outlive the connection it came from; sends after the
/// connection ends are silently dropped, the same as every other
/// fire-and-forget write in the SDK.
#[derive(Clone, Debug)]
pub struct AgentConnection {
    pub(crate) agent_name: String,
    pub(crate) outbound: mpsc::Sender<Frame>,
}

impl AgentConnection {
    /// The agent's display name, as reported by the server in `auth_ok`.
    pub fn agent_name(&self) -> &str {
        &self.agent_name
    }

    /// Post a message to a conversation outside the scope of any task.
    pub async fn send_message(
        &self,
        conversation_id: impl Into<String>,
        content: impl Into<String>,
    ) {
        let _ = self
            .outbound
            .send(Frame::AgentSend {
                conversation_id: conversation_id.into(),
                content: content.into(),
            })
            .await;
    }
}

pub(crate) type ConnectedCallback = Arc<dyn Fn(AgentConnection) + Send + Sync>;
pub(crate) type DisconnectedCallback = Arc<dyn Fn() + Send + Sync>;
pub(crate) type ErrorCallback = Arc<dyn Fn(&AgentError) + Send + Sync>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_auth_rejection_is_permanent() {
        assert!(AgentError::AuthRejected("Invalid bot token".into()).is_permanent());
        assert!(!AgentError::Transport("connection refused".into()).is_permanent());
        assert!(!AgentError::Handshake("timed out".into()).is_permanent());
        assert!(!AgentError::Task { task_id: "t1".into(), message: "boom".into() }.is_permanent());
    }

    #[tokio::test]
    async fn send_message_after_connection_dropped_is_silent() {
        let (tx, rx) = mpsc::channel(1);
        let conn = AgentConnection { agent_name: "Echo".into(), outbound: tx };
        drop(rx);

        conn.send_message("c1", "hello").await;
    }
}
