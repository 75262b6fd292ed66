//! Core agent client: the reconnect loop, the per-connection session
//! (auth handshake, keepalive, serialized writes, inbound routing), and
//! task supervision.

use std::panic::AssertUnwindSafe;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use std::time::Duration;

use futures_util::{FutureExt, SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;
use tokio_util::sync::CancellationToken;

use arinova_protocol::{AgentSkill, Frame};

use crate::registry::TaskRegistry;
use crate::task::{Task, TaskHandler};
use crate::types::{
    AgentConnection, AgentError, ConnectedCallback, DisconnectedCallback, ErrorCallback,
};

/// How long to wait for the server's reply to `agent_auth`.
const AUTH_REPLY_TIMEOUT: Duration = Duration::from_secs(10);

/// Outbound queue depth between task handles and the connection writer.
const OUTBOUND_BUFFER: usize = 64;

/// A resilient agent client. Build one with [`AgentClient::builder`], then
/// drive it with [`run`](AgentClient::run) or [`spawn`](AgentClient::spawn).
///
/// The client owns the connection lifecycle end to end: it dials the
/// server, authenticates, answers dispatched tasks through the registered
/// [`TaskHandler`], and reconnects on a fixed cadence whenever the
/// connection drops. Tasks already running are unaffected by a disconnect;
/// their output simply goes nowhere until the task ends.
pub struct AgentClient {
    pub(crate) server_url: String,
    pub(crate) bot_token: String,
    pub(crate) skills: Vec<AgentSkill>,
    pub(crate) reconnect_interval: Duration,
    pub(crate) ping_interval: Duration,
    pub(crate) handler: Option<Arc<dyn TaskHandler>>,
    pub(crate) on_connected: Option<ConnectedCallback>,
    pub(crate) on_disconnected: Option<DisconnectedCallback>,
    pub(crate) on_error: Option<ErrorCallback>,
    pub(crate) registry: TaskRegistry,
}

impl AgentClient {
    pub fn builder() -> crate::builder::AgentClientBuilder {
        crate::builder::AgentClientBuilder::new()
    }

    /// Run the agent until `shutdown` is cancelled.
    ///
    /// Connection failures and dropped sessions are retried after the
    /// configured reconnect interval, indefinitely. The one exception is a
    /// rejected bot token: that halts the loop and returns
    /// [`AgentError::AuthRejected`]. Cancelling `shutdown` returns `Ok(())`
    /// and also cancels the token of every task still running.
    pub async fn run(self, shutdown: CancellationToken) -> Result<(), AgentError> {
        let endpoint = endpoint_url(&self.server_url);

        loop {
            if shutdown.is_cancelled() {
                return Ok(());
            }

            match self.connect_once(&endpoint, &shutdown).await {
                Ok(()) => {}
                Err(e) if e.is_permanent() => {
                    tracing::error!(error = %e, "authentication rejected, halting");
                    self.emit_error(&e);
                    return Err(e);
                }
                Err(e) => {
                    tracing::warn!(error = %e, "connection lost");
                    self.emit_error(&e);
                }
            }

            if shutdown.is_cancelled() {
                return Ok(());
            }

            tracing::info!(
                delay_ms = self.reconnect_interval.as_millis() as u64,
                "reconnecting"
            );
            tokio::select! {
                _ = tokio::time::sleep(self.reconnect_interval) => {}
                _ = shutdown.cancelled() => return Ok(()),
            }
        }
    }

    /// Same as [`run`](Self::run), but detached, for embedding in a larger
    /// runtime.
    pub fn spawn(
        self,
        shutdown: CancellationToken,
    ) -> tokio::task::JoinHandle<Result<(), AgentError>> {
        tokio::spawn(async move { self.run(shutdown).await })
    }

    /// Single connection lifecycle: connect, authenticate, process frames
    /// until the connection ends or shutdown is requested.
    async fn connect_once(
        &self,
        endpoint: &str,
        shutdown: &CancellationToken,
    ) -> Result<(), AgentError> {
        tracing::info!(url = %endpoint, "connecting");

        let (ws, _response) = tokio::select! {
            r = tokio_tungstenite::connect_async(endpoint) => {
                r.map_err(|e| AgentError::Transport(e.to_string()))?
            }
            _ = shutdown.cancelled() => return Ok(()),
        };
        let (mut sink, mut stream) = ws.split();

        // ── Send agent_auth ──────────────────────────────────────────
        let auth = Frame::AgentAuth {
            bot_token: self.bot_token.clone(),
            skills: self.skills.clone(),
        };
        let json = serde_json::to_string(&auth)
            .map_err(|e| AgentError::Handshake(format!("encode agent_auth: {e}")))?;
        sink.send(Message::Text(json))
            .await
            .map_err(|e| AgentError::Transport(e.to_string()))?;

        // ── Wait for the auth reply ──────────────────────────────────
        // Exactly one protocol frame decides the attempt. Anything that is
        // not auth_ok or auth_error aborts as a transient failure.
        let auth_wait = tokio::time::timeout(AUTH_REPLY_TIMEOUT, async {
            while let Some(msg) = stream.next().await {
                let text = match msg {
                    Ok(Message::Text(text)) => text,
                    Ok(Message::Close(_)) => break,
                    Ok(_) => continue,
                    Err(e) => return Err(AgentError::Transport(e.to_string())),
                };
                return match serde_json::from_str::<Frame>(&text) {
                    Ok(Frame::AuthOk { agent_name }) => Ok(agent_name),
                    Ok(Frame::AuthError { error }) => Err(AgentError::AuthRejected(error)),
                    Ok(other) => {
                        Err(AgentError::Handshake(format!("unexpected auth reply: {other:?}")))
                    }
                    Err(e) => Err(AgentError::Handshake(format!("malformed auth reply: {e}"))),
                };
            }
            Err(AgentError::Handshake("connection closed before auth reply".into()))
        });

        let agent_name = tokio::select! {
            r = auth_wait => match r {
                Ok(Ok(name)) => name,
                Ok(Err(e)) => return Err(e),
                Err(_) => {
                    return Err(AgentError::Handshake("timed out waiting for auth reply".into()))
                }
            },
            _ = shutdown.cancelled() => return Ok(()),
        };

        tracing::info!(agent = %agent_name, "authenticated");

        // ── Session: keepalive, writer, read loop ────────────────────
        let (outbound_tx, mut outbound_rx) = mpsc::channel::<Frame>(OUTBOUND_BUFFER);

        if let Some(cb) = &self.on_connected {
            cb(AgentConnection {
                agent_name: agent_name.clone(),
                outbound: outbound_tx.clone(),
            });
        }

        // Ping task: keepalive on a fixed cadence.
        let ping_tx = outbound_tx.clone();
        let ping_interval = self.ping_interval;
        let ping_task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(ping_interval);
            ticker.tick().await; // first tick completes immediately
            loop {
                ticker.tick().await;
                if ping_tx.send(Frame::Ping).await.is_err() {
                    break;
                }
            }
        });

        // Writer task: every outbound frame goes through here, keeping the
        // socket single-writer.
        let writer_task = tokio::spawn(async move {
            while let Some(frame) = outbound_rx.recv().await {
                let json = match serde_json::to_string(&frame) {
                    Ok(j) => j,
                    Err(e) => {
                        tracing::error!(error = %e, "failed to serialize outbound frame");
                        continue;
                    }
                };
                if sink.send(Message::Text(json)).await.is_err() {
                    break;
                }
            }
        });

        // Read loop: inbound frames are handled in arrival order. Task
        // execution is spawned off, so a slow handler never stalls the
        // loop or delays a cancel.
        let result = loop {
            let msg = tokio::select! {
                m = stream.next() => m,
                _ = shutdown.cancelled() => {
                    tracing::info!("shutdown requested");
                    break Ok(());
                }
            };

            match msg {
                Some(Ok(Message::Text(text))) => self.route_frame(&text, &outbound_tx, shutdown),
                Some(Ok(Message::Close(_))) => {
                    tracing::info!("server closed the connection");
                    break Ok(());
                }
                Some(Ok(_)) => {}
                Some(Err(e)) => break Err(AgentError::Transport(e.to_string())),
                None => break Ok(()),
            }
        };

        // ── Teardown ─────────────────────────────────────────────────
        ping_task.abort();
        writer_task.abort();

        if let Some(cb) = &self.on_disconnected {
            cb();
        }

        result
    }

    /// Route one inbound text frame. Frames that fail to decode, and frame
    /// types a server should not be sending, are dropped without breaking
    /// the connection.
    fn route_frame(
        &self,
        text: &str,
        outbound: &mpsc::Sender<Frame>,
        shutdown: &CancellationToken,
    ) {
        match serde_json::from_str::<Frame>(text) {
            Ok(Frame::Pong) => {}
            Ok(Frame::CancelTask { task_id }) => {
                if self.registry.cancel(&task_id) {
                    tracing::info!(task_id = %task_id, "cancellation requested");
                } else {
                    tracing::debug!(
                        task_id = %task_id,
                        "cancel for unknown or finished task, ignoring"
                    );
                }
            }
            Ok(Frame::Task {
                task_id,
                conversation_id,
                content,
                conversation_type,
                members,
                reply_to,
            }) => {
                tracing::debug!(
                    task_id = %task_id,
                    conversation_id = %conversation_id,
                    "received task"
                );
                let task = Task {
                    task_id,
                    conversation_id,
                    content,
                    conversation_type,
                    members,
                    reply_to,
                    cancel: shutdown.child_token(),
                    outbound: outbound.clone(),
                    registry: self.registry.clone(),
                    finished: Arc::new(AtomicBool::new(false)),
                };
                self.dispatch(task);
            }
            Ok(other) => {
                tracing::trace!(?other, "ignoring inbound frame");
            }
            Err(e) => {
                tracing::debug!(error = %e, "dropping undecodable frame");
            }
        }
    }

    /// Run the handler for one task on its own tokio task. However the
    /// handler exits, at most one terminal outcome reaches the server and
    /// the registry entry is freed.
    fn dispatch(&self, task: Task) {
        let Some(handler) = self.handler.clone() else {
            tracing::warn!(task_id = %task.task_id, "task received but no handler registered");
            tokio::spawn(async move {
                task.send_error("No task handler registered").await;
            });
            return;
        };

        self.registry.register(&task.task_id, task.cancel.clone());

        let on_error = self.on_error.clone();
        let registry = self.registry.clone();
        tokio::spawn(async move {
            // catch_unwind: a panicking handler still produces a terminal
            // outcome for its task.
            let outcome = AssertUnwindSafe(handler.handle(task.clone())).catch_unwind().await;

            match outcome {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    let message = e.to_string();
                    tracing::warn!(
                        task_id = %task.task_id,
                        error = %message,
                        "task handler failed"
                    );
                    task.send_error(message.clone()).await;
                    if let Some(cb) = &on_error {
                        cb(&AgentError::Task { task_id: task.task_id.clone(), message });
                    }
                }
                Err(_panic) => {
                    tracing::error!(task_id = %task.task_id, "task handler panicked");
                    task.send_error("task handler panicked").await;
                    if let Some(cb) = &on_error {
                        cb(&AgentError::Task {
                            task_id: task.task_id.clone(),
                            message: "task handler panicked".into(),
                        });
                    }
                }
            }

            // Handlers that return without reporting still free their entry.
            registry.remove(&task.task_id);
        });
    }

    fn emit_error(&self, error: &AgentError) {
        if let Some(cb) = &self.on_error {
            cb(error);
        }
    }
}

/// Join the agent endpoint path onto the configured server URL.
fn endpoint_url(server_url: &str) -> String {
    format!("{}/ws/agent", server_url.trim_end_matches('/'))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_client() -> AgentClient {
        AgentClient {
            server_url: "ws://localhost:8080".into(),
            bot_token: "secret".into(),
            skills: Vec::new(),
            reconnect_interval: Duration::from_secs(5),
            ping_interval: Duration::from_secs(30),
            handler: None,
            on_connected: None,
            on_disconnected: None,
            on_error: None,
            registry: TaskRegistry::new(),
        }
    }

    fn task_json(task_id: &str) -> String {
        format!(r#"{{"type":"task","taskId":"{task_id}","conversationId":"c1","content":"hello"}}"#)
    }

    #[test]
    fn endpoint_url_appends_agent_path() {
        assert_eq!(endpoint_url("wss://chat.arinova.app"), "wss://chat.arinova.app/ws/agent");
        assert_eq!(endpoint_url("ws://localhost:8080"), "ws://localhost:8080/ws/agent");
    }

    #[test]
    fn endpoint_url_strips_trailing_slashes() {
        assert_eq!(endpoint_url("wss://chat.arinova.app/"), "wss://chat.arinova.app/ws/agent");
        assert_eq!(endpoint_url("wss://chat.arinova.app//"), "wss://chat.arinova.app/ws/agent");
    }

    #[tokio::test]
    async fn task_without_handler_fails_with_the_stock_message() {
        let client = test_client();
        let (tx, mut rx) = mpsc::channel(8);
        let shutdown = CancellationToken::new();

        client.route_frame(&task_json("t3"), &tx, &shutdown);

        assert_eq!(
            rx.recv().await.unwrap(),
            Frame::AgentError { task_id: "t3".into(), error: "No task handler registered".into() }
        );
        assert!(!client.registry.is_active("t3"));
    }

    #[tokio::test]
    async fn handler_error_reports_agent_error() {
        let errors: Arc<parking_lot::Mutex<Vec<String>>> = Arc::default();
        let seen = errors.clone();

        let mut client = test_client();
        client.handler = Some(Arc::new(|_task: Task| async move {
            Err(anyhow::anyhow!("model exploded"))
        }));
        client.on_error = Some(Arc::new(move |e: &AgentError| {
            seen.lock().push(e.to_string());
        }));

        let (tx, mut rx) = mpsc::channel(8);
        let shutdown = CancellationToken::new();
        client.route_frame(&task_json("t1"), &tx, &shutdown);

        assert_eq!(
            rx.recv().await.unwrap(),
            Frame::AgentError { task_id: "t1".into(), error: "model exploded".into() }
        );
        assert!(!client.registry.is_active("t1"));

        let deadline = tokio::time::Instant::now() + Duration::from_secs(2);
        while errors.lock().is_empty() {
            assert!(tokio::time::Instant::now() < deadline, "on_error was never invoked");
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        assert_eq!(errors.lock()[0], "task t1: model exploded");
    }

    async fn exploding_handler(_task: Task) -> anyhow::Result<()> {
        panic!("kaboom")
    }

    #[tokio::test]
    async fn panicking_handler_reports_agent_error() {
        let mut client = test_client();
        client.handler = Some(Arc::new(exploding_handler));

        let (tx, mut rx) = mpsc::channel(8);
        let shutdown = CancellationToken::new();
        client.route_frame(&task_json("t1"), &tx, &shutdown);

        assert_eq!(
            rx.recv().await.unwrap(),
            Frame::AgentError { task_id: "t1".into(), error: "task handler panicked".into() }
        );
        assert!(!client.registry.is_active("t1"));
    }

    #[tokio::test]
    async fn cancel_frame_reaches_the_running_task() {
        let mut client = test_client();
        client.handler = Some(Arc::new(|task: Task| async move {
            task.cancel.cancelled().await;
            task.send_error("cancelled").await;
            Ok(())
        }));

        let (tx, mut rx) = mpsc::channel(8);
        let shutdown = CancellationToken::new();

        client.route_frame(&task_json("t2"), &tx, &shutdown);
        assert!(client.registry.is_active("t2"));

        client.route_frame(r#"{"type":"cancel_task","taskId":"t2"}"#, &tx, &shutdown);

        assert_eq!(
            rx.recv().await.unwrap(),
            Frame::AgentError { task_id: "t2".into(), error: "cancelled".into() }
        );
        assert!(!client.registry.is_active("t2"));
    }

    #[tokio::test]
    async fn client_shutdown_cancels_running_tasks() {
        let mut client = test_client();
        client.handler = Some(Arc::new(|task: Task| async move {
            task.cancel.cancelled().await;
            task.send_error("cancelled").await;
            Ok(())
        }));

        let (tx, mut rx) = mpsc::channel(8);
        let shutdown = CancellationToken::new();

        client.route_frame(&task_json("t5"), &tx, &shutdown);
        shutdown.cancel();

        assert_eq!(
            rx.recv().await.unwrap(),
            Frame::AgentError { task_id: "t5".into(), error: "cancelled".into() }
        );
    }

    #[tokio::test]
    async fn cancel_after_completion_is_ignored() {
        let mut client = test_client();
        client.handler = Some(Arc::new(|task: Task| async move {
            task.send_complete("done").await;
            Ok(())
        }));

        let (tx, mut rx) = mpsc::channel(8);
        let shutdown = CancellationToken::new();

        client.route_frame(&task_json("t1"), &tx, &shutdown);
        assert_eq!(
            rx.recv().await.unwrap(),
            Frame::AgentComplete { task_id: "t1".into(), content: "done".into(), mentions: None }
        );

        client.route_frame(r#"{"type":"cancel_task","taskId":"t1"}"#, &tx, &shutdown);
        assert!(tokio::time::timeout(Duration::from_millis(100), rx.recv()).await.is_err());
    }

    #[tokio::test]
    async fn junk_frames_are_dropped_silently() {
        let client = test_client();
        let (tx, mut rx) = mpsc::channel(8);
        let shutdown = CancellationToken::new();

        client.route_frame("{not json", &tx, &shutdown);
        client.route_frame(r#"{"type":"resize_window","cols":80}"#, &tx, &shutdown);
        client.route_frame(r#"{"type":"pong"}"#, &tx, &shutdown);

        assert!(tokio::time::timeout(Duration::from_millis(100), rx.recv()).await.is_err());
    }
}
