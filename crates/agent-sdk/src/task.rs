//! Task context and the handler contract.

use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use arinova_protocol::{Frame, MemberInfo, ReplyContext};

use crate::registry::TaskRegistry;

/// Implement this to handle tasks dispatched by the server.
///
/// Each dispatch runs on its own tokio task, so handlers execute
/// concurrently with each other and with the connection's read loop.
/// Outcomes are reported through the [`Task`] handle; returning `Err` is
/// shorthand for `task.send_error(..)` and also surfaces the error to the
/// `on_error` callback. Panics are caught and reported the same way.
///
/// Plain async closures implement the trait too:
///
/// ```rust,no_run
/// use arinova_agent_sdk::{AgentClient, Task};
///
/// let client = AgentClient::builder()
///     .server_url("wss://chat.arinova.app")
///     .bot_token("secret")
///     .on_task(|task: Task| async move {
///         task.send_complete(format!("you said: {}", task.content)).await;
///         Ok(())
///     })
///     .build()
///     .unwrap();
/// ```
#[async_trait::async_trait]
pub trait TaskHandler: Send + Sync + 'static {
    async fn handle(&self, task: Task) -> anyhow::Result<()>;
}

#[async_trait::async_trait]
impl<F, Fut> TaskHandler for F
where
    F: Fn(Task) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
{
    async fn handle(&self, task: Task) -> anyhow::Result<()> {
        (self)(task).await
    }
}

/// One dispatched unit of work, handed to the [`TaskHandler`].
///
/// Any number of [`send_chunk`](Task::send_chunk) calls may precede one
/// terminal report ([`send_complete`](Task::send_complete) or
/// [`send_error`](Task::send_error)). The first terminal report wins;
/// everything after it is silently dropped. All sends are fire-and-forget:
/// if the connection died underneath the task, frames go nowhere and the
/// handler keeps running undisturbed.
#[derive(Clone, Debug)]
pub struct Task {
    /// Server-assigned id, unique per dispatch.
    pub task_id: String,
    /// Conversation the task belongs to.
    pub conversation_id: String,
    /// The message content to act on.
    pub content: String,
    /// `"direct"` or `"group"`, when the server includes it.
    pub conversation_type: Option<String>,
    /// Other agents in a group conversation.
    pub members: Option<Vec<MemberInfo>>,
    /// The message being replied to, if the task is a reply.
    pub reply_to: Option<ReplyContext>,
    /// Fires when the server requests cancellation of this task, or when
    /// the whole client shuts down. Cancellation is advisory: check
    /// `is_cancelled()` or await `cancelled()` at convenient points and
    /// wind down; nothing preempts the handler.
    pub cancel: CancellationToken,

    pub(crate) outbound: mpsc::Sender<Frame>,
    pub(crate) registry: TaskRegistry,
    pub(crate) finished: Arc<AtomicBool>,
}

impl Task {
    /// Stream an output delta (new characters only, not the accumulated
    /// text). Dropped once a terminal outcome has been reported.
    pub async fn send_chunk(&self, delta: impl Into<String>) {
        if self.finished.load(Ordering::Acquire) {
            return;
        }
        let _ = self
            .outbound
            .send(Frame::AgentChunk { task_id: self.task_id.clone(), chunk: delta.into() })
            .await;
    }

    /// Report success, with the full response content.
    pub async fn send_complete(&self, content: impl Into<String>) {
        self.finish(Frame::AgentComplete {
            task_id: self.task_id.clone(),
            content: content.into(),
            mentions: None,
        })
        .await;
    }

    /// Like [`send_complete`](Task::send_complete), additionally asking
    /// the server to notify the named agents about the response.
    pub async fn send_complete_with_mentions(
        &self,
        content: impl Into<String>,
        mentions: Vec<String>,
    ) {
        self.finish(Frame::AgentComplete {
            task_id: self.task_id.clone(),
            content: content.into(),
            mentions: Some(mentions),
        })
        .await;
    }

    /// Report failure, with a human-readable message.
    pub async fn send_error(&self, error: impl Into<String>) {
        self.finish(Frame::AgentError { task_id: self.task_id.clone(), error: error.into() })
            .await;
    }

    /// Tell the server the task is still in progress. Handlers that go a
    /// long time between chunks should call this periodically, or the
    /// server gives the task up as abandoned.
    pub async fn heartbeat(&self) {
        if self.finished.load(Ordering::Acquire) {
            return;
        }
        let _ = self
            .outbound
            .send(Frame::AgentHeartbeat { task_id: self.task_id.clone() })
            .await;
    }

    /// Claim the terminal slot and send the frame. The registry entry is
    /// removed before the frame is queued, so no cancel can land between
    /// the two.
    async fn finish(&self, frame: Frame) {
        if self.finished.swap(true, Ordering::AcqRel) {
            return;
        }
        self.registry.remove(&self.task_id);
        let _ = self.outbound.send(frame).await;
    }
}
