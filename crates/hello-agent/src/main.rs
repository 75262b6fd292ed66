//! Reference "hello-world" agent for Arinova Chat.
//!
//! Connects to the server, advertises one skill, and answers every task by
//! streaming the message back in small chunks, checking for cancellation
//! between them.
//!
//! Usage:
//!   ARINOVA_BOT_TOKEN=secret arinova-hello-agent wss://chat.arinova.app
//!
//! Env vars:
//!   ARINOVA_BOT_TOKEN   — the agent's bot token (required)
//!   ARINOVA_SERVER_URL  — server URL (the CLI argument takes precedence;
//!                         default: "ws://localhost:8080")

use std::time::Duration;

use arinova_agent_sdk::{AgentClient, AgentSkill, Task};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let server_url = std::env::args()
        .nth(1)
        .or_else(|| std::env::var("ARINOVA_SERVER_URL").ok())
        .unwrap_or_else(|| "ws://localhost:8080".into());

    let bot_token = std::env::var("ARINOVA_BOT_TOKEN")
        .map_err(|_| anyhow::anyhow!("ARINOVA_BOT_TOKEN is required"))?;

    let client = AgentClient::builder()
        .server_url(server_url)
        .bot_token(bot_token)
        .skill(AgentSkill {
            id: "echo".into(),
            name: "Echo".into(),
            description: "Streams your message back to you".into(),
        })
        .on_connected(|conn| {
            tracing::info!(agent = %conn.agent_name(), "connected");
        })
        .on_disconnected(|| {
            tracing::info!("disconnected");
        })
        .on_error(|err| {
            tracing::warn!(error = %err, "agent error");
        })
        .on_task(handle_task)
        .build()?;

    let shutdown = CancellationToken::new();
    let signal = shutdown.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("shutdown signal received");
            signal.cancel();
        }
    });

    client.run(shutdown).await?;
    tracing::info!("agent exiting");
    Ok(())
}

/// Stream the reply back a few characters at a time, with a small delay so
/// the streaming is visible in the chat UI.
async fn handle_task(task: Task) -> anyhow::Result<()> {
    tracing::info!(task_id = %task.task_id, content = %task.content, "task received");

    let reply = format!("You said: {}", task.content);
    let chars: Vec<char> = reply.chars().collect();
    let mut sent = String::with_capacity(reply.len());

    for piece in chars.chunks(8) {
        if task.cancel.is_cancelled() {
            tracing::info!(task_id = %task.task_id, "task cancelled mid-stream");
            task.send_error("cancelled").await;
            return Ok(());
        }

        let piece: String = piece.iter().collect();
        task.send_chunk(piece.clone()).await;
        sent.push_str(&piece);
        tokio::time::sleep(Duration::from_millis(120)).await;
    }

    task.send_complete(sent).await;
    Ok(())
}
