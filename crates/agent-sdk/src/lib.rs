//! Rust SDK for building Arinova Chat agents.
//!
//! An agent is a process that attaches to the chat server over a
//! persistent WebSocket, authenticates with its bot token, and answers the
//! tasks the server dispatches, streaming partial output as it goes. This
//! crate owns everything between your handler and the socket: dialing,
//! authentication, keepalive, reconnection, concurrent task supervision,
//! and cooperative cancellation.
//!
//! # Quick start
//!
//! ```rust,no_run
//! use arinova_agent_sdk::{AgentClient, Task};
//! use tokio_util::sync::CancellationToken;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let client = AgentClient::builder()
//!         .server_url("wss://chat.arinova.app")
//!         .bot_token(std::env::var("ARINOVA_BOT_TOKEN")?)
//!         .on_task(|task: Task| async move {
//!             task.send_chunk("thinking...").await;
//!             task.send_complete(format!("echo: {}", task.content)).await;
//!             Ok(())
//!         })
//!         .build()?;
//!
//!     client.run(CancellationToken::new()).await?;
//!     Ok(())
//! }
//! ```
//!
//! # Connection lifecycle
//!
//! 1. Dial `<server>/ws/agent`.
//! 2. Send `agent_auth` with the bot token and any advertised skills.
//! 3. Wait up to 10s for `auth_ok` or `auth_error`.
//! 4. Session loop:
//!    - `task` frames spawn the registered handler; the handler streams
//!      `agent_chunk`s and ends with exactly one `agent_complete` or
//!      `agent_error`, whichever it reports first.
//!    - `cancel_task` frames cancel the matching task's token. The request
//!      is advisory; handlers opt in by checking the token.
//!    - A `ping` goes out every 30s; `pong`s are discarded.
//! 5. When the connection ends, for any reason other than a rejected
//!    token, the client sleeps the reconnect interval (5s by default) and
//!    dials again. `auth_error` is permanent and stops the loop.
//!
//! Handlers run concurrently with each other and with the read loop, so a
//! slow task never delays other tasks or a cancellation aimed at it.

pub mod builder;
pub mod client;
mod registry;
pub mod task;
pub mod types;

pub use builder::AgentClientBuilder;
pub use client::AgentClient;
pub use task::{Task, TaskHandler};
pub use types::{AgentConnection, AgentError};

// Wire types an agent touches directly, re-exported so embedders rarely
// need arinova-protocol as an explicit dependency.
pub use arinova_protocol::{AgentSkill, Frame, MemberInfo, ReplyContext};
