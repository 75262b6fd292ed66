//! Builder for [`AgentClient`].

use std::sync::Arc;
use std::time::Duration;

use arinova_protocol::AgentSkill;

use crate::client::AgentClient;
use crate::registry::TaskRegistry;
use crate::task::TaskHandler;
use crate::types::{
    AgentConnection, AgentError, ConnectedCallback, DisconnectedCallback, ErrorCallback,
};

/// Fluent builder for [`AgentClient`].
///
/// `server_url` and `bot_token` are required; everything else has a
/// sensible default.
///
/// ```rust,no_run
/// use std::time::Duration;
/// use arinova_agent_sdk::{AgentClient, Task};
///
/// let client = AgentClient::builder()
///     .server_url("wss://chat.arinova.app")
///     .bot_token("secret")
///     .reconnect_interval(Duration::from_secs(5))
///     .on_task(|task: Task| async move {
///         task.send_complete("hi!").await;
///         Ok(())
///     })
///     .build()
///     .unwrap();
/// ```
pub struct AgentClientBuilder {
    server_url: String,
    bot_token: String,
    skills: Vec<AgentSkill>,
    reconnect_interval: Duration,
    ping_interval: Duration,
    handler: Option<Arc<dyn TaskHandler>>,
    on_connected: Option<ConnectedCallback>,
    on_disconnected: Option<DisconnectedCallback>,
    on_error: Option<ErrorCallback>,
}

impl AgentClientBuilder {
    pub fn new() -> Self {
        Self {
            server_url: String::new(),
            bot_token: String::new(),
            skills: Vec::new(),
            reconnect_interval: Duration::from_secs(5),
            ping_interval: Duration::from_secs(30),
            handler: None,
            on_connected: None,
            on_disconnected: None,
            on_error: None,
        }
    }

    // ── Required ────────────────────────────────────────────────────────

    /// Server base URL, e.g. `wss://chat.arinova.app`. The agent endpoint
    /// path is appended automatically.
    pub fn server_url(mut self, url: impl Into<String>) -> Self {
        self.server_url = url.into();
        self
    }

    /// The agent's bot token, issued when the agent was registered.
    pub fn bot_token(mut self, token: impl Into<String>) -> Self {
        self.bot_token = token.into();
        self
    }

    // ── Identity ────────────────────────────────────────────────────────

    /// Advertise a skill in the auth handshake. Call repeatedly to add
    /// several.
    pub fn skill(mut self, skill: AgentSkill) -> Self {
        self.skills.push(skill);
        self
    }

    /// Replace the advertised skill list wholesale.
    pub fn skills(mut self, skills: Vec<AgentSkill>) -> Self {
        self.skills = skills;
        self
    }

    // ── Timing ──────────────────────────────────────────────────────────

    /// Fixed delay between reconnect attempts. Default 5 seconds.
    pub fn reconnect_interval(mut self, interval: Duration) -> Self {
        self.reconnect_interval = interval;
        self
    }

    /// Keepalive ping cadence while connected. Default 30 seconds.
    pub fn ping_interval(mut self, interval: Duration) -> Self {
        self.ping_interval = interval;
        self
    }

    // ── Handler and lifecycle observers ─────────────────────────────────

    /// Register the task handler. One slot: the last registration before
    /// [`build`](Self::build) wins.
    pub fn on_task(mut self, handler: impl TaskHandler) -> Self {
        self.handler = Some(Arc::new(handler));
        self
    }

    /// Called after each successful authentication, with a handle to the
    /// live connection.
    pub fn on_connected(
        mut self,
        callback: impl Fn(AgentConnection) + Send + Sync + 'static,
    ) -> Self {
        self.on_connected = Some(Arc::new(callback));
        self
    }

    /// Called once each time an established connection ends, for any
    /// reason.
    pub fn on_disconnected(mut self, callback: impl Fn() + Send + Sync + 'static) -> Self {
        self.on_disconnected = Some(Arc::new(callback));
        self
    }

    /// Called for every failure the client recovers from, and for the one
    /// it does not (auth rejection, reported once before `run` returns).
    pub fn on_error(mut self, callback: impl Fn(&AgentError) + Send + Sync + 'static) -> Self {
        self.on_error = Some(Arc::new(callback));
        self
    }

    /// Validate the configuration and build the client.
    pub fn build(self) -> Result<AgentClient, AgentError> {
        if self.server_url.is_empty() {
            return Err(AgentError::Config("server_url is required".into()));
        }
        if self.bot_token.is_empty() {
            return Err(AgentError::Config("bot_token is required".into()));
        }

        Ok(AgentClient {
            server_url: self.server_url,
            bot_token: self.bot_token,
            skills: self.skills,
            reconnect_interval: self.reconnect_interval,
            ping_interval: self.ping_interval,
            handler: self.handler,
            on_connected: self.on_connected,
            on_disconnected: self.on_disconnected,
            on_error: self.on_error,
            registry: TaskRegistry::new(),
        })
    }
}

impl Default for AgentClientBuilder {
    fn default() -> Self {
        Self::new()
    }
}
