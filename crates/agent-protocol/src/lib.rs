//! Wire protocol between Arinova agents and the chat server.
//!
//! Agents attach to the server at `<server>/ws/agent` over a WebSocket.
//! Every frame is a single JSON object carried in a text message and
//! discriminated by its `type` field; field names are camelCase on the
//! wire. Frames with an unknown `type`, or that fail to decode, are
//! dropped by both sides rather than treated as a protocol error.

use serde::{Deserialize, Serialize};

/// One protocol frame, in either direction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Frame {
    /// Agent → Server: authenticate with the agent's bot token. Must be
    /// the first frame on a fresh connection.
    #[serde(rename_all = "camelCase")]
    AgentAuth {
        bot_token: String,
        /// Skills the agent advertises; omitted from the wire when empty.
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        skills: Vec<AgentSkill>,
    },

    /// Server → Agent: authentication accepted.
    #[serde(rename_all = "camelCase")]
    AuthOk { agent_name: String },

    /// Server → Agent: authentication rejected. Permanent; the agent must
    /// not retry with the same token.
    AuthError { error: String },

    /// Agent → Server: connection keepalive.
    Ping,

    /// Server → Agent: keepalive reply.
    Pong,

    /// Server → Agent: a unit of work for the agent to execute.
    #[serde(rename_all = "camelCase")]
    Task {
        task_id: String,
        conversation_id: String,
        content: String,
        /// `"direct"` or `"group"`, when the server includes it.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        conversation_type: Option<String>,
        /// Other agents in the conversation, for group chats.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        members: Option<Vec<MemberInfo>>,
        /// The message this task replies to, if any.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        reply_to: Option<ReplyContext>,
    },

    /// Server → Agent: request cooperative cancellation of a running task.
    #[serde(rename_all = "camelCase")]
    CancelTask { task_id: String },

    /// Agent → Server: a streaming output delta for a running task.
    #[serde(rename_all = "camelCase")]
    AgentChunk { task_id: String, chunk: String },

    /// Agent → Server: terminal success; `content` is the full response.
    #[serde(rename_all = "camelCase")]
    AgentComplete {
        task_id: String,
        content: String,
        /// Agent names the server should notify about this response.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        mentions: Option<Vec<String>>,
    },

    /// Agent → Server: terminal failure.
    #[serde(rename_all = "camelCase")]
    AgentError { task_id: String, error: String },

    /// Agent → Server: the task is still being worked on. Resets the
    /// server's idle timer for tasks that go a long time between chunks.
    #[serde(rename_all = "camelCase")]
    AgentHeartbeat { task_id: String },

    /// Agent → Server: post a message to a conversation outside any task.
    #[serde(rename_all = "camelCase")]
    AgentSend {
        conversation_id: String,
        content: String,
    },
}

/// An agent participating in a group conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MemberInfo {
    pub agent_id: String,
    pub agent_name: String,
}

/// The message a task is replying to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReplyContext {
    /// Role of the original sender, `"user"` or `"agent"`.
    pub role: String,
    pub content: String,
    /// Set when the original sender was another agent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sender_agent_name: Option<String>,
}

/// A capability advertised in `agent_auth`, shown in the agent directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentSkill {
    pub id: String,
    pub name: String,
    pub description: String,
}
