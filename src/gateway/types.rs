//! Gateway protocol types
//!
//! Chat records and the payloads carried inside event frames.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

/// Outgoing event names
pub mod events {
    /// Send a chat message
    pub const CHAT_SEND: &str = "chat.send";
    /// Request recent chat history
    pub const CHAT_HISTORY: &str = "chat.history";
    /// Request (and receive) gateway status
    pub const STATUS: &str = "status";
    /// Incoming chat message
    pub const CHAT: &str = "chat";
}

/// Number of history entries requested by `fetch_history`
pub const HISTORY_LIMIT: u32 = 50;

// ============================================================================
// Chat
// ============================================================================

/// Author of a chat message
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Role {
    User,
    Assistant,
    /// Any other role string, kept verbatim
    Other(String),
}

impl From<String> for Role {
    fn from(s: String) -> Self {
        match s.to_lowercase().as_str() {
            "user" => Role::User,
            "assistant" => Role::Assistant,
            _ => Role::Other(s),
        }
    }
}

impl From<Role> for String {
    fn from(role: Role) -> Self {
        role.as_str().to_string()
    }
}

impl Role {
    pub fn as_str(&self) -> &str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
            Role::Other(s) => s,
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single entry in the session's message log
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    /// Opaque identifier (server-assigned or generated)
    pub id: String,
    /// Author role
    pub role: Role,
    /// Text content
    pub content: String,
    /// RFC 3339 timestamp
    pub timestamp: Option<String>,
    /// Session the message belongs to
    pub session_key: Option<String>,
}

impl ChatMessage {
    /// Create a message stamped with the current time
    pub fn new(id: Option<String>, role: Role, content: impl Into<String>, session_key: Option<String>) -> Self {
        ChatMessage {
            id: id.unwrap_or_else(|| uuid::Uuid::new_v4().to_string()),
            role,
            content: content.into(),
            timestamp: Some(Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true)),
            session_key,
        }
    }

    /// Optimistic local message for a send that has not been acknowledged
    pub fn user(content: impl Into<String>, session_key: Option<String>) -> Self {
        Self::new(None, Role::User, content, session_key)
    }

    pub fn is_user(&self) -> bool {
        self.role == Role::User
    }

    pub fn is_assistant(&self) -> bool {
        self.role == Role::Assistant
    }

    /// Parsed timestamp, with or without fractional seconds
    pub fn received_at(&self) -> Option<DateTime<Utc>> {
        let raw = self.timestamp.as_deref()?;
        DateTime::parse_from_rfc3339(raw)
            .ok()
            .map(|dt| dt.with_timezone(&Utc))
    }
}

/// `chat.send` payload
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatSendRequest {
    pub message: String,
    pub session_key: String,
}

/// `chat.history` payload
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatHistoryRequest {
    pub session_key: String,
    pub limit: u32,
}

/// Incoming `chat` event payload
///
/// Fields other than `role` are kept loose so a wrongly typed `id` or `text`
/// falls back instead of rejecting the whole event.
#[derive(Debug, Clone, Deserialize)]
pub struct ChatEvent {
    pub role: Role,
    #[serde(default)]
    id: Option<serde_json::Value>,
    #[serde(default)]
    text: Option<serde_json::Value>,
    #[serde(default)]
    content: Option<serde_json::Value>,
}

impl ChatEvent {
    /// Server-assigned id, if it is a string
    pub fn id(&self) -> Option<String> {
        self.id.as_ref()?.as_str().map(str::to_string)
    }

    /// Direct `text`, else the first content block's `text`
    pub fn body(&self) -> Option<&str> {
        if let Some(text) = self.text.as_ref().and_then(|t| t.as_str()) {
            return Some(text);
        }
        self.content
            .as_ref()?
            .as_array()?
            .first()?
            .get("text")?
            .as_str()
    }
}

// ============================================================================
// Status and sessions
// ============================================================================

/// Incoming `status` event payload
///
/// Only `agentName` is typed; the rest may be strings or numbers depending
/// on the gateway build.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GatewayStatus {
    #[serde(default)]
    pub status: Option<serde_json::Value>,
    #[serde(default)]
    pub version: Option<serde_json::Value>,
    #[serde(default, alias = "agent_name")]
    pub agent_name: Option<String>,
    #[serde(default)]
    pub uptime: Option<serde_json::Value>,
}

/// Chat session summary as reported by the gateway
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatSession {
    pub id: String,
    pub key: String,
    pub channel: Option<String>,
    pub agent_name: Option<String>,
    pub created_at: Option<String>,
    pub last_activity: Option<String>,
}
