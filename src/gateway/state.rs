//! Observable session state
//!
//! The session is the only writer. Readers take snapshots, watch the
//! connection state, or subscribe to a stream of [`SessionEvent`]s.

use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use serde::{Deserialize, Serialize};
use tokio::sync::{broadcast, watch};

use super::types::ChatMessage;
use crate::error::{Error, ErrorKind};

/// Capacity of the event broadcast channel; slow subscribers see `Lagged`
const EVENT_CAPACITY: usize = 256;

/// Connection lifecycle
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionState {
    #[default]
    Disconnected,
    Connecting,
    Authenticating,
    Ready,
    Closing,
}

impl ConnectionState {
    pub fn is_ready(self) -> bool {
        self == ConnectionState::Ready
    }
}

impl std::fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ConnectionState::Disconnected => "disconnected",
            ConnectionState::Connecting => "connecting",
            ConnectionState::Authenticating => "authenticating",
            ConnectionState::Ready => "ready",
            ConnectionState::Closing => "closing",
        };
        f.write_str(s)
    }
}

/// The latest error, as stored in observable state
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Fault {
    pub kind: ErrorKind,
    pub message: String,
}

impl From<&Error> for Fault {
    fn from(err: &Error) -> Self {
        Fault {
            kind: err.kind(),
            message: err.to_string(),
        }
    }
}

impl std::fmt::Display for Fault {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.message)
    }
}

/// Everything a front-end can observe about a session
#[derive(Debug, Clone, Default)]
pub struct GatewaySessionState {
    /// Append-only, arrival-ordered
    pub messages: Vec<ChatMessage>,
    pub connection: ConnectionState,
    pub last_error: Option<Fault>,
    pub agent_name: Option<String>,
}

/// Change notifications
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    ConnectionChanged(ConnectionState),
    MessageAppended(ChatMessage),
    AgentNameChanged(String),
    Error(Fault),
}

/// Shared state container; cloning shares the same state
#[derive(Clone)]
pub struct StateStore {
    inner: Arc<RwLock<GatewaySessionState>>,
    events: broadcast::Sender<SessionEvent>,
    connection: Arc<watch::Sender<ConnectionState>>,
}

impl Default for StateStore {
    fn default() -> Self {
        Self::new()
    }
}

impl StateStore {
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        let (connection, _) = watch::channel(ConnectionState::Disconnected);
        StateStore {
            inner: Arc::new(RwLock::new(GatewaySessionState::default())),
            events,
            connection: Arc::new(connection),
        }
    }

    // Every write is a single assignment or push; poison is ignored.
    fn read(&self) -> RwLockReadGuard<'_, GatewaySessionState> {
        self.inner.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, GatewaySessionState> {
        self.inner.write().unwrap_or_else(|e| e.into_inner())
    }

    fn emit(&self, event: SessionEvent) {
        // No subscribers is fine
        let _ = self.events.send(event);
    }

    pub fn snapshot(&self) -> GatewaySessionState {
        self.read().clone()
    }

    pub fn connection(&self) -> ConnectionState {
        self.read().connection
    }

    pub fn messages(&self) -> Vec<ChatMessage> {
        self.read().messages.clone()
    }

    pub fn message_count(&self) -> usize {
        self.read().messages.len()
    }

    pub fn last_error(&self) -> Option<Fault> {
        self.read().last_error.clone()
    }

    pub fn agent_name(&self) -> Option<String> {
        self.read().agent_name.clone()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    pub fn watch_connection(&self) -> watch::Receiver<ConnectionState> {
        self.connection.subscribe()
    }

    pub(crate) fn set_connection(&self, state: ConnectionState) {
        {
            let mut guard = self.write();
            if guard.connection == state {
                return;
            }
            guard.connection = state;
        }
        self.connection.send_replace(state);
        self.emit(SessionEvent::ConnectionChanged(state));
    }

    pub(crate) fn append_message(&self, message: ChatMessage) {
        self.write().messages.push(message.clone());
        self.emit(SessionEvent::MessageAppended(message));
    }

    pub(crate) fn set_agent_name(&self, name: String) {
        self.write().agent_name = Some(name.clone());
        self.emit(SessionEvent::AgentNameChanged(name));
    }

    pub(crate) fn record_error(&self, err: &Error) -> Fault {
        let fault = Fault::from(err);
        self.write().last_error = Some(fault.clone());
        self.emit(SessionEvent::Error(fault.clone()));
        fault
    }

    pub(crate) fn clear_error(&self) {
        self.write().last_error = None;
    }
}
