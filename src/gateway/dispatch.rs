//! Event dispatch table
//!
//! Maps an event name to a handler that decodes the payload into its typed
//! form and updates session state. A payload that does not decode is dropped
//! without touching state; unknown event names are ignored.

use std::collections::HashMap;

use serde_json::Value;
use tracing::debug;

use super::state::StateStore;
use super::types::{events, ChatEvent, ChatMessage, GatewayStatus};
use crate::error::{Error, Result};

/// Handles one named event
pub trait EventHandler: Send + Sync {
    /// Event name this handler is registered under
    fn event(&self) -> &str;

    /// Apply the payload to session state
    fn handle(&self, payload: &Value, state: &StateStore) -> Result<()>;
}

fn decode_payload<T: serde::de::DeserializeOwned>(event: &str, payload: &Value) -> Result<T> {
    T::deserialize(payload).map_err(|e| Error::Decode(format!("{} payload: {}", event, e)))
}

/// `chat`: append an incoming message
#[derive(Debug, Default)]
pub struct ChatHandler;

impl EventHandler for ChatHandler {
    fn event(&self) -> &str {
        events::CHAT
    }

    fn handle(&self, payload: &Value, state: &StateStore) -> Result<()> {
        let chat: ChatEvent = decode_payload(events::CHAT, payload)?;
        let body = chat
            .body()
            .ok_or_else(|| Error::Decode("chat payload has no text".to_string()))?;

        state.append_message(ChatMessage::new(chat.id(), chat.role.clone(), body, None));
        Ok(())
    }
}

/// `status`: track the agent name
#[derive(Debug, Default)]
pub struct StatusHandler;

impl EventHandler for StatusHandler {
    fn event(&self) -> &str {
        events::STATUS
    }

    fn handle(&self, payload: &Value, state: &StateStore) -> Result<()> {
        let status: GatewayStatus = decode_payload(events::STATUS, payload)?;
        if let Some(name) = status.agent_name {
            state.set_agent_name(name);
        }
        Ok(())
    }
}

/// Registry of event handlers
pub struct EventTable {
    handlers: HashMap<String, Box<dyn EventHandler>>,
}

impl Default for EventTable {
    /// Table with the built-in `chat` and `status` handlers
    fn default() -> Self {
        let mut table = Self::empty();
        table.register(ChatHandler);
        table.register(StatusHandler);
        table
    }
}

impl EventTable {
    /// Table with no handlers
    pub fn empty() -> Self {
        EventTable {
            handlers: HashMap::new(),
        }
    }

    /// Register a handler, replacing any previous one for the same event
    pub fn register<H: EventHandler + 'static>(&mut self, handler: H) {
        self.handlers.insert(handler.event().to_string(), Box::new(handler));
    }

    /// Whether a handler exists for `event`
    pub fn handles(&self, event: &str) -> bool {
        self.handlers.contains_key(event)
    }

    /// Dispatch one event. Returns `true` if a handler applied it.
    pub fn dispatch(&self, event: &str, payload: &Value, state: &StateStore) -> bool {
        let Some(handler) = self.handlers.get(event) else {
            debug!("No handler for event '{}'", event);
            return false;
        };

        match handler.handle(payload, state) {
            Ok(()) => true,
            Err(e) => {
                debug!("Dropped '{}' event: {}", event, e);
                false
            }
        }
    }

    /// Registered event names
    pub fn events(&self) -> Vec<&str> {
        self.handlers.keys().map(|k| k.as_str()).collect()
    }
}
