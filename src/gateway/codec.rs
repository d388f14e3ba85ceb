//! Gateway wire codec
//!
//! Socket.IO-style text frames. A frame is an engine packet type digit,
//! optionally a socket packet type digit, optionally a JSON body:
//!
//! ```text
//! 2                       ping (server -> client)
//! 3                       pong (client -> server)
//! 0{...}                  engine open
//! 40{"auth":{...}}        socket connect / connect ack
//! 42["event",{...}]       application event
//! ```
//!
//! Decoding is total: anything unrecognised becomes [`WireFrame::Noop`].

use serde::Serialize;
use serde_json::Value;
use tracing::debug;

/// Engine packet: open
const ENGINE_OPEN: &str = "0";
/// Engine packet: ping
const ENGINE_PING: &str = "2";
/// Engine packet: pong
const ENGINE_PONG: &str = "3";
/// Engine message + socket connect
const SOCKET_CONNECT: &str = "40";
/// Engine message + socket event
const SOCKET_EVENT: &str = "42";

/// A decoded frame
#[derive(Debug, Clone, PartialEq)]
pub enum WireFrame {
    /// Empty or unrecognised payload
    Noop,
    /// Session metadata from the server (`0{..}` or `40{..}`)
    Open(Value),
    /// Server liveness check
    HeartbeatPing,
    /// Liveness reply
    HeartbeatPong,
    /// Application-level event
    Event {
        /// Event name
        name: String,
        /// Event payload, `Null` when the server sent none
        payload: Value,
    },
}

/// Credential carried in the handshake body
#[derive(Debug, Clone, Serialize)]
pub struct AuthCredential {
    /// Gateway token
    pub token: String,
}

impl AuthCredential {
    pub fn new(token: impl Into<String>) -> Self {
        AuthCredential { token: token.into() }
    }
}

/// Decode one raw text payload
pub fn decode(raw: &str) -> WireFrame {
    match raw {
        "" => return WireFrame::Noop,
        ENGINE_PING => return WireFrame::HeartbeatPing,
        ENGINE_PONG => return WireFrame::HeartbeatPong,
        SOCKET_CONNECT => return WireFrame::Open(Value::Null),
        _ => {}
    }

    if let Some(body) = raw.strip_prefix(SOCKET_EVENT) {
        return decode_event(body);
    }

    if let Some(body) = raw.strip_prefix(SOCKET_CONNECT).or_else(|| raw.strip_prefix(ENGINE_OPEN)) {
        return match serde_json::from_str::<Value>(body) {
            Ok(meta @ Value::Object(_)) => WireFrame::Open(meta),
            Ok(_) => {
                debug!("Ignoring open frame whose body is not an object");
                WireFrame::Noop
            }
            Err(e) => {
                debug!("Ignoring malformed open frame: {}", e);
                WireFrame::Noop
            }
        };
    }

    debug!("Ignoring unrecognised frame prefix: {:.8}", raw);
    WireFrame::Noop
}

fn decode_event(body: &str) -> WireFrame {
    let items = match serde_json::from_str::<Value>(body) {
        Ok(Value::Array(items)) => items,
        Ok(_) => {
            debug!("Ignoring event frame whose body is not an array");
            return WireFrame::Noop;
        }
        Err(e) => {
            debug!("Ignoring malformed event frame: {}", e);
            return WireFrame::Noop;
        }
    };

    let mut items = items.into_iter();
    match items.next() {
        Some(Value::String(name)) => WireFrame::Event {
            name,
            payload: items.next().unwrap_or(Value::Null),
        },
        Some(_) => {
            debug!("Ignoring event frame without a string name");
            WireFrame::Noop
        }
        None => {
            debug!("Ignoring empty event frame");
            WireFrame::Noop
        }
    }
}

/// `40{"auth":{"token":...}}`
pub fn encode_handshake(credential: &AuthCredential) -> String {
    let body = serde_json::json!({ "auth": { "token": credential.token } });
    format!("{}{}", SOCKET_CONNECT, body)
}

/// `42["name",payload]`
pub fn encode_event(name: &str, payload: &Value) -> String {
    let body = Value::Array(vec![Value::String(name.to_string()), payload.clone()]);
    format!("{}{}", SOCKET_EVENT, body)
}

/// Reply to a server ping
pub fn encode_heartbeat_ack() -> String {
    ENGINE_PONG.to_string()
}
