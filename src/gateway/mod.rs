//! Gateway module - Socket.IO client session for an OpenClaw gateway
//!
//! The gateway speaks a minimal Socket.IO (Engine.IO v4) dialect over a
//! single WebSocket. This module owns that connection and exposes the
//! resulting chat state to front-ends.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────┐
//! │                   GatewaySession                     │
//! │  connect / disconnect / send_message / fetch_history │
//! └──────────┬─────────────────────────────┬─────────────┘
//!            │ frames                      │ events
//!            ▼                             ▼
//!      ┌───────────┐   ┌─────────┐   ┌────────────┐   ┌────────────┐
//!      │ Transport │◄─►│  codec  │──►│ EventTable │──►│ StateStore │
//!      └───────────┘   └─────────┘   └────────────┘   └────────────┘
//!   WebSocket / memory                 chat, status     snapshots,
//!                                                       subscriptions
//! ```

pub mod codec;
pub mod dispatch;
pub mod memory;
pub mod session;
pub mod state;
pub mod transport;
pub mod types;

pub use codec::{AuthCredential, WireFrame};
pub use dispatch::{ChatHandler, EventHandler, EventTable, StatusHandler};
pub use memory::{MemoryPeer, MemoryServer, MemoryTransport};
pub use session::{build_gateway_url, GatewaySession, SOCKET_IO_PATH};
pub use state::{ConnectionState, Fault, GatewaySessionState, SessionEvent, StateStore};
pub use transport::{Connection, FrameSink, FrameSource, Inbound, Transport, WebSocketTransport};
pub use types::{events, ChatMessage, ChatSession, GatewayStatus, Role};
