//! # Clawlink
//!
//! A client for OpenClaw agent gateways, built with Rust.
//!
//! ## Features
//!
//! - **Gateway Session:** Socket.IO chat over WebSocket with an explicit connection state machine
//! - **Observable State:** Snapshots, a connection watch and an event stream for front-ends
//! - **Knowledge Graph:** Read-only client for the agent's entities, tasks and search
//! - **Layered Config:** JSON5 or TOML files, `.env` and `CLAWLINK_*` overrides

pub mod config;
pub mod error;
pub mod gateway;
pub mod kg;

pub use config::AppConfig;
pub use error::{Error, Result};
pub use gateway::GatewaySession;
pub use kg::KnowledgeGraphClient;

/// Application version from Cargo.toml
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Application name
pub const NAME: &str = env!("CARGO_PKG_NAME");
