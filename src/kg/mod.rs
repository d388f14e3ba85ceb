//! Knowledge graph
//!
//! Read-only access to the agent's knowledge-graph REST API: entities,
//! facts, relationships, tasks and search.

pub mod client;
pub mod types;

pub use client::KnowledgeGraphClient;
pub use types::*;
