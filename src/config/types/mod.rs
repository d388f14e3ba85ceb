//! Configuration types module
//!
//! Splits the client configuration into the two backends it talks to.

pub mod gateway;
pub mod knowledge_graph;

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize, Serializer};

use crate::error::Error;

/// Main application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Real-time gateway configuration
    #[serde(default)]
    pub gateway: gateway::GatewayConfig,

    /// Knowledge-graph REST API configuration
    #[serde(default, alias = "kg")]
    pub knowledge_graph: knowledge_graph::KnowledgeGraphConfig,
}

impl AppConfig {
    /// Load configuration from the config file and environment
    ///
    /// Precedence, lowest first:
    /// 1. Default values
    /// 2. Config file (if present)
    /// 3. Environment variable overrides
    pub fn from_env() -> crate::error::Result<Self> {
        crate::config::load_config()
    }

    /// Keys accepted by [`AppConfig::set_value`]
    pub const KEYS: [&'static str; 6] = [
        "gateway.url",
        "gateway.token",
        "gateway.session_key",
        "kg.url",
        "kg.token",
        "kg.timeout",
    ];

    /// Set one field from its dotted key
    pub fn set_value(&mut self, key: &str, value: &str) -> crate::error::Result<()> {
        match key {
            "gateway.url" => self.gateway.url = value.to_string(),
            "gateway.token" => self.gateway.token = SecretString::from(value.to_string()),
            "gateway.session_key" => self.gateway.session_key = value.to_string(),
            "kg.url" | "knowledge_graph.url" => self.knowledge_graph.url = value.to_string(),
            "kg.token" | "knowledge_graph.token" => {
                self.knowledge_graph.token = SecretString::from(value.to_string())
            }
            "kg.timeout" | "knowledge_graph.timeout" => {
                self.knowledge_graph.timeout = humantime_serde::re::humantime::parse_duration(value)
                    .map_err(|e| Error::InvalidInput(format!("{}: {}", key, e)))?
            }
            _ => {
                return Err(Error::InvalidInput(format!(
                    "Unknown key '{}'; expected one of: {}",
                    key,
                    Self::KEYS.join(", ")
                )))
            }
        }
        Ok(())
    }
}

pub(crate) fn default_secret() -> SecretString {
    SecretString::from(String::new())
}

/// Tokens are persisted so the store survives restarts.
pub(crate) fn serialize_secret<S>(secret: &SecretString, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    serializer.serialize_str(secret.expose_secret())
}

/// Trim whitespace and drop a single trailing slash
pub(crate) fn normalize_base_url(raw: &str) -> String {
    let trimmed = raw.trim();
    trimmed.strip_suffix('/').unwrap_or(trimmed).to_string()
}
