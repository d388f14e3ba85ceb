//! Gateway configuration types

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};

use super::{default_secret, normalize_base_url, serialize_secret};

/// Gateway endpoint and credentials
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    /// Base URL of the gateway (http, https, ws, wss or bare host)
    #[serde(default)]
    pub url: String,
    /// Token sent in the Socket.IO handshake
    #[serde(serialize_with = "serialize_secret", default = "default_secret")]
    pub token: SecretString,
    /// Chat session key sent with outgoing messages
    #[serde(default = "default_session_key")]
    pub session_key: String,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        GatewayConfig {
            url: String::new(),
            token: default_secret(),
            session_key: default_session_key(),
        }
    }
}

fn default_session_key() -> String {
    "mobile".to_string()
}

impl GatewayConfig {
    /// Both endpoint and token are present
    pub fn is_configured(&self) -> bool {
        !self.url.trim().is_empty() && !self.token.expose_secret().is_empty()
    }

    /// URL with surrounding whitespace and trailing slash removed
    pub fn normalized_url(&self) -> String {
        normalize_base_url(&self.url)
    }
}
