//! Knowledge-graph API configuration types

use std::time::Duration;

use secrecy::SecretString;
use serde::{Deserialize, Serialize};

use super::{normalize_base_url, serialize_secret};

/// Knowledge-graph REST endpoint and credentials
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KnowledgeGraphConfig {
    /// Base URL of the API (without the `/api` suffix)
    #[serde(default)]
    pub url: String,
    /// Bearer token
    #[serde(serialize_with = "serialize_secret", default = "default_kg_token")]
    pub token: SecretString,
    /// Per-request timeout
    #[serde(with = "humantime_serde", default = "default_timeout")]
    pub timeout: Duration,
}

impl Default for KnowledgeGraphConfig {
    fn default() -> Self {
        KnowledgeGraphConfig {
            url: String::new(),
            token: default_kg_token(),
            timeout: default_timeout(),
        }
    }
}

fn default_kg_token() -> SecretString {
    SecretString::from("enigma-kg-local".to_string())
}

fn default_timeout() -> Duration {
    Duration::from_secs(30)
}

impl KnowledgeGraphConfig {
    /// An endpoint is present
    pub fn is_configured(&self) -> bool {
        !self.url.trim().is_empty()
    }

    /// URL with surrounding whitespace and trailing slash removed
    pub fn normalized_url(&self) -> String {
        normalize_base_url(&self.url)
    }
}
