//! Configuration I/O - Loading and saving configuration
//!
//! Handles reading configuration from files and environment variables.

use std::path::Path;

use secrecy::SecretString;

use super::types::AppConfig;
use crate::error::{Error, Result};

/// A snapshot of the configuration file
#[derive(Debug, Clone)]
pub struct ConfigSnapshot {
    /// Path to the config file
    pub path: std::path::PathBuf,
    /// Whether the file exists
    pub exists: bool,
    /// Parsed configuration
    pub config: Option<AppConfig>,
    /// Problems found while reading or parsing
    pub issues: Vec<String>,
}

/// Load configuration with layered precedence:
/// 1. Config file (config.json) if it exists, otherwise defaults
/// 2. Environment variable overrides (includes .env)
pub fn load_config() -> Result<AppConfig> {
    let config_path = super::paths::config_path();

    let mut config = if config_path.exists() {
        load_config_from_path(&config_path)?
    } else {
        AppConfig::default()
    };

    apply_env_overrides(&mut config);

    Ok(config)
}

/// Load configuration from a specific path
pub fn load_config_from_path(path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path).map_err(|e| {
        Error::Config(format!("Failed to read config file {}: {}", path.display(), e))
    })?;

    let config: AppConfig = if path.extension().map_or(false, |ext| ext == "json") {
        json5::from_str(&content).map_err(|e| Error::Config(format!("Invalid JSON config: {}", e)))?
    } else if path.extension().map_or(false, |ext| ext == "toml") {
        toml::from_str(&content).map_err(|e| Error::Config(format!("Invalid TOML config: {}", e)))?
    } else {
        json5::from_str(&content)
            .or_else(|_| toml::from_str(&content).map_err(|e| Error::Config(e.to_string())))
            .map_err(|e| Error::Config(format!("Failed to parse config: {}", e)))?
    };

    Ok(config)
}

/// Apply environment variable overrides to an existing config.
///
/// Loads `.env` first, then overlays any set `CLAWLINK_*` variables.
pub fn apply_env_overrides(config: &mut AppConfig) {
    dotenvy::dotenv().ok();
    apply_overrides_from(config, |key| std::env::var(key).ok());
}

fn apply_overrides_from<F>(config: &mut AppConfig, lookup: F)
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(url) = lookup("CLAWLINK_GATEWAY_URL") {
        config.gateway.url = url;
    }
    if let Some(token) = lookup("CLAWLINK_GATEWAY_TOKEN") {
        config.gateway.token = SecretString::from(token);
    }
    if let Some(key) = lookup("CLAWLINK_SESSION_KEY") {
        config.gateway.session_key = key;
    }

    if let Some(url) = lookup("CLAWLINK_KG_URL") {
        config.knowledge_graph.url = url;
    }
    if let Some(token) = lookup("CLAWLINK_KG_TOKEN") {
        config.knowledge_graph.token = SecretString::from(token);
    }
    if let Some(timeout) = lookup("CLAWLINK_KG_TIMEOUT") {
        match humantime_serde::re::humantime::parse_duration(&timeout) {
            Ok(v) => config.knowledge_graph.timeout = v,
            Err(e) => tracing::warn!("Ignoring CLAWLINK_KG_TIMEOUT={}: {}", timeout, e),
        }
    }
}

/// Save configuration to a file
pub fn save_config(config: &AppConfig, path: &Path) -> Result<()> {
    let content = if path.extension().map_or(false, |ext| ext == "toml") {
        toml::to_string_pretty(config).map_err(|e| Error::Config(format!("Failed to serialize config: {}", e)))?
    } else {
        serde_json::to_string_pretty(config).map_err(|e| Error::Config(format!("Failed to serialize config: {}", e)))?
    };

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    std::fs::write(path, content)?;
    Ok(())
}

/// Read a configuration file into a snapshot
pub fn read_config_snapshot(path: &Path) -> ConfigSnapshot {
    if !path.exists() {
        return ConfigSnapshot {
            path: path.to_path_buf(),
            exists: false,
            config: None,
            issues: vec!["Configuration file does not exist".to_string()],
        };
    }

    match load_config_from_path(path) {
        Ok(config) => ConfigSnapshot {
            path: path.to_path_buf(),
            exists: true,
            config: Some(config),
            issues: Vec::new(),
        },
        Err(e) => ConfigSnapshot {
            path: path.to_path_buf(),
            exists: true,
            config: None,
            issues: vec![e.to_string()],
        },
    }
}
