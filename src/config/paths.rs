//! Configuration paths
//!
//! `CLAWLINK_CONFIG` names the file outright. Otherwise the file lives in
//! `CLAWLINK_CONFIG_DIR` or the platform config directory, as `config.json`
//! unless only a `config.toml` exists there.

use std::path::{Path, PathBuf};

const APP_DIR: &str = "clawlink";
const JSON_FILE: &str = "config.json";
const TOML_FILE: &str = "config.toml";

/// Directory holding the configuration file
pub fn config_dir() -> PathBuf {
    dir_from(|key| std::env::var(key).ok())
}

/// Configuration file path
pub fn config_path() -> PathBuf {
    path_from(|key| std::env::var(key).ok())
}

fn dir_from<F>(lookup: F) -> PathBuf
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(dir) = lookup("CLAWLINK_CONFIG_DIR").filter(|d| !d.is_empty()) {
        return PathBuf::from(dir);
    }

    dirs::config_dir()
        .or_else(|| dirs::home_dir().map(|h| h.join(".config")))
        .map(|d| d.join(APP_DIR))
        .unwrap_or_else(|| PathBuf::from(format!(".{}", APP_DIR)))
}

fn path_from<F>(lookup: F) -> PathBuf
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(path) = lookup("CLAWLINK_CONFIG").filter(|p| !p.is_empty()) {
        return PathBuf::from(path);
    }
    file_in(&dir_from(lookup))
}

fn file_in(dir: &Path) -> PathBuf {
    let json = dir.join(JSON_FILE);
    let toml = dir.join(TOML_FILE);
    if !json.exists() && toml.exists() {
        toml
    } else {
        json
    }
}
