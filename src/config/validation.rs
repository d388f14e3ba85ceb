//! Configuration validation
//!
//! Validates configuration and reports issues.

use secrecy::ExposeSecret;

use super::types::AppConfig;
use crate::gateway::build_gateway_url;

/// Result of configuration validation
#[derive(Debug, Clone)]
pub struct ConfigValidationResult {
    /// Whether the config is valid
    pub valid: bool,
    /// Validation errors (critical)
    pub errors: Vec<ValidationIssue>,
    /// Validation warnings (non-critical)
    pub warnings: Vec<ValidationIssue>,
}

impl ConfigValidationResult {
    /// Create a valid result
    pub fn valid() -> Self {
        ConfigValidationResult {
            valid: true,
            errors: Vec::new(),
            warnings: Vec::new(),
        }
    }

    /// Add an error
    pub fn with_error(mut self, issue: ValidationIssue) -> Self {
        self.valid = false;
        self.errors.push(issue);
        self
    }

    /// Add a warning
    pub fn with_warning(mut self, issue: ValidationIssue) -> Self {
        self.warnings.push(issue);
        self
    }
}

/// A validation issue
#[derive(Debug, Clone)]
pub struct ValidationIssue {
    /// Path to the config field
    pub path: String,
    /// Issue message
    pub message: String,
    /// Suggested fix
    pub suggestion: Option<String>,
}

impl ValidationIssue {
    /// Create a new issue
    pub fn new(path: impl Into<String>, message: impl Into<String>) -> Self {
        ValidationIssue {
            path: path.into(),
            message: message.into(),
            suggestion: None,
        }
    }

    /// Add a suggestion
    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestion = Some(suggestion.into());
        self
    }
}

/// Validate the configuration
pub fn validate_config(config: &AppConfig) -> ConfigValidationResult {
    let result = ConfigValidationResult::valid();
    let result = validate_gateway_config(config, result);
    validate_kg_config(config, result)
}

fn validate_gateway_config(config: &AppConfig, mut result: ConfigValidationResult) -> ConfigValidationResult {
    let gateway = &config.gateway;

    if gateway.url.trim().is_empty() {
        result = result.with_error(
            ValidationIssue::new("gateway.url", "Gateway URL is not set")
                .with_suggestion("Set CLAWLINK_GATEWAY_URL or run `clawlink config set gateway.url <url>`"),
        );
    } else if let Err(e) = build_gateway_url(&gateway.url) {
        result = result.with_error(ValidationIssue::new("gateway.url", e.to_string()));
    }

    if gateway.token.expose_secret().is_empty() {
        result = result.with_error(
            ValidationIssue::new("gateway.token", "Gateway token is not set")
                .with_suggestion("Set CLAWLINK_GATEWAY_TOKEN"),
        );
    }

    if gateway.session_key.trim().is_empty() {
        result = result.with_warning(ValidationIssue::new(
            "gateway.session_key",
            "Empty session key; the gateway will route messages to its default session",
        ));
    }

    result
}

fn validate_kg_config(config: &AppConfig, mut result: ConfigValidationResult) -> ConfigValidationResult {
    let kg = &config.knowledge_graph;

    if !kg.is_configured() {
        return result.with_warning(
            ValidationIssue::new("knowledge_graph.url", "Knowledge graph API not configured")
                .with_suggestion("Set CLAWLINK_KG_URL to enable the `kg` commands"),
        );
    }

    if let Err(e) = url::Url::parse(&kg.normalized_url()) {
        result = result.with_error(ValidationIssue::new(
            "knowledge_graph.url",
            format!("Invalid URL: {}", e),
        ));
    }

    if kg.timeout.is_zero() {
        result = result.with_error(ValidationIssue::new(
            "knowledge_graph.timeout",
            "Timeout must be greater than zero",
        ));
    }

    result
}
