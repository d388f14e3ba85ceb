//! Error types for ClawLink

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type alias using ClawLink's Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for ClawLink
#[derive(Error, Debug)]
pub enum Error {
    /// A required endpoint or token is missing
    #[error("Not configured: {0}")]
    NotConfigured(String),

    /// Endpoint could not be turned into a usable URL
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    /// Socket-level failure while connecting, sending or receiving
    #[error("Transport failure: {0}")]
    Transport(String),

    /// A frame or payload could not be decoded
    #[error("Decode failure: {0}")]
    Decode(String),

    /// Operation requires a ready gateway connection
    #[error("Not connected to gateway")]
    NotConnected,

    /// Non-2xx response from a REST endpoint
    #[error("HTTP {status}: {body}")]
    Remote {
        /// HTTP status code
        status: u16,
        /// Response body as text
        body: String,
    },

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// HTTP request error
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

/// Coarse error category kept in observable state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    NotConfigured,
    InvalidUrl,
    Transport,
    Decode,
    NotConnected,
    Remote,
    Config,
    Internal,
}

impl Error {
    /// Category of this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::NotConfigured(_) => ErrorKind::NotConfigured,
            Error::InvalidUrl(_) => ErrorKind::InvalidUrl,
            Error::Transport(_) | Error::Http(_) => ErrorKind::Transport,
            Error::Decode(_) | Error::Json(_) => ErrorKind::Decode,
            Error::NotConnected => ErrorKind::NotConnected,
            Error::Remote { .. } => ErrorKind::Remote,
            Error::Config(_) => ErrorKind::Config,
            Error::Io(_) | Error::InvalidInput(_) => ErrorKind::Internal,
        }
    }

    /// Check if error is retryable
    pub fn is_retryable(&self) -> bool {
        match self {
            Error::Transport(_) | Error::Http(_) | Error::NotConnected => true,
            Error::Remote { status, .. } => *status >= 500 || *status == 429,
            _ => false,
        }
    }

    /// Check if error is a client error (user's fault)
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            Error::NotConfigured(_) | Error::InvalidUrl(_) | Error::InvalidInput(_)
        )
    }
}

impl From<tokio_tungstenite::tungstenite::Error> for Error {
    fn from(err: tokio_tungstenite::tungstenite::Error) -> Self {
        Error::Transport(err.to_string())
    }
}

impl From<url::ParseError> for Error {
    fn from(err: url::ParseError) -> Self {
        Error::InvalidUrl(err.to_string())
    }
}
