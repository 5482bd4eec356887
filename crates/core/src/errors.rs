//! Error types

use thiserror::Error;

use crate::Channel;

/// Payload validation failures
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum NormalizeError {
    #[error("{channel} payload is not a JSON object")]
    NotAnObject { channel: Channel },

    #[error("missing field `{field}` in {channel} payload")]
    MissingField { channel: Channel, field: &'static str },

    #[error("field `{field}` is not a valid number: {value}")]
    InvalidNumber { field: &'static str, value: String },

    #[error("field `{field}` is not a string")]
    InvalidString { field: &'static str },
}

/// Transport session errors
#[derive(Debug, Error)]
pub enum FeedError {
    #[error("WebSocket connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Handshake failed: {0}")]
    HandshakeFailed(String),

    #[error("Server error {code}: {message}")]
    Server { code: u32, message: String },

    #[error("Invalid message format: {0}")]
    InvalidMessage(String),

    #[error("{0}")]
    Disconnected(String),

    /// Server ended the session and asked the client not to come back
    #[error("{reason} ({code})")]
    Terminal { code: u32, reason: String },

    #[error("Timeout waiting for {0}")]
    Timeout(&'static str),

    #[error("Session already open")]
    AlreadyOpen,

    #[error("Session closed")]
    Closed,
}

impl FeedError {
    /// Reason string surfaced to the connection status
    pub fn reason(&self) -> String {
        match self {
            FeedError::Disconnected(reason) => reason.clone(),
            FeedError::Terminal { reason, .. } => reason.clone(),
            other => other.to_string(),
        }
    }

    /// Whether reconnecting after this error is pointless
    pub fn is_terminal(&self) -> bool {
        matches!(self, FeedError::Terminal { .. })
    }
}

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to load configuration: {0}")]
    Load(#[from] ::config::ConfigError),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Result type alias
pub type NormalizeResult<T> = Result<T, NormalizeError>;
pub type FeedResult<T> = Result<T, FeedError>;
pub type ConfigResult<T> = Result<T, ConfigError>;
