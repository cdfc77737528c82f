//! Error types for feedstate
//!
//! Two layers live here. `ErrorInfo` is the structured failure carried inside
//! `AsyncResult::Failed`; repositories translate whatever their backend
//! raised into one of these before it crosses into the state layer.
//! `FeedStateError` covers the crate's own fallible surface (configuration
//! loading, constructor validation).

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub type Result<T> = std::result::Result<T, FeedStateError>;

/// Outcome of a repository call before it is wrapped as an `AsyncResult`
pub type FetchResult<T> = std::result::Result<T, ErrorInfo>;

#[derive(Error, Debug)]
pub enum FeedStateError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Fetch failed: {0}")]
    Fetch(#[from] ErrorInfo),

    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("Failed to parse config: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("Missing required field: {0}")]
    MissingField(String),

    #[error("Invalid value for {field}: {reason}")]
    InvalidValue { field: String, reason: String },
}

/// Failure category surfaced to observers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Transport-level failure (offline, timeout, connection reset)
    Network,
    /// The requested entity or page does not exist
    NotFound,
    /// The backend refused the request for the current user
    Permission,
    /// Anything the repository could not classify
    Unknown,
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ErrorKind::Network => write!(f, "network"),
            ErrorKind::NotFound => write!(f, "not found"),
            ErrorKind::Permission => write!(f, "permission"),
            ErrorKind::Unknown => write!(f, "unknown"),
        }
    }
}

/// Structured failure cause: a kind plus a human-readable message
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[error("{kind} error: {message}")]
pub struct ErrorInfo {
    pub kind: ErrorKind,
    pub message: String,
}

impl ErrorInfo {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn network(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Network, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::NotFound, message)
    }

    pub fn permission(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Permission, message)
    }

    pub fn unknown(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Unknown, message)
    }

    /// Whether a user-initiated retry has a reasonable chance of succeeding
    pub fn is_retryable(&self) -> bool {
        matches!(self.kind, ErrorKind::Network | ErrorKind::Unknown)
    }
}
