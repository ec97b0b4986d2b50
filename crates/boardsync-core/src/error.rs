//! Unified error types for BoardSync.
//!
//! All crates map their internal errors into [`CollabError`] for consistent
//! propagation through the ? operator.

use std::fmt;
use thiserror::Error;

/// Top-level error kind categorization used across the collaboration layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum ErrorKind {
    /// The transport to the session layer could not be established at all.
    SessionUnavailable,
    /// A recoverable transport error; the lifecycle controller retries.
    TransientTransport,
    /// The reconnect attempt budget was exhausted; the attachment is dead.
    RetryExhausted,
    /// An operation exceeded its deadline.
    Timeout,
    /// Input validation failed.
    Validation,
    /// A serialization/deserialization error occurred.
    Serialization,
    /// A configuration error occurred.
    Configuration,
    /// The operation was attempted on a closed session or controller.
    Closed,
    /// An internal error occurred.
    Internal,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SessionUnavailable => write!(f, "SESSION_UNAVAILABLE"),
            Self::TransientTransport => write!(f, "TRANSIENT_TRANSPORT"),
            Self::RetryExhausted => write!(f, "RETRY_EXHAUSTED"),
            Self::Timeout => write!(f, "TIMEOUT"),
            Self::Validation => write!(f, "VALIDATION"),
            Self::Serialization => write!(f, "SERIALIZATION"),
            Self::Configuration => write!(f, "CONFIGURATION"),
            Self::Closed => write!(f, "CLOSED"),
            Self::Internal => write!(f, "INTERNAL"),
        }
    }
}

/// The unified error used throughout BoardSync.
///
/// Crate-specific errors are mapped into `CollabError` using `From` impls
/// or explicit `.map_err()` calls. This provides a single error type at the
/// library boundary.
#[derive(Debug, Error)]
#[error("{kind}: {message}")]
pub struct CollabError {
    /// The category of error.
    pub kind: ErrorKind,
    /// A human-readable error message.
    pub message: String,
    /// Optional underlying cause.
    #[source]
    pub source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl CollabError {
    /// Create a new error.
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            source: None,
        }
    }

    /// Create a new error with an underlying cause.
    pub fn with_source(
        kind: ErrorKind,
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self {
            kind,
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Create a session-unavailable error.
    pub fn session_unavailable(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::SessionUnavailable, message)
    }

    /// Create a transient transport error.
    pub fn transient_transport(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::TransientTransport, message)
    }

    /// Create a retry-exhausted error.
    pub fn retry_exhausted(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::RetryExhausted, message)
    }

    /// Create a timeout error.
    pub fn timeout(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Timeout, message)
    }

    /// Create a validation error.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Validation, message)
    }

    /// Create a configuration error.
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Configuration, message)
    }

    /// Create a closed error.
    pub fn closed(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Closed, message)
    }

    /// Create an internal error.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Internal, message)
    }

    /// Whether the lifecycle controller may retry after this error.
    pub fn is_transient(&self) -> bool {
        matches!(
            self.kind,
            ErrorKind::TransientTransport | ErrorKind::Timeout
        )
    }
}

impl Clone for CollabError {
    fn clone(&self) -> Self {
        Self {
            kind: self.kind,
            message: self.message.clone(),
            source: None,
        }
    }
}

impl From<serde_json::Error> for CollabError {
    fn from(err: serde_json::Error) -> Self {
        Self::with_source(
            ErrorKind::Serialization,
            format!("JSON serialization error: {err}"),
            err,
        )
    }
}

impl From<std::io::Error> for CollabError {
    fn from(err: std::io::Error) -> Self {
        Self::with_source(
            ErrorKind::TransientTransport,
            format!("I/O error: {err}"),
            err,
        )
    }
}

impl From<config::ConfigError> for CollabError {
    fn from(err: config::ConfigError) -> Self {
        Self::with_source(
            ErrorKind::Configuration,
            format!("Configuration error: {err}"),
            err,
        )
    }
}
