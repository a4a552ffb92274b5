//! Client error types for the cluster access layer.
//!
//! Every backend maps its native failures onto [`ClientError`] so the
//! reconciliation loop can apply one policy regardless of where the call went.

use std::fmt;

/// Errors that can occur while talking to the cluster.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ClientError {
    /// The requested object does not exist.
    #[error("{kind} \"{name}\" not found")]
    NotFound {
        /// Kind of the missing object.
        kind: String,
        /// Namespaced name (`namespace/name`) or cluster-scoped name.
        name: String,
    },

    /// A write lost an optimistic concurrency race.
    #[error("Conflict on {kind} \"{name}\": {message}")]
    Conflict {
        kind: String,
        name: String,
        message: String,
    },

    /// The API server rejected the request.
    #[error("API error ({code}): {message}")]
    Api {
        /// HTTP status code returned by the server.
        code: u16,
        /// Server supplied message.
        message: String,
    },

    /// The request never reached the server or the connection dropped.
    #[error("Transport error: {message}")]
    Transport { message: String },

    /// An object could not be converted to or from its wire form.
    #[error("Serialization error: {message}")]
    Serialization { message: String },
}

impl ClientError {
    /// Creates a new `NotFound` error.
    #[must_use]
    pub fn not_found(kind: impl Into<String>, name: impl Into<String>) -> Self {
        Self::NotFound {
            kind: kind.into(),
            name: name.into(),
        }
    }

    /// Creates a new `Conflict` error.
    #[must_use]
    pub fn conflict(
        kind: impl Into<String>,
        name: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::Conflict {
            kind: kind.into(),
            name: name.into(),
            message: message.into(),
        }
    }

    /// Creates a new `Api` error.
    #[must_use]
    pub fn api(code: u16, message: impl Into<String>) -> Self {
        Self::Api {
            code,
            message: message.into(),
        }
    }

    /// Creates a new `Transport` error.
    #[must_use]
    pub fn transport(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
        }
    }

    /// Creates a new `Serialization` error.
    #[must_use]
    pub fn serialization(message: impl Into<String>) -> Self {
        Self::Serialization {
            message: message.into(),
        }
    }

    /// Returns `true` if the target object does not exist.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    /// Returns `true` if this is a write conflict.
    #[must_use]
    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::Conflict { .. })
    }

    /// Returns the error category for logging purposes.
    #[must_use]
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::NotFound { .. } => ErrorCategory::NotFound,
            Self::Conflict { .. } => ErrorCategory::Conflict,
            Self::Api { .. } => ErrorCategory::Server,
            Self::Transport { .. } => ErrorCategory::Infrastructure,
            Self::Serialization { .. } => ErrorCategory::Internal,
        }
    }
}

/// Categories of client errors for logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    NotFound,
    Conflict,
    /// Rejected by the API server.
    Server,
    /// Connection level failure.
    Infrastructure,
    Internal,
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotFound => write!(f, "not_found"),
            Self::Conflict => write!(f, "conflict"),
            Self::Server => write!(f, "server"),
            Self::Infrastructure => write!(f, "infrastructure"),
            Self::Internal => write!(f, "internal"),
        }
    }
}
