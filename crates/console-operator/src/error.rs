//! Error types for the reconciliation cycle.

use std::fmt;

use console_operator_client::{ClientError, ObjectRef, ResourceKind};

/// Boxed error returned by the managed-state reconciler.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Errors that end a sync cycle. Every variant is retried by the controller.
#[derive(Debug, thiserror::Error)]
pub enum OperatorError {
    /// A configuration singleton could not be read; nothing was mutated.
    #[error("failed to retrieve {kind} \"{name}\": {source}")]
    ConfigFetch {
        kind: ResourceKind,
        name: String,
        #[source]
        source: ClientError,
    },

    /// The operator config declares a management state this operator does
    /// not understand.
    #[error("console is in an unknown state: {0}")]
    UnknownManagementState(String),

    /// One or more teardown steps failed for a reason other than not found.
    #[error(transparent)]
    Removal(#[from] RemovalError),

    /// Returned unchanged from the managed-state reconciler.
    #[error("{0}")]
    Reconcile(BoxError),

    /// The controller was asked to stop while the cycle was in flight.
    #[error("sync cancelled")]
    Cancelled,

    /// The controller was assembled incorrectly.
    #[error("invalid controller setup: {0}")]
    Setup(String),
}

impl OperatorError {
    pub fn config_fetch(kind: ResourceKind, name: impl Into<String>, source: ClientError) -> Self {
        Self::ConfigFetch {
            kind,
            name: name.into(),
            source,
        }
    }

    pub fn setup(msg: impl Into<String>) -> Self {
        Self::Setup(msg.into())
    }

    /// Short label for logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::ConfigFetch { .. } => "config_fetch",
            Self::UnknownManagementState(_) => "unknown_management_state",
            Self::Removal(_) => "removal",
            Self::Reconcile(_) => "reconcile",
            Self::Cancelled => "cancelled",
            Self::Setup(_) => "setup",
        }
    }
}

/// One teardown step that failed.
#[derive(Debug, Clone)]
pub struct RemovalFailure {
    pub target: ObjectRef,
    pub error: ClientError,
}

impl fmt::Display for RemovalFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.target, self.error)
    }
}

/// Aggregate of the teardown failures left after ignorable errors were
/// filtered out. Never empty.
#[derive(Debug, Clone)]
pub struct RemovalError {
    failures: Vec<RemovalFailure>,
}

impl RemovalError {
    /// Builds the aggregate, or `None` when there is nothing to report.
    pub fn from_failures(failures: Vec<RemovalFailure>) -> Option<Self> {
        if failures.is_empty() {
            None
        } else {
            Some(Self { failures })
        }
    }

    pub fn failures(&self) -> &[RemovalFailure] {
        &self.failures
    }

    pub fn len(&self) -> usize {
        self.failures.len()
    }

    pub fn is_empty(&self) -> bool {
        self.failures.is_empty()
    }
}

impl fmt::Display for RemovalError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let [only] = self.failures.as_slice() {
            return write!(f, "{only}");
        }
        write!(f, "[")?;
        for (i, failure) in self.failures.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{failure}")?;
        }
        write!(f, "]")
    }
}

impl std::error::Error for RemovalError {}
