//! # console-operator-client
//!
//! Cluster access layer for the console operator.
//!
//! This crate defines the narrow object types the operator works with, the
//! [`ConfigReader`] and [`ResourceClient`] traits the reconciliation loop is
//! written against, and two backends:
//!
//! - [`KubeCluster`]: a live API server via `kube`
//! - [`InMemoryCluster`]: maps plus a call log, for tests and dry runs
//!
//! ## Example
//!
//! ```ignore
//! use console_operator_client::{ConfigReader, InMemoryCluster, ManagementState};
//!
//! let cluster = InMemoryCluster::with_configs(ManagementState::Removed);
//! let operator = cluster.operator_config("cluster").await?;
//! assert_eq!(operator.spec.management_state, ManagementState::Removed);
//! ```

mod error;
pub mod events;
pub mod kubernetes;
pub mod memory;
pub mod names;
mod traits;
mod types;

pub use error::{ClientError, ErrorCategory};
pub use events::{EventRecord, EventRecorder, EventType, MemoryRecorder, TracingRecorder};
pub use kubernetes::KubeCluster;
pub use memory::{Call, InMemoryCluster, Verb};
pub use traits::{ConfigReader, ResourceClient};
pub use types::{
    ApplyOutcome, Condition, ConfigMap, ConsoleAuthentication, ConsoleConfig, ConsoleConfigSpec,
    ConsoleConfigStatus, IdentityProvider, InfrastructureConfig, InfrastructureStatus, LogLevel,
    ManagementState, Metadata, OAuthClient, OAuthConfig, OAuthSpec, ObjectRef, OperatorConfig,
    OperatorSpec, OperatorStatus, ProxyConfig, ProxySpec, ProxyStatus, ResourceKind,
};

/// Type alias for a client result.
pub type ClientResult<T> = Result<T, ClientError>;

/// Shareable configuration reader.
pub type DynConfigReader = std::sync::Arc<dyn ConfigReader>;

/// Shareable resource client.
pub type DynResourceClient = std::sync::Arc<dyn ResourceClient>;
