//! # console-operator
//!
//! Reconciliation loop that keeps the cluster console in the state declared
//! by its operator config.
//!
//! Each sync cycle reads the configuration singletons ([`fetch_configs`]),
//! then acts on the management state:
//!
//! - `Managed`: hands a private copy of the operator config to a [`Reconciler`]
//! - `Unmanaged`: does nothing
//! - `Removed`: tears down every owned resource with [`RemovalExecutor`]
//!
//! Cycles are scheduled by a [`Controller`] that listens to filtered change
//! notifications, resyncs periodically and retries failures with backoff.

pub mod controller;
pub mod error;
pub mod filter;
pub mod observability;
pub mod operator;
pub mod reconciler;
pub mod removal;
pub mod settings;
pub mod snapshot;
pub mod state;

pub use controller::{
    BackoffPolicy, Controller, ControllerBuilder, ControllerStats, SyncContext, SyncHandler,
    TriggerReason,
};
pub use error::{BoxError, OperatorError, RemovalError, RemovalFailure};
pub use filter::{EventFilterFn, NamesFilter, names_filter};
pub use operator::{
    CONTROLLER_NAME, ConsoleEventSources, ConsoleOperator, OperatorContext, console_controller,
};
pub use reconciler::{ObservedGenerationReconciler, Reconciler};
pub use removal::{RemovalExecutor, TeardownAction, owned_resources};
pub use settings::OperatorSettings;
pub use snapshot::{ConfigSet, fetch_configs};
pub use state::{Branch, SyncOutcome, classify};
