//! Managed-state convergence contract.

use async_trait::async_trait;
use console_operator_client::{OperatorConfig, OperatorStatus};

use crate::error::BoxError;
use crate::snapshot::ConfigSet;

/// Drives the console towards the state described by the operator config.
///
/// Called only when the management state is `Managed`. Implementations must
/// be idempotent: the same inputs may be delivered any number of times.
/// `working` is a private copy of the operator config and may be modified
/// freely; the returned status is a new value.
#[async_trait]
pub trait Reconciler: Send + Sync {
    async fn reconcile(
        &self,
        working: OperatorConfig,
        configs: &ConfigSet,
    ) -> Result<OperatorStatus, BoxError>;
}

/// Reconciler that only records the generation it has seen.
#[derive(Debug, Clone, Copy, Default)]
pub struct ObservedGenerationReconciler;

#[async_trait]
impl Reconciler for ObservedGenerationReconciler {
    async fn reconcile(
        &self,
        working: OperatorConfig,
        _configs: &ConfigSet,
    ) -> Result<OperatorStatus, BoxError> {
        let mut status = working.status;
        status.observed_generation = working.metadata.generation;
        Ok(status)
    }
}
