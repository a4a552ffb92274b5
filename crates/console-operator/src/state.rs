//! Management state dispatch.

use console_operator_client::{ManagementState, OperatorStatus};

use crate::error::OperatorError;

/// What a cycle does for a given management state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Branch {
    /// Hand the working copy to the reconciler.
    Converge,
    /// Leave the cluster alone.
    Skip,
    /// Tear down every owned resource.
    Teardown,
}

/// Maps a declared state onto a branch. Unrecognized values are an error for
/// this cycle only.
pub fn classify(state: &ManagementState) -> Result<Branch, OperatorError> {
    match state {
        ManagementState::Managed => Ok(Branch::Converge),
        ManagementState::Unmanaged => Ok(Branch::Skip),
        ManagementState::Removed => Ok(Branch::Teardown),
        ManagementState::Unknown(value) => {
            Err(OperatorError::UnknownManagementState(value.clone()))
        }
    }
}

/// Result of a successful cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncOutcome {
    Unmanaged,
    Removed,
    Reconciled(OperatorStatus),
}
