//! Cluster access traits.
//!
//! The reconciliation loop only ever talks to the cluster through these two
//! traits, so a backend is anything that can answer them: the Kubernetes API
//! ([`crate::KubeCluster`]) or the in-memory cluster used in tests
//! ([`crate::InMemoryCluster`]).

use async_trait::async_trait;

use crate::error::ClientError;
use crate::types::{
    ApplyOutcome, ConfigMap, ConsoleConfig, InfrastructureConfig, OAuthClient, OAuthConfig,
    OperatorConfig, ProxyConfig,
};

/// Read access to the singleton configuration objects.
///
/// Each getter addresses one object by its singleton name. A missing object
/// is reported as [`ClientError::NotFound`].
#[async_trait]
pub trait ConfigReader: Send + Sync {
    /// Reads the operator's own configuration.
    async fn operator_config(&self, name: &str) -> Result<OperatorConfig, ClientError>;

    /// Reads the cluster-wide console configuration.
    async fn console_config(&self, name: &str) -> Result<ConsoleConfig, ClientError>;

    /// Reads the infrastructure configuration (API server URL, platform).
    async fn infrastructure_config(&self, name: &str)
    -> Result<InfrastructureConfig, ClientError>;

    /// Reads the cluster proxy configuration.
    async fn proxy_config(&self, name: &str) -> Result<ProxyConfig, ClientError>;

    /// Reads the cluster OAuth configuration.
    async fn oauth_config(&self, name: &str) -> Result<OAuthConfig, ClientError>;
}

/// Access to the objects the operator creates or modifies.
#[async_trait]
pub trait ResourceClient: Send + Sync {
    // ==================== Config maps ====================

    async fn get_config_map(&self, namespace: &str, name: &str)
    -> Result<ConfigMap, ClientError>;

    /// Deletes a config map.
    ///
    /// # Errors
    ///
    /// Returns `ClientError::NotFound` if it does not exist.
    async fn delete_config_map(&self, namespace: &str, name: &str) -> Result<(), ClientError>;

    /// Creates the config map, or updates its data when it differs.
    ///
    /// Returns the stored object and whether anything was written.
    async fn apply_config_map(
        &self,
        config_map: &ConfigMap,
    ) -> Result<(ConfigMap, ApplyOutcome), ClientError>;

    // ==================== Secrets and workloads ====================

    /// # Errors
    ///
    /// Returns `ClientError::NotFound` if the secret does not exist.
    async fn delete_secret(&self, namespace: &str, name: &str) -> Result<(), ClientError>;

    /// # Errors
    ///
    /// Returns `ClientError::NotFound` if the deployment does not exist.
    async fn delete_deployment(&self, namespace: &str, name: &str) -> Result<(), ClientError>;

    // ==================== OAuth clients ====================

    async fn get_oauth_client(&self, name: &str) -> Result<OAuthClient, ClientError>;

    /// Replaces an OAuth client.
    ///
    /// # Errors
    ///
    /// Returns `ClientError::Conflict` if the stored resource version moved on.
    async fn update_oauth_client(&self, client: &OAuthClient) -> Result<OAuthClient, ClientError>;
}
