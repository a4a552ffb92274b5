//! In-memory cluster backend.
//!
//! Implements [`ConfigReader`] and [`ResourceClient`] over plain maps, records
//! every call in order and lets callers inject failures for specific
//! `(verb, object)` pairs. Used by the operator's tests and for dry runs.

use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;

use crate::error::ClientError;
use crate::names::{
    CONFIG_MANAGED_NAMESPACE, CONFIG_RESOURCE_NAME, CONSOLE_CONFIG_MAP_NAME, CONSOLE_NAME,
    CONSOLE_OAUTH_SECRET_NAME, CONSOLE_PUBLIC_CONFIG_MAP_NAME, CONSOLE_URL_KEY,
    SERVICE_CA_CONFIG_MAP_NAME, TARGET_NAMESPACE,
};
use crate::traits::{ConfigReader, ResourceClient};
use crate::types::{
    ApplyOutcome, ConfigMap, ConsoleConfig, InfrastructureConfig, ManagementState, Metadata,
    OAuthClient, OAuthConfig, ObjectRef, OperatorConfig, ProxyConfig, ResourceKind,
};

/// Remote operation issued against the cluster.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Verb {
    Get,
    Delete,
    Update,
    Apply,
}

impl Verb {
    /// Returns `true` for verbs that can change cluster state.
    pub fn is_mutation(&self) -> bool {
        !matches!(self, Self::Get)
    }
}

/// One recorded call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Call {
    pub verb: Verb,
    pub target: ObjectRef,
}

type Key = (String, String);

fn key(namespace: &str, name: &str) -> Key {
    (namespace.to_string(), name.to_string())
}

#[derive(Debug, Default)]
struct ClusterState {
    operator_configs: HashMap<String, OperatorConfig>,
    console_configs: HashMap<String, ConsoleConfig>,
    infrastructures: HashMap<String, InfrastructureConfig>,
    proxies: HashMap<String, ProxyConfig>,
    oauths: HashMap<String, OAuthConfig>,
    config_maps: HashMap<Key, ConfigMap>,
    secrets: HashMap<Key, ()>,
    deployments: HashMap<Key, ()>,
    oauth_clients: HashMap<String, OAuthClient>,
}

/// In-memory stand-in for the cluster API.
#[derive(Debug)]
pub struct InMemoryCluster {
    state: Mutex<ClusterState>,
    calls: Mutex<Vec<Call>>,
    failures: Mutex<HashMap<(Verb, ObjectRef), ClientError>>,
    version_counter: AtomicU64,
}

impl Default for InMemoryCluster {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryCluster {
    /// Creates an empty cluster: every read reports not found.
    pub fn new() -> Self {
        Self {
            state: Mutex::new(ClusterState::default()),
            calls: Mutex::new(Vec::new()),
            failures: Mutex::new(HashMap::new()),
            version_counter: AtomicU64::new(1),
        }
    }

    /// Creates a cluster holding all five configuration singletons, with the
    /// operator config set to `state`.
    pub fn with_configs(state: ManagementState) -> Self {
        let cluster = Self::new();
        cluster.insert_operator_config(OperatorConfig::new(CONFIG_RESOURCE_NAME, state));
        cluster.insert_console_config(ConsoleConfig {
            metadata: Metadata::named(CONFIG_RESOURCE_NAME),
            ..ConsoleConfig::default()
        });
        cluster.insert_infrastructure_config(InfrastructureConfig {
            metadata: Metadata::named(CONFIG_RESOURCE_NAME),
            ..InfrastructureConfig::default()
        });
        cluster.insert_proxy_config(ProxyConfig {
            metadata: Metadata::named(CONFIG_RESOURCE_NAME),
            ..ProxyConfig::default()
        });
        cluster.insert_oauth_config(OAuthConfig {
            metadata: Metadata::named(CONFIG_RESOURCE_NAME),
            ..OAuthConfig::default()
        });
        cluster
    }

    /// Populates every object a managed console deployment leaves behind.
    pub fn with_console_resources(self, console_url: &str) -> Self {
        self.insert_config_map(ConfigMap::new(TARGET_NAMESPACE, CONSOLE_CONFIG_MAP_NAME));
        self.insert_config_map(ConfigMap::new(TARGET_NAMESPACE, SERVICE_CA_CONFIG_MAP_NAME));
        self.insert_secret(TARGET_NAMESPACE, CONSOLE_OAUTH_SECRET_NAME);
        self.insert_deployment(TARGET_NAMESPACE, CONSOLE_NAME);
        self.insert_oauth_client(OAuthClient {
            metadata: Metadata::named(CONSOLE_NAME),
            secret: Some("s3cr3t".to_string()),
            redirect_uris: vec![format!("{console_url}/auth/callback")],
            grant_method: Some("auto".to_string()),
        });
        self.insert_config_map(
            ConfigMap::new(CONFIG_MANAGED_NAMESPACE, CONSOLE_PUBLIC_CONFIG_MAP_NAME)
                .with_data(CONSOLE_URL_KEY, console_url),
        );
        self
    }

    // ==================== Seeding ====================

    pub fn insert_operator_config(&self, config: OperatorConfig) {
        self.with_state(|s| {
            s.operator_configs
                .insert(config.metadata.name.clone(), config);
        });
    }

    pub fn insert_console_config(&self, config: ConsoleConfig) {
        self.with_state(|s| {
            s.console_configs.insert(config.metadata.name.clone(), config);
        });
    }

    pub fn insert_infrastructure_config(&self, config: InfrastructureConfig) {
        self.with_state(|s| {
            s.infrastructures.insert(config.metadata.name.clone(), config);
        });
    }

    pub fn insert_proxy_config(&self, config: ProxyConfig) {
        self.with_state(|s| {
            s.proxies.insert(config.metadata.name.clone(), config);
        });
    }

    pub fn insert_oauth_config(&self, config: OAuthConfig) {
        self.with_state(|s| {
            s.oauths.insert(config.metadata.name.clone(), config);
        });
    }

    pub fn insert_config_map(&self, config_map: ConfigMap) {
        let k = key(config_map.namespace(), &config_map.metadata.name);
        self.with_state(|s| {
            s.config_maps.insert(k, config_map);
        });
    }

    pub fn insert_secret(&self, namespace: &str, name: &str) {
        self.with_state(|s| {
            s.secrets.insert(key(namespace, name), ());
        });
    }

    pub fn insert_deployment(&self, namespace: &str, name: &str) {
        self.with_state(|s| {
            s.deployments.insert(key(namespace, name), ());
        });
    }

    pub fn insert_oauth_client(&self, mut client: OAuthClient) {
        client.metadata.resource_version = Some(self.next_version());
        self.with_state(|s| {
            s.oauth_clients.insert(client.metadata.name.clone(), client);
        });
    }

    pub fn remove_operator_config(&self, name: &str) {
        self.with_state(|s| {
            s.operator_configs.remove(name);
        });
    }

    pub fn remove_console_config(&self, name: &str) {
        self.with_state(|s| {
            s.console_configs.remove(name);
        });
    }

    // ==================== Failure injection ====================

    /// Makes every `verb` call against `target` fail with `error`.
    pub fn fail(&self, verb: Verb, target: ObjectRef, error: ClientError) {
        if let Ok(mut failures) = self.failures.lock() {
            failures.insert((verb, target), error);
        }
    }

    pub fn clear_failures(&self) {
        if let Ok(mut failures) = self.failures.lock() {
            failures.clear();
        }
    }

    // ==================== Inspection ====================

    /// Every call issued so far, in order.
    pub fn calls(&self) -> Vec<Call> {
        self.calls
            .lock()
            .map(|calls| calls.clone())
            .unwrap_or_default()
    }

    /// Calls with the given verb, in order.
    pub fn calls_with(&self, verb: Verb) -> Vec<Call> {
        self.calls().into_iter().filter(|c| c.verb == verb).collect()
    }

    /// Calls that could have changed cluster state.
    pub fn mutations(&self) -> Vec<Call> {
        self.calls()
            .into_iter()
            .filter(|c| c.verb.is_mutation())
            .collect()
    }

    pub fn reset_calls(&self) {
        if let Ok(mut calls) = self.calls.lock() {
            calls.clear();
        }
    }

    pub fn config_map(&self, namespace: &str, name: &str) -> Option<ConfigMap> {
        self.read_state(|s| s.config_maps.get(&key(namespace, name)).cloned())
    }

    pub fn has_secret(&self, namespace: &str, name: &str) -> bool {
        self.read_state(|s| s.secrets.contains_key(&key(namespace, name)))
    }

    pub fn has_deployment(&self, namespace: &str, name: &str) -> bool {
        self.read_state(|s| s.deployments.contains_key(&key(namespace, name)))
    }

    pub fn oauth_client(&self, name: &str) -> Option<OAuthClient> {
        self.read_state(|s| s.oauth_clients.get(name).cloned())
    }

    // ==================== Internals ====================

    fn next_version(&self) -> String {
        self.version_counter
            .fetch_add(1, Ordering::SeqCst)
            .to_string()
    }

    fn with_state(&self, f: impl FnOnce(&mut ClusterState)) {
        if let Ok(mut state) = self.state.lock() {
            f(&mut *state);
        }
    }

    fn read_state<R: Default>(&self, f: impl FnOnce(&ClusterState) -> R) -> R {
        self.state.lock().map(|s| f(&*s)).unwrap_or_default()
    }

    /// Records the call and returns the injected failure for it, if any.
    fn begin(&self, verb: Verb, target: ObjectRef) -> Result<(), ClientError> {
        let injected = self
            .failures
            .lock()
            .ok()
            .and_then(|f| f.get(&(verb, target.clone())).cloned());
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(Call { verb, target });
        }
        match injected {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    fn lock_state(&self) -> Result<std::sync::MutexGuard<'_, ClusterState>, ClientError> {
        self.state
            .lock()
            .map_err(|_| ClientError::transport("in-memory cluster state poisoned"))
    }

    fn get_singleton<T: Clone>(
        &self,
        kind: ResourceKind,
        name: &str,
        select: impl FnOnce(&ClusterState) -> Option<&T>,
    ) -> Result<T, ClientError> {
        let target = ObjectRef::cluster(kind, name);
        self.begin(Verb::Get, target)?;
        let state = self.lock_state()?;
        select(&*state)
            .cloned()
            .ok_or_else(|| ClientError::not_found(kind.to_string(), name))
    }
}

#[async_trait]
impl ConfigReader for InMemoryCluster {
    async fn operator_config(&self, name: &str) -> Result<OperatorConfig, ClientError> {
        self.get_singleton(ResourceKind::OperatorConfig, name, |s| {
            s.operator_configs.get(name)
        })
    }

    async fn console_config(&self, name: &str) -> Result<ConsoleConfig, ClientError> {
        self.get_singleton(ResourceKind::ConsoleConfig, name, |s| {
            s.console_configs.get(name)
        })
    }

    async fn infrastructure_config(
        &self,
        name: &str,
    ) -> Result<InfrastructureConfig, ClientError> {
        self.get_singleton(ResourceKind::Infrastructure, name, |s| {
            s.infrastructures.get(name)
        })
    }

    async fn proxy_config(&self, name: &str) -> Result<ProxyConfig, ClientError> {
        self.get_singleton(ResourceKind::Proxy, name, |s| s.proxies.get(name))
    }

    async fn oauth_config(&self, name: &str) -> Result<OAuthConfig, ClientError> {
        self.get_singleton(ResourceKind::OAuth, name, |s| s.oauths.get(name))
    }
}

#[async_trait]
impl ResourceClient for InMemoryCluster {
    async fn get_config_map(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<ConfigMap, ClientError> {
        let target = ObjectRef::namespaced(ResourceKind::ConfigMap, namespace, name);
        self.begin(Verb::Get, target.clone())?;
        let state = self.lock_state()?;
        state
            .config_maps
            .get(&key(namespace, name))
            .cloned()
            .ok_or_else(|| ClientError::not_found("ConfigMap", target.qualified_name()))
    }

    async fn delete_config_map(&self, namespace: &str, name: &str) -> Result<(), ClientError> {
        let target = ObjectRef::namespaced(ResourceKind::ConfigMap, namespace, name);
        self.begin(Verb::Delete, target.clone())?;
        let mut state = self.lock_state()?;
        state
            .config_maps
            .remove(&key(namespace, name))
            .map(|_| ())
            .ok_or_else(|| ClientError::not_found("ConfigMap", target.qualified_name()))
    }

    async fn apply_config_map(
        &self,
        config_map: &ConfigMap,
    ) -> Result<(ConfigMap, ApplyOutcome), ClientError> {
        let namespace = config_map.namespace();
        let name = &config_map.metadata.name;
        self.begin(
            Verb::Apply,
            ObjectRef::namespaced(ResourceKind::ConfigMap, namespace, name),
        )?;
        let version = self.next_version();
        let mut state = self.lock_state()?;
        let k = key(namespace, name);
        if let Some(existing) = state.config_maps.get_mut(&k) {
            if existing.data == config_map.data {
                return Ok((existing.clone(), ApplyOutcome::Unchanged));
            }
            existing.data = config_map.data.clone();
            existing.metadata.resource_version = Some(version);
            return Ok((existing.clone(), ApplyOutcome::Updated));
        }
        let mut stored = config_map.clone();
        stored.metadata.resource_version = Some(version);
        state.config_maps.insert(k, stored.clone());
        Ok((stored, ApplyOutcome::Created))
    }

    async fn delete_secret(&self, namespace: &str, name: &str) -> Result<(), ClientError> {
        let target = ObjectRef::namespaced(ResourceKind::Secret, namespace, name);
        self.begin(Verb::Delete, target.clone())?;
        let mut state = self.lock_state()?;
        state
            .secrets
            .remove(&key(namespace, name))
            .ok_or_else(|| ClientError::not_found("Secret", target.qualified_name()))
    }

    async fn delete_deployment(&self, namespace: &str, name: &str) -> Result<(), ClientError> {
        let target = ObjectRef::namespaced(ResourceKind::Deployment, namespace, name);
        self.begin(Verb::Delete, target.clone())?;
        let mut state = self.lock_state()?;
        state
            .deployments
            .remove(&key(namespace, name))
            .ok_or_else(|| ClientError::not_found("Deployment", target.qualified_name()))
    }

    async fn get_oauth_client(&self, name: &str) -> Result<OAuthClient, ClientError> {
        self.begin(Verb::Get, ObjectRef::cluster(ResourceKind::OAuthClient, name))?;
        let state = self.lock_state()?;
        state
            .oauth_clients
            .get(name)
            .cloned()
            .ok_or_else(|| ClientError::not_found("OAuthClient", name))
    }

    async fn update_oauth_client(&self, client: &OAuthClient) -> Result<OAuthClient, ClientError> {
        let name = &client.metadata.name;
        self.begin(
            Verb::Update,
            ObjectRef::cluster(ResourceKind::OAuthClient, name),
        )?;
        let version = self.next_version();
        let mut state = self.lock_state()?;
        let Some(existing) = state.oauth_clients.get_mut(name) else {
            return Err(ClientError::not_found("OAuthClient", name));
        };
        if client.metadata.resource_version.is_some()
            && client.metadata.resource_version != existing.metadata.resource_version
        {
            return Err(ClientError::conflict(
                "OAuthClient",
                name,
                "the object has been modified; please apply your changes to the latest version",
            ));
        }
        let mut stored = client.clone();
        stored.metadata.resource_version = Some(version);
        *existing = stored.clone();
        Ok(stored)
    }
}
