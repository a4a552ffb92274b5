//! Object types read and written by the console operator.
//!
//! These are deliberately narrow views of the cluster objects: only the fields
//! the reconciliation loop looks at are modelled, everything else is ignored
//! on deserialization.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

/// Kinds of objects the operator reads, writes or watches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ResourceKind {
    ConfigMap,
    Secret,
    Deployment,
    Service,
    Route,
    OAuthClient,
    /// The operator's own configuration (`operator.openshift.io/Console`).
    OperatorConfig,
    /// Cluster-wide console configuration (`config.openshift.io/Console`).
    ConsoleConfig,
    Infrastructure,
    Proxy,
    OAuth,
}

impl ResourceKind {
    /// Returns `true` for kinds that live outside any namespace.
    pub fn is_cluster_scoped(&self) -> bool {
        matches!(
            self,
            Self::OAuthClient
                | Self::OperatorConfig
                | Self::ConsoleConfig
                | Self::Infrastructure
                | Self::Proxy
                | Self::OAuth
        )
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ConfigMap => write!(f, "ConfigMap"),
            Self::Secret => write!(f, "Secret"),
            Self::Deployment => write!(f, "Deployment"),
            Self::Service => write!(f, "Service"),
            Self::Route => write!(f, "Route"),
            Self::OAuthClient => write!(f, "OAuthClient"),
            Self::OperatorConfig => write!(f, "consoles.operator.openshift.io"),
            Self::ConsoleConfig => write!(f, "consoles.config.openshift.io"),
            Self::Infrastructure => write!(f, "infrastructures.config.openshift.io"),
            Self::Proxy => write!(f, "proxies.config.openshift.io"),
            Self::OAuth => write!(f, "oauths.config.openshift.io"),
        }
    }
}

/// Identity of a single object: kind, optional namespace and name.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ObjectRef {
    pub kind: ResourceKind,
    pub namespace: Option<String>,
    pub name: String,
}

impl ObjectRef {
    pub fn namespaced(kind: ResourceKind, namespace: &str, name: &str) -> Self {
        Self {
            kind,
            namespace: Some(namespace.to_string()),
            name: name.to_string(),
        }
    }

    pub fn cluster(kind: ResourceKind, name: &str) -> Self {
        Self {
            kind,
            namespace: None,
            name: name.to_string(),
        }
    }

    /// `namespace/name` for namespaced objects, `name` otherwise.
    pub fn qualified_name(&self) -> String {
        match &self.namespace {
            Some(ns) => format!("{ns}/{}", self.name),
            None => self.name.clone(),
        }
    }
}

impl fmt::Display for ObjectRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.kind, self.qualified_name())
    }
}

/// Subset of object metadata used by the operator.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Metadata {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub generation: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resource_version: Option<String>,
}

impl Metadata {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn namespaced(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            namespace: Some(namespace.into()),
            ..Self::default()
        }
    }
}

// ==================== Operator configuration ====================

/// Declared intent for the managed workload.
///
/// Values outside the three recognised ones are preserved verbatim in
/// `Unknown` so they can be reported back.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ManagementState {
    Managed,
    Unmanaged,
    Removed,
    Unknown(String),
}

impl From<&str> for ManagementState {
    fn from(value: &str) -> Self {
        match value {
            "Managed" => Self::Managed,
            "Unmanaged" => Self::Unmanaged,
            "Removed" => Self::Removed,
            other => Self::Unknown(other.to_string()),
        }
    }
}

impl From<String> for ManagementState {
    fn from(value: String) -> Self {
        match value.as_str() {
            "Managed" | "Unmanaged" | "Removed" => Self::from(value.as_str()),
            _ => Self::Unknown(value),
        }
    }
}

impl From<ManagementState> for String {
    fn from(value: ManagementState) -> Self {
        value.to_string()
    }
}

impl fmt::Display for ManagementState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Managed => write!(f, "Managed"),
            Self::Unmanaged => write!(f, "Unmanaged"),
            Self::Removed => write!(f, "Removed"),
            Self::Unknown(raw) => write!(f, "{raw}"),
        }
    }
}

impl ManagementState {
    /// State of a config that does not declare one.
    pub fn unset() -> Self {
        Self::Unknown(String::new())
    }
}

/// Verbosity requested through the operator config. An empty value means
/// `Normal`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LogLevel {
    #[default]
    #[serde(alias = "")]
    Normal,
    Debug,
    Trace,
    TraceAll,
}

impl LogLevel {
    /// Tracing filter directive for the raised levels. `Normal` has none and
    /// falls back to whatever the settings configured.
    pub fn as_filter(&self) -> Option<&'static str> {
        match self {
            Self::Normal => None,
            Self::Debug => Some("debug"),
            Self::Trace | Self::TraceAll => Some("trace"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OperatorSpec {
    #[serde(default = "ManagementState::unset")]
    pub management_state: ManagementState,
    #[serde(default, rename = "operatorLogLevel")]
    pub log_level: LogLevel,
}

impl Default for OperatorSpec {
    fn default() -> Self {
        Self {
            management_state: ManagementState::Managed,
            log_level: LogLevel::Normal,
        }
    }
}

impl OperatorSpec {
    fn unset() -> Self {
        Self {
            management_state: ManagementState::unset(),
            log_level: LogLevel::Normal,
        }
    }
}

/// Status condition reported on the operator config.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Condition {
    #[serde(rename = "type")]
    pub type_: String,
    pub status: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(
        default,
        with = "time::serde::rfc3339::option",
        skip_serializing_if = "Option::is_none"
    )]
    pub last_transition_time: Option<OffsetDateTime>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct OperatorStatus {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub observed_generation: Option<i64>,
    pub conditions: Vec<Condition>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
}

/// `operator.openshift.io/v1` Console.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OperatorConfig {
    pub metadata: Metadata,
    #[serde(default = "OperatorSpec::unset")]
    pub spec: OperatorSpec,
    pub status: OperatorStatus,
}

impl OperatorConfig {
    pub fn new(name: impl Into<String>, management_state: ManagementState) -> Self {
        Self {
            metadata: Metadata::named(name),
            spec: OperatorSpec {
                management_state,
                ..OperatorSpec::default()
            },
            status: OperatorStatus::default(),
        }
    }
}

// ==================== Cluster configuration ====================

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ConsoleAuthentication {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub logout_redirect: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConsoleConfigSpec {
    pub authentication: ConsoleAuthentication,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConsoleConfigStatus {
    #[serde(rename = "consoleURL", skip_serializing_if = "Option::is_none")]
    pub console_url: Option<String>,
}

/// `config.openshift.io/v1` Console.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConsoleConfig {
    pub metadata: Metadata,
    pub spec: ConsoleConfigSpec,
    pub status: ConsoleConfigStatus,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct InfrastructureStatus {
    #[serde(rename = "apiServerURL", skip_serializing_if = "Option::is_none")]
    pub api_server_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub platform: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub control_plane_topology: Option<String>,
}

/// `config.openshift.io/v1` Infrastructure.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct InfrastructureConfig {
    pub metadata: Metadata,
    pub status: InfrastructureStatus,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ProxySpec {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trusted_ca: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ProxyStatus {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub http_proxy: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub https_proxy: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub no_proxy: Option<String>,
}

/// `config.openshift.io/v1` Proxy.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProxyConfig {
    pub metadata: Metadata,
    pub spec: ProxySpec,
    pub status: ProxyStatus,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct IdentityProvider {
    pub name: String,
    #[serde(rename = "type")]
    pub type_: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct OAuthSpec {
    pub identity_providers: Vec<IdentityProvider>,
}

/// `config.openshift.io/v1` OAuth.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OAuthConfig {
    pub metadata: Metadata,
    pub spec: OAuthSpec,
}

// ==================== Owned objects ====================

/// `oauth.openshift.io/v1` OAuthClient. Shared cluster-wide.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct OAuthClient {
    pub metadata: Metadata,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub secret: Option<String>,
    #[serde(rename = "redirectURIs")]
    pub redirect_uris: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub grant_method: Option<String>,
}

/// Core `v1` ConfigMap, string data only.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConfigMap {
    pub metadata: Metadata,
    pub data: BTreeMap<String, String>,
}

impl ConfigMap {
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            metadata: Metadata::namespaced(namespace, name),
            data: BTreeMap::new(),
        }
    }

    pub fn with_data(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.data.insert(key.into(), value.into());
        self
    }

    pub fn namespace(&self) -> &str {
        self.metadata.namespace.as_deref().unwrap_or_default()
    }
}

/// Outcome of a create-or-update.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplyOutcome {
    Created,
    Updated,
    Unchanged,
}

impl ApplyOutcome {
    pub fn changed(&self) -> bool {
        !matches!(self, Self::Unchanged)
    }
}
