//! Kubernetes API backend.
//!
//! Core kinds go through the typed `k8s-openapi` structs; the OpenShift kinds
//! (operator and cluster config, OAuth clients, routes) go through
//! `DynamicObject` with a fixed [`ApiResource`] and are converted to the narrow
//! types in [`crate::types`] via serde.

use std::fmt::Debug;

use async_trait::async_trait;
use futures_util::StreamExt;
use futures_util::stream::BoxStream;
use k8s_openapi::api::apps::v1::Deployment;
use k8s_openapi::api::core::v1::{ConfigMap as K8sConfigMap, Secret, Service};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use kube::api::{Api, DeleteParams, DynamicObject, PostParams};
use kube::discovery::ApiResource;
use kube::runtime::{WatchStreamExt, watcher};
use kube::{Client, Resource, ResourceExt};
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use crate::error::ClientError;
use crate::traits::{ConfigReader, ResourceClient};
use crate::types::{
    ApplyOutcome, ConfigMap, ConsoleConfig, InfrastructureConfig, Metadata, OAuthClient,
    OAuthConfig, ObjectRef, OperatorConfig, ProxyConfig, ResourceKind,
};

/// Field manager used when none is configured.
pub const DEFAULT_FIELD_MANAGER: &str = "console-operator";

/// API coordinates for the kinds that have no typed binding.
pub fn api_resource(kind: ResourceKind) -> Option<ApiResource> {
    let (group, version, kind_name, plural) = match kind {
        ResourceKind::OperatorConfig => ("operator.openshift.io", "v1", "Console", "consoles"),
        ResourceKind::ConsoleConfig => ("config.openshift.io", "v1", "Console", "consoles"),
        ResourceKind::Infrastructure => {
            ("config.openshift.io", "v1", "Infrastructure", "infrastructures")
        }
        ResourceKind::Proxy => ("config.openshift.io", "v1", "Proxy", "proxies"),
        ResourceKind::OAuth => ("config.openshift.io", "v1", "OAuth", "oauths"),
        ResourceKind::OAuthClient => ("oauth.openshift.io", "v1", "OAuthClient", "oauthclients"),
        ResourceKind::Route => ("route.openshift.io", "v1", "Route", "routes"),
        ResourceKind::ConfigMap
        | ResourceKind::Secret
        | ResourceKind::Deployment
        | ResourceKind::Service => return None,
    };
    Some(ApiResource {
        group: group.to_string(),
        version: version.to_string(),
        api_version: format!("{group}/{version}"),
        kind: kind_name.to_string(),
        plural: plural.to_string(),
    })
}

/// Maps a kube error onto the client taxonomy.
fn map_kube_error(err: kube::Error, kind: ResourceKind, name: &str) -> ClientError {
    match err {
        kube::Error::Api(ae) if ae.code == 404 => ClientError::not_found(kind.to_string(), name),
        kube::Error::Api(ae) if ae.code == 409 => {
            ClientError::conflict(kind.to_string(), name, ae.message)
        }
        kube::Error::Api(ae) => ClientError::api(ae.code, ae.message),
        kube::Error::SerdeError(e) => ClientError::serialization(e.to_string()),
        other => ClientError::transport(other.to_string()),
    }
}

fn from_dynamic<T: DeserializeOwned>(obj: &DynamicObject) -> Result<T, ClientError> {
    let value = serde_json::to_value(obj).map_err(|e| ClientError::serialization(e.to_string()))?;
    serde_json::from_value(value).map_err(|e| ClientError::serialization(e.to_string()))
}

fn config_map_from_k8s(cm: K8sConfigMap) -> ConfigMap {
    ConfigMap {
        metadata: Metadata {
            name: cm.metadata.name.unwrap_or_default(),
            namespace: cm.metadata.namespace,
            generation: cm.metadata.generation,
            resource_version: cm.metadata.resource_version,
        },
        data: cm.data.unwrap_or_default(),
    }
}

/// Cluster backend talking to a live API server.
#[derive(Clone)]
pub struct KubeCluster {
    client: Client,
    field_manager: String,
}

impl KubeCluster {
    pub fn new(client: Client, field_manager: impl Into<String>) -> Self {
        Self {
            client,
            field_manager: field_manager.into(),
        }
    }

    /// Connects using the in-cluster service account or the local kubeconfig.
    pub async fn connect(field_manager: impl Into<String>) -> Result<Self, ClientError> {
        let client = Client::try_default()
            .await
            .map_err(|e| ClientError::transport(e.to_string()))?;
        Ok(Self::new(client, field_manager))
    }

    fn post_params(&self) -> PostParams {
        PostParams {
            field_manager: Some(self.field_manager.clone()),
            ..PostParams::default()
        }
    }

    fn dynamic_api(&self, kind: ResourceKind) -> Result<Api<DynamicObject>, ClientError> {
        let ar = api_resource(kind).ok_or_else(|| {
            ClientError::serialization(format!("{kind} has no dynamic API binding"))
        })?;
        Ok(Api::all_with(self.client.clone(), &ar))
    }

    async fn get_dynamic<T: DeserializeOwned>(
        &self,
        kind: ResourceKind,
        name: &str,
    ) -> Result<T, ClientError> {
        let api = self.dynamic_api(kind)?;
        let obj = api
            .get(name)
            .await
            .map_err(|e| map_kube_error(e, kind, name))?;
        from_dynamic(&obj)
    }

    // ==================== Event sources ====================

    /// Change notifications for config maps in `namespace`.
    pub fn watch_config_maps(&self, namespace: &str) -> BoxStream<'static, ObjectRef> {
        let api: Api<K8sConfigMap> = Api::namespaced(self.client.clone(), namespace);
        object_events(api, ResourceKind::ConfigMap)
    }

    /// Change notifications for secrets in `namespace`.
    pub fn watch_secrets(&self, namespace: &str) -> BoxStream<'static, ObjectRef> {
        let api: Api<Secret> = Api::namespaced(self.client.clone(), namespace);
        object_events(api, ResourceKind::Secret)
    }

    /// Change notifications for deployments in `namespace`.
    pub fn watch_deployments(&self, namespace: &str) -> BoxStream<'static, ObjectRef> {
        let api: Api<Deployment> = Api::namespaced(self.client.clone(), namespace);
        object_events(api, ResourceKind::Deployment)
    }

    /// Change notifications for services in `namespace`.
    pub fn watch_services(&self, namespace: &str) -> BoxStream<'static, ObjectRef> {
        let api: Api<Service> = Api::namespaced(self.client.clone(), namespace);
        object_events(api, ResourceKind::Service)
    }

    /// Change notifications for routes in `namespace`.
    pub fn watch_routes(&self, namespace: &str) -> Result<BoxStream<'static, ObjectRef>, ClientError> {
        let ar = api_resource(ResourceKind::Route)
            .ok_or_else(|| ClientError::serialization("Route has no dynamic API binding"))?;
        let api: Api<DynamicObject> = Api::namespaced_with(self.client.clone(), namespace, &ar);
        Ok(object_events(api, ResourceKind::Route))
    }

    /// Change notifications for a cluster-scoped OpenShift kind.
    pub fn watch_cluster_scoped(
        &self,
        kind: ResourceKind,
    ) -> Result<BoxStream<'static, ObjectRef>, ClientError> {
        let api = self.dynamic_api(kind)?;
        Ok(object_events(api, kind))
    }
}

impl std::fmt::Debug for KubeCluster {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KubeCluster")
            .field("field_manager", &self.field_manager)
            .finish()
    }
}

/// Turns a watch on `api` into a stream of touched object identities.
///
/// Watch errors are logged and skipped; the watcher backs off and relists on
/// its own.
fn object_events<K>(api: Api<K>, kind: ResourceKind) -> BoxStream<'static, ObjectRef>
where
    K: Resource + Clone + DeserializeOwned + Debug + Send + 'static,
{
    watcher(api, watcher::Config::default())
        .default_backoff()
        .touched_objects()
        .filter_map(move |res| async move {
            match res {
                Ok(obj) => Some(ObjectRef {
                    kind,
                    namespace: obj.namespace(),
                    name: obj.name_any(),
                }),
                Err(e) => {
                    warn!(kind = %kind, error = %e, "watch stream error");
                    None
                }
            }
        })
        .boxed()
}

#[async_trait]
impl ConfigReader for KubeCluster {
    async fn operator_config(&self, name: &str) -> Result<OperatorConfig, ClientError> {
        self.get_dynamic(ResourceKind::OperatorConfig, name).await
    }

    async fn console_config(&self, name: &str) -> Result<ConsoleConfig, ClientError> {
        self.get_dynamic(ResourceKind::ConsoleConfig, name).await
    }

    async fn infrastructure_config(
        &self,
        name: &str,
    ) -> Result<InfrastructureConfig, ClientError> {
        self.get_dynamic(ResourceKind::Infrastructure, name).await
    }

    async fn proxy_config(&self, name: &str) -> Result<ProxyConfig, ClientError> {
        self.get_dynamic(ResourceKind::Proxy, name).await
    }

    async fn oauth_config(&self, name: &str) -> Result<OAuthConfig, ClientError> {
        self.get_dynamic(ResourceKind::OAuth, name).await
    }
}

#[async_trait]
impl ResourceClient for KubeCluster {
    async fn get_config_map(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<ConfigMap, ClientError> {
        let api: Api<K8sConfigMap> = Api::namespaced(self.client.clone(), namespace);
        api.get(name)
            .await
            .map(config_map_from_k8s)
            .map_err(|e| map_kube_error(e, ResourceKind::ConfigMap, name))
    }

    async fn delete_config_map(&self, namespace: &str, name: &str) -> Result<(), ClientError> {
        let api: Api<K8sConfigMap> = Api::namespaced(self.client.clone(), namespace);
        api.delete(name, &DeleteParams::default())
            .await
            .map(|_| ())
            .map_err(|e| map_kube_error(e, ResourceKind::ConfigMap, name))
    }

    async fn apply_config_map(
        &self,
        config_map: &ConfigMap,
    ) -> Result<(ConfigMap, ApplyOutcome), ClientError> {
        let namespace = config_map.namespace();
        let name = config_map.metadata.name.as_str();
        let api: Api<K8sConfigMap> = Api::namespaced(self.client.clone(), namespace);
        let map_err = |e: kube::Error| map_kube_error(e, ResourceKind::ConfigMap, name);

        let existing = api.get_opt(name).await.map_err(map_err)?;
        match existing {
            None => {
                let desired = K8sConfigMap {
                    metadata: ObjectMeta {
                        name: Some(name.to_string()),
                        namespace: Some(namespace.to_string()),
                        ..ObjectMeta::default()
                    },
                    data: Some(config_map.data.clone()),
                    ..K8sConfigMap::default()
                };
                let created = api
                    .create(&self.post_params(), &desired)
                    .await
                    .map_err(map_err)?;
                debug!(namespace, name, "created config map");
                Ok((config_map_from_k8s(created), ApplyOutcome::Created))
            }
            Some(current) if current.data.as_ref() == Some(&config_map.data) => {
                Ok((config_map_from_k8s(current), ApplyOutcome::Unchanged))
            }
            Some(mut current) => {
                current.data = Some(config_map.data.clone());
                let updated = api
                    .replace(name, &self.post_params(), &current)
                    .await
                    .map_err(map_err)?;
                debug!(namespace, name, "updated config map");
                Ok((config_map_from_k8s(updated), ApplyOutcome::Updated))
            }
        }
    }

    async fn delete_secret(&self, namespace: &str, name: &str) -> Result<(), ClientError> {
        let api: Api<Secret> = Api::namespaced(self.client.clone(), namespace);
        api.delete(name, &DeleteParams::default())
            .await
            .map(|_| ())
            .map_err(|e| map_kube_error(e, ResourceKind::Secret, name))
    }

    async fn delete_deployment(&self, namespace: &str, name: &str) -> Result<(), ClientError> {
        let api: Api<Deployment> = Api::namespaced(self.client.clone(), namespace);
        api.delete(name, &DeleteParams::background())
            .await
            .map(|_| ())
            .map_err(|e| map_kube_error(e, ResourceKind::Deployment, name))
    }

    async fn get_oauth_client(&self, name: &str) -> Result<OAuthClient, ClientError> {
        self.get_dynamic(ResourceKind::OAuthClient, name).await
    }

    async fn update_oauth_client(&self, client: &OAuthClient) -> Result<OAuthClient, ClientError> {
        let kind = ResourceKind::OAuthClient;
        let name = client.metadata.name.as_str();
        let api = self.dynamic_api(kind)?;

        // Overlay the modelled fields onto the live object so fields this
        // crate does not know about survive the replace.
        let mut obj = api
            .get(name)
            .await
            .map_err(|e| map_kube_error(e, kind, name))?;
        if client.metadata.resource_version.is_some() {
            obj.metadata.resource_version = client.metadata.resource_version.clone();
        }
        if let Some(fields) = obj.data.as_object_mut() {
            fields.insert(
                "redirectURIs".to_string(),
                serde_json::json!(client.redirect_uris),
            );
            match &client.secret {
                Some(secret) => {
                    fields.insert("secret".to_string(), serde_json::json!(secret));
                }
                None => {
                    fields.remove("secret");
                }
            }
            if let Some(grant_method) = &client.grant_method {
                fields.insert("grantMethod".to_string(), serde_json::json!(grant_method));
            }
        }

        let updated = api
            .replace(name, &self.post_params(), &obj)
            .await
            .map_err(|e| map_kube_error(e, kind, name))?;
        from_dynamic(&updated)
    }
}
