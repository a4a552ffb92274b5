//! Teardown of everything the operator created for the console.
//!
//! Removal is fail-open: every step runs regardless of earlier failures, and
//! the per-step results are folded into a single error at the end. Objects
//! that are already gone count as removed, so running the teardown twice is
//! the same as running it once.

use std::collections::BTreeMap;

use console_operator_client::names::{
    CONFIG_MANAGED_NAMESPACE, CONSOLE_CONFIG_MAP_NAME, CONSOLE_NAME, CONSOLE_OAUTH_SECRET_NAME,
    CONSOLE_PUBLIC_CONFIG_MAP_NAME, CONSOLE_URL_KEY, SERVICE_CA_CONFIG_MAP_NAME, TARGET_NAMESPACE,
};
use console_operator_client::{
    ApplyOutcome, ClientError, ConfigMap, EventRecord, EventRecorder, OAuthClient, ObjectRef,
    ResourceClient, ResourceKind,
};
use tracing::{debug, info, warn};

use crate::error::{RemovalError, RemovalFailure};

/// How a single owned object is torn down.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TeardownAction {
    /// Remove the object.
    Delete,
    /// Keep the shared object but drop the console's registration on it.
    Deregister,
    /// Keep the object but publish an empty console URL.
    ClearConsoleUrl,
}

/// An object the operator owns and how removal treats it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OwnedResource {
    pub target: ObjectRef,
    pub action: TeardownAction,
}

impl OwnedResource {
    fn new(target: ObjectRef, action: TeardownAction) -> Self {
        Self { target, action }
    }
}

/// Objects touched by removal, in the order they are processed.
pub fn owned_resources() -> Vec<OwnedResource> {
    use TeardownAction::*;
    vec![
        OwnedResource::new(
            ObjectRef::namespaced(ResourceKind::ConfigMap, TARGET_NAMESPACE, CONSOLE_CONFIG_MAP_NAME),
            Delete,
        ),
        OwnedResource::new(
            ObjectRef::namespaced(
                ResourceKind::ConfigMap,
                TARGET_NAMESPACE,
                SERVICE_CA_CONFIG_MAP_NAME,
            ),
            Delete,
        ),
        OwnedResource::new(
            ObjectRef::namespaced(ResourceKind::Secret, TARGET_NAMESPACE, CONSOLE_OAUTH_SECRET_NAME),
            Delete,
        ),
        OwnedResource::new(
            ObjectRef::cluster(ResourceKind::OAuthClient, CONSOLE_NAME),
            Deregister,
        ),
        OwnedResource::new(
            ObjectRef::namespaced(ResourceKind::Deployment, TARGET_NAMESPACE, CONSOLE_NAME),
            Delete,
        ),
        OwnedResource::new(
            ObjectRef::namespaced(
                ResourceKind::ConfigMap,
                CONFIG_MANAGED_NAMESPACE,
                CONSOLE_PUBLIC_CONFIG_MAP_NAME,
            ),
            ClearConsoleUrl,
        ),
    ]
}

/// Outcome of one teardown step.
#[derive(Debug, Clone)]
pub struct ActionResult {
    pub target: ObjectRef,
    pub result: Result<(), ClientError>,
}

/// Errors that do not count as a teardown failure: the object is already gone.
pub fn is_ignorable(error: &ClientError) -> bool {
    error.is_not_found()
}

/// Keeps the failed results that are not ignorable, preserving order.
pub fn filter_ignorable(results: Vec<ActionResult>) -> Vec<RemovalFailure> {
    results
        .into_iter()
        .filter_map(|r| match r.result {
            Err(error) if !is_ignorable(&error) => Some(RemovalFailure {
                target: r.target,
                error,
            }),
            _ => None,
        })
        .collect()
}

/// Copy of `client` with every redirect URI removed.
pub fn deregister_console(client: &OAuthClient) -> OAuthClient {
    let mut updated = client.clone();
    updated.redirect_uris.clear();
    updated
}

/// Public console config map with an empty console URL.
pub fn empty_public_config() -> ConfigMap {
    ConfigMap {
        data: BTreeMap::from([(CONSOLE_URL_KEY.to_string(), String::new())]),
        ..ConfigMap::new(CONFIG_MANAGED_NAMESPACE, CONSOLE_PUBLIC_CONFIG_MAP_NAME)
    }
}

/// Runs the teardown sequence against a cluster.
pub struct RemovalExecutor<'a> {
    resources: &'a dyn ResourceClient,
    recorder: &'a dyn EventRecorder,
}

impl<'a> RemovalExecutor<'a> {
    pub fn new(resources: &'a dyn ResourceClient, recorder: &'a dyn EventRecorder) -> Self {
        Self {
            resources,
            recorder,
        }
    }

    /// Attempts every step, then reports the failures that matter.
    pub async fn execute(&self) -> Result<(), RemovalError> {
        info!("removing console");

        let mut results = Vec::new();
        for owned in owned_resources() {
            let result = self.run(&owned).await;
            match &result {
                Ok(()) => debug!(object = %owned.target, "teardown step done"),
                Err(e) if is_ignorable(e) => {
                    debug!(object = %owned.target, "teardown step skipped, object already gone")
                }
                Err(e) => warn!(
                    object = %owned.target,
                    error = %e,
                    category = %e.category(),
                    "teardown step failed"
                ),
            }
            results.push(ActionResult {
                target: owned.target,
                result,
            });
        }

        let failures = filter_ignorable(results);
        match RemovalError::from_failures(failures) {
            Some(err) => {
                warn!(failures = err.len(), "console removal incomplete");
                Err(err)
            }
            None => {
                info!("console removed");
                Ok(())
            }
        }
    }

    async fn run(&self, owned: &OwnedResource) -> Result<(), ClientError> {
        let target = &owned.target;
        let namespace = target.namespace.as_deref().unwrap_or_default();
        match (owned.action, target.kind) {
            (TeardownAction::Delete, ResourceKind::ConfigMap) => {
                self.resources
                    .delete_config_map(namespace, &target.name)
                    .await
            }
            (TeardownAction::Delete, ResourceKind::Secret) => {
                self.resources.delete_secret(namespace, &target.name).await
            }
            (TeardownAction::Delete, ResourceKind::Deployment) => {
                self.resources
                    .delete_deployment(namespace, &target.name)
                    .await
            }
            (TeardownAction::Deregister, _) => self.deregister(&target.name).await,
            (TeardownAction::ClearConsoleUrl, _) => self.clear_console_url().await,
            (TeardownAction::Delete, kind) => Err(ClientError::api(
                405,
                format!("teardown cannot delete {kind} objects"),
            )),
        }
    }

    async fn deregister(&self, name: &str) -> Result<(), ClientError> {
        let client = self.resources.get_oauth_client(name).await?;
        if client.redirect_uris.is_empty() {
            debug!(name, "oauth client has no redirect URIs, nothing to clear");
            return Ok(());
        }
        self.resources
            .update_oauth_client(&deregister_console(&client))
            .await?;
        Ok(())
    }

    async fn clear_console_url(&self) -> Result<(), ClientError> {
        let desired = empty_public_config();
        let (applied, outcome) = self.resources.apply_config_map(&desired).await?;
        if outcome.changed() {
            let object = ObjectRef::namespaced(
                ResourceKind::ConfigMap,
                applied.namespace(),
                &applied.metadata.name,
            );
            self.recorder.record(EventRecord::for_apply(
                &object,
                outcome == ApplyOutcome::Created,
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use console_operator_client::{InMemoryCluster, ManagementState, MemoryRecorder, Verb};

    #[test]
    fn test_owned_resource_order() {
        let names: Vec<_> = owned_resources()
            .into_iter()
            .map(|o| o.target.to_string())
            .collect();
        assert_eq!(
            names,
            vec![
                "ConfigMap openshift-console/console-config",
                "ConfigMap openshift-console/service-ca",
                "Secret openshift-console/console-oauth-config",
                "OAuthClient console",
                "Deployment openshift-console/console",
                "ConfigMap openshift-config-managed/console-public",
            ]
        );
    }

    #[test]
    fn test_filter_drops_not_found_only() {
        let target = ObjectRef::cluster(ResourceKind::OAuthClient, "console");
        let results = vec![
            ActionResult {
                target: target.clone(),
                result: Ok(()),
            },
            ActionResult {
                target: target.clone(),
                result: Err(ClientError::not_found("OAuthClient", "console")),
            },
            ActionResult {
                target: target.clone(),
                result: Err(ClientError::conflict("OAuthClient", "console", "stale")),
            },
        ];

        let failures = filter_ignorable(results);

        assert_eq!(failures.len(), 1);
        assert!(failures[0].error.is_conflict());
    }

    #[test]
    fn test_deregister_keeps_secret() {
        let client = OAuthClient {
            secret: Some("keep".to_string()),
            redirect_uris: vec!["https://a/auth/callback".to_string()],
            ..OAuthClient::default()
        };
        let updated = deregister_console(&client);
        assert!(updated.redirect_uris.is_empty());
        assert_eq!(updated.secret.as_deref(), Some("keep"));
    }

    #[test]
    fn test_empty_public_config() {
        let cm = empty_public_config();
        assert_eq!(cm.namespace(), "openshift-config-managed");
        assert_eq!(cm.metadata.name, "console-public");
        assert_eq!(cm.data.get("consoleURL").map(String::as_str), Some(""));
    }

    #[tokio::test]
    async fn test_removes_populated_console() {
        let cluster = InMemoryCluster::with_configs(ManagementState::Removed)
            .with_console_resources("https://console.example.com");
        let recorder = MemoryRecorder::new();

        RemovalExecutor::new(&cluster, &recorder)
            .execute()
            .await
            .unwrap();

        assert!(cluster.config_map(TARGET_NAMESPACE, CONSOLE_CONFIG_MAP_NAME).is_none());
        assert!(cluster.config_map(TARGET_NAMESPACE, SERVICE_CA_CONFIG_MAP_NAME).is_none());
        assert!(!cluster.has_secret(TARGET_NAMESPACE, CONSOLE_OAUTH_SECRET_NAME));
        assert!(!cluster.has_deployment(TARGET_NAMESPACE, CONSOLE_NAME));
        let client = cluster.oauth_client(CONSOLE_NAME).unwrap();
        assert!(client.redirect_uris.is_empty());
        let public = cluster
            .config_map(CONFIG_MANAGED_NAMESPACE, CONSOLE_PUBLIC_CONFIG_MAP_NAME)
            .unwrap();
        assert_eq!(public.data.get(CONSOLE_URL_KEY).map(String::as_str), Some(""));
        assert_eq!(recorder.reasons(), vec!["ConfigMapUpdated"]);
    }

    #[tokio::test]
    async fn test_oauth_get_failure_skips_update() {
        let cluster = InMemoryCluster::new();
        cluster.fail(
            Verb::Get,
            ObjectRef::cluster(ResourceKind::OAuthClient, CONSOLE_NAME),
            ClientError::api(503, "unavailable"),
        );
        let recorder = MemoryRecorder::new();

        let err = RemovalExecutor::new(&cluster, &recorder)
            .execute()
            .await
            .unwrap_err();

        assert_eq!(err.len(), 1);
        assert_eq!(err.failures()[0].target.kind, ResourceKind::OAuthClient);
        assert!(cluster.calls_with(Verb::Update).is_empty());
        // Steps after the failed one still ran.
        assert_eq!(cluster.calls_with(Verb::Apply).len(), 1);
        assert_eq!(recorder.reasons(), vec!["ConfigMapCreated"]);
    }
}
