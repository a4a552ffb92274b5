//! End-to-end sync cycles against the in-memory cluster.
//!
//! Every remote call goes through `InMemoryCluster`, which records the calls
//! so the tests can check exactly what a cycle touched.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use console_operator::{
    BoxError, ConfigSet, ConsoleOperator, ObservedGenerationReconciler, OperatorContext,
    OperatorError, Reconciler, RemovalExecutor, SyncOutcome, fetch_configs, names_filter,
};
use console_operator_client::names::{
    CONFIG_MANAGED_NAMESPACE, CONSOLE_CONFIG_MAP_NAME, CONSOLE_NAME, CONSOLE_OAUTH_SECRET_NAME,
    CONSOLE_PUBLIC_CONFIG_MAP_NAME, CONSOLE_URL_KEY, TARGET_NAMESPACE,
};
use console_operator_client::{
    ClientError, InMemoryCluster, ManagementState, MemoryRecorder, Metadata, OAuthClient,
    ObjectRef, OperatorConfig, OperatorStatus, ResourceClient, ResourceKind, Verb,
};

/// Reconciler that counts its invocations and optionally fails.
#[derive(Default)]
struct CountingReconciler {
    calls: AtomicUsize,
    fail_with: Option<String>,
}

#[async_trait]
impl Reconciler for CountingReconciler {
    async fn reconcile(
        &self,
        mut working: OperatorConfig,
        _configs: &ConfigSet,
    ) -> Result<OperatorStatus, BoxError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(msg) = &self.fail_with {
            return Err(msg.clone().into());
        }
        // The working copy belongs to the reconciler.
        working.status.version = Some("4.99".to_string());
        Ok(working.status)
    }
}

fn operator_with(
    cluster: &Arc<InMemoryCluster>,
    reconciler: Arc<dyn Reconciler>,
) -> ConsoleOperator {
    ConsoleOperator::new(OperatorContext::from_cluster(cluster.clone(), reconciler))
}

fn operator(cluster: &Arc<InMemoryCluster>) -> ConsoleOperator {
    operator_with(cluster, Arc::new(ObservedGenerationReconciler))
}

fn console_client(redirect_uris: &[&str]) -> OAuthClient {
    OAuthClient {
        metadata: Metadata::named(CONSOLE_NAME),
        secret: Some("s3cr3t".to_string()),
        redirect_uris: redirect_uris.iter().map(|u| u.to_string()).collect(),
        grant_method: Some("auto".to_string()),
    }
}

// =============================================================================
// Management state dispatch
// =============================================================================

#[tokio::test]
async fn test_managed_invokes_reconciler_once() {
    let cluster = Arc::new(InMemoryCluster::with_configs(ManagementState::Managed));
    let reconciler = Arc::new(CountingReconciler::default());
    let op = operator_with(&cluster, reconciler.clone());

    let outcome = op.run_cycle(&MemoryRecorder::new()).await.unwrap();

    assert_eq!(reconciler.calls.load(Ordering::SeqCst), 1);
    match outcome {
        SyncOutcome::Reconciled(status) => assert_eq!(status.version.as_deref(), Some("4.99")),
        other => panic!("unexpected outcome: {other:?}"),
    }
    assert!(cluster.mutations().is_empty());
}

#[tokio::test]
async fn test_managed_does_not_touch_snapshot() {
    let cluster = Arc::new(InMemoryCluster::with_configs(ManagementState::Managed));
    let op = operator_with(&cluster, Arc::new(CountingReconciler::default()));
    let configs = fetch_configs(cluster.as_ref(), "cluster").await.unwrap();
    let before = configs.clone();

    op.handle_sync(&configs, &MemoryRecorder::new()).await.unwrap();

    assert_eq!(configs, before);
}

#[tokio::test]
async fn test_reconcile_error_propagates_unchanged() {
    let cluster = Arc::new(InMemoryCluster::with_configs(ManagementState::Managed));
    let reconciler = Arc::new(CountingReconciler {
        fail_with: Some("deployment rollout stuck".to_string()),
        ..CountingReconciler::default()
    });
    let op = operator_with(&cluster, reconciler);

    let err = op.run_cycle(&MemoryRecorder::new()).await.unwrap_err();

    assert!(matches!(err, OperatorError::Reconcile(_)));
    assert_eq!(err.to_string(), "deployment rollout stuck");
}

#[tokio::test]
async fn test_unmanaged_issues_no_mutations() {
    let cluster = Arc::new(
        InMemoryCluster::with_configs(ManagementState::Unmanaged)
            .with_console_resources("https://console.example.com"),
    );
    let reconciler = Arc::new(CountingReconciler::default());
    let op = operator_with(&cluster, reconciler.clone());

    let outcome = op.run_cycle(&MemoryRecorder::new()).await.unwrap();

    assert_eq!(outcome, SyncOutcome::Unmanaged);
    assert!(cluster.mutations().is_empty());
    assert_eq!(reconciler.calls.load(Ordering::SeqCst), 0);
    assert!(cluster.has_deployment(TARGET_NAMESPACE, CONSOLE_NAME));
}

#[tokio::test]
async fn test_unknown_state_mentions_value() {
    let cluster = Arc::new(InMemoryCluster::with_configs(ManagementState::from(
        "SomethingElse",
    )));
    let op = operator(&cluster);

    let err = op.run_cycle(&MemoryRecorder::new()).await.unwrap_err();

    assert!(matches!(err, OperatorError::UnknownManagementState(_)));
    assert!(err.to_string().contains("SomethingElse"));
    assert!(cluster.mutations().is_empty());
}

#[tokio::test]
async fn test_removed_tears_down_console() {
    let cluster = Arc::new(
        InMemoryCluster::with_configs(ManagementState::Removed)
            .with_console_resources("https://console.example.com"),
    );
    let op = operator(&cluster);

    let outcome = op.run_cycle(&MemoryRecorder::new()).await.unwrap();

    assert_eq!(outcome, SyncOutcome::Removed);
    assert!(!cluster.has_deployment(TARGET_NAMESPACE, CONSOLE_NAME));
    assert!(!cluster.has_secret(TARGET_NAMESPACE, CONSOLE_OAUTH_SECRET_NAME));
    assert!(cluster.oauth_client(CONSOLE_NAME).is_some());
}

// =============================================================================
// Configuration fetch
// =============================================================================

#[tokio::test]
async fn test_console_config_failure_short_circuits() {
    let cluster = Arc::new(InMemoryCluster::with_configs(ManagementState::Removed));
    cluster.fail(
        Verb::Get,
        ObjectRef::cluster(ResourceKind::ConsoleConfig, "cluster"),
        ClientError::api(500, "etcd timeout"),
    );
    let op = operator(&cluster);

    let err = op.run_cycle(&MemoryRecorder::new()).await.unwrap_err();

    match err {
        OperatorError::ConfigFetch { kind, .. } => assert_eq!(kind, ResourceKind::ConsoleConfig),
        other => panic!("unexpected error: {other}"),
    }
    let kinds: Vec<_> = cluster.calls().into_iter().map(|c| c.target.kind).collect();
    assert_eq!(
        kinds,
        vec![ResourceKind::OperatorConfig, ResourceKind::ConsoleConfig]
    );
    assert!(cluster.mutations().is_empty());
}

#[tokio::test]
async fn test_missing_console_config_is_an_error() {
    let cluster = Arc::new(InMemoryCluster::with_configs(ManagementState::Managed));
    cluster.remove_console_config("cluster");
    let op = operator(&cluster);

    let err = op.run_cycle(&MemoryRecorder::new()).await.unwrap_err();

    assert!(err.to_string().contains("consoles.config.openshift.io"));
}

// =============================================================================
// Removal
// =============================================================================

#[tokio::test]
async fn test_removal_on_empty_cluster_is_idempotent() {
    let cluster = InMemoryCluster::new();
    let recorder = MemoryRecorder::new();
    let executor = RemovalExecutor::new(&cluster, &recorder);

    assert!(executor.execute().await.is_ok());
    cluster.reset_calls();
    assert!(executor.execute().await.is_ok());

    // The second run still walks every step.
    assert_eq!(cluster.calls_with(Verb::Delete).len(), 4);
    assert_eq!(cluster.calls_with(Verb::Get).len(), 1);
    assert_eq!(cluster.calls_with(Verb::Apply).len(), 1);

    // Only the first run creates the public config map.
    assert_eq!(recorder.reasons(), vec!["ConfigMapCreated"]);
}

#[tokio::test]
async fn test_removal_is_fail_open() {
    let cluster = InMemoryCluster::with_configs(ManagementState::Removed)
        .with_console_resources("https://console.example.com");
    let console_config =
        ObjectRef::namespaced(ResourceKind::ConfigMap, TARGET_NAMESPACE, CONSOLE_CONFIG_MAP_NAME);
    cluster.fail(
        Verb::Delete,
        console_config.clone(),
        ClientError::api(500, "internal error"),
    );
    let recorder = MemoryRecorder::new();

    let err = RemovalExecutor::new(&cluster, &recorder)
        .execute()
        .await
        .unwrap_err();

    assert_eq!(err.len(), 1);
    assert_eq!(err.failures()[0].target, console_config);
    assert!(!err.failures()[0].error.is_not_found());

    // Every other step ran.
    assert_eq!(cluster.calls_with(Verb::Delete).len(), 4);
    assert_eq!(cluster.calls_with(Verb::Update).len(), 1);
    assert_eq!(cluster.calls_with(Verb::Apply).len(), 1);
    assert!(!cluster.has_secret(TARGET_NAMESPACE, CONSOLE_OAUTH_SECRET_NAME));
    assert!(!cluster.has_deployment(TARGET_NAMESPACE, CONSOLE_NAME));
}

#[tokio::test]
async fn test_removal_failure_fails_cycle() {
    let cluster = Arc::new(InMemoryCluster::with_configs(ManagementState::Removed));
    cluster.fail(
        Verb::Delete,
        ObjectRef::namespaced(ResourceKind::Deployment, TARGET_NAMESPACE, CONSOLE_NAME),
        ClientError::transport("connection refused"),
    );
    let op = operator(&cluster);

    let err = op.run_cycle(&MemoryRecorder::new()).await.unwrap_err();

    assert!(matches!(err, OperatorError::Removal(ref e) if e.len() == 1));
    assert!(err.to_string().contains("Deployment openshift-console/console"));
}

#[tokio::test]
async fn test_oauth_client_without_redirects_is_not_updated() {
    let cluster = InMemoryCluster::new();
    cluster.insert_oauth_client(console_client(&[]));

    RemovalExecutor::new(&cluster, &MemoryRecorder::new())
        .execute()
        .await
        .unwrap();

    assert!(cluster.calls_with(Verb::Update).is_empty());
}

#[tokio::test]
async fn test_oauth_client_with_redirects_is_updated_once() {
    let cluster = InMemoryCluster::new();
    cluster.insert_oauth_client(console_client(&["https://a/auth/callback"]));

    RemovalExecutor::new(&cluster, &MemoryRecorder::new())
        .execute()
        .await
        .unwrap();

    let updates = cluster.calls_with(Verb::Update);
    assert_eq!(updates.len(), 1);
    assert_eq!(
        updates[0].target,
        ObjectRef::cluster(ResourceKind::OAuthClient, CONSOLE_NAME)
    );
    let client = cluster.oauth_client(CONSOLE_NAME).unwrap();
    assert!(client.redirect_uris.is_empty());
    assert_eq!(client.secret.as_deref(), Some("s3cr3t"));
}

#[tokio::test]
async fn test_oauth_update_conflict_is_reported() {
    let cluster = InMemoryCluster::new();
    cluster.insert_oauth_client(console_client(&["https://a/auth/callback"]));
    cluster.fail(
        Verb::Update,
        ObjectRef::cluster(ResourceKind::OAuthClient, CONSOLE_NAME),
        ClientError::conflict("OAuthClient", CONSOLE_NAME, "stale resource version"),
    );

    let err = RemovalExecutor::new(&cluster, &MemoryRecorder::new())
        .execute()
        .await
        .unwrap_err();

    assert!(err.failures()[0].error.is_conflict());
}

// =============================================================================
// Scenarios
// =============================================================================

#[tokio::test]
async fn test_removed_with_nothing_deployed() {
    let cluster = Arc::new(InMemoryCluster::with_configs(ManagementState::Removed));
    let op = operator(&cluster);

    let outcome = op.run_cycle(&MemoryRecorder::new()).await.unwrap();

    assert_eq!(outcome, SyncOutcome::Removed);
    let public = cluster
        .get_config_map(CONFIG_MANAGED_NAMESPACE, CONSOLE_PUBLIC_CONFIG_MAP_NAME)
        .await
        .unwrap();
    assert_eq!(public.data.get(CONSOLE_URL_KEY).map(String::as_str), Some(""));
}

#[tokio::test]
async fn test_removed_clears_two_redirect_uris() {
    let cluster = Arc::new(InMemoryCluster::with_configs(ManagementState::Removed));
    cluster.insert_oauth_client(console_client(&[
        "https://console.apps.example.com/auth/callback",
        "https://console.alt.example.com/auth/callback",
    ]));
    let op = operator(&cluster);

    let outcome = op.run_cycle(&MemoryRecorder::new()).await.unwrap();

    assert_eq!(outcome, SyncOutcome::Removed);
    assert_eq!(cluster.calls_with(Verb::Update).len(), 1);
    assert!(cluster.oauth_client(CONSOLE_NAME).unwrap().redirect_uris.is_empty());
}

#[test]
fn test_names_filter_is_exact() {
    let filter = names_filter(["a", "b"]);
    let named = |name: &str| ObjectRef::cluster(ResourceKind::OAuthClient, name);

    assert!(filter(&named("a")));
    assert!(filter(&named("b")));
    assert!(!filter(&named("A")));
    assert!(!filter(&named("ab")));
}
