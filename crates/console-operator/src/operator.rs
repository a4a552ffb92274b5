//! The console operator's sync cycle and its controller wiring.

use std::sync::{Arc, Mutex};
use std::time::Instant;

use async_trait::async_trait;
use console_operator_client::names::{
    CONFIG_MANAGED_NAMESPACE, CONFIG_RESOURCE_NAME, CONSOLE_CONFIG_MAP_NAME, CONSOLE_NAME,
    CONSOLE_OAUTH_SECRET_NAME, CONSOLE_PUBLIC_CONFIG_MAP_NAME, CUSTOM_LOGO_CONFIG_MAP_NAME,
    SERVICE_CA_CONFIG_MAP_NAME, TARGET_NAMESPACE, TRUSTED_CA_CONFIG_MAP_NAME,
};
use console_operator_client::{
    ClientError, ConfigReader, DynConfigReader, DynResourceClient, EventRecorder, KubeCluster,
    LogLevel, ObjectRef, OperatorStatus, ResourceClient, ResourceKind,
};
use futures_util::stream::BoxStream;
use tracing::{debug, info};

use crate::controller::{ControllerBuilder, SyncContext, SyncHandler};
use crate::error::{OperatorError, RemovalError};
use crate::filter::names_filter;
use crate::observability;
use crate::reconciler::Reconciler;
use crate::removal::RemovalExecutor;
use crate::snapshot::{ConfigSet, fetch_configs};
use crate::state::{Branch, SyncOutcome, classify};

/// Name the console controller is registered under.
pub const CONTROLLER_NAME: &str = "Console";

/// Collaborators a sync cycle needs. Built once at startup.
#[derive(Clone)]
pub struct OperatorContext {
    pub configs: DynConfigReader,
    pub resources: DynResourceClient,
    pub reconciler: Arc<dyn Reconciler>,
}

impl OperatorContext {
    pub fn new(
        configs: DynConfigReader,
        resources: DynResourceClient,
        reconciler: Arc<dyn Reconciler>,
    ) -> Self {
        Self {
            configs,
            resources,
            reconciler,
        }
    }

    /// Uses one backend for both reads and writes.
    pub fn from_cluster<C>(cluster: Arc<C>, reconciler: Arc<dyn Reconciler>) -> Self
    where
        C: ConfigReader + ResourceClient + 'static,
    {
        Self {
            configs: cluster.clone(),
            resources: cluster,
            reconciler,
        }
    }
}

/// Runs one reconciliation cycle per [`SyncHandler::sync`] call.
pub struct ConsoleOperator {
    ctx: OperatorContext,
    config_name: String,
    base_log_level: String,
    applied_log_level: Mutex<Option<LogLevel>>,
    last_status: Mutex<Option<OperatorStatus>>,
}

impl ConsoleOperator {
    pub fn new(ctx: OperatorContext) -> Self {
        Self {
            ctx,
            config_name: CONFIG_RESOURCE_NAME.to_string(),
            base_log_level: "info".to_string(),
            applied_log_level: Mutex::new(None),
            last_status: Mutex::new(None),
        }
    }

    /// Reads a differently named set of configuration singletons.
    pub fn with_config_name(mut self, name: impl Into<String>) -> Self {
        self.config_name = name.into();
        self
    }

    /// Filter directive restored when the operator config asks for `Normal`.
    pub fn with_base_log_level(mut self, level: impl Into<String>) -> Self {
        self.base_log_level = level.into();
        self
    }

    /// Directive currently requested through the operator config, if any
    /// cycle has changed it.
    pub fn log_directive(&self) -> Option<String> {
        let applied = self.applied_log_level.lock().ok().and_then(|l| *l)?;
        Some(observability::operator_directive(applied, &self.base_log_level).to_string())
    }

    /// Status produced by the most recent managed cycle.
    pub fn last_status(&self) -> Option<OperatorStatus> {
        self.last_status.lock().ok().and_then(|s| s.clone())
    }

    /// Fetches the configuration and acts on the declared management state.
    pub async fn run_cycle(
        &self,
        recorder: &dyn EventRecorder,
    ) -> Result<SyncOutcome, OperatorError> {
        let started = Instant::now();
        debug!("started syncing operator");

        let result = match fetch_configs(self.ctx.configs.as_ref(), &self.config_name).await {
            Ok(configs) => {
                self.apply_log_level(configs.operator.spec.log_level);
                self.handle_sync(&configs, recorder).await
            }
            Err(e) => Err(e),
        };

        debug!(
            elapsed_ms = started.elapsed().as_millis() as u64,
            ok = result.is_ok(),
            "finished syncing operator"
        );
        result
    }

    /// Dispatches on the management state of a private copy of the operator
    /// config. `configs` is never modified.
    pub async fn handle_sync(
        &self,
        configs: &ConfigSet,
        recorder: &dyn EventRecorder,
    ) -> Result<SyncOutcome, OperatorError> {
        let working = configs.operator.clone();

        match classify(&working.spec.management_state)? {
            Branch::Converge => {
                debug!("console is in a managed state");
                let status = self
                    .ctx
                    .reconciler
                    .reconcile(working, configs)
                    .await
                    .map_err(OperatorError::Reconcile)?;
                if let Ok(mut last) = self.last_status.lock() {
                    *last = Some(status.clone());
                }
                Ok(SyncOutcome::Reconciled(status))
            }
            Branch::Skip => {
                debug!("console is in an unmanaged state");
                Ok(SyncOutcome::Unmanaged)
            }
            Branch::Teardown => {
                info!("console is in a removed state");
                self.remove_console(recorder).await?;
                Ok(SyncOutcome::Removed)
            }
        }
    }

    /// Tears down every resource the operator owns.
    pub async fn remove_console(&self, recorder: &dyn EventRecorder) -> Result<(), RemovalError> {
        RemovalExecutor::new(self.ctx.resources.as_ref(), recorder)
            .execute()
            .await
    }

    // The filter already sits at the base level before the first change.
    fn apply_log_level(&self, level: LogLevel) {
        let Ok(mut applied) = self.applied_log_level.lock() else {
            return;
        };
        if *applied == Some(level) || (applied.is_none() && level == LogLevel::Normal) {
            return;
        }
        let directive = observability::operator_directive(level, &self.base_log_level);
        if observability::reload_filter(directive) {
            info!(level = ?level, directive, "operator log level changed");
        }
        *applied = Some(level);
    }
}

#[async_trait]
impl SyncHandler for ConsoleOperator {
    async fn sync(&self, ctx: &SyncContext) -> Result<(), OperatorError> {
        self.run_cycle(ctx.recorder.as_ref()).await.map(|_| ())
    }
}

/// Change notifications the console controller listens to, grouped by the
/// names that matter for each group.
#[derive(Default)]
pub struct ConsoleEventSources {
    /// Cluster configuration singletons.
    pub configs: Vec<BoxStream<'static, ObjectRef>>,
    /// Deployments, routes, services and OAuth clients.
    pub console_resources: Vec<BoxStream<'static, ObjectRef>>,
    /// Config maps in the console's namespace.
    pub target_config_maps: Vec<BoxStream<'static, ObjectRef>>,
    /// Config maps in the managed configuration namespace.
    pub managed_config_maps: Vec<BoxStream<'static, ObjectRef>>,
    pub secrets: Vec<BoxStream<'static, ObjectRef>>,
}

impl ConsoleEventSources {
    /// Opens watches for every group against a live cluster.
    pub fn watch(cluster: &KubeCluster) -> Result<Self, ClientError> {
        let configs = [
            ResourceKind::OperatorConfig,
            ResourceKind::ConsoleConfig,
            ResourceKind::Infrastructure,
            ResourceKind::Proxy,
            ResourceKind::OAuth,
        ]
        .into_iter()
        .map(|kind| cluster.watch_cluster_scoped(kind))
        .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            configs,
            console_resources: vec![
                cluster.watch_deployments(TARGET_NAMESPACE),
                cluster.watch_routes(TARGET_NAMESPACE)?,
                cluster.watch_services(TARGET_NAMESPACE),
                cluster.watch_cluster_scoped(ResourceKind::OAuthClient)?,
            ],
            target_config_maps: vec![cluster.watch_config_maps(TARGET_NAMESPACE)],
            managed_config_maps: vec![cluster.watch_config_maps(CONFIG_MANAGED_NAMESPACE)],
            secrets: vec![cluster.watch_secrets(TARGET_NAMESPACE)],
        })
    }
}

/// Registers `operator` as the sync handler of the `Console` controller,
/// wired to the five filtered event groups.
pub fn console_controller(
    operator: Arc<ConsoleOperator>,
    sources: ConsoleEventSources,
) -> ControllerBuilder {
    ControllerBuilder::new(CONTROLLER_NAME)
        .with_filtered_event_sources(names_filter([CONFIG_RESOURCE_NAME]), sources.configs)
        .with_filtered_event_sources(names_filter([CONSOLE_NAME]), sources.console_resources)
        .with_filtered_event_sources(
            names_filter([
                CONSOLE_CONFIG_MAP_NAME,
                SERVICE_CA_CONFIG_MAP_NAME,
                CUSTOM_LOGO_CONFIG_MAP_NAME,
                TRUSTED_CA_CONFIG_MAP_NAME,
            ]),
            sources.target_config_maps,
        )
        .with_filtered_event_sources(
            names_filter([CONSOLE_CONFIG_MAP_NAME, CONSOLE_PUBLIC_CONFIG_MAP_NAME]),
            sources.managed_config_maps,
        )
        .with_filtered_event_sources(
            names_filter([CONSOLE_OAUTH_SECRET_NAME]),
            sources.secrets,
        )
        .with_sync(operator)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reconciler::ObservedGenerationReconciler;
    use console_operator_client::{
        InMemoryCluster, ManagementState, MemoryRecorder, OperatorConfig, Verb,
    };

    fn operator(cluster: &Arc<InMemoryCluster>) -> ConsoleOperator {
        ConsoleOperator::new(OperatorContext::from_cluster(
            cluster.clone(),
            Arc::new(ObservedGenerationReconciler),
        ))
    }

    #[tokio::test]
    async fn test_managed_cycle_stores_status() {
        let cluster = Arc::new(InMemoryCluster::with_configs(ManagementState::Managed));
        let op = operator(&cluster);

        let outcome = op.run_cycle(&MemoryRecorder::new()).await.unwrap();

        assert!(matches!(outcome, SyncOutcome::Reconciled(_)));
        assert!(op.last_status().is_some());
        assert!(cluster.mutations().is_empty());
    }

    #[tokio::test]
    async fn test_unknown_state_fails_cycle() {
        let cluster = Arc::new(InMemoryCluster::with_configs(ManagementState::from("Force")));
        let op = operator(&cluster);

        let err = op.run_cycle(&MemoryRecorder::new()).await.unwrap_err();

        assert_eq!(err.to_string(), "console is in an unknown state: Force");
        assert!(cluster.mutations().is_empty());
    }

    #[tokio::test]
    async fn test_log_level_returns_to_base() {
        let cluster = Arc::new(InMemoryCluster::with_configs(ManagementState::Unmanaged));
        let op = operator(&cluster).with_base_log_level("warn");
        let recorder = MemoryRecorder::new();

        op.run_cycle(&recorder).await.unwrap();
        assert_eq!(op.log_directive(), None);

        let mut config = OperatorConfig::new(CONFIG_RESOURCE_NAME, ManagementState::Unmanaged);
        config.spec.log_level = LogLevel::Debug;
        cluster.insert_operator_config(config.clone());
        op.run_cycle(&recorder).await.unwrap();
        assert_eq!(op.log_directive().as_deref(), Some("debug"));

        config.spec.log_level = LogLevel::Normal;
        cluster.insert_operator_config(config);
        op.run_cycle(&recorder).await.unwrap();
        assert_eq!(op.log_directive().as_deref(), Some("warn"));
    }

    #[tokio::test]
    async fn test_missing_state_fails_cycle() {
        let cluster = Arc::new(InMemoryCluster::with_configs(ManagementState::Managed));
        cluster.insert_operator_config(OperatorConfig::new(
            CONFIG_RESOURCE_NAME,
            ManagementState::unset(),
        ));
        let op = operator(&cluster);

        let err = op.run_cycle(&MemoryRecorder::new()).await.unwrap_err();

        assert!(matches!(err, OperatorError::UnknownManagementState(ref v) if v.is_empty()));
        assert!(cluster.mutations().is_empty());
    }

    #[tokio::test]
    async fn test_custom_config_name() {
        let cluster = Arc::new(InMemoryCluster::with_configs(ManagementState::Managed));
        let op = operator(&cluster).with_config_name("other");

        let err = op.run_cycle(&MemoryRecorder::new()).await.unwrap_err();

        assert!(matches!(err, OperatorError::ConfigFetch { ref name, .. } if name == "other"));
        assert_eq!(cluster.calls_with(Verb::Get).len(), 1);
    }
}
