use std::{env, sync::Arc};

use anyhow::Context;
use console_operator::settings::OperatorSettings;
use console_operator::settings::loader::{DEFAULT_SETTINGS_PATH, load_settings};
use console_operator::{
    ConsoleEventSources, ConsoleOperator, ObservedGenerationReconciler, OperatorContext,
    console_controller, observability,
};
use console_operator_client::KubeCluster;
use tokio_util::sync::CancellationToken;

/// How the settings path was determined.
#[derive(Debug, Clone, Copy)]
enum ConfigSource {
    /// From --config CLI argument
    CliArgument,
    /// From CONSOLE_OPERATOR_CONFIG environment variable
    EnvironmentVariable,
    /// Default path (console-operator.toml)
    Default,
}

impl std::fmt::Display for ConfigSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::CliArgument => write!(f, "CLI argument (--config)"),
            Self::EnvironmentVariable => {
                write!(f, "environment variable (CONSOLE_OPERATOR_CONFIG)")
            }
            Self::Default => write!(f, "default"),
        }
    }
}

#[tokio::main]
async fn main() {
    // Load .env file if present (before anything else)
    if let Err(e) = dotenvy::dotenv() {
        // Not an error if .env doesn't exist - it's optional
        if !matches!(e, dotenvy::Error::Io(ref io_err) if io_err.kind() == std::io::ErrorKind::NotFound)
        {
            eprintln!("Warning: Failed to load .env file: {e}");
        }
    }

    let (config_path, source) = resolve_config_path();

    let settings = match load_settings(Some(&config_path)) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("Configuration error: {e}");
            std::process::exit(2);
        }
    };

    observability::init_tracing(&settings.logging.level);

    tracing::info!(
        path = %config_path,
        source = %source,
        "Configuration loaded"
    );

    if let Err(err) = run(settings).await {
        eprintln!("Operator error: {err:#}");
        std::process::exit(1);
    }
}

async fn run(settings: OperatorSettings) -> anyhow::Result<()> {
    let cluster = KubeCluster::connect(settings.kube.field_manager.clone())
        .await
        .context("failed to connect to the cluster")?;
    let sources = ConsoleEventSources::watch(&cluster).context("failed to open watches")?;

    let operator = Arc::new(
        ConsoleOperator::new(OperatorContext::from_cluster(
            Arc::new(cluster),
            Arc::new(ObservedGenerationReconciler),
        ))
        .with_base_log_level(settings.logging.level.clone()),
    );

    let mut builder =
        console_controller(operator, sources).with_backoff(settings.controller.backoff());
    if let Some(interval) = settings.controller.resync_interval() {
        builder = builder.with_resync_interval(interval);
    }
    let controller = builder.build()?;

    let token = CancellationToken::new();
    let shutdown = token.clone();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                tracing::info!("Shutdown signal received");
                shutdown.cancel();
            }
            Err(e) => tracing::warn!(error = %e, "Unable to listen for shutdown signal"),
        }
    });

    let stats = controller.run(token).await;
    tracing::info!(cycles = stats.cycles, failures = stats.failures, "Operator stopped");
    Ok(())
}

/// Resolve the settings file path.
///
/// Priority order:
/// 1. CLI argument: --config <path>
/// 2. Environment variable: CONSOLE_OPERATOR_CONFIG
/// 3. Default: console-operator.toml
fn resolve_config_path() -> (String, ConfigSource) {
    let mut args = env::args().skip(1);
    while let Some(arg) = args.next() {
        if arg == "--config"
            && let Some(path) = args.next()
        {
            return (path, ConfigSource::CliArgument);
        }
    }

    if let Ok(path) = env::var("CONSOLE_OPERATOR_CONFIG")
        && !path.is_empty()
    {
        return (path, ConfigSource::EnvironmentVariable);
    }

    (DEFAULT_SETTINGS_PATH.to_string(), ConfigSource::Default)
}
