//! Read-only collection of the configuration a sync cycle depends on.

use console_operator_client::{
    ConfigReader, ConsoleConfig, InfrastructureConfig, OAuthConfig, OperatorConfig, ProxyConfig,
    ResourceKind,
};
use tracing::error;

use crate::error::OperatorError;

/// Every configuration singleton one cycle reads, captured once at the start
/// of the cycle. Nothing in the cycle writes back into it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigSet {
    pub operator: OperatorConfig,
    pub console: ConsoleConfig,
    pub infrastructure: InfrastructureConfig,
    pub proxy: ProxyConfig,
    pub oauth: OAuthConfig,
}

/// Fetches the five singletons named `name`, in order: operator, console,
/// infrastructure, proxy, oauth.
///
/// The first failure ends the fetch; later kinds are not requested.
pub async fn fetch_configs(
    reader: &dyn ConfigReader,
    name: &str,
) -> Result<ConfigSet, OperatorError> {
    let operator = reader
        .operator_config(name)
        .await
        .map_err(|e| fetch_failed(ResourceKind::OperatorConfig, name, e))?;
    let console = reader
        .console_config(name)
        .await
        .map_err(|e| fetch_failed(ResourceKind::ConsoleConfig, name, e))?;
    let infrastructure = reader
        .infrastructure_config(name)
        .await
        .map_err(|e| fetch_failed(ResourceKind::Infrastructure, name, e))?;
    let proxy = reader
        .proxy_config(name)
        .await
        .map_err(|e| fetch_failed(ResourceKind::Proxy, name, e))?;
    let oauth = reader
        .oauth_config(name)
        .await
        .map_err(|e| fetch_failed(ResourceKind::OAuth, name, e))?;

    Ok(ConfigSet {
        operator,
        console,
        infrastructure,
        proxy,
        oauth,
    })
}

fn fetch_failed(
    kind: ResourceKind,
    name: &str,
    source: console_operator_client::ClientError,
) -> OperatorError {
    error!(kind = %kind, name, error = %source, "error retrieving config");
    OperatorError::config_fetch(kind, name, source)
}
