//! Well-known object names and namespaces.

/// Namespace the console workload runs in.
pub const TARGET_NAMESPACE: &str = "openshift-console";
/// Namespace holding objects published for other components.
pub const CONFIG_MANAGED_NAMESPACE: &str = "openshift-config-managed";

/// Singleton name shared by every cluster configuration object.
pub const CONFIG_RESOURCE_NAME: &str = "cluster";
/// Name of the console deployment, service, route and OAuth client.
pub const CONSOLE_NAME: &str = "console";

pub const CONSOLE_CONFIG_MAP_NAME: &str = "console-config";
pub const SERVICE_CA_CONFIG_MAP_NAME: &str = "service-ca";
pub const CUSTOM_LOGO_CONFIG_MAP_NAME: &str = "custom-logo";
pub const TRUSTED_CA_CONFIG_MAP_NAME: &str = "trusted-ca-bundle";
pub const CONSOLE_PUBLIC_CONFIG_MAP_NAME: &str = "console-public";
pub const CONSOLE_OAUTH_SECRET_NAME: &str = "console-oauth-config";

/// Key in the public config map advertising where the console lives.
pub const CONSOLE_URL_KEY: &str = "consoleURL";
