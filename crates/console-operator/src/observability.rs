//! Tracing setup for the operator binary.
//!
//! The filter starts at the level from settings. The operator config can
//! raise it at runtime, and asking for `Normal` again drops back to the
//! settings level.

use std::sync::OnceLock;

use console_operator_client::LogLevel;
use tracing_subscriber::{EnvFilter, Registry, fmt, prelude::*, reload};

static FILTER_HANDLE: OnceLock<reload::Handle<EnvFilter, Registry>> = OnceLock::new();

/// Installs the global subscriber. `RUST_LOG` takes precedence over
/// `base_level` when it is set and parses.
pub fn init_tracing(base_level: &str) {
    let filter = std::env::var("RUST_LOG")
        .ok()
        .and_then(|_| EnvFilter::try_from_default_env().ok())
        .unwrap_or_else(|| EnvFilter::new(base_level));

    let (reload_layer, handle) = reload::Layer::new(filter);
    let _ = FILTER_HANDLE.set(handle);

    let _ = tracing_subscriber::registry()
        .with(reload_layer)
        .with(fmt::layer().with_target(true))
        .try_init();
}

/// Directive in effect for an operator log level.
pub fn operator_directive(requested: LogLevel, base_level: &str) -> &str {
    requested.as_filter().unwrap_or(base_level)
}

/// Swaps the active filter. Returns `false` when [`init_tracing`] never ran.
pub fn reload_filter(directive: &str) -> bool {
    match FILTER_HANDLE.get() {
        Some(handle) => handle
            .modify(|f| {
                *f = EnvFilter::new(directive);
            })
            .is_ok(),
        None => false,
    }
}
