// Tracing initialization with a reloadable log level.
use std::sync::OnceLock;
use tracing_subscriber::{EnvFilter, fmt, prelude::*, reload};

static LOG_RELOAD_HANDLE: OnceLock<reload::Handle<EnvFilter, tracing_subscriber::Registry>> =
    OnceLock::new();

pub fn init_tracing() {
    init_tracing_with_level(octofhir_idp::config::DEFAULT_LOG_LEVEL);
}

pub fn init_tracing_with_level(level: &str) {
    // RUST_LOG wins over LOG_LEVEL.
    let base_filter = std::env::var("RUST_LOG")
        .ok()
        .and_then(|_| EnvFilter::try_from_default_env().ok())
        .unwrap_or_else(|| EnvFilter::new(level));

    let (reload_layer, handle) = reload::Layer::new(base_filter);
    let _ = LOG_RELOAD_HANDLE.set(handle);

    let _ = tracing_subscriber::registry()
        .with(reload_layer)
        .with(fmt::layer())
        .try_init();
}

/// Applies `LOG_LEVEL` once configuration is loaded, unless `RUST_LOG` is set.
pub fn apply_logging_level(level: &str) {
    if std::env::var_os("RUST_LOG").is_some() {
        return;
    }
    if let Some(handle) = LOG_RELOAD_HANDLE.get() {
        match EnvFilter::try_new(level) {
            Ok(filter) => {
                let _ = handle.modify(|f| *f = filter);
            }
            Err(e) => tracing::warn!(level, error = %e, "Ignoring invalid LOG_LEVEL"),
        }
    }
}
