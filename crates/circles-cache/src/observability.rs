//! Tracing setup for services embedding the cache and for the operator CLI.
//!
//! `RUST_LOG` always wins over the configured level. The level can be changed
//! at runtime through [`apply_logging_level`].

use std::io;
use std::sync::OnceLock;

use tracing_subscriber::{EnvFilter, Registry, fmt, prelude::*, reload};

use crate::config::LoggingConfig;

static LOG_RELOAD_HANDLE: OnceLock<reload::Handle<EnvFilter, Registry>> = OnceLock::new();

pub fn init_tracing() {
    init_tracing_with_level("info");
}

pub fn init_tracing_from_config(logging: &LoggingConfig) {
    init_tracing_with_level(&logging.level);
}

/// Install a stdout subscriber filtered at `level`.
pub fn init_tracing_with_level(level: &str) {
    let _ = tracing_subscriber::registry()
        .with(reloadable_filter(level))
        .with(fmt::layer())
        .try_init();
}

/// Install a compact stderr subscriber, keeping stdout free for command output.
pub fn init_tracing_to_stderr(level: &str) {
    let _ = tracing_subscriber::registry()
        .with(reloadable_filter(level))
        .with(
            fmt::layer()
                .with_writer(io::stderr)
                .with_target(false)
                .compact(),
        )
        .try_init();
}

fn reloadable_filter(level: &str) -> reload::Layer<EnvFilter, Registry> {
    let filter = std::env::var("RUST_LOG")
        .ok()
        .and_then(|_| EnvFilter::try_from_default_env().ok())
        .unwrap_or_else(|| EnvFilter::new(level));

    let (layer, handle) = reload::Layer::new(filter);
    let _ = LOG_RELOAD_HANDLE.set(handle);
    layer
}

/// Apply a new logging level at runtime if a subscriber was installed here.
pub fn apply_logging_level(level: &str) {
    if let Some(handle) = LOG_RELOAD_HANDLE.get() {
        let _ = handle.modify(|f| {
            *f = EnvFilter::new(level);
        });
    }
}
