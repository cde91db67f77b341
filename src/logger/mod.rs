//! Logger module
//!
//! Installs the global `tracing` subscriber and renders access log lines.
//! Access lines go through `tracing` under the `access` target, so they can
//! be filtered separately (`RUST_LOG=access=off`).

mod format;

pub use format::AccessLogEntry;

use crate::config::{Config, LoggingConfig};
use std::net::SocketAddr;
use tracing_subscriber::EnvFilter;

/// Build the filter: `RUST_LOG` when set, the configured level otherwise
fn env_filter(config: &LoggingConfig) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.level))
}

/// Initialize the logger with configuration
///
/// Should be called once at application startup; a second call reports the
/// already-installed subscriber as an error.
pub fn init(config: &LoggingConfig) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let builder = tracing_subscriber::fmt().with_env_filter(env_filter(config));
    if config.json {
        builder.json().flatten_event(true).try_init()
    } else {
        builder.try_init()
    }
}

pub fn log_server_start(addr: &SocketAddr, config: &Config) {
    tracing::info!(
        %addr,
        workers = ?config.server.workers,
        mounts = config.content.mounts.len(),
        metrics = config.metrics.enabled,
        "server started"
    );
    for (namespace, mount) in &config.content.mounts {
        tracing::info!(
            namespace = %namespace,
            root = %mount.root.display(),
            immutable = mount.immutable,
            "mount"
        );
    }
}

/// Emit one access log line in the configured format
pub fn log_access(entry: &AccessLogEntry, format: &str) {
    tracing::info!(target: "access", "{}", entry.format(format));
}
