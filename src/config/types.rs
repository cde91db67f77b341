// Configuration types module
// Defines all configuration-related data structures

use serde::Deserialize;
use std::collections::HashMap;
use std::path::PathBuf;

/// Main configuration structure
#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub server: ServerConfig,
    pub logging: LoggingConfig,
    pub performance: PerformanceConfig,
    pub http: HttpConfig,
    #[serde(default)]
    pub content: ContentConfig,
    pub metrics: MetricsConfig,
}

/// Server configuration
#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub workers: Option<usize>,
}

/// Logging configuration
#[derive(Debug, Deserialize, Clone)]
pub struct LoggingConfig {
    /// Default filter directive, overridden by `RUST_LOG`
    pub level: String,
    pub access_log: bool,
    /// Access log format (combined, common, json, or custom pattern)
    #[serde(default = "default_access_log_format")]
    pub access_log_format: String,
    /// Emit diagnostics as JSON lines
    #[serde(default)]
    pub json: bool,
}

#[allow(clippy::missing_const_for_fn)]
fn default_access_log_format() -> String {
    "combined".to_string()
}

/// Performance configuration
#[derive(Debug, Deserialize, Clone)]
pub struct PerformanceConfig {
    pub keep_alive_timeout: u64,
    /// Seconds allowed for a request head to arrive
    pub read_timeout: u64,
    /// Seconds a response write may stall before the connection is dropped
    pub write_timeout: u64,
    pub max_connections: Option<u64>,
}

/// HTTP configuration
#[derive(Debug, Deserialize, Clone)]
pub struct HttpConfig {
    pub server_name: String,
    /// Cache lifetime (seconds) for mutable mounts; 0 means `no-cache`
    pub max_age: u32,
    /// Body chunks queued between a file worker and its connection
    pub stream_buffer: usize,
}

/// Served content
#[derive(Debug, Deserialize, Clone, Default)]
pub struct ContentConfig {
    /// Mounts keyed by namespace, the first request path segment
    #[serde(default)]
    pub mounts: HashMap<String, MountConfig>,
}

/// One mounted directory
#[derive(Debug, Deserialize, Clone)]
pub struct MountConfig {
    pub root: PathBuf,
    /// Files never change under their path
    #[serde(default)]
    pub immutable: bool,
    /// Overrides `http.max_age` for this mount
    #[serde(default)]
    pub max_age: Option<u32>,
}

/// Latency metrics configuration
#[derive(Debug, Deserialize, Clone)]
pub struct MetricsConfig {
    pub enabled: bool,
    /// Path serving the JSON snapshot
    pub path: String,
}
