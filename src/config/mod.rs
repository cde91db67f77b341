// Configuration module entry point
// Loads configuration and builds the shared application state

mod state;
mod types;

use std::net::SocketAddr;

// Re-export public types
pub use state::AppState;
pub use types::{
    Config, ContentConfig, HttpConfig, LoggingConfig, MetricsConfig, MountConfig,
    PerformanceConfig, ServerConfig,
};

/// Environment variable prefix, e.g. `RANGEGATE__SERVER__PORT=9000`
pub const ENV_PREFIX: &str = "RANGEGATE";

impl Config {
    /// Load configuration from the default `config` file (any supported extension)
    pub fn load() -> Result<Self, config::ConfigError> {
        Self::load_from("config")
    }

    /// Load configuration from specified file path (extension optional)
    ///
    /// A missing file is fine; defaults and the environment still apply.
    pub fn load_from(config_path: &str) -> Result<Self, config::ConfigError> {
        let settings = config::Config::builder()
            .set_default("server.host", "127.0.0.1")?
            .set_default("server.port", 8080)?
            .set_default("logging.level", "info")?
            .set_default("logging.access_log", true)?
            .set_default("logging.access_log_format", "combined")?
            .set_default("logging.json", false)?
            .set_default("performance.keep_alive_timeout", 75)?
            .set_default("performance.read_timeout", 30)?
            .set_default("performance.write_timeout", 60)?
            .set_default("http.server_name", "rangegate")?
            .set_default("http.max_age", 3600)?
            .set_default("http.stream_buffer", 8)?
            .set_default("metrics.enabled", true)?
            .set_default("metrics.path", "/_metrics")?
            .add_source(config::File::with_name(config_path).required(false))
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("__")
                    .separator("__"),
            )
            .build()?;

        settings.try_deserialize()
    }

    pub fn get_socket_addr(&self) -> Result<SocketAddr, String> {
        format!("{}:{}", self.server.host, self.server.port)
            .parse()
            .map_err(|e| format!("Invalid address: {e}"))
    }
}
