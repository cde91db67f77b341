// Application state module
// Shared, read-only state handed to every connection

use std::sync::Arc;

use super::types::Config;
use crate::handler::resolve::{Mount, Mounts};
use crate::http::cache::CachePolicy;
use crate::metrics::{Discard, LatencyHistogram, MetricsSink};

/// Application state
pub struct AppState {
    pub config: Config,
    pub mounts: Mounts,
    pub histogram: Arc<LatencyHistogram>,
}

impl AppState {
    pub fn new(config: &Config) -> Self {
        let mounts = config
            .content
            .mounts
            .iter()
            .map(|(namespace, mount)| {
                let max_age = mount.max_age.unwrap_or(config.http.max_age);
                let mount = Mount {
                    root: mount.root.clone(),
                    policy: CachePolicy::for_mount(mount.immutable, max_age),
                };
                (namespace.clone(), mount)
            })
            .collect();

        Self {
            config: config.clone(),
            mounts,
            histogram: Arc::new(LatencyHistogram::new()),
        }
    }

    /// Sink file workers report latency to
    pub fn metrics_sink(&self) -> Arc<dyn MetricsSink> {
        if self.config.metrics.enabled {
            Arc::clone(&self.histogram) as Arc<dyn MetricsSink>
        } else {
            Arc::new(Discard)
        }
    }
}
