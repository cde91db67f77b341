//! Request latency metrics
//!
//! One observation per response that actually carried body bytes, bucketed
//! per namespace with the usual Prometheus second boundaries.

use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use std::sync::{Mutex, PoisonError};

/// Upper bounds (seconds) of the latency buckets
pub const DEFAULT_BUCKETS: &[f64] = &[
    0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0,
];

/// Receiver of latency observations, shared by all request workers
pub trait MetricsSink: Send + Sync {
    fn observe(&self, namespace: &str, seconds: f64);
}

/// Sink used when metrics are disabled
#[derive(Debug, Default, Clone, Copy)]
pub struct Discard;

impl MetricsSink for Discard {
    fn observe(&self, _namespace: &str, _seconds: f64) {}
}

#[derive(Debug, Clone)]
struct Histogram {
    counts: Vec<u64>,
    sum: f64,
}

impl Histogram {
    fn new() -> Self {
        Self {
            counts: vec![0; DEFAULT_BUCKETS.len() + 1], // +Inf bucket
            sum: 0.0,
        }
    }

    fn record(&mut self, seconds: f64) {
        let idx = DEFAULT_BUCKETS
            .iter()
            .position(|upper| seconds <= *upper)
            .unwrap_or(DEFAULT_BUCKETS.len());
        self.counts[idx] += 1;
        self.sum += seconds;
    }

    fn count(&self) -> u64 {
        self.counts.iter().sum()
    }

    fn snapshot(&self) -> HistogramSnapshot {
        let mut running = 0;
        let buckets = self
            .counts
            .iter()
            .enumerate()
            .map(|(i, count)| {
                running += count;
                let le = DEFAULT_BUCKETS
                    .get(i)
                    .map_or_else(|| "+Inf".to_string(), ToString::to_string);
                (le, running)
            })
            .collect();

        HistogramSnapshot {
            count: self.count(),
            sum: self.sum,
            buckets,
        }
    }
}

/// Cumulative view of one namespace's histogram
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct HistogramSnapshot {
    pub count: u64,
    pub sum: f64,
    /// `(upper bound, cumulative count)` pairs, ending with `+Inf`
    pub buckets: Vec<(String, u64)>,
}

/// Per-namespace latency histograms
#[derive(Debug, Default)]
pub struct LatencyHistogram {
    inner: Mutex<HashMap<String, Histogram>>,
}

impl LatencyHistogram {
    pub fn new() -> Self {
        Self::default()
    }

    /// Observations recorded for `namespace` so far
    pub fn count(&self, namespace: &str) -> u64 {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(namespace)
            .map_or(0, Histogram::count)
    }

    /// Snapshot of every namespace, sorted by name
    pub fn snapshot(&self) -> BTreeMap<String, HistogramSnapshot> {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|(ns, h)| (ns.clone(), h.snapshot()))
            .collect()
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(&self.snapshot())
    }
}

impl MetricsSink for LatencyHistogram {
    fn observe(&self, namespace: &str, seconds: f64) {
        let mut map = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        map.entry(namespace.to_string())
            .or_insert_with(Histogram::new)
            .record(seconds);
    }
}
