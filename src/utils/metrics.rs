use std::collections::HashMap;
use std::sync::Arc;
use parking_lot::Mutex;
use lazy_static::lazy_static;

pub const BLOCKS_APPENDED: &str = "blocks_appended";
pub const BLOCKS_INGESTED: &str = "blocks_ingested";
pub const MESSAGES_DISCARDED: &str = "messages_discarded";
pub const BROADCAST_DELIVERED: &str = "broadcast_delivered";
pub const BROADCAST_FAILED: &str = "broadcast_failed";
pub const CONNECTIONS_ACCEPTED: &str = "connections_accepted";
pub const PEERS_CONNECTED: &str = "peers_connected";

/// Metrics registry (simple, Prometheus-style)
#[derive(Clone, Default)]
pub struct MetricsRegistry {
    counters: Arc<Mutex<HashMap<String, u64>>>,
    gauges: Arc<Mutex<HashMap<String, f64>>>,
}

impl MetricsRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn inc_counter(&self, name: &str) {
        self.add_counter(name, 1);
    }

    pub fn add_counter(&self, name: &str, n: u64) {
        let mut counters = self.counters.lock();
        *counters.entry(name.to_string()).or_insert(0) += n;
    }

    pub fn counter(&self, name: &str) -> u64 {
        self.counters.lock().get(name).copied().unwrap_or(0)
    }

    pub fn set_gauge(&self, name: &str, val: f64) {
        self.gauges.lock().insert(name.to_string(), val);
    }

    pub fn snapshot(&self) -> (HashMap<String, u64>, HashMap<String, f64>) {
        (self.counters.lock().clone(), self.gauges.lock().clone())
    }

    /// One-line `name=value` rendering of every counter and gauge, sorted by name.
    pub fn summary(&self) -> String {
        let (counters, gauges) = self.snapshot();
        let mut fields: Vec<String> = counters
            .into_iter()
            .map(|(k, v)| format!("{}={}", k, v))
            .chain(gauges.into_iter().map(|(k, v)| format!("{}={}", k, v)))
            .collect();
        fields.sort();
        fields.join(" ")
    }
}

lazy_static! {
    pub static ref METRICS: MetricsRegistry = MetricsRegistry::new();
}
