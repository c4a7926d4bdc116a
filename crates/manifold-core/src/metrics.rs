//! # Metrics
//!
//! Minimal named-counter registry. The dispatcher records request and
//! per-status counters; valves with the metrics capability get a handle
//! through their context.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

/// Thread-safe counter registry handle
#[derive(Clone, Default)]
pub struct Metrics {
    counters: Arc<RwLock<HashMap<String, u64>>>,
}

impl Metrics {
    /// Create a new empty registry
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Increment a counter by one
    pub fn incr(&self, name: &str) {
        self.add(name, 1);
    }

    /// Increment a counter by `delta`
    pub fn add(&self, name: &str, delta: u64) {
        let mut counters = self.counters.write().unwrap_or_else(|e| e.into_inner());
        *counters.entry(name.to_string()).or_insert(0) += delta;
    }

    /// Read a counter (0 if never written)
    #[must_use]
    pub fn get(&self, name: &str) -> u64 {
        let counters = self.counters.read().unwrap_or_else(|e| e.into_inner());
        counters.get(name).copied().unwrap_or(0)
    }

    /// Copy out every counter
    #[must_use]
    pub fn snapshot(&self) -> HashMap<String, u64> {
        self.counters
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_incr_and_get() {
        let metrics = Metrics::new();
        assert_eq!(metrics.get("requests_total"), 0);
        metrics.incr("requests_total");
        metrics.incr("requests_total");
        metrics.add("requests_total", 3);
        assert_eq!(metrics.get("requests_total"), 5);
    }

    #[test]
    fn test_snapshot() {
        let metrics = Metrics::new();
        metrics.incr("a");
        metrics.incr("b");
        let snap = metrics.snapshot();
        assert_eq!(snap.len(), 2);
        assert_eq!(snap.get("a"), Some(&1));
    }

    #[test]
    fn test_handles_share_counters() {
        let metrics = Metrics::new();
        let other = metrics.clone();
        other.incr("shared");
        assert_eq!(metrics.get("shared"), 1);
    }
}
