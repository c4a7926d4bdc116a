//! # Background Tasks & Health Checks
//!
//! Registries for periodic/one-shot tasks and aggregatable health
//! probes. Both registries are lock-guarded: valves may still register
//! entries from their app-start callback, after route registration has
//! closed.

use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::info;

/// Outcome of a single health probe
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum HealthStatus {
    /// Fully operational
    Healthy,
    /// Operational with reduced capacity
    Degraded,
    /// Not operational
    Unhealthy,
}

/// Background task callback
pub type TaskFn = Arc<dyn Fn() + Send + Sync>;

/// Health probe callback
pub type HealthCheckFn = Arc<dyn Fn() -> HealthStatus + Send + Sync>;

struct TaskEntry {
    name: String,
    interval: Option<Duration>,
    run: TaskFn,
    owner: Option<String>,
}

/// Registry of background tasks
///
/// Entries are handed to the runtime scheduler when the engine starts;
/// an interval of `None` marks a one-shot task.
#[derive(Default)]
pub struct TaskRegistry {
    entries: Mutex<Vec<TaskEntry>>,
}

impl TaskRegistry {
    /// Create an empty registry
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a task
    pub fn register(
        &self,
        name: impl Into<String>,
        interval: Option<Duration>,
        run: TaskFn,
        owner: Option<String>,
    ) {
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        entries.push(TaskEntry {
            name: name.into(),
            interval,
            run,
            owner,
        });
    }

    /// Number of registered tasks
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    /// Check if the registry is empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub(crate) fn truncate(&self, len: usize) {
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        entries.truncate(len);
    }

    pub(crate) fn remove_owned(&self, owner: &str) {
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        entries.retain(|e| e.owner.as_deref() != Some(owner));
    }

    /// Hand every registered task to the tokio scheduler
    ///
    /// Must be called from within a tokio runtime. Interval tasks tick
    /// immediately and then on their period; one-shots run once.
    pub fn spawn_all(&self) -> Vec<tokio::task::JoinHandle<()>> {
        let entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        entries
            .iter()
            .map(|entry| {
                let run = entry.run.clone();
                let name = entry.name.clone();
                match entry.interval {
                    Some(period) => tokio::spawn(async move {
                        info!(task = %name, period_ms = %period.as_millis(), "Background task scheduled");
                        let mut ticker = tokio::time::interval(period);
                        loop {
                            ticker.tick().await;
                            run();
                        }
                    }),
                    None => tokio::spawn(async move {
                        info!(task = %name, "One-shot task running");
                        run();
                    }),
                }
            })
            .collect()
    }
}

struct HealthEntry {
    name: String,
    check: HealthCheckFn,
    owner: Option<String>,
}

/// Registry of health probes
#[derive(Default)]
pub struct HealthRegistry {
    entries: Mutex<Vec<HealthEntry>>,
}

impl HealthRegistry {
    /// Create an empty registry
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a health probe
    pub fn register(&self, name: impl Into<String>, check: HealthCheckFn, owner: Option<String>) {
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        entries.push(HealthEntry {
            name: name.into(),
            check,
            owner,
        });
    }

    /// Number of registered probes
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    /// Check if the registry is empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub(crate) fn truncate(&self, len: usize) {
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        entries.truncate(len);
    }

    pub(crate) fn remove_owned(&self, owner: &str) {
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        entries.retain(|e| e.owner.as_deref() != Some(owner));
    }

    /// Run every probe and return the worst status
    ///
    /// An empty registry aggregates to [`HealthStatus::Healthy`].
    #[must_use]
    pub fn aggregate(&self) -> HealthStatus {
        let entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        entries
            .iter()
            .map(|e| (e.check)())
            .max()
            .unwrap_or(HealthStatus::Healthy)
    }

    /// Run every probe and return per-probe results
    #[must_use]
    pub fn report(&self) -> Vec<(String, HealthStatus)> {
        let entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        entries
            .iter()
            .map(|e| (e.name.clone(), (e.check)()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_task_registry_register_and_remove() {
        let registry = TaskRegistry::new();
        assert!(registry.is_empty());

        registry.register("sweep", Some(Duration::from_secs(60)), Arc::new(|| {}), None);
        registry.register("warmup", None, Arc::new(|| {}), Some("cache-valve".to_string()));
        assert_eq!(registry.len(), 2);

        registry.remove_owned("cache-valve");
        assert_eq!(registry.len(), 1);
    }

    #[tokio::test]
    async fn test_one_shot_task_runs() {
        let registry = TaskRegistry::new();
        let counter = Arc::new(AtomicUsize::new(0));
        let c = counter.clone();
        registry.register(
            "once",
            None,
            Arc::new(move || {
                c.fetch_add(1, Ordering::SeqCst);
            }),
            None,
        );

        let handles = registry.spawn_all();
        for handle in handles {
            let _ = handle.await;
        }
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_health_aggregate_worst() {
        let registry = HealthRegistry::new();
        assert_eq!(registry.aggregate(), HealthStatus::Healthy);

        registry.register("db", Arc::new(|| HealthStatus::Healthy), None);
        assert_eq!(registry.aggregate(), HealthStatus::Healthy);

        registry.register("queue", Arc::new(|| HealthStatus::Degraded), None);
        assert_eq!(registry.aggregate(), HealthStatus::Degraded);

        registry.register("disk", Arc::new(|| HealthStatus::Unhealthy), None);
        assert_eq!(registry.aggregate(), HealthStatus::Unhealthy);
    }

    #[test]
    fn test_health_report_names() {
        let registry = HealthRegistry::new();
        registry.register("db", Arc::new(|| HealthStatus::Healthy), None);
        let report = registry.report();
        assert_eq!(report.len(), 1);
        assert_eq!(report[0].0, "db");
        assert_eq!(report[0].1, HealthStatus::Healthy);
    }
}
