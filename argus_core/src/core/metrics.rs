//! Injected metrics sink.
//!
//! The core reports counters and gauges through a [`MetricsSink`]; collection
//! and aggregation live in the embedding host. The default sink drops
//! everything. Like log sinks, metrics sinks must return quickly and must
//! not propagate errors into the core.
//!
//! Counter names emitted by the core:
//! - `topic.publish` / `topic.publish_rejected`
//! - `topic.read` / `topic.read_empty`
//! - `node.state_transition`
//! - `arena.allocation_failure`

use std::sync::Arc;

use parking_lot::RwLock;

/// Injected metrics collaborator.
pub trait MetricsSink: Send + Sync {
    /// Increment a named counter.
    fn counter(&self, name: &str, value: u64);

    /// Record a named gauge value.
    fn gauge(&self, name: &str, value: f64);
}

/// Default sink: discards every observation.
pub struct NoopMetrics;

impl MetricsSink for NoopMetrics {
    fn counter(&self, _name: &str, _value: u64) {}
    fn gauge(&self, _name: &str, _value: f64) {}
}

static SINK: RwLock<Option<Arc<dyn MetricsSink>>> = RwLock::new(None);
static NOOP: NoopMetrics = NoopMetrics;

/// Install the process-wide metrics sink. Replaces any previous sink.
pub fn set_metrics_sink(sink: Arc<dyn MetricsSink>) {
    *SINK.write() = Some(sink);
}

/// Increment a counter through the installed sink.
pub fn counter(name: &str, value: u64) {
    let guard = SINK.read();
    match guard.as_ref() {
        Some(sink) => sink.counter(name, value),
        None => NOOP.counter(name, value),
    }
}

/// Record a gauge through the installed sink.
pub fn gauge(name: &str, value: f64) {
    let guard = SINK.read();
    match guard.as_ref() {
        Some(sink) => sink.gauge(name, value),
        None => NOOP.gauge(name, value),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    struct CaptureMetrics {
        counters: Mutex<Vec<(String, u64)>>,
    }

    impl MetricsSink for CaptureMetrics {
        fn counter(&self, name: &str, value: u64) {
            self.counters.lock().push((name.to_string(), value));
        }
        fn gauge(&self, _name: &str, _value: f64) {}
    }

    #[test]
    fn test_installed_sink_receives_counters() {
        let sink = Arc::new(CaptureMetrics {
            counters: Mutex::new(Vec::new()),
        });
        set_metrics_sink(sink.clone());

        counter("test.metric", 3);

        let counters = sink.counters.lock();
        assert!(counters
            .iter()
            .any(|(name, value)| name == "test.metric" && *value == 3));
    }

    #[test]
    fn test_default_sink_is_silent() {
        // Nothing to assert beyond "does not panic with no sink installed";
        // reset to a fresh capture sink first is not possible without
        // uninstall, so exercise the noop path directly.
        NOOP.counter("dropped", 1);
        NOOP.gauge("dropped", 1.0);
    }
}
