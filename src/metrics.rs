//! Metrics for tracking emitted deprecation notices.
//!
//! Provides Prometheus metrics for monitoring which deprecated surfaces
//! consumers still hit.

use prometheus::{IntCounterVec, IntGauge, Opts, Registry};

/// Metrics collector for deprecation notices.
#[derive(Clone)]
pub struct NoticeMetrics {
    /// Registry for all metrics
    registry: Registry,

    /// Counter for notices delivered to the sink
    pub notices_total: IntCounterVec,

    /// Counter for emissions rejected before delivery
    pub emission_failures_total: IntCounterVec,

    /// Gauge for deprecated class families currently tracked
    pub tracked_families: IntGauge,
}

impl NoticeMetrics {
    /// Create a new metrics collector with the given prefix.
    pub fn new(prefix: &str) -> Self {
        let registry = Registry::new();

        let notices_total = IntCounterVec::new(
            Opts::new(
                format!("{}_notices_total", prefix),
                "Total number of deprecation notices delivered",
            ),
            &["kind", "product", "surface"],
        )
        .expect("Failed to create notices_total metric");

        let emission_failures_total = IntCounterVec::new(
            Opts::new(
                format!("{}_emission_failures_total", prefix),
                "Total number of notice emissions rejected before delivery",
            ),
            &["surface", "reason"],
        )
        .expect("Failed to create emission_failures_total metric");

        let tracked_families = IntGauge::new(
            format!("{}_tracked_families", prefix),
            "Number of deprecated class families currently tracked",
        )
        .expect("Failed to create tracked_families metric");

        // Register all metrics
        registry
            .register(Box::new(notices_total.clone()))
            .expect("Failed to register notices_total");
        registry
            .register(Box::new(emission_failures_total.clone()))
            .expect("Failed to register emission_failures_total");
        registry
            .register(Box::new(tracked_families.clone()))
            .expect("Failed to register tracked_families");

        Self {
            registry,
            notices_total,
            emission_failures_total,
            tracked_families,
        }
    }

    /// Record a delivered notice.
    pub fn record_notice(&self, kind: &str, product: &str, surface: &str) {
        self.notices_total
            .with_label_values(&[kind, product, surface])
            .inc();
    }

    /// Record an emission rejected by validation or rendering.
    pub fn record_failure(&self, surface: &str, reason: &str) {
        self.emission_failures_total
            .with_label_values(&[surface, reason])
            .inc();
    }

    /// Record that a new class family entered lifecycle tracking.
    pub fn record_family_tracked(&self) {
        self.tracked_families.inc();
    }

    /// Get the Prometheus registry.
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Encode metrics in Prometheus text format.
    pub fn encode(&self) -> String {
        use prometheus::Encoder;
        let encoder = prometheus::TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        encoder.encode(&metric_families, &mut buffer).unwrap();
        String::from_utf8(buffer).unwrap()
    }
}

impl Default for NoticeMetrics {
    fn default() -> Self {
        Self::new("caretaker")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_creation() {
        let metrics = NoticeMetrics::new("test");
        // Record a value to initialize the metric
        metrics.record_notice("imminent", "MyProduct", "function");
        assert!(!metrics.encode().is_empty());
    }

    #[test]
    fn test_record_notice() {
        let metrics = NoticeMetrics::new("test");
        metrics.record_notice("imminent", "MyProduct", "keyword_migration");

        let output = metrics.encode();
        assert!(output.contains("test_notices_total"));
        assert!(output.contains("keyword_migration"));
        assert!(output.contains("MyProduct"));
    }

    #[test]
    fn test_record_failure() {
        let metrics = NoticeMetrics::new("test");
        metrics.record_failure("module", "configuration");

        let output = metrics.encode();
        assert!(output.contains("test_emission_failures_total"));
        assert!(output.contains("configuration"));
    }

    #[test]
    fn test_tracked_families_gauge() {
        let metrics = NoticeMetrics::new("test");
        metrics.record_family_tracked();
        metrics.record_family_tracked();

        let output = metrics.encode();
        assert!(output.contains("test_tracked_families 2"));
    }
}
