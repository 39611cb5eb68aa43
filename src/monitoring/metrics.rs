use prometheus::{Counter, Encoder, IntCounter, Opts, Registry, TextEncoder};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Request/error/latency counters for one component (`cache`, `provider`).
#[derive(Clone)]
pub struct ComponentMetrics {
    requests: IntCounter,
    errors: IntCounter,
    timed_responses: IntCounter,
    response_time_ms_sum: Counter,
}

impl ComponentMetrics {
    fn register(registry: &Registry, component: &str) -> prometheus::Result<Self> {
        let opts = |name: &str, help: &str| {
            Opts::new(name, help)
                .namespace("hotelcache")
                .const_label("component", component)
        };

        let requests = IntCounter::with_opts(opts("requests_total", "Total requests handled"))?;
        let errors = IntCounter::with_opts(opts("errors_total", "Total failed or degraded requests"))?;
        let timed_responses =
            IntCounter::with_opts(opts("response_time_ms_count", "Number of timed responses"))?;
        let response_time_ms_sum =
            Counter::with_opts(opts("response_time_ms_sum", "Sum of response times in milliseconds"))?;

        registry.register(Box::new(requests.clone()))?;
        registry.register(Box::new(errors.clone()))?;
        registry.register(Box::new(timed_responses.clone()))?;
        registry.register(Box::new(response_time_ms_sum.clone()))?;

        Ok(Self {
            requests,
            errors,
            timed_responses,
            response_time_ms_sum,
        })
    }

    pub fn record_request(&self) {
        self.requests.inc();
    }

    pub fn record_error(&self) {
        self.errors.inc();
    }

    pub fn observe_response_time(&self, elapsed: Duration) {
        self.timed_responses.inc();
        self.response_time_ms_sum.inc_by(elapsed.as_secs_f64() * 1000.0);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        let requests = self.requests.get();
        let errors = self.errors.get();
        let timed = self.timed_responses.get();
        let sum = self.response_time_ms_sum.get();

        MetricsSnapshot {
            requests,
            errors,
            success_rate: if requests == 0 {
                100.0
            } else {
                requests.saturating_sub(errors) as f64 / requests as f64 * 100.0
            },
            response_time_ms_sum: sum,
            avg_response_time_ms: if timed == 0 { 0.0 } else { sum / timed as f64 },
        }
    }

    pub fn reset(&self) {
        self.requests.reset();
        self.errors.reset();
        self.timed_responses.reset();
        self.response_time_ms_sum.reset();
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    pub requests: u64,
    pub errors: u64,
    /// Percentage, 100.0 when no requests were made
    pub success_rate: f64,
    pub response_time_ms_sum: f64,
    pub avg_response_time_ms: f64,
}

/// Owns a private registry so several instances can coexist (one per
/// process in production, one per test).
pub struct MetricsRecorder {
    registry: Registry,
    cache: ComponentMetrics,
    provider: ComponentMetrics,
}

impl MetricsRecorder {
    pub fn new() -> prometheus::Result<Self> {
        let registry = Registry::new();
        let cache = ComponentMetrics::register(&registry, "cache")?;
        let provider = ComponentMetrics::register(&registry, "provider")?;
        Ok(Self {
            registry,
            cache,
            provider,
        })
    }

    pub fn cache(&self) -> &ComponentMetrics {
        &self.cache
    }

    pub fn provider(&self) -> &ComponentMetrics {
        &self.provider
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Exporter for Prometheus text format
    pub fn export_prometheus(&self) -> String {
        let metric_families = self.registry.gather();
        let encoder = TextEncoder::new();
        let mut buffer = Vec::new();
        if encoder.encode(&metric_families, &mut buffer).is_ok() {
            String::from_utf8(buffer).unwrap_or_default()
        } else {
            String::new()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_success_rate_defaults_to_100() {
        let metrics = MetricsRecorder::new().unwrap();
        let snap = metrics.provider().snapshot();
        assert_eq!(snap.requests, 0);
        assert_eq!(snap.success_rate, 100.0);
        assert_eq!(snap.avg_response_time_ms, 0.0);
    }

    #[test]
    fn test_counts_and_average() {
        let metrics = MetricsRecorder::new().unwrap();
        let provider = metrics.provider();
        for _ in 0..4 {
            provider.record_request();
        }
        provider.record_error();
        provider.observe_response_time(Duration::from_millis(100));
        provider.observe_response_time(Duration::from_millis(300));

        let snap = provider.snapshot();
        assert_eq!(snap.requests, 4);
        assert_eq!(snap.errors, 1);
        assert_eq!(snap.success_rate, 75.0);
        assert!((snap.avg_response_time_ms - 200.0).abs() < 1e-6);

        // components are independent
        assert_eq!(metrics.cache().snapshot().requests, 0);

        provider.reset();
        assert_eq!(provider.snapshot().requests, 0);
        assert_eq!(provider.snapshot().response_time_ms_sum, 0.0);
    }

    #[test]
    fn test_export_contains_component_labels() {
        let metrics = MetricsRecorder::new().unwrap();
        metrics.cache().record_request();
        let text = metrics.export_prometheus();
        assert!(text.contains("hotelcache_requests_total"));
        assert!(text.contains("component=\"cache\""));
        assert!(text.contains("component=\"provider\""));
    }
}
