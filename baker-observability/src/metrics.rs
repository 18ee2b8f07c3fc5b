//! Prometheus metrics, grounded on `ando-observability::metrics`'s
//! `MetricsCollector`, trimmed of the VictoriaMetrics push loop and the
//! Lua-pool gauges (no counterpart here) and relabeled under `baker_`.

use prometheus::{
    Encoder, HistogramOpts, HistogramVec, IntCounterVec, IntGauge, Opts, Registry, TextEncoder,
};

/// Request- and discovery-level metrics for the proxy.
pub struct MetricsCollector {
    registry: Registry,

    /// Total proxied requests by domain, method, status.
    pub http_requests_total: IntCounterVec,

    /// Request latency histogram by domain.
    pub http_request_duration: HistogramVec,

    /// Upstream response time histogram by backend address.
    pub upstream_latency: HistogramVec,

    /// Middleware execution time by name.
    pub middleware_execution_time: HistogramVec,

    /// Number of containers currently tracked by the pinger.
    pub containers_tracked: IntGauge,

    /// Number of routes currently installed in the routing index.
    pub routes_installed: IntGauge,
}

impl MetricsCollector {
    pub fn new() -> anyhow::Result<Self> {
        let registry = Registry::new();

        let http_requests_total = IntCounterVec::new(
            Opts::new("baker_http_requests_total", "Total proxied HTTP requests").namespace("baker"),
            &["domain", "method", "status"],
        )?;

        let http_request_duration = HistogramVec::new(
            HistogramOpts::new("baker_http_request_duration_seconds", "Request latency")
                .namespace("baker")
                .buckets(vec![0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0]),
            &["domain"],
        )?;

        let upstream_latency = HistogramVec::new(
            HistogramOpts::new("baker_upstream_latency_seconds", "Upstream response time")
                .namespace("baker")
                .buckets(vec![0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0]),
            &["backend"],
        )?;

        let middleware_execution_time = HistogramVec::new(
            HistogramOpts::new("baker_middleware_execution_seconds", "Middleware execution time")
                .namespace("baker")
                .buckets(vec![0.0001, 0.0005, 0.001, 0.005, 0.01, 0.05, 0.1]),
            &["name"],
        )?;

        let containers_tracked = IntGauge::new("baker_containers_tracked", "Containers currently tracked by the pinger")?;
        let routes_installed = IntGauge::new("baker_routes_installed", "Routes currently installed in the routing index")?;

        registry.register(Box::new(http_requests_total.clone()))?;
        registry.register(Box::new(http_request_duration.clone()))?;
        registry.register(Box::new(upstream_latency.clone()))?;
        registry.register(Box::new(middleware_execution_time.clone()))?;
        registry.register(Box::new(containers_tracked.clone()))?;
        registry.register(Box::new(routes_installed.clone()))?;

        Ok(Self {
            registry,
            http_requests_total,
            http_request_duration,
            upstream_latency,
            middleware_execution_time,
            containers_tracked,
            routes_installed,
        })
    }

    pub fn record_request(&self, domain: &str, method: &str, status: u16, duration_secs: f64) {
        self.http_requests_total
            .with_label_values(&[domain, method, &status.to_string()])
            .inc();
        self.http_request_duration.with_label_values(&[domain]).observe(duration_secs);
    }

    pub fn gather_text(&self) -> String {
        let encoder = TextEncoder::new();
        let metrics = self.registry.gather();
        let mut buffer = Vec::new();
        encoder.encode(&metrics, &mut buffer).unwrap_or_default();
        String::from_utf8(buffer).unwrap_or_default()
    }
}

impl Default for MetricsCollector {
    fn default() -> Self {
        Self::new().expect("failed to construct metrics registry")
    }
}
