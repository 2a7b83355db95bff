use prometheus::{Encoder, HistogramOpts, HistogramVec, IntCounterVec, Opts, Registry, TextEncoder};
use std::sync::OnceLock;

pub struct Metrics {
    registry: Registry,
    pub http_requests_total: IntCounterVec,
    pub http_request_duration_seconds: HistogramVec,
    pub sign_in_attempts_total: IntCounterVec,
}

static METRICS: OnceLock<Metrics> = OnceLock::new();

impl Metrics {
    fn new() -> Self {
        let registry = Registry::new();

        let http_requests_total = IntCounterVec::new(
            Opts::new("http_requests_total", "Total number of HTTP requests"),
            &["method", "path", "status"],
        )
        .expect("metric can be created");

        let http_request_duration_seconds = HistogramVec::new(
            HistogramOpts::new(
                "http_request_duration_seconds",
                "HTTP request duration in seconds",
            ),
            &["method", "path", "status"],
        )
        .expect("metric can be created");

        let sign_in_attempts_total = IntCounterVec::new(
            Opts::new("sign_in_attempts_total", "Sign-in attempts by provider and outcome"),
            &["provider", "outcome"],
        )
        .expect("metric can be created");

        for collector in [
            Box::new(http_requests_total.clone()) as Box<dyn prometheus::core::Collector>,
            Box::new(http_request_duration_seconds.clone()),
            Box::new(sign_in_attempts_total.clone()),
        ] {
            registry
                .register(collector)
                .expect("collector can be registered");
        }

        Self {
            registry,
            http_requests_total,
            http_request_duration_seconds,
            sign_in_attempts_total,
        }
    }
}

/// Process-wide metrics, registered on first access.
pub fn metrics() -> &'static Metrics {
    METRICS.get_or_init(Metrics::new)
}

pub fn record_sign_in(provider: &str, outcome: &str) {
    metrics()
        .sign_in_attempts_total
        .with_label_values(&[provider, outcome])
        .inc();
}

/// Prometheus text exposition of every registered metric.
pub fn get_metrics() -> Result<String, anyhow::Error> {
    let mut buffer = Vec::new();
    let encoder = TextEncoder::new();
    let metric_families = metrics().registry.gather();
    encoder.encode(&metric_families, &mut buffer)?;
    Ok(String::from_utf8(buffer)?)
}
