//! Process-wide Prometheus metrics.
//!
//! A single [`Metrics`] value is built at startup and shared as
//! `Arc<Metrics>` with every component that records observations. Each
//! instance owns its own [`Registry`], so tests can build as many as they
//! like without colliding on a global registry.

use prometheus::{
    Counter, CounterVec, Encoder, Histogram, HistogramOpts, Opts, Registry, TextEncoder,
};

const NAMESPACE: &str = "shorter";

/// Application metrics container.
pub struct Metrics {
    registry: Registry,

    // ===== HTTP =====
    /// Redirects served, by alias.
    pub redirects_total: CounterVec,
    /// Redirects that failed (unknown alias, store error).
    pub redirect_errors_total: Counter,

    // ===== Producer =====
    /// Click facts dropped before reaching the broker, by reason.
    pub events_dropped_total: CounterVec,

    // ===== Consumer =====
    /// Click facts turned into stored analytics records.
    pub events_processed_total: Counter,
    /// Click facts that failed processing, by stage.
    pub events_failed_total: CounterVec,

    // ===== Enrichment =====
    /// Latency of the geolocation sub-step.
    pub enrich_duration_seconds: Histogram,
}

impl Metrics {
    /// Creates and registers all metrics.
    ///
    /// # Errors
    ///
    /// Returns an error if a metric descriptor is invalid or registered twice.
    pub fn new() -> prometheus::Result<Self> {
        let registry = Registry::new();

        let redirects_total = CounterVec::new(
            Opts::new("redirects_total", "Total number of redirects by alias")
                .namespace(NAMESPACE)
                .subsystem("http"),
            &["alias"],
        )?;

        let redirect_errors_total = Counter::with_opts(
            Opts::new("redirect_errors_total", "Total number of redirect errors")
                .namespace(NAMESPACE)
                .subsystem("http"),
        )?;

        let events_dropped_total = CounterVec::new(
            Opts::new(
                "events_dropped_total",
                "Click events dropped before delivery, by reason",
            )
            .namespace(NAMESPACE)
            .subsystem("producer"),
            &["reason"],
        )?;

        let events_processed_total = Counter::with_opts(
            Opts::new(
                "events_processed_total",
                "Total number of events processed by consumer",
            )
            .namespace(NAMESPACE)
            .subsystem("consumer"),
        )?;

        let events_failed_total = CounterVec::new(
            Opts::new(
                "events_failed_total",
                "Click events that failed processing, by stage",
            )
            .namespace(NAMESPACE)
            .subsystem("consumer"),
            &["stage"],
        )?;

        let enrich_duration_seconds = Histogram::with_opts(
            HistogramOpts::new("duration_seconds", "Geo enrichment duration in seconds")
                .namespace(NAMESPACE)
                .subsystem("enricher"),
        )?;

        registry.register(Box::new(redirects_total.clone()))?;
        registry.register(Box::new(redirect_errors_total.clone()))?;
        registry.register(Box::new(events_dropped_total.clone()))?;
        registry.register(Box::new(events_processed_total.clone()))?;
        registry.register(Box::new(events_failed_total.clone()))?;
        registry.register(Box::new(enrich_duration_seconds.clone()))?;

        Ok(Self {
            registry,
            redirects_total,
            redirect_errors_total,
            events_dropped_total,
            events_processed_total,
            events_failed_total,
            enrich_duration_seconds,
        })
    }

    /// Export metrics in Prometheus text format.
    ///
    /// # Errors
    ///
    /// Returns an error if encoding fails.
    pub fn export(&self) -> prometheus::Result<String> {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        encoder.encode(&metric_families, &mut buffer)?;
        String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
    }

    /// Content type of [`Self::export`] output.
    pub fn content_type(&self) -> &'static str {
        prometheus::TEXT_FORMAT
    }
}
