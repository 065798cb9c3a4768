//! Metrics collection for observability

use prometheus::{
    register_counter_vec_with_registry, register_counter_with_registry,
    register_histogram_vec_with_registry, register_histogram_with_registry,
    register_int_gauge_with_registry, Counter, CounterVec, Histogram, HistogramVec, IntGauge,
    Opts, Registry,
};
use std::sync::Arc;
use once_cell::sync::Lazy;

/// Global metrics registry
pub static METRICS: Lazy<Arc<Metrics>> = Lazy::new(|| {
    Arc::new(Metrics::new().expect("Failed to initialize metrics"))
});

/// Metrics collector
pub struct Metrics {
    registry: Registry,

    // Pipeline runs
    pub runs: CounterVec,
    pub run_duration: HistogramVec,
    pub chunks_per_run: Histogram,
    pub chunks_filtered: Counter,
    pub truncations: Counter,

    // Generation calls
    pub generation_calls: CounterVec,
    pub generation_in_flight: IntGauge,

    // Extractive scoring
    pub extraction_fallbacks: Counter,
}

impl Metrics {
    /// Create a new metrics collector
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();

        let runs = register_counter_vec_with_registry!(
            Opts::new("summary_runs_total", "Total summarization runs"),
            &["strategy", "outcome"],
            registry
        )?;

        let run_duration = register_histogram_vec_with_registry!(
            "summary_run_duration_seconds",
            "Summarization run duration in seconds",
            &["strategy"],
            registry
        )?;

        let chunks_per_run = register_histogram_with_registry!(
            "summary_chunks_per_run",
            "Chunks produced per chunked run",
            registry
        )?;

        let chunks_filtered = register_counter_with_registry!(
            Opts::new("summary_chunks_filtered_total", "Chunks dropped by relevance filtering"),
            registry
        )?;

        let truncations = register_counter_with_registry!(
            Opts::new("summary_truncations_total", "Inputs truncated to the safe token limit"),
            registry
        )?;

        let generation_calls = register_counter_vec_with_registry!(
            Opts::new("summary_generation_calls_total", "Total generation calls"),
            &["phase", "status"],
            registry
        )?;

        let generation_in_flight = register_int_gauge_with_registry!(
            Opts::new("summary_generation_in_flight", "Generation calls currently in flight"),
            registry
        )?;

        let extraction_fallbacks = register_counter_with_registry!(
            Opts::new(
                "summary_extraction_fallbacks_total",
                "Extractive scorings served by the heuristic fallback"
            ),
            registry
        )?;

        Ok(Self {
            registry,
            runs,
            run_duration,
            chunks_per_run,
            chunks_filtered,
            truncations,
            generation_calls,
            generation_in_flight,
            extraction_fallbacks,
        })
    }

    /// Get the metrics registry for exporting
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Record a finished run
    pub fn record_run(&self, strategy: &str, outcome: &str, seconds: f64) {
        self.runs.with_label_values(&[strategy, outcome]).inc();
        self.run_duration.with_label_values(&[strategy]).observe(seconds);
    }

    /// Record chunking and filtering for one run
    pub fn record_chunks(&self, produced: usize, filtered: usize) {
        self.chunks_per_run.observe(produced as f64);
        self.chunks_filtered.inc_by(filtered as f64);
    }

    /// Record one generation call
    pub fn record_generation(&self, phase: &str, success: bool) {
        let status = if success { "success" } else { "error" };
        self.generation_calls.with_label_values(&[phase, status]).inc();
    }

    /// Mark a generation call in flight until the guard drops
    pub fn track_in_flight(&self) -> InFlightGuard<'_> {
        self.generation_in_flight.inc();
        InFlightGuard { gauge: &self.generation_in_flight }
    }

    /// Export metrics in Prometheus text format
    pub fn export_prometheus(&self) -> String {
        use prometheus::Encoder;

        let encoder = prometheus::TextEncoder::new();
        let metric_families = self.registry.gather();

        let mut buffer = Vec::new();
        encoder.encode(&metric_families, &mut buffer).unwrap_or_default();

        String::from_utf8(buffer).unwrap_or_default()
    }
}

/// Decrements the in-flight gauge on drop, including on cancellation
pub struct InFlightGuard<'a> {
    gauge: &'a IntGauge,
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.gauge.dec();
    }
}
