use lazy_static::lazy_static;
use prometheus::{
    Counter, CounterVec, Encoder, Gauge, Histogram, TextEncoder, register_counter,
    register_counter_vec, register_gauge, register_histogram,
};

lazy_static! {
    pub static ref REQUEST_TOTAL: Counter =
        register_counter!("estimate_analysis_requests_total", "Total number of analysis requests").unwrap();
    pub static ref CACHE_HITS: Counter =
        register_counter!("estimate_cache_hits_total", "Total cache hits").unwrap();
    pub static ref CACHE_MISSES: Counter =
        register_counter!("estimate_cache_misses_total", "Total cache misses").unwrap();
    pub static ref DEDUPLICATED: Counter = register_counter!(
        "estimate_deduplicated_total",
        "Analysis requests served by an identical in-flight call"
    )
    .unwrap();
    pub static ref REQUEST_LATENCY: Histogram = register_histogram!(
        "estimate_generation_latency_seconds",
        "Model call latency in seconds",
        vec![0.5, 1.0, 2.5, 5.0, 10.0, 20.0, 30.0, 45.0, 60.0]
    )
    .unwrap();
    pub static ref CACHE_SIZE: Gauge =
        register_gauge!("estimate_cache_size", "Current number of items in cache").unwrap();
    pub static ref GENERATION_ERRORS: CounterVec = register_counter_vec!(
        "estimate_generation_errors_total",
        "Failed generation calls by error kind",
        &["kind"]
    )
    .unwrap();
    pub static ref VIDEO_POLLS: Counter =
        register_counter!("estimate_video_polls_total", "Total video operation polls").unwrap();
}

// Prometheus text exposition of everything registered above
pub fn render() -> Result<String, String> {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    encoder
        .encode(&metric_families, &mut buffer)
        .map_err(|e| format!("Failed to encode metrics: {}", e))?;
    String::from_utf8(buffer).map_err(|e| format!("Metrics are not UTF-8: {}", e))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn render_includes_registered_metrics() {
        CACHE_HITS.inc();
        GENERATION_ERRORS.with_label_values(&["timeout"]).inc();
        let text = render().unwrap();
        assert!(text.contains("estimate_cache_hits_total"));
        assert!(text.contains("estimate_generation_errors_total{kind=\"timeout\"}"));
    }
}
