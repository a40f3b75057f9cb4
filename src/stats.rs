use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

/// Point-in-time view of gateway usage.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UsageStats {
    pub total_calls: u64,
    pub cached_responses: u64,
    pub deduplicated_calls: u64,
    pub avg_response_time_ms: f64,
    pub last_updated: DateTime<Utc>,
    pub cache_size: usize,
    /// `None` until the first call has been recorded.
    pub cache_hit_rate: Option<f64>,
}

struct Counters {
    total_calls: u64,
    cached_responses: u64,
    deduplicated_calls: u64,
    avg_response_time_ms: f64,
    last_updated: DateTime<Utc>,
}

// Counters for the analysis path, one lock so blend-and-store is atomic
pub struct StatsRecorder {
    inner: Mutex<Counters>,
}

impl Default for StatsRecorder {
    fn default() -> Self {
        Self::new()
    }
}

impl StatsRecorder {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Counters {
                total_calls: 0,
                cached_responses: 0,
                deduplicated_calls: 0,
                avg_response_time_ms: 0.0,
                last_updated: Utc::now(),
            }),
        }
    }

    pub fn record_call(&self) {
        let mut counters = self.lock();
        counters.total_calls += 1;
        counters.last_updated = Utc::now();
    }

    pub fn record_cache_hit(&self) {
        let mut counters = self.lock();
        counters.cached_responses += 1;
        counters.last_updated = Utc::now();
    }

    pub fn record_deduplicated(&self) {
        let mut counters = self.lock();
        counters.deduplicated_calls += 1;
        counters.last_updated = Utc::now();
    }

    // moving blend, not a true mean: each sample weighs half
    pub fn record_latency(&self, elapsed: Duration) {
        let sample = elapsed.as_secs_f64() * 1000.0;
        let mut counters = self.lock();
        counters.avg_response_time_ms = (counters.avg_response_time_ms + sample) / 2.0;
        counters.last_updated = Utc::now();
    }

    pub fn snapshot(&self, cache_size: usize) -> UsageStats {
        let counters = self.lock();
        let cache_hit_rate = if counters.total_calls > 0 {
            Some(counters.cached_responses as f64 / counters.total_calls as f64)
        } else {
            None
        };
        UsageStats {
            total_calls: counters.total_calls,
            cached_responses: counters.cached_responses,
            deduplicated_calls: counters.deduplicated_calls,
            avg_response_time_ms: counters.avg_response_time_ms,
            last_updated: counters.last_updated,
            cache_size,
            cache_hit_rate,
        }
    }

    fn lock(&self) -> MutexGuard<'_, Counters> {
        // counters stay usable even if a holder panicked
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
