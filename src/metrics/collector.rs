use crate::metrics::snapshot::MetricsSnapshot;
use std::sync::{
    atomic::{AtomicU64, Ordering},
    Arc,
};
use std::time::{Duration, Instant};

#[derive(Clone)]
pub struct MetricsCollector {
    items_queued: Arc<AtomicU64>,
    items_resolved: Arc<AtomicU64>,
    items_dropped: Arc<AtomicU64>,
    items_skipped: Arc<AtomicU64>,
    cache_hits: Arc<AtomicU64>,
    cache_misses: Arc<AtomicU64>,
    requests_total: Arc<AtomicU64>,
    requests_success: Arc<AtomicU64>,
    requests_failed: Arc<AtomicU64>,
    rate_limited: Arc<AtomicU64>,
    current_delay_ms: Arc<AtomicU64>,
    total_response_time_ms: Arc<AtomicU64>,
    start_time: Arc<Instant>,
}

impl Default for MetricsCollector {
    fn default() -> Self {
        Self {
            items_queued: Arc::new(AtomicU64::new(0)),
            items_resolved: Arc::new(AtomicU64::new(0)),
            items_dropped: Arc::new(AtomicU64::new(0)),
            items_skipped: Arc::new(AtomicU64::new(0)),
            cache_hits: Arc::new(AtomicU64::new(0)),
            cache_misses: Arc::new(AtomicU64::new(0)),
            requests_total: Arc::new(AtomicU64::new(0)),
            requests_success: Arc::new(AtomicU64::new(0)),
            requests_failed: Arc::new(AtomicU64::new(0)),
            rate_limited: Arc::new(AtomicU64::new(0)),
            current_delay_ms: Arc::new(AtomicU64::new(0)),
            total_response_time_ms: Arc::new(AtomicU64::new(0)),
            start_time: Arc::new(Instant::now()),
        }
    }
}

impl MetricsCollector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn increment_items_queued(&self) {
        self.items_queued.fetch_add(1, Ordering::SeqCst);
    }

    pub fn increment_items_resolved(&self) {
        self.items_resolved.fetch_add(1, Ordering::SeqCst);
    }

    pub fn increment_items_dropped(&self) {
        self.items_dropped.fetch_add(1, Ordering::SeqCst);
    }

    pub fn increment_items_skipped(&self) {
        self.items_skipped.fetch_add(1, Ordering::SeqCst);
    }

    pub fn increment_cache_hits(&self) {
        self.cache_hits.fetch_add(1, Ordering::SeqCst);
    }

    pub fn increment_cache_misses(&self) {
        self.cache_misses.fetch_add(1, Ordering::SeqCst);
    }

    pub fn set_current_delay(&self, delay: Duration) {
        self.current_delay_ms
            .store(delay.as_millis() as u64, Ordering::SeqCst);
    }

    pub fn record_success(&self, duration: Duration) {
        self.requests_total.fetch_add(1, Ordering::SeqCst);
        self.requests_success.fetch_add(1, Ordering::SeqCst);
        self.total_response_time_ms
            .fetch_add(duration.as_millis() as u64, Ordering::SeqCst);
    }

    pub fn record_failure(&self, duration: Duration) {
        self.requests_total.fetch_add(1, Ordering::SeqCst);
        self.requests_failed.fetch_add(1, Ordering::SeqCst);
        self.total_response_time_ms
            .fetch_add(duration.as_millis() as u64, Ordering::SeqCst);
    }

    pub fn record_rate_limited(&self, duration: Duration) {
        self.rate_limited.fetch_add(1, Ordering::SeqCst);
        self.record_failure(duration);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        let total_requests = self.requests_total.load(Ordering::SeqCst);
        let success = self.requests_success.load(Ordering::SeqCst);
        let failed = self.requests_failed.load(Ordering::SeqCst);
        let total_time = self.total_response_time_ms.load(Ordering::SeqCst);

        let success_rate = if total_requests > 0 {
            (success as f64 / total_requests as f64) * 100.0
        } else {
            0.0
        };

        let avg_response_time_ms = if total_requests > 0 {
            total_time / total_requests
        } else {
            0
        };

        MetricsSnapshot {
            items_queued: self.items_queued.load(Ordering::SeqCst),
            items_resolved: self.items_resolved.load(Ordering::SeqCst),
            items_dropped: self.items_dropped.load(Ordering::SeqCst),
            items_skipped: self.items_skipped.load(Ordering::SeqCst),
            cache_hits: self.cache_hits.load(Ordering::SeqCst),
            cache_misses: self.cache_misses.load(Ordering::SeqCst),
            requests_total: total_requests,
            requests_success: success,
            requests_failed: failed,
            rate_limited: self.rate_limited.load(Ordering::SeqCst),
            current_delay_ms: self.current_delay_ms.load(Ordering::SeqCst),
            success_rate,
            avg_response_time_ms,
            elapsed_seconds: self.start_time.elapsed().as_secs_f64(),
        }
    }
}
