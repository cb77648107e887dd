use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    pub items_queued: u64,
    pub items_resolved: u64,
    pub items_dropped: u64,
    pub items_skipped: u64,
    pub cache_hits: u64,
    pub cache_misses: u64,
    pub requests_total: u64,
    pub requests_success: u64,
    pub requests_failed: u64,
    pub rate_limited: u64,
    pub current_delay_ms: u64,
    pub success_rate: f64,
    pub avg_response_time_ms: u64,
    pub elapsed_seconds: f64,
}

impl MetricsSnapshot {
    /// Items that reached a final state, resolved or not.
    pub fn items_finished(&self) -> u64 {
        self.items_resolved + self.items_dropped + self.items_skipped
    }
}
