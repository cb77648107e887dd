//! Sequential, rate-limited fetch queue.
//!
//! One item is in flight at a time. Between items the queue sleeps for the
//! batch delay, which grows by a fixed increment on every HTTP 429 and never
//! shrinks inside a batch. A rate-limited item goes to the back of the queue
//! and is retried. Any other failure drops the item. Cancellation is a
//! one-way latch checked before each dequeue and after each response; it
//! never interrupts a request already in flight, but the response that
//! arrives after it is neither rendered nor kept.

use crate::cache::CacheStore;
use crate::error::Result;
use crate::extractor::{Extractor, RawRecord};
use crate::item::{ItemQuantity, QuantityResolver, WorkItem};
use crate::metrics::collector::MetricsCollector;
use crate::metrics::snapshot::MetricsSnapshot;
use crate::price::PricedRecord;
use crate::render::{render_logged, Renderer};
use std::collections::{HashMap, VecDeque};
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};
use std::time::{Duration, Instant};
use tokio::sync::watch;
use tokio::time::sleep;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueueStatus {
    Idle,
    Running,
    Draining,
    Completed,
}

/// Cancellation latch shared between a batch and whoever may stop it.
#[derive(Debug, Clone, Default)]
pub struct CancelHandle(Arc<AtomicBool>);

impl CancelHandle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        if !self.0.swap(true, Ordering::SeqCst) {
            log::info!("Cancellation requested...");
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

pub type BatchResults = HashMap<String, PricedRecord>;

#[derive(Debug)]
pub enum BatchOutcome {
    Completed(BatchResults),
    /// Cancelled batches report nothing, not even items already resolved.
    Cancelled,
}

impl BatchOutcome {
    pub fn into_results(self) -> Option<BatchResults> {
        match self {
            BatchOutcome::Completed(results) => Some(results),
            BatchOutcome::Cancelled => None,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, BatchOutcome::Cancelled)
    }
}

#[derive(Debug, Clone, Copy)]
pub struct QueueSettings {
    pub base_delay: Duration,
    pub delay_increment: Duration,
    pub max_rate_limit_retries: Option<u32>,
}

impl Default for QueueSettings {
    fn default() -> Self {
        Self {
            base_delay: Duration::from_millis(1000),
            delay_increment: Duration::from_millis(1000),
            max_rate_limit_retries: None,
        }
    }
}

/// Everything one batch owns. Built fresh per batch, so the delay and the
/// cancel latch always start from scratch.
#[derive(Debug)]
pub struct QueueState {
    pending: VecDeque<WorkItem>,
    delay: Duration,
    cancel: CancelHandle,
    results: BatchResults,
    rate_limit_hits: HashMap<String, u32>,
}

impl QueueState {
    pub fn new(items: impl IntoIterator<Item = WorkItem>, base_delay: Duration) -> Self {
        Self::with_cancel(items, base_delay, CancelHandle::new())
    }

    pub fn with_cancel(
        items: impl IntoIterator<Item = WorkItem>,
        base_delay: Duration,
        cancel: CancelHandle,
    ) -> Self {
        Self {
            pending: items.into_iter().collect(),
            delay: base_delay,
            cancel,
            results: BatchResults::new(),
            rate_limit_hits: HashMap::new(),
        }
    }

    pub fn cancel_handle(&self) -> CancelHandle {
        self.cancel.clone()
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }
}

pub struct FetchQueue {
    settings: QueueSettings,
    extractor: Arc<dyn Extractor>,
    cache: Arc<CacheStore>,
    quantities: Arc<dyn QuantityResolver>,
    metrics: Arc<MetricsCollector>,
    status: watch::Sender<QueueStatus>,
}

impl FetchQueue {
    pub fn new(
        settings: QueueSettings,
        extractor: Arc<dyn Extractor>,
        cache: Arc<CacheStore>,
        metrics: Option<Arc<MetricsCollector>>,
    ) -> Self {
        let (status_tx, _) = watch::channel(QueueStatus::Idle);

        Self {
            settings,
            extractor,
            cache,
            quantities: Arc::new(ItemQuantity),
            metrics: metrics.unwrap_or_else(|| Arc::new(MetricsCollector::new())),
            status: status_tx,
        }
    }

    pub fn with_quantity_resolver(mut self, quantities: Arc<dyn QuantityResolver>) -> Self {
        self.quantities = quantities;
        self
    }

    pub fn settings(&self) -> &QueueSettings {
        &self.settings
    }

    pub fn cache(&self) -> &CacheStore {
        &self.cache
    }

    pub fn metrics(&self) -> &MetricsCollector {
        &self.metrics
    }

    pub fn new_state(&self, items: impl IntoIterator<Item = WorkItem>) -> QueueState {
        QueueState::new(items, self.settings.base_delay)
    }

    pub fn status(&self) -> QueueStatus {
        *self.status.borrow()
    }

    pub fn watch_status(&self) -> watch::Receiver<QueueStatus> {
        self.status.subscribe()
    }

    pub fn get_metrics(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }

    pub fn watch_metrics(&self) -> watch::Receiver<MetricsSnapshot> {
        let (tx, rx) = watch::channel(self.metrics.snapshot());
        let metrics = self.metrics.clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(Duration::from_millis(500));
            loop {
                interval.tick().await;
                if tx.send(metrics.snapshot()).is_err() {
                    break;
                }
            }
        });
        rx
    }

    fn set_status(&self, status: QueueStatus) {
        self.status.send_replace(status);
    }

    /// Turns a raw record into prices for `item`.
    pub fn price(&self, item: &WorkItem, raw: &RawRecord) -> Result<PricedRecord> {
        let quantity = self.quantities.quantity(item).max(1);
        PricedRecord::compute(raw, item.seller_price_text.as_deref(), quantity)
    }

    /// Cache first, then the extractor. Fresh records are validated before
    /// they are cached.
    pub async fn resolve(&self, url: &str) -> Result<RawRecord> {
        if let Some(raw) = self.cache.get(url).await {
            self.metrics.increment_cache_hits();
            return Ok(raw);
        }

        let start_time = Instant::now();
        let result = self.extractor.extract(url).await;
        let duration = start_time.elapsed();

        match result {
            Ok(raw) => {
                self.metrics.record_success(duration);
                raw.validate()?;
                if let Err(e) = self.cache.put(url, &raw).await {
                    log::warn!("Could not cache {}: {}", url, e);
                }
                Ok(raw)
            }
            Err(e) => {
                if e.is_rate_limited() {
                    self.metrics.record_rate_limited(duration);
                } else {
                    self.metrics.record_failure(duration);
                }
                Err(e)
            }
        }
    }

    /// Drives `state` until its queue is empty or it is cancelled.
    pub async fn run(&self, state: &mut QueueState, renderer: &mut dyn Renderer) -> BatchOutcome {
        if state.pending.is_empty() {
            return BatchOutcome::Completed(std::mem::take(&mut state.results));
        }

        self.set_status(QueueStatus::Running);
        self.metrics.set_current_delay(state.delay);
        log::info!(
            "Processing {} items, delay {}ms",
            state.pending.len(),
            state.delay.as_millis()
        );

        loop {
            if state.cancel.is_cancelled() {
                return self.drain(state);
            }

            let Some(item) = state.pending.pop_front() else {
                break;
            };

            let Some(url) = item.key().map(str::to_string) else {
                log::debug!("Skipping \"{}\": no product link", item.label);
                self.metrics.increment_items_skipped();
                continue;
            };

            let resolved = self.resolve(&url).await;
            if state.cancel.is_cancelled() {
                return self.drain(state);
            }

            match resolved {
                Ok(raw) => self.accept(state, &item, &url, &raw, renderer),
                Err(e) if e.is_rate_limited() => self.back_off(state, item, &url),
                Err(e) => {
                    log::error!("Error fetching product page for \"{}\" ({}): {}", item.label, url, e);
                    self.metrics.increment_items_dropped();
                }
            }

            if state.pending.is_empty() {
                break;
            }

            sleep(state.delay).await;
        }

        self.set_status(QueueStatus::Completed);
        let results = std::mem::take(&mut state.results);
        log::info!("Processing finished: {} items resolved", results.len());
        self.set_status(QueueStatus::Idle);
        BatchOutcome::Completed(results)
    }

    fn accept(
        &self,
        state: &mut QueueState,
        item: &WorkItem,
        url: &str,
        raw: &RawRecord,
        renderer: &mut dyn Renderer,
    ) {
        match self.price(item, raw) {
            Ok(priced) => {
                render_logged(renderer, item, &priced);
                state.results.insert(url.to_string(), priced);
                self.metrics.increment_items_resolved();
            }
            Err(e) => {
                log::error!("Error processing product page for \"{}\" ({}): {}", item.label, url, e);
                self.metrics.increment_items_dropped();
            }
        }
    }

    fn back_off(&self, state: &mut QueueState, item: WorkItem, url: &str) {
        state.delay += self.settings.delay_increment;
        self.metrics.set_current_delay(state.delay);

        let hits = state.rate_limit_hits.entry(url.to_string()).or_insert(0);
        *hits += 1;

        if let Some(max) = self.settings.max_rate_limit_retries {
            if *hits > max {
                log::error!("Giving up on \"{}\" after {} rate-limited attempts", item.label, hits);
                self.metrics.increment_items_dropped();
                return;
            }
        }

        log::warn!(
            "Rate limited on {}; delay now {}ms, retrying later",
            url,
            state.delay.as_millis()
        );
        state.pending.push_back(item);
    }

    fn drain(&self, state: &mut QueueState) -> BatchOutcome {
        self.set_status(QueueStatus::Draining);
        let discarded = state.pending.len();
        state.pending.clear();
        state.results.clear();
        log::info!("Processing canceled; {} pending items discarded", discarded);
        self.set_status(QueueStatus::Idle);
        BatchOutcome::Cancelled
    }
}
