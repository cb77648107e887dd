use crate::error::{Error, Result};
use crate::item::WorkItem;
use crate::price::PricedRecord;
use crate::queue::{BatchOutcome, BatchResults, CancelHandle, FetchQueue, QueueState};
use crate::render::{render_logged, render_summary_logged, Renderer};
use serde::{Deserialize, Serialize};

/// Items belonging to one seller.
#[derive(Debug, Clone)]
pub struct ItemGroup {
    pub name: String,
    /// What was paid to this seller, `NaN` if the text did not parse.
    pub paid_total: Option<f64>,
    pub items: Vec<WorkItem>,
}

/// Estimated market value of a group against what it cost.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupSummary {
    pub name: String,
    pub item_count: usize,
    pub estimated_average: f64,
    pub estimated_trend: f64,
    pub paid_total: Option<f64>,
}

impl GroupSummary {
    /// Sums the prices as-is, so a single `NaN` poisons the estimate.
    pub fn from_results(name: impl Into<String>, results: &BatchResults, paid_total: Option<f64>) -> Self {
        Self {
            name: name.into(),
            item_count: results.len(),
            estimated_average: results.values().map(|p| p.average_price).sum(),
            estimated_trend: results.values().map(|p| p.trend_price).sum(),
            paid_total,
        }
    }

    pub fn total(name: impl Into<String>, groups: &[GroupSummary], paid_total: Option<f64>) -> Self {
        Self {
            name: name.into(),
            item_count: groups.iter().map(|g| g.item_count).sum(),
            estimated_average: groups.iter().map(|g| g.estimated_average).sum(),
            estimated_trend: groups.iter().map(|g| g.estimated_trend).sum(),
            paid_total,
        }
    }

    pub fn profit_average(&self) -> Option<f64> {
        self.paid_total.map(|paid| self.estimated_average - paid)
    }

    pub fn profit_trend(&self) -> Option<f64> {
        self.paid_total.map(|paid| self.estimated_trend - paid)
    }
}

#[derive(Debug)]
pub enum GroupOutcome {
    Completed {
        groups: Vec<GroupSummary>,
        total: GroupSummary,
    },
    Cancelled,
}

pub struct BatchOrchestrator {
    queue: FetchQueue,
}

impl BatchOrchestrator {
    pub fn new(queue: FetchQueue) -> Self {
        Self { queue }
    }

    pub fn queue(&self) -> &FetchQueue {
        &self.queue
    }

    /// Resolves every item, serving cache hits immediately and queueing the
    /// rest. `cancel` should be a fresh handle per batch.
    pub async fn run_batch(
        &self,
        items: Vec<WorkItem>,
        renderer: &mut dyn Renderer,
        cancel: CancelHandle,
    ) -> BatchOutcome {
        let metrics = self.queue.metrics();
        let mut cached = BatchResults::new();
        let mut misses = Vec::new();

        for item in items {
            metrics.increment_items_queued();

            let Some(key) = item.key() else {
                log::debug!("Skipping \"{}\": no product link", item.label);
                metrics.increment_items_skipped();
                continue;
            };

            let hit = self.queue.cache().get(key).await;
            match hit {
                Some(raw) => {
                    metrics.increment_cache_hits();
                    match self.queue.price(&item, &raw) {
                        Ok(priced) => {
                            render_logged(renderer, &item, &priced);
                            cached.insert(key.to_string(), priced);
                            metrics.increment_items_resolved();
                        }
                        Err(e) => {
                            log::error!("Error processing cached data for \"{}\": {}", item.label, e);
                            metrics.increment_items_dropped();
                        }
                    }
                }
                None => {
                    metrics.increment_cache_misses();
                    misses.push(item);
                }
            }
        }

        if misses.is_empty() {
            log::info!("All items satisfied via cache. Nothing left to fetch.");
            return BatchOutcome::Completed(cached);
        }

        let mut state = QueueState::with_cancel(misses, self.queue.settings().base_delay, cancel);
        match self.queue.run(&mut state, renderer).await {
            BatchOutcome::Completed(mut fetched) => {
                fetched.extend(cached);
                BatchOutcome::Completed(fetched)
            }
            BatchOutcome::Cancelled => BatchOutcome::Cancelled,
        }
    }

    /// The per-line action: one item, cache or network, no queue delay.
    pub async fn fetch_one(&self, item: &WorkItem, renderer: &mut dyn Renderer) -> Result<PricedRecord> {
        let key = item
            .key()
            .ok_or_else(|| Error::Processing(format!("\"{}\" has no product link", item.label)))?;

        let raw = self.queue.resolve(key).await?;
        let priced = self.queue.price(item, &raw)?;
        render_logged(renderer, item, &priced);
        Ok(priced)
    }

    /// Runs one batch per group, one after another, then totals them up
    /// against `cart_total`. Cancelling any group cancels the whole run.
    pub async fn run_groups(
        &self,
        groups: Vec<ItemGroup>,
        cart_total: Option<f64>,
        renderer: &mut dyn Renderer,
        cancel: CancelHandle,
    ) -> GroupOutcome {
        let mut summaries = Vec::with_capacity(groups.len());

        for group in groups {
            if group.items.is_empty() {
                log::warn!("No items found for group \"{}\", skipping", group.name);
                continue;
            }

            log::info!("Processing group \"{}\" ({} items)", group.name, group.items.len());
            let results = match self.run_batch(group.items, renderer, cancel.clone()).await {
                BatchOutcome::Completed(results) => results,
                BatchOutcome::Cancelled => return GroupOutcome::Cancelled,
            };

            let summary = GroupSummary::from_results(group.name, &results, group.paid_total);
            render_summary_logged(renderer, &summary);
            summaries.push(summary);
        }

        let total = GroupSummary::total("Total", &summaries, cart_total);
        render_summary_logged(renderer, &total);

        GroupOutcome::Completed {
            groups: summaries,
            total,
        }
    }
}
