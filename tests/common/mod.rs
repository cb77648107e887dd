#![allow(dead_code)]

use async_trait::async_trait;
use pricefetch::batch::GroupSummary;
use pricefetch::error::{Error, Result};
use pricefetch::extractor::{Extractor, RawRecord};
use pricefetch::item::WorkItem;
use pricefetch::price::PricedRecord;
use pricefetch::queue::{CancelHandle, FetchQueue, QueueSettings};
use pricefetch::render::Renderer;
use pricefetch::{BatchOrchestrator, CacheStore};
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub enum Reply {
    Ok(RawRecord),
    Status(u16),
    Malformed,
}

/// Answers from a per-URL script; once a script runs dry every call succeeds
/// with a default record.
#[derive(Default)]
pub struct ScriptedExtractor {
    scripts: Mutex<HashMap<String, VecDeque<Reply>>>,
    calls: Mutex<Vec<String>>,
    cancel_on: Mutex<Option<(String, CancelHandle)>>,
}

impl ScriptedExtractor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn script(&self, url: &str, replies: Vec<Reply>) {
        self.scripts
            .lock()
            .unwrap()
            .insert(url.to_string(), replies.into_iter().collect());
    }

    /// Requests cancellation while `url` is in flight.
    pub fn cancel_during(&self, url: &str, handle: CancelHandle) {
        *self.cancel_on.lock().unwrap() = Some((url.to_string(), handle));
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

pub fn record_for(url: &str) -> RawRecord {
    RawRecord::new("2,00 €", "1,00 €").with_auxiliary(serde_json::json!(url))
}

#[async_trait]
impl Extractor for ScriptedExtractor {
    async fn extract(&self, url: &str) -> Result<RawRecord> {
        self.calls.lock().unwrap().push(url.to_string());

        if let Some((target, handle)) = self.cancel_on.lock().unwrap().as_ref() {
            if target == url {
                handle.cancel();
            }
        }

        let reply = self
            .scripts
            .lock()
            .unwrap()
            .get_mut(url)
            .and_then(|script| script.pop_front());

        match reply {
            Some(Reply::Ok(record)) => Ok(record),
            Some(Reply::Status(status)) => Err(Error::Status {
                status,
                url: url.to_string(),
            }),
            Some(Reply::Malformed) => Ok(RawRecord::new("", "")),
            None => Ok(record_for(url)),
        }
    }
}

#[derive(Default)]
pub struct RecordingRenderer {
    pub rendered: Vec<(String, PricedRecord)>,
    pub summaries: Vec<GroupSummary>,
}

impl Renderer for RecordingRenderer {
    fn render(&mut self, item: &WorkItem, priced: &PricedRecord) -> Result<()> {
        self.rendered.push((item.label.clone(), priced.clone()));
        Ok(())
    }

    fn render_summary(&mut self, summary: &GroupSummary) -> Result<()> {
        self.summaries.push(summary.clone());
        Ok(())
    }
}

pub fn settings(base_ms: u64, increment_ms: u64) -> QueueSettings {
    QueueSettings {
        base_delay: Duration::from_millis(base_ms),
        delay_increment: Duration::from_millis(increment_ms),
        max_rate_limit_retries: None,
    }
}

pub fn queue_with(extractor: Arc<ScriptedExtractor>, cache: Arc<CacheStore>) -> FetchQueue {
    FetchQueue::new(settings(1000, 1000), extractor, cache, None)
}

pub fn orchestrator_with(extractor: Arc<ScriptedExtractor>, cache: Arc<CacheStore>) -> BatchOrchestrator {
    BatchOrchestrator::new(queue_with(extractor, cache))
}

pub fn item(url: &str) -> WorkItem {
    WorkItem::keyed(url, url)
}
