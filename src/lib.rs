pub mod batch;
pub mod cache;
pub mod config;
pub mod error;
pub mod extractor;
pub mod item;
pub mod metrics;
pub mod price;
pub mod queue;
pub mod render;

pub use batch::{BatchOrchestrator, GroupOutcome, GroupSummary, ItemGroup};
pub use cache::{CacheBackend, CacheStore};
pub use error::{Error, Result};
pub use extractor::{Extractor, HttpExtractor, RawRecord};
pub use item::{QuantityResolver, Variant, WorkItem};
pub use metrics::{MetricsCollector, MetricsSnapshot};
pub use price::{parse_price, PricedRecord};
pub use queue::{BatchOutcome, BatchResults, CancelHandle, FetchQueue, QueueSettings, QueueState, QueueStatus};
pub use render::Renderer;
