use crate::batch::ItemGroup;
use crate::error::Result;
use crate::item::{Variant, WorkItem};
use crate::price::parse_price;
use crate::queue::QueueSettings;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use validator::Validate;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub queue: QueueConfig,

    #[serde(default)]
    pub cache: CacheConfig,

    #[serde(default)]
    pub http: HttpConfig,

    #[serde(default)]
    pub extraction: ExtractionRules,

    #[serde(default)]
    pub output: Option<OutputConfig>,

    /// Optional path to a parent configuration file to inherit from
    #[serde(default)]
    pub extends: Option<String>,
}

impl AppConfig {
    pub fn validate_all(&self) -> Result<()> {
        self.queue.validate()?;
        self.cache.validate()?;
        self.http.validate()?;
        self.extraction.validate()?;
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct QueueConfig {
    #[serde(default = "default_base_delay")]
    pub base_delay_ms: u64,

    #[serde(default = "default_delay_increment")]
    #[validate(range(min = 1))]
    pub delay_increment_ms: u64,

    /// Unset means a 429 is retried for as long as the batch runs.
    #[serde(default)]
    pub max_rate_limit_retries: Option<u32>,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            base_delay_ms: default_base_delay(),
            delay_increment_ms: default_delay_increment(),
            max_rate_limit_retries: None,
        }
    }
}

impl QueueConfig {
    pub fn settings(&self) -> QueueSettings {
        QueueSettings {
            base_delay: Duration::from_millis(self.base_delay_ms),
            delay_increment: Duration::from_millis(self.delay_increment_ms),
            max_rate_limit_retries: self.max_rate_limit_retries,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct CacheConfig {
    #[serde(default)]
    pub backend: CacheBackendConfig,

    #[serde(default = "default_namespace")]
    #[validate(length(min = 1))]
    pub namespace: String,

    #[serde(default = "default_cache_version")]
    pub version: u32,

    #[serde(default = "default_expiration")]
    #[validate(range(min = 1))]
    pub expiration_ms: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            backend: CacheBackendConfig::default(),
            namespace: default_namespace(),
            version: default_cache_version(),
            expiration_ms: default_expiration(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum CacheBackendConfig {
    #[default]
    Memory,
    File {
        path: String,
    },
    Sqlite {
        path: String,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct HttpConfig {
    #[serde(default = "default_user_agent")]
    #[validate(length(min = 1))]
    pub user_agent: String,

    #[serde(default = "default_timeout")]
    #[validate(range(min = 1))]
    pub timeout_secs: u64,

    /// Extra `key=value` query appended to every product URL.
    #[serde(default)]
    pub extra_query: String,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            user_agent: default_user_agent(),
            timeout_secs: default_timeout(),
            extra_query: String::new(),
        }
    }
}

/// ChadSelect queries locating the prices on a product page.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct ExtractionRules {
    #[serde(default = "default_average_selector")]
    #[validate(length(min = 1))]
    pub average_price: String,

    #[serde(default = "default_trend_selector")]
    #[validate(length(min = 1))]
    pub trend_price: String,

    #[serde(default = "default_auxiliary_selector")]
    pub auxiliary: Option<String>,
}

impl Default for ExtractionRules {
    fn default() -> Self {
        Self {
            average_price: default_average_selector(),
            trend_price: default_trend_selector(),
            auxiliary: default_auxiliary_selector(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum OutputConfig {
    Console,
    Json {
        path: String,
    },
    Csv {
        path: String,
    },
}

fn default_base_delay() -> u64 {
    1000
}

fn default_delay_increment() -> u64 {
    1000
}

fn default_namespace() -> String {
    "pricefetch".to_string()
}

fn default_cache_version() -> u32 {
    2
}

fn default_expiration() -> u64 {
    24 * 60 * 60 * 1000
}

fn default_user_agent() -> String {
    "pricefetch/0.1".to_string()
}

fn default_timeout() -> u64 {
    10
}

fn default_average_selector() -> String {
    "xpath://dt[normalize-space(.)='30-days average price']/following-sibling::dd[1]//span/text()"
        .to_string()
}

fn default_trend_selector() -> String {
    "xpath://dt[normalize-space(.)='Price Trend']/following-sibling::dd[1]//span/text()".to_string()
}

fn default_auxiliary_selector() -> Option<String> {
    Some("css:#tabContent-info .chart-wrapper".to_string())
}

/// The list of items to price, grouped by seller.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct ItemsFile {
    /// What the whole cart costs, e.g. `"42,10 €"`.
    #[serde(default)]
    pub cart_total: Option<String>,

    #[validate(length(min = 1))]
    pub groups: Vec<GroupSpec>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GroupSpec {
    pub name: String,

    #[serde(default)]
    pub paid_total: Option<String>,

    #[serde(default)]
    pub items: Vec<ItemSpec>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ItemSpec {
    #[serde(default)]
    pub label: Option<String>,

    #[serde(default)]
    pub link: Option<String>,

    #[serde(default)]
    pub foil: bool,

    #[serde(default)]
    pub quantity: Option<u32>,

    #[serde(default)]
    pub seller_price: Option<String>,
}

impl ItemSpec {
    pub fn to_work_item(&self, extra_query: &str) -> WorkItem {
        let variant = if self.foil { Variant::Foil } else { Variant::Regular };
        let label = self
            .label
            .clone()
            .or_else(|| self.link.clone())
            .unwrap_or_else(|| "Unknown Product Name".to_string());

        let mut item = WorkItem::from_link(label, self.link.as_deref(), variant, extra_query);
        item.quantity = self.quantity;
        item.seller_price_text = self.seller_price.clone();
        item
    }
}

impl ItemsFile {
    pub fn cart_total(&self) -> Option<f64> {
        self.cart_total.as_deref().map(parse_price)
    }

    pub fn to_groups(&self, extra_query: &str) -> Vec<ItemGroup> {
        self.groups
            .iter()
            .map(|group| ItemGroup {
                name: group.name.clone(),
                paid_total: group.paid_total.as_deref().map(parse_price),
                items: group
                    .items
                    .iter()
                    .map(|item| item.to_work_item(extra_query))
                    .collect(),
            })
            .collect()
    }
}
