use crate::config::schema::{ExtractionRules, HttpConfig};
use crate::error::{Error, Result};
use crate::price::UNAVAILABLE;
use async_trait::async_trait;
use chadselect::ChadSelect;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;

/// What an extractor pulls out of one product page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawRecord {
    pub average_price_text: String,
    pub trend_price_text: String,
    /// Opaque page fragment handed through to renderers (the price chart).
    #[serde(default)]
    pub auxiliary: Value,
}

impl RawRecord {
    pub fn new(average_price_text: impl Into<String>, trend_price_text: impl Into<String>) -> Self {
        Self {
            average_price_text: average_price_text.into(),
            trend_price_text: trend_price_text.into(),
            auxiliary: Value::Null,
        }
    }

    pub fn with_auxiliary(mut self, auxiliary: Value) -> Self {
        self.auxiliary = auxiliary;
        self
    }

    /// A record with no price text at all did not come from a product page.
    /// Missing prices must be spelled with the `N/A` sentinel.
    pub fn validate(&self) -> Result<()> {
        if self.average_price_text.trim().is_empty() && self.trend_price_text.trim().is_empty() {
            return Err(Error::Processing("record carries no price fields".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
pub trait Extractor: Send + Sync {
    /// Fetches `url` and extracts its record. A non-200 response must surface
    /// as [`Error::Status`] so the queue can recognise rate limiting.
    async fn extract(&self, url: &str) -> Result<RawRecord>;
}

pub struct HttpExtractor {
    client: Client,
    rules: ExtractionRules,
}

impl HttpExtractor {
    pub fn new(http: &HttpConfig, rules: ExtractionRules) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(http.timeout_secs))
            .user_agent(http.user_agent.as_str())
            .build()?;

        Ok(Self { client, rules })
    }

    fn extract_record(&self, html: String) -> RawRecord {
        let mut cs = ChadSelect::new();
        cs.add_html(html);

        let average = select_text(&cs, &self.rules.average_price);
        let trend = select_text(&cs, &self.rules.trend_price);

        let auxiliary = self
            .rules
            .auxiliary
            .as_ref()
            .map(|query| cs.select(0, &normalize_query(query)))
            .filter(|fragment| !fragment.trim().is_empty())
            .map(Value::String)
            .unwrap_or(Value::Null);

        RawRecord {
            average_price_text: average.unwrap_or_else(|| UNAVAILABLE.to_string()),
            trend_price_text: trend.unwrap_or_else(|| UNAVAILABLE.to_string()),
            auxiliary,
        }
    }
}

const QUERY_PREFIXES: [&str; 3] = ["css:", "xpath:", "regex:"];

/// Bare selectors are treated as CSS; prefixed queries pass through.
fn normalize_query(selector: &str) -> String {
    if QUERY_PREFIXES.iter().any(|prefix| selector.starts_with(prefix)) {
        selector.to_string()
    } else {
        format!("css:{}", selector)
    }
}

fn select_text(cs: &ChadSelect, selector: &str) -> Option<String> {
    let val = cs.select(0, &normalize_query(selector));
    let val = val.trim();
    if val.is_empty() {
        None
    } else {
        Some(val.to_string())
    }
}

#[async_trait]
impl Extractor for HttpExtractor {
    async fn extract(&self, url: &str) -> Result<RawRecord> {
        log::debug!("Fetching product page: {}", url);

        let res = self.client.get(url).send().await?;
        let status = res.status();
        if status.as_u16() != 200 {
            return Err(Error::Status {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }

        let html = res
            .text()
            .await
            .map_err(|e| Error::Extraction(format!("unreadable body from {}: {}", url, e)))?;
        log::debug!("HTML length: {} bytes", html.len());

        let record = self.extract_record(html);
        if record.average_price_text == UNAVAILABLE && record.trend_price_text == UNAVAILABLE {
            log::warn!("No prices found on {}", url);
        }
        Ok(record)
    }
}
