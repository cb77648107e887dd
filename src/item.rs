use serde::{Deserialize, Serialize};
use url::Url;

/// Printing of a product; the marketplace prices foils separately.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Variant {
    #[default]
    Regular,
    Foil,
}

impl Variant {
    pub fn query(self) -> &'static str {
        match self {
            Variant::Regular => "isFoil=N",
            Variant::Foil => "isFoil=Y",
        }
    }
}

/// One unit of work for the fetch queue.
///
/// The key is the canonical product URL, which doubles as the address the
/// extractor fetches. Items without a key are skipped by the queue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkItem {
    key: Option<String>,
    pub label: String,
    pub variant: Variant,
    pub quantity: Option<u32>,
    pub seller_price_text: Option<String>,
}

impl WorkItem {
    /// Builds an item from a product link, canonicalising it with the
    /// variant flag and any extra query (`"k=v"`, may be empty).
    pub fn from_link(
        label: impl Into<String>,
        link: Option<&str>,
        variant: Variant,
        extra_query: &str,
    ) -> Self {
        let key = link.and_then(|link| canonical_url(link, &[extra_query, variant.query()]));
        if key.is_none() {
            log::debug!("No usable product link for item {:?}", link);
        }

        Self {
            key,
            label: label.into(),
            variant,
            quantity: None,
            seller_price_text: None,
        }
    }

    /// Item with a caller-chosen key.
    pub fn keyed(key: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            key: Some(key.into()),
            label: label.into(),
            variant: Variant::Regular,
            quantity: None,
            seller_price_text: None,
        }
    }

    /// Item that cannot yield a lookup key.
    pub fn unkeyed(label: impl Into<String>) -> Self {
        Self {
            key: None,
            label: label.into(),
            variant: Variant::Regular,
            quantity: None,
            seller_price_text: None,
        }
    }

    pub fn with_quantity(mut self, quantity: u32) -> Self {
        self.quantity = Some(quantity);
        self
    }

    pub fn with_seller_price(mut self, text: impl Into<String>) -> Self {
        self.seller_price_text = Some(text.into());
        self
    }

    pub fn key(&self) -> Option<&str> {
        self.key.as_deref()
    }
}

/// Replaces (or appends) each `k=v` query on `base`. Empty entries are ignored.
pub fn canonical_url(base: &str, queries: &[&str]) -> Option<String> {
    let mut url = Url::parse(base).ok()?;

    for query in queries.iter().filter(|q| !q.is_empty()) {
        let (key, value) = query.split_once('=').unwrap_or((*query, ""));

        let kept: Vec<(String, String)> = url
            .query_pairs()
            .filter(|(k, _)| k != key)
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect();

        url.query_pairs_mut()
            .clear()
            .extend_pairs(kept)
            .append_pair(key, value);
    }

    Some(url.to_string())
}

/// Supplies the per-item multiplier applied to every price.
pub trait QuantityResolver: Send + Sync {
    /// Always at least 1.
    fn quantity(&self, item: &WorkItem) -> u32;
}

/// Reads the quantity carried on the item, defaulting to 1.
#[derive(Debug, Clone, Copy, Default)]
pub struct ItemQuantity;

impl QuantityResolver for ItemQuantity {
    fn quantity(&self, item: &WorkItem) -> u32 {
        item.quantity.filter(|q| *q >= 1).unwrap_or(1)
    }
}
