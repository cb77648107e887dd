use crate::error::{Error, Result};
use crate::extractor::RawRecord;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Text the marketplace shows when a price is missing.
pub const UNAVAILABLE: &str = "N/A";

const CURRENCY_SUFFIX: &str = " €";

/// Parses a localized price such as `"12,34 €"`.
///
/// Returns `NaN` for the unavailable sentinel and for anything that does not
/// start with a number. Like a browser's `parseFloat`, trailing garbage after
/// the leading number is ignored.
pub fn parse_price(text: &str) -> f64 {
    let text = text.trim();
    if text.is_empty() || text == UNAVAILABLE {
        return f64::NAN;
    }

    let cleaned = text.replacen(CURRENCY_SUFFIX, "", 1);
    let cleaned = cleaned.trim().trim_end_matches('€').trim_end();
    let cleaned = cleaned.replacen(',', ".", 1);

    leading_float(&cleaned).unwrap_or(f64::NAN)
}

fn leading_float(s: &str) -> Option<f64> {
    let bytes = s.as_bytes();
    let mut end = 0;

    if matches!(bytes.first(), Some(b'+' | b'-')) {
        end = 1;
    }

    let int_start = end;
    while end < bytes.len() && bytes[end].is_ascii_digit() {
        end += 1;
    }
    let mut digits = end - int_start;

    if end < bytes.len() && bytes[end] == b'.' {
        let frac_start = end + 1;
        let mut frac_end = frac_start;
        while frac_end < bytes.len() && bytes[frac_end].is_ascii_digit() {
            frac_end += 1;
        }
        digits += frac_end - frac_start;
        end = frac_end;
    }

    if digits == 0 {
        return None;
    }

    if end < bytes.len() && matches!(bytes[end], b'e' | b'E') {
        let mut exp_end = end + 1;
        if matches!(bytes.get(exp_end), Some(b'+' | b'-')) {
            exp_end += 1;
        }
        let exp_digits = exp_end;
        while exp_end < bytes.len() && bytes[exp_end].is_ascii_digit() {
            exp_end += 1;
        }
        if exp_end > exp_digits {
            end = exp_end;
        }
    }

    s[..end].parse().ok()
}

/// Prices for one item, already multiplied by its quantity.
///
/// `NaN` marks a price that could not be parsed and is kept as-is through
/// every sum and difference.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PricedRecord {
    pub average_price: f64,
    pub trend_price: f64,
    pub seller_price: f64,
    pub quantity: u32,
    pub average_price_text: String,
    pub trend_price_text: String,
    #[serde(default)]
    pub auxiliary: Value,
}

impl PricedRecord {
    pub fn compute(raw: &RawRecord, seller_price_text: Option<&str>, quantity: u32) -> Result<Self> {
        raw.validate()?;
        if quantity == 0 {
            return Err(Error::Processing("quantity must be at least 1".to_string()));
        }

        let q = f64::from(quantity);
        let seller = parse_price(seller_price_text.unwrap_or(UNAVAILABLE));

        Ok(Self {
            average_price: parse_price(&raw.average_price_text) * q,
            trend_price: parse_price(&raw.trend_price_text) * q,
            seller_price: seller * q,
            quantity,
            average_price_text: raw.average_price_text.clone(),
            trend_price_text: raw.trend_price_text.clone(),
            auxiliary: raw.auxiliary.clone(),
        })
    }

    /// Market average relative to what the seller asks. Above 1 is a bargain.
    pub fn average_ratio(&self) -> f64 {
        self.average_price / self.seller_price
    }

    pub fn trend_ratio(&self) -> f64 {
        self.trend_price / self.seller_price
    }
}
