use super::Renderer;
use crate::error::{Error, Result};
use crate::item::WorkItem;
use crate::price::PricedRecord;
use std::path::PathBuf;

const HEADERS: [&str; 8] = [
    "key",
    "label",
    "quantity",
    "average_price",
    "trend_price",
    "seller_price",
    "average_price_text",
    "trend_price_text",
];

pub struct CsvRenderer {
    writer: csv::Writer<std::fs::File>,
    headers_written: bool,
}

impl CsvRenderer {
    pub fn new(path: PathBuf) -> Result<Self> {
        let writer = csv::Writer::from_path(path)
            .map_err(|e| Error::Internal(e.to_string()))?;

        Ok(Self {
            writer,
            headers_written: false,
        })
    }
}

fn number(value: f64) -> String {
    if value.is_nan() {
        String::new()
    } else {
        format!("{:.2}", value)
    }
}

impl Renderer for CsvRenderer {
    fn render(&mut self, item: &WorkItem, priced: &PricedRecord) -> Result<()> {
        if !self.headers_written {
            self.writer.write_record(HEADERS)
                .map_err(|e| Error::Internal(e.to_string()))?;
            self.headers_written = true;
        }

        self.writer
            .write_record([
                item.key().unwrap_or_default().to_string(),
                item.label.clone(),
                priced.quantity.to_string(),
                number(priced.average_price),
                number(priced.trend_price),
                number(priced.seller_price),
                priced.average_price_text.clone(),
                priced.trend_price_text.clone(),
            ])
            .map_err(|e| Error::Internal(e.to_string()))?;
        Ok(())
    }

    fn finish(&mut self) -> Result<()> {
        self.writer.flush()?;
        Ok(())
    }
}
