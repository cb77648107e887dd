use super::Renderer;
use crate::batch::GroupSummary;
use crate::error::Result;
use crate::item::WorkItem;
use crate::price::PricedRecord;
use serde_json::json;
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::PathBuf;

/// Streams a JSON array of item and summary objects. Unparseable prices
/// come out as `null`.
pub struct JsonRenderer {
    file: File,
    first: bool,
}

impl JsonRenderer {
    pub fn new(path: PathBuf) -> Result<Self> {
        let mut file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(path)?;

        write!(file, "[")?;

        Ok(Self {
            file,
            first: true,
        })
    }

    fn write_value(&mut self, value: &serde_json::Value) -> Result<()> {
        if !self.first {
            write!(self.file, ",")?;
        } else {
            self.first = false;
        }

        serde_json::to_writer(&mut self.file, value)?;
        Ok(())
    }
}

impl Renderer for JsonRenderer {
    fn render(&mut self, item: &WorkItem, priced: &PricedRecord) -> Result<()> {
        self.write_value(&json!({
            "kind": "item",
            "key": item.key(),
            "label": item.label,
            "variant": item.variant,
            "prices": priced,
        }))
    }

    fn render_summary(&mut self, summary: &GroupSummary) -> Result<()> {
        self.write_value(&json!({
            "kind": "summary",
            "summary": summary,
            "profit_average": summary.profit_average(),
            "profit_trend": summary.profit_trend(),
        }))
    }

    fn finish(&mut self) -> Result<()> {
        write!(self.file, "]")?;
        self.file.flush()?;
        Ok(())
    }
}
