use super::{diff_marker, Renderer};
use crate::batch::GroupSummary;
use crate::error::{Error, Result};
use crate::item::{Variant, WorkItem};
use crate::price::PricedRecord;
use indicatif::MultiProgress;
use std::sync::Arc;

pub struct ConsoleRenderer {
    multi: Option<Arc<MultiProgress>>,
}

impl ConsoleRenderer {
    pub fn new(multi: Option<Arc<MultiProgress>>) -> Self {
        Self { multi }
    }

    fn print(&self, line: &str) -> Result<()> {
        if let Some(multi) = &self.multi {
            multi.println(line).map_err(|e| Error::Internal(e.to_string()))?;
        } else {
            println!("{}", line);
        }
        Ok(())
    }
}

impl Default for ConsoleRenderer {
    fn default() -> Self {
        Self::new(None)
    }
}

pub fn format_item(item: &WorkItem, priced: &PricedRecord) -> String {
    let star = if item.variant == Variant::Foil { " ⭐" } else { "" };
    let (avg_sign, avg_diff) = diff_marker(priced.average_ratio());
    let (trend_sign, trend_diff) = diff_marker(priced.trend_ratio());

    format!(
        "{}{} x{} | 30-day: {} | Diff: {}{} | Trend: {} | Diff: {}{}",
        item.label,
        star,
        priced.quantity,
        priced.average_price_text,
        avg_sign,
        avg_diff,
        priced.trend_price_text,
        trend_sign,
        trend_diff,
    )
}

pub fn format_summary(summary: &GroupSummary) -> String {
    let mut line = format!(
        "{} ({} items) | Estimated Value 30-day: {:.2} € | Trend: {:.2} €",
        summary.name, summary.item_count, summary.estimated_average, summary.estimated_trend,
    );
    if let (Some(average), Some(trend)) = (summary.profit_average(), summary.profit_trend()) {
        line.push_str(&format!(" | Profit 30-day: {:.2} € | Trend: {:.2} €", average, trend));
    }
    line
}

impl Renderer for ConsoleRenderer {
    fn render(&mut self, item: &WorkItem, priced: &PricedRecord) -> Result<()> {
        self.print(&format_item(item, priced))
    }

    fn render_summary(&mut self, summary: &GroupSummary) -> Result<()> {
        self.print(&format_summary(summary))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extractor::RawRecord;

    #[test]
    fn item_line_shows_texts_and_diffs() {
        let item = WorkItem::keyed("k", "Bolt").with_quantity(2);
        let raw = RawRecord::new("2,00 €", "1,00 €");
        let priced = PricedRecord::compute(&raw, Some("2,00 €"), 2).unwrap();

        assert_eq!(
            format_item(&item, &priced),
            "Bolt x2 | 30-day: 2,00 € | Diff: 1.00 x | Trend: 1,00 € | Diff: +0.50 x"
        );
    }

    #[test]
    fn summary_includes_profit_only_with_paid_total() {
        let mut summary = GroupSummary {
            name: "seller".into(),
            item_count: 1,
            estimated_average: 3.0,
            estimated_trend: 2.0,
            paid_total: None,
        };
        assert!(!format_summary(&summary).contains("Profit"));

        summary.paid_total = Some(1.0);
        assert!(format_summary(&summary).ends_with("Profit 30-day: 2.00 € | Trend: 1.00 €"));
    }
}
