use crate::batch::GroupSummary;
use crate::error::Result;
use crate::item::WorkItem;
use crate::price::PricedRecord;

pub mod console;
pub mod csv;
pub mod json;

/// Presents resolved items. Called synchronously from the queue; an error is
/// logged and never stops a batch.
pub trait Renderer: Send {
    fn render(&mut self, item: &WorkItem, priced: &PricedRecord) -> Result<()>;

    fn render_summary(&mut self, _summary: &GroupSummary) -> Result<()> {
        Ok(())
    }

    fn finish(&mut self) -> Result<()> {
        Ok(())
    }
}

/// Discards everything.
pub struct NullRenderer;

impl Renderer for NullRenderer {
    fn render(&mut self, _item: &WorkItem, _priced: &PricedRecord) -> Result<()> {
        Ok(())
    }
}

pub(crate) fn render_logged(renderer: &mut dyn Renderer, item: &WorkItem, priced: &PricedRecord) {
    if let Err(e) = renderer.render(item, priced) {
        log::error!("Renderer failed for \"{}\": {}", item.label, e);
    }
}

pub(crate) fn render_summary_logged(renderer: &mut dyn Renderer, summary: &GroupSummary) {
    if let Err(e) = renderer.render_summary(summary) {
        log::error!("Renderer failed for summary \"{}\": {}", summary.name, e);
    }
}

/// Formats a market/seller ratio as the marketplace overlay did: `"1.25 x"`
/// with `-` when the item is cheaper than the market and `+` when dearer.
pub fn diff_marker(ratio: f64) -> (&'static str, String) {
    let sign = if ratio > 1.0 {
        "-"
    } else if ratio < 1.0 {
        "+"
    } else {
        ""
    };
    (sign, format!("{:.2} x", ratio.abs()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn diff_marker_signs() {
        assert_eq!(diff_marker(1.25), ("-", "1.25 x".to_string()));
        assert_eq!(diff_marker(0.5), ("+", "0.50 x".to_string()));
        assert_eq!(diff_marker(1.0).0, "");
        assert_eq!(diff_marker(f64::NAN), ("", "NaN x".to_string()));
    }
}
