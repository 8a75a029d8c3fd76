//! Rendering of aggregated totals to display strings.

use std::sync::Arc;

use rust_decimal::{Decimal, RoundingStrategy};

use vendo_core::FreeLabelSource;

use crate::aggregator::PriceAggregator;

/// Renders per-currency totals as `"{amount}{CODE}"` segments joined by `+`.
///
/// Only currencies with a net amount above zero are emitted. An empty result
/// falls back to the free label, read from its source on every call so a
/// runtime reconfiguration is visible immediately.
pub struct PriceFormatter {
    free_label: Arc<dyn FreeLabelSource>,
}

impl PriceFormatter {
    pub fn new(free_label: Arc<dyn FreeLabelSource>) -> Self {
        Self { free_label }
    }

    pub fn format(&self, aggregator: &PriceAggregator) -> String {
        if !aggregator.is_positive() {
            return self.free_label.free_label();
        }
        aggregator
            .iter()
            .filter(|(_, amount)| *amount > Decimal::ZERO)
            .map(|(code, amount)| format!("{}{}", render(amount), code))
            .collect::<Vec<String>>()
            .join("+")
    }

    /// Per-unit price: each currency's amount divided by `quantity`.
    ///
    /// Not applicable (quantity or amount not positive) renders as the empty
    /// string, which callers must keep distinct from "0.00".
    pub fn unit_price(&self, aggregator: &PriceAggregator, quantity: i64) -> String {
        if quantity <= 0 {
            return String::new();
        }
        let segments: Vec<String> = aggregator
            .iter()
            .filter(|(_, amount)| *amount > Decimal::ZERO)
            .map(|(code, amount)| {
                format!("{}{}", render(amount / Decimal::from(quantity)), code)
            })
            .collect();
        segments.join("+")
    }
}

fn render(amount: Decimal) -> String {
    format!(
        "{:.2}",
        amount.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
    )
}
