//! Per-type settlement buckets.

use rust_decimal::{Decimal, RoundingStrategy};
use serde::Serialize;

use crate::line::{PriceKind, PriceLine};

/// Per-type subtotals over a set of price lines.
///
/// This is a **CNY settlement view by contract**: only CNY lines accumulate
/// here. Mixed-currency orders keep the per-currency aggregator as ground
/// truth; folding other currencies into these buckets would produce a
/// misleading single figure.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TypeTotals {
    sale: Decimal,
    cost: Decimal,
    compete: Decimal,
    freight: Decimal,
    marketing: Decimal,
    original: Decimal,
}

impl TypeTotals {
    pub fn new() -> Self {
        Self::default()
    }

    /// Accumulate one price line into its kind bucket. Non-CNY lines are
    /// ignored (see type-level contract).
    pub fn accumulate(&mut self, line: &PriceLine) {
        if !line.is_cny() {
            return;
        }
        let amount = line.amount();
        match line.kind {
            PriceKind::Sale => self.sale += amount,
            PriceKind::Cost => self.cost += amount,
            PriceKind::Compete => self.compete += amount,
            PriceKind::Freight => self.freight += amount,
            PriceKind::Marketing => self.marketing += amount,
            PriceKind::Original => self.original += amount,
        }
    }

    /// Fold another set of buckets into this one (multi-order subtotals).
    pub fn merge(&mut self, other: &TypeTotals) {
        self.sale += other.sale;
        self.cost += other.cost;
        self.compete += other.compete;
        self.freight += other.freight;
        self.marketing += other.marketing;
        self.original += other.original;
    }

    pub fn sale(&self) -> String {
        render(self.sale)
    }

    pub fn cost(&self) -> String {
        render(self.cost)
    }

    pub fn compete(&self) -> String {
        render(self.compete)
    }

    pub fn freight(&self) -> String {
        render(self.freight)
    }

    pub fn marketing(&self) -> String {
        render(self.marketing)
    }

    pub fn original_price(&self) -> String {
        render(self.original)
    }

    /// `sale + freight − marketing`, clamped to zero when negative.
    ///
    /// Marketing entries are discounts; some writers store them signed
    /// (−20.00), others as a magnitude (20.00). Either way the discount
    /// reduces the total, so its absolute value is subtracted.
    pub fn total(&self) -> String {
        let total = self.sale + self.freight - self.marketing.abs();
        render(total.max(Decimal::ZERO))
    }
}

fn render(amount: Decimal) -> String {
    format!(
        "{:.2}",
        amount.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
    )
}
