//! Order-level and cross-order settlement views.
//!
//! Services here are computed on demand from persisted price lines; nothing
//! is cached. Callers pass the set of invalidated order-line ids so that
//! entries belonging to a cancelled line drop out of every total.

use std::collections::HashSet;
use std::sync::Arc;

use rust_decimal::Decimal;

use vendo_core::{FreeLabelSource, LineId};

use crate::aggregator::PriceAggregator;
use crate::filter;
use crate::formatter::PriceFormatter;
use crate::line::{PriceLine, CNY};
use crate::totals::TypeTotals;

/// A single order's price lines plus its invalidated line ids.
#[derive(Debug, Clone, Copy)]
pub struct OrderPrices<'a> {
    pub lines: &'a [PriceLine],
    pub invalid_lines: &'a HashSet<LineId>,
}

impl<'a> OrderPrices<'a> {
    pub fn new(lines: &'a [PriceLine], invalid_lines: &'a HashSet<LineId>) -> Self {
        Self {
            lines,
            invalid_lines,
        }
    }

    /// Lines that still count: order-level entries, or entries whose owning
    /// order line has not been invalidated.
    fn counted(&self) -> impl Iterator<Item = &'a PriceLine> {
        let invalid = self.invalid_lines;
        self.lines
            .iter()
            .filter(move |pl| pl.line_id.is_none_or(|id| !invalid.contains(&id)))
    }
}

/// Composes aggregation, predicates and formatting into per-order views.
pub struct ContractPriceService {
    formatter: PriceFormatter,
}

impl ContractPriceService {
    pub fn new(free_label: Arc<dyn FreeLabelSource>) -> Self {
        Self {
            formatter: PriceFormatter::new(free_label),
        }
    }

    /// Display price: money only (tax excluded), every counted line.
    pub fn display_price(&self, prices: OrderPrices<'_>) -> String {
        let mut agg = PriceAggregator::new();
        for line in prices.counted() {
            agg.add(&line.currency, line.money, None);
        }
        self.formatter.format(&agg)
    }

    /// Tax-inclusive price over every counted line.
    pub fn tax_inclusive_price(&self, prices: OrderPrices<'_>) -> String {
        let mut agg = PriceAggregator::new();
        for line in prices.counted() {
            agg.add_line(line);
        }
        self.formatter.format(&agg)
    }

    /// Freight charges only.
    pub fn freight_price(&self, prices: OrderPrices<'_>) -> String {
        let mut agg = PriceAggregator::new();
        for line in prices.counted().filter(|pl| filter::is_freight(pl)) {
            agg.add_line(line);
        }
        self.formatter.format(&agg)
    }

    /// What remains to be paid (unpaid counted lines, tax included).
    pub fn payable_price(&self, prices: OrderPrices<'_>) -> String {
        let mut agg = PriceAggregator::new();
        for line in prices.counted().filter(|pl| !filter::is_paid(pl)) {
            agg.add_line(line);
        }
        self.formatter.format(&agg)
    }

    /// Net unpaid CNY amount; decides whether a fresh order has anything to
    /// settle through the payment gateway.
    pub fn payable_cny_total(&self, prices: OrderPrices<'_>) -> Decimal {
        let mut agg = PriceAggregator::new();
        for line in prices.counted().filter(|pl| !filter::is_paid(pl)) {
            agg.add_line(line);
        }
        agg.total(CNY)
    }

    /// Per-unit price of one order line's entries.
    pub fn unit_price(&self, prices: OrderPrices<'_>, line_id: LineId, quantity: i64) -> String {
        let mut agg = PriceAggregator::new();
        for line in prices.counted().filter(|pl| pl.line_id == Some(line_id)) {
            agg.add_line(line);
        }
        self.formatter.unit_price(&agg, quantity)
    }

    /// Per-type CNY buckets over counted lines.
    pub fn type_totals(&self, prices: OrderPrices<'_>) -> TypeTotals {
        let mut totals = TypeTotals::new();
        for line in prices.counted() {
            totals.accumulate(line);
        }
        totals
    }
}

/// Cross-order aggregation.
pub struct PriceService {
    formatter: PriceFormatter,
    contract: ContractPriceService,
}

impl PriceService {
    pub fn new(free_label: Arc<dyn FreeLabelSource>) -> Self {
        Self {
            formatter: PriceFormatter::new(free_label.clone()),
            contract: ContractPriceService::new(free_label),
        }
    }

    /// Multi-order subtotal: one formatted string over all counted lines.
    pub fn subtotal(&self, orders: &[OrderPrices<'_>]) -> String {
        let mut agg = PriceAggregator::new();
        for prices in orders {
            for line in prices.counted() {
                agg.add_line(line);
            }
        }
        self.formatter.format(&agg)
    }

    /// Per-type buckets folded across orders.
    pub fn type_subtotal(&self, orders: &[OrderPrices<'_>]) -> TypeTotals {
        let mut totals = TypeTotals::new();
        for prices in orders {
            totals.merge(&self.contract.type_totals(*prices));
        }
        totals
    }
}
