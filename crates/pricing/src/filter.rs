//! Stateless predicates over a single price line.

use crate::line::{PriceKind, PriceLine};

/// Legacy freight lines were identified by name before the kind existed.
pub const FREIGHT_NAME: &str = "运费";

pub fn is_freight(line: &PriceLine) -> bool {
    line.name == FREIGHT_NAME || line.kind == PriceKind::Freight
}

/// Whether the entry is scoped to a product line (vs. an order-level charge).
pub fn has_line(line: &PriceLine) -> bool {
    line.line_id.is_some()
}

pub fn is_paid(line: &PriceLine) -> bool {
    line.paid
}
