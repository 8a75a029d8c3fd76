use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use vendo_core::{LineId, PriceLineId};

/// Default settlement currency.
pub const CNY: &str = "CNY";

/// Classification of a price line for per-type subtotaling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PriceKind {
    Sale,
    Cost,
    Compete,
    Freight,
    Marketing,
    Original,
}

/// One charge/credit entry in a given currency.
///
/// Price lines are append-only: created at order-build time, afterwards only
/// the boolean flags (`paid`, `refund`) change. Negative `money` is a
/// discount netting against positive charges in the same currency. A price
/// line without an associated order line is an order-level charge.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceLine {
    pub id: PriceLineId,
    /// Owning order line; `None` means order-level (freight/service/discount).
    pub line_id: Option<LineId>,
    pub name: String,
    pub currency: String,
    /// Signed amount; negative = discount.
    pub money: Decimal,
    /// Tax component; `None` is treated as zero everywhere.
    pub tax: Option<Decimal>,
    pub kind: PriceKind,
    pub paid: bool,
    pub can_refund: bool,
    pub refund: bool,
}

impl PriceLine {
    pub fn new(kind: PriceKind, name: impl Into<String>, money: Decimal) -> Self {
        Self {
            id: PriceLineId::new(),
            line_id: None,
            name: name.into(),
            currency: CNY.to_string(),
            money,
            tax: None,
            kind,
            paid: false,
            can_refund: false,
            refund: false,
        }
    }

    pub fn with_currency(mut self, currency: impl Into<String>) -> Self {
        self.currency = currency.into();
        self
    }

    pub fn with_line(mut self, line_id: LineId) -> Self {
        self.line_id = Some(line_id);
        self
    }

    pub fn with_tax(mut self, tax: Decimal) -> Self {
        self.tax = Some(tax);
        self
    }

    pub fn paid(mut self) -> Self {
        self.paid = true;
        self
    }

    pub fn refundable(mut self) -> Self {
        self.can_refund = true;
        self
    }

    /// Money plus tax (tax `None` counts as zero).
    pub fn amount(&self) -> Decimal {
        self.money + self.tax.unwrap_or_default()
    }

    pub fn is_cny(&self) -> bool {
        self.currency == CNY
    }

    /// One-shot refund gate: refundable, settled, and not yet refunded.
    pub fn can_refund_now(&self) -> bool {
        self.can_refund && self.paid && !self.refund
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn amount_treats_missing_tax_as_zero() {
        let line = PriceLine::new(PriceKind::Sale, "商品", dec!(100.00));
        assert_eq!(line.amount(), dec!(100.00));
        let taxed = line.with_tax(dec!(13.00));
        assert_eq!(taxed.amount(), dec!(113.00));
    }

    #[test]
    fn refund_gate_requires_all_three_flags() {
        let base = PriceLine::new(PriceKind::Sale, "商品", dec!(10));
        assert!(!base.clone().can_refund_now());
        assert!(!base.clone().refundable().can_refund_now());
        assert!(base.clone().refundable().paid().can_refund_now());

        let mut spent = base.refundable().paid();
        spent.refund = true;
        assert!(!spent.can_refund_now());
    }
}
