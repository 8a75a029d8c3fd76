//! Per-currency accumulator of (money, tax) pairs.

use rust_decimal::Decimal;

use crate::line::PriceLine;

#[derive(Debug, Clone, Copy, Default, PartialEq)]
struct Bucket {
    money: Decimal,
    tax: Decimal,
}

/// Accumulates signed amounts per currency, preserving first-appearance
/// order of the currencies. Amounts never cross currency boundaries.
#[derive(Debug, Clone, Default)]
pub struct PriceAggregator {
    entries: Vec<(String, Bucket)>,
}

impl PriceAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Accumulate `money` and `tax` under `currency`. Discounts (negative
    /// money) net against positive charges within the same currency.
    pub fn add(&mut self, currency: &str, money: Decimal, tax: Option<Decimal>) {
        let tax = tax.unwrap_or_default();
        match self.entries.iter_mut().find(|(code, _)| code == currency) {
            Some((_, bucket)) => {
                bucket.money += money;
                bucket.tax += tax;
            }
            None => self.entries.push((
                currency.to_string(),
                Bucket { money, tax },
            )),
        }
    }

    /// Accumulate a price line's money and tax.
    pub fn add_line(&mut self, line: &PriceLine) {
        self.add(&line.currency, line.money, line.tax);
    }

    /// Net total (money + tax) for one currency; zero if never seen.
    pub fn total(&self, currency: &str) -> Decimal {
        self.entries
            .iter()
            .find(|(code, _)| code == currency)
            .map(|(_, bucket)| bucket.money + bucket.tax)
            .unwrap_or_default()
    }

    /// Net totals in first-appearance order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, Decimal)> {
        self.entries
            .iter()
            .map(|(code, bucket)| (code.as_str(), bucket.money + bucket.tax))
    }

    /// True when at least one currency nets above zero. Discounts can drive
    /// every bucket to zero or below, which renders as "free".
    pub fn is_positive(&self) -> bool {
        self.iter().any(|(_, net)| net > Decimal::ZERO)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use rust_decimal_macros::dec;

    #[test]
    fn unseen_currency_totals_zero() {
        let agg = PriceAggregator::new();
        assert_eq!(agg.total("CNY"), Decimal::ZERO);
    }

    #[test]
    fn discounts_net_within_the_same_currency() {
        let mut agg = PriceAggregator::new();
        agg.add("CNY", dec!(100.00), Some(dec!(13.00)));
        agg.add("CNY", dec!(-20.00), None);
        agg.add("GOLD", dec!(5), None);

        assert_eq!(agg.total("CNY"), dec!(93.00));
        assert_eq!(agg.total("GOLD"), dec!(5));
    }

    #[test]
    fn fully_discounted_buckets_are_not_positive() {
        let mut agg = PriceAggregator::new();
        assert!(!agg.is_positive());

        agg.add("CNY", dec!(30.00), None);
        agg.add("CNY", dec!(-30.00), None);
        assert!(!agg.is_positive());

        agg.add("GOLD", dec!(1), None);
        assert!(agg.is_positive());
    }

    #[test]
    fn iteration_follows_first_appearance_order() {
        let mut agg = PriceAggregator::new();
        agg.add("GOLD", dec!(1), None);
        agg.add("CNY", dec!(2), None);
        agg.add("GOLD", dec!(3), None);

        let order: Vec<&str> = agg.iter().map(|(code, _)| code).collect();
        assert_eq!(order, vec!["GOLD", "CNY"]);
    }

    proptest! {
        /// The per-currency total equals the exact decimal sum of every
        /// (money + tax) pair added under that currency.
        #[test]
        fn total_is_exact_sum(entries in proptest::collection::vec(
            (0u8..3, -1_000_000i64..1_000_000, 0i64..100_000),
            0..64,
        )) {
            let codes = ["CNY", "GOLD", "POINT"];
            let mut agg = PriceAggregator::new();
            let mut expected = [Decimal::ZERO; 3];

            for (idx, money_cents, tax_cents) in entries {
                let money = Decimal::new(money_cents, 2);
                let tax = Decimal::new(tax_cents, 2);
                agg.add(codes[idx as usize], money, Some(tax));
                expected[idx as usize] += money + tax;
            }

            for (idx, code) in codes.iter().enumerate() {
                prop_assert_eq!(agg.total(code), expected[idx]);
            }
        }
    }
}
