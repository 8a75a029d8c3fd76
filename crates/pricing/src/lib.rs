//! `vendo-pricing` — exact-decimal settlement over price lines.
//!
//! A price line is one charge or credit entry in a given currency, scoped
//! either to an order line or to the whole order (freight, service fees,
//! discounts). Settlement never crosses currency boundaries: each currency
//! accumulates independently, and rendering keeps the per-currency breakdown
//! as ground truth.

pub mod aggregator;
pub mod filter;
pub mod formatter;
pub mod line;
pub mod service;
pub mod totals;

pub use aggregator::PriceAggregator;
pub use formatter::PriceFormatter;
pub use line::{CNY, PriceKind, PriceLine};
pub use service::{ContractPriceService, OrderPrices, PriceService};
pub use totals::TypeTotals;
