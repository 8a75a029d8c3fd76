//! Lifecycle event subscribers, one per external concern.
//!
//! Registration order is load-bearing: stock movements settle before credit
//! transfers, so a failed hold aborts creation before any money moves.

mod credit;
mod sales;
mod stock;

pub use credit::CreditSubscriber;
pub use sales::SalesCounter;
pub use stock::StockSubscriber;
