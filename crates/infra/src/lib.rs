//! `vendo-infra` — side-effect orchestration around the order lifecycle.
//!
//! The subscribers in this crate bind the lifecycle events to the external
//! ledgers: stock holds, virtual-currency settlement and refund payout.
//! Failed non-cash refunds go through a durable retry outbox so that
//! cancellation itself never fails on a flaky ledger.

pub mod outbox;
pub mod subscribers;
pub mod wiring;

#[cfg(test)]
mod integration_tests;

pub use outbox::{BackoffStrategy, RefundOutbox, RefundTask, RefundWorker, RetryPolicy};
pub use subscribers::{CreditSubscriber, SalesCounter, StockSubscriber};
pub use wiring::{OrderPlatform, PlatformConfig};
