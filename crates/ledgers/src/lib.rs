//! `vendo-ledgers` — contracts for external stock/credit/payment
//! collaborators, plus in-memory reference implementations used by tests
//! and local wiring. The wire formats of the real services are out of scope;
//! only the consumed behavior matters here.

pub mod credit;
pub mod error;
pub mod gateway;
pub mod lock;
pub mod stock;

pub use credit::{AccountRef, CreditLedger, Currency, CurrencyResolver, MemoryCreditLedger, StaticCurrencies};
pub use error::LedgerError;
pub use gateway::{MemoryGateway, PaymentGateway};
pub use lock::{order_key, sku_key, EntityLock, LockGuard, LockRegistry};
pub use stock::{MemoryStockLedger, Movement, MovementKind, StockLedger};
