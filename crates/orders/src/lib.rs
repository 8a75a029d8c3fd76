//! `vendo-orders` — the order aggregate, its lifecycle state machine, and
//! the services driving state transitions.
//!
//! State changes only happen through lifecycle operations; displayed totals
//! are always derived from persisted price lines, never from the
//! informational total field.

pub mod callback;
pub mod event;
pub mod lifecycle;
pub mod model;
pub mod service;
pub mod state;
pub mod store;

pub use callback::{PaymentCallback, PaymentCallbackService};
pub use event::{OrderDispatcher, OrderEvent, OrderSubscriber};
pub use lifecycle::{lifecycle_chain, AuditLogLifecycle, BaseLifecycle, CreationGuard, EventLifecycle, Lifecycle};
pub use model::{AuditLogEntry, Order, OrderContact, OrderLine, PaymentRecord};
pub use service::OrderService;
pub use state::OrderState;
pub use store::{MemoryOrderStore, OrderStore};
