//! Lifecycle operations as an explicit decorator chain.
//!
//! One interface, three small implementations composed into a fixed pipeline
//! at construction:
//!
//! ```text
//! EventLifecycle (domain events + rollback)
//!   └─ AuditLogLifecycle (append-only audit snapshots)
//!        └─ BaseLifecycle (guards, state mutation, persistence)
//! ```
//!
//! The outermost layer owns event dispatch because a failed synchronous side
//! effect (stock reservation, credit debit) has to undo what the inner
//! layers persisted.

use std::sync::Arc;

use chrono::Utc;
use rust_decimal::Decimal;
use tracing::{info, warn};

use vendo_core::{FreeLabelSource, OrderError, OrderResult, UserId};
use vendo_pricing::ContractPriceService;

use crate::event::{OrderDispatcher, OrderEvent};
use crate::model::Order;
use crate::state::OrderState;
use crate::store::OrderStore;

/// Pre-creation validation (stock sufficiency, credit balances).
///
/// Guards may mutate the order: the credit guard marks zero-amount lines
/// paid without a balance check. A guard error aborts the creation before
/// anything is persisted.
pub trait CreationGuard: Send + Sync {
    fn name(&self) -> &'static str;

    fn check(&self, order: &mut Order) -> OrderResult<()>;
}

/// The order lifecycle operations (create / cancel / pay).
pub trait Lifecycle: Send + Sync {
    fn create(&self, order: Order) -> OrderResult<Order>;

    fn cancel(
        &self,
        order: &mut Order,
        actor: Option<UserId>,
        reason: Option<&str>,
    ) -> OrderResult<()>;

    /// Publishes the paid event only; the state transition itself belongs to
    /// the gateway-callback handler, since payment can originate internally
    /// or externally.
    fn pay(&self, order: &mut Order) -> OrderResult<()>;
}

/// Business mutation + persistence.
pub struct BaseLifecycle {
    store: Arc<dyn OrderStore>,
    guards: Vec<Arc<dyn CreationGuard>>,
    pricing: ContractPriceService,
}

impl BaseLifecycle {
    pub fn new(
        store: Arc<dyn OrderStore>,
        guards: Vec<Arc<dyn CreationGuard>>,
        free_label: Arc<dyn FreeLabelSource>,
    ) -> Self {
        Self {
            store,
            guards,
            pricing: ContractPriceService::new(free_label),
        }
    }
}

impl Lifecycle for BaseLifecycle {
    fn create(&self, mut order: Order) -> OrderResult<Order> {
        for guard in &self.guards {
            guard.check(&mut order).inspect_err(|err| {
                warn!(serial = order.serial(), guard = guard.name(), error = %err,
                    "creation guard rejected order");
            })?;
        }

        let invalid = order.invalid_line_ids();
        let payable_cny = self.pricing.payable_cny_total(order.prices(&invalid));
        let state = if payable_cny > Decimal::ZERO {
            OrderState::Init
        } else {
            OrderState::Paid
        };
        order.set_state(state);
        order.create_time = Some(Utc::now());

        self.store.save(&order)?;
        info!(serial = order.serial(), state = %state, "order created");
        Ok(order)
    }

    fn cancel(
        &self,
        order: &mut Order,
        actor: Option<UserId>,
        reason: Option<&str>,
    ) -> OrderResult<()> {
        if order.state() == OrderState::Canceled {
            return Ok(());
        }
        if order.state().is_terminal() {
            return Err(OrderError::state(format!(
                "cannot cancel from {}",
                order.state()
            )));
        }

        order.set_state(OrderState::Canceled);
        order.cancel_time = Some(Utc::now());
        order.cancel_reason = reason.map(str::to_string);
        self.store.save(order)?;
        info!(serial = order.serial(), actor = ?actor, "order canceled");
        Ok(())
    }

    fn pay(&self, _order: &mut Order) -> OrderResult<()> {
        Ok(())
    }
}

/// Appends an audit snapshot after each successful inner operation.
pub struct AuditLogLifecycle {
    inner: Arc<dyn Lifecycle>,
    store: Arc<dyn OrderStore>,
}

impl AuditLogLifecycle {
    pub fn new(inner: Arc<dyn Lifecycle>, store: Arc<dyn OrderStore>) -> Self {
        Self { inner, store }
    }
}

impl Lifecycle for AuditLogLifecycle {
    fn create(&self, order: Order) -> OrderResult<Order> {
        let mut order = self.inner.create(order)?;
        order.push_audit(Utc::now(), None, "create");
        self.store.save(&order)?;
        Ok(order)
    }

    fn cancel(
        &self,
        order: &mut Order,
        actor: Option<UserId>,
        reason: Option<&str>,
    ) -> OrderResult<()> {
        let before = order.state();
        self.inner.cancel(order, actor, reason)?;
        if order.state() != before {
            order.push_audit(Utc::now(), actor, "cancel");
            self.store.save(order)?;
        }
        Ok(())
    }

    fn pay(&self, order: &mut Order) -> OrderResult<()> {
        self.inner.pay(order)?;
        order.push_audit(Utc::now(), None, "pay");
        self.store.save(order)?;
        Ok(())
    }
}

/// Publishes domain events and rolls the operation back when a synchronous
/// side effect fails.
pub struct EventLifecycle {
    inner: Arc<dyn Lifecycle>,
    store: Arc<dyn OrderStore>,
    dispatcher: Arc<OrderDispatcher>,
}

impl EventLifecycle {
    pub fn new(
        inner: Arc<dyn Lifecycle>,
        store: Arc<dyn OrderStore>,
        dispatcher: Arc<OrderDispatcher>,
    ) -> Self {
        Self {
            inner,
            store,
            dispatcher,
        }
    }
}

impl EventLifecycle {
    /// Best-effort undo of create-time side effects: a cancel event lets the
    /// subscribers that already ran release what they took (stock holds,
    /// settled credit). Failures here are logged, not surfaced; the original
    /// error stays the caller's answer.
    fn compensate(&self, order: &mut Order, was_paid: bool) {
        let event = OrderEvent::Canceled {
            order_id: order.id,
            was_paid,
            at: Utc::now(),
        };
        if let Err(err) = self.dispatcher.dispatch(&event, order) {
            warn!(serial = order.serial(), error = %err, "create compensation incomplete");
        }
    }
}

impl Lifecycle for EventLifecycle {
    fn create(&self, order: Order) -> OrderResult<Order> {
        let mut order = self.inner.create(order)?;
        let settled_at_creation = order.state() == OrderState::Paid;

        let created = OrderEvent::Created {
            order_id: order.id,
            at: Utc::now(),
        };
        if let Err(err) = self.dispatcher.dispatch(&created, &mut order) {
            warn!(serial = order.serial(), error = %err, "create side effect failed; rolling back");
            self.compensate(&mut order, false);
            self.store.remove(order.id)?;
            return Err(err);
        }

        // Nothing payable in CNY: the order settles immediately, so the paid
        // side effects (stock deduction, sales count) run as part of create.
        if settled_at_creation {
            let paid = OrderEvent::Paid {
                order_id: order.id,
                at: Utc::now(),
            };
            if let Err(err) = self.dispatcher.dispatch(&paid, &mut order) {
                warn!(serial = order.serial(), error = %err, "paid side effect failed; rolling back");
                self.compensate(&mut order, true);
                self.store.remove(order.id)?;
                return Err(err);
            }
        }

        // Subscribers recorded outcomes on the aggregate (paid flags).
        self.store.save(&order)?;
        Ok(order)
    }

    fn cancel(
        &self,
        order: &mut Order,
        actor: Option<UserId>,
        reason: Option<&str>,
    ) -> OrderResult<()> {
        let before = order.state();
        let snapshot = order.clone();
        self.inner.cancel(order, actor, reason)?;
        if order.state() == before {
            // Idempotent no-op; nothing to publish.
            return Ok(());
        }

        let event = OrderEvent::Canceled {
            order_id: order.id,
            was_paid: !before.is_unpaid(),
            at: Utc::now(),
        };
        if let Err(err) = self.dispatcher.dispatch(&event, order) {
            warn!(serial = order.serial(), error = %err, "cancel side effect failed; rolling back");
            *order = snapshot;
            self.store.save(order)?;
            return Err(err);
        }
        self.store.save(order)?;
        Ok(())
    }

    fn pay(&self, order: &mut Order) -> OrderResult<()> {
        self.inner.pay(order)?;
        let event = OrderEvent::Paid {
            order_id: order.id,
            at: Utc::now(),
        };
        self.dispatcher.dispatch(&event, order)?;
        self.store.save(order)?;
        Ok(())
    }
}

/// Assemble the fixed pipeline: base → audit log → domain events.
pub fn lifecycle_chain(
    store: Arc<dyn OrderStore>,
    dispatcher: Arc<OrderDispatcher>,
    guards: Vec<Arc<dyn CreationGuard>>,
    free_label: Arc<dyn FreeLabelSource>,
) -> Arc<dyn Lifecycle> {
    let base = Arc::new(BaseLifecycle::new(store.clone(), guards, free_label));
    let audited = Arc::new(AuditLogLifecycle::new(base, store.clone()));
    Arc::new(EventLifecycle::new(audited, store, dispatcher))
}
