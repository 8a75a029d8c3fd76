//! Order operations beyond the create/cancel/pay chain: line cancellation
//! with cascade, receive with time-window validation, and refunds at
//! order/line/price-line granularity.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{info, warn};

use vendo_core::{LineId, OrderError, OrderId, OrderResult, PriceLineId, UserId};
use vendo_ledgers::{order_key, EntityLock, PaymentGateway};

use crate::event::{OrderDispatcher, OrderEvent};
use crate::lifecycle::Lifecycle;
use crate::model::Order;
use crate::state::OrderState;
use crate::store::OrderStore;

pub struct OrderService {
    store: Arc<dyn OrderStore>,
    lifecycle: Arc<dyn Lifecycle>,
    dispatcher: Arc<OrderDispatcher>,
    locks: Arc<dyn EntityLock>,
    /// CNY refunds are delegated here; only non-CNY (credit) lines are
    /// settled through the event-driven ledger path.
    gateway: Option<Arc<dyn PaymentGateway>>,
}

impl OrderService {
    pub fn new(
        store: Arc<dyn OrderStore>,
        lifecycle: Arc<dyn Lifecycle>,
        dispatcher: Arc<OrderDispatcher>,
        locks: Arc<dyn EntityLock>,
        gateway: Option<Arc<dyn PaymentGateway>>,
    ) -> Self {
        Self {
            store,
            lifecycle,
            dispatcher,
            locks,
            gateway,
        }
    }

    fn load(&self, order_id: OrderId) -> OrderResult<Order> {
        self.store.find(order_id)?.ok_or(OrderError::NotFound)
    }

    /// Cancel one line; when every line of the order has become invalid,
    /// cascade to order-level cancellation.
    ///
    /// The per-order lock is what makes the cascade fire exactly once: two
    /// concurrent single-line cancellations cannot both observe "not yet all
    /// invalid".
    pub fn cancel_line(
        &self,
        order_id: OrderId,
        line_id: LineId,
        actor: Option<UserId>,
        reason: Option<&str>,
    ) -> OrderResult<()> {
        let _guard = self.locks.acquire(&[order_key(order_id)]);

        let mut order = self.load(order_id)?;
        if !order.line(line_id).ok_or(OrderError::NotFound)?.valid {
            return Ok(());
        }
        let was_paid = !order.state().is_unpaid();
        let snapshot = order.clone();
        let now = Utc::now();
        if let Some(line) = order.line_mut(line_id) {
            line.valid = false;
            line.cancel_time = Some(now);
            line.cancel_reason = reason.map(str::to_string);
        }
        self.store.save(&order)?;

        // Release the cancelled line's share of stock right away; the
        // order-level events then cover surviving lines only.
        let event = OrderEvent::LineCanceled {
            order_id: order.id,
            line_id,
            was_paid,
            at: now,
        };
        if let Err(err) = self.dispatcher.dispatch(&event, &mut order) {
            warn!(serial = order.serial(), %line_id, error = %err,
                "line cancel side effect failed; rolling back");
            self.store.save(&snapshot)?;
            return Err(err);
        }
        self.store.save(&order)?;
        info!(serial = order.serial(), %line_id, "line canceled");

        if order.all_lines_invalid() {
            self.lifecycle
                .cancel(&mut order, actor, Some("all lines canceled"))?;
        }
        Ok(())
    }

    /// Cancel the whole order.
    ///
    /// Takes the per-order lock and reloads before delegating to the
    /// lifecycle, so a cancel racing a payment callback decides from the
    /// stored state rather than a caller-held snapshot.
    pub fn cancel_order(
        &self,
        order_id: OrderId,
        actor: Option<UserId>,
        reason: Option<&str>,
    ) -> OrderResult<()> {
        let _guard = self.locks.acquire(&[order_key(order_id)]);
        let mut order = self.load(order_id)?;
        self.lifecycle.cancel(&mut order, actor, reason)
    }

    /// Complete the order inside its receive window.
    ///
    /// All-or-nothing: state, finish stamp and per-line receive stamps land
    /// in one save; a failed side effect restores the pre-receive snapshot.
    pub fn receive(
        &self,
        order_id: OrderId,
        actor: Option<UserId>,
        now: DateTime<Utc>,
    ) -> OrderResult<()> {
        let _guard = self.locks.acquire(&[order_key(order_id)]);

        let mut order = self.load(order_id)?;
        if order.state() == OrderState::Received {
            return Ok(());
        }
        if let Some(start) = order.start_receive_time {
            if now < start {
                return Err(OrderError::state("receive window not open yet"));
            }
        }
        if let Some(expire) = order.expire_receive_time {
            if now > expire {
                return Err(OrderError::state("receive window expired"));
            }
        }
        if !order.state().can_receive() {
            return Err(OrderError::state(format!(
                "cannot receive from {}",
                order.state()
            )));
        }

        let snapshot = order.clone();
        order.set_state(OrderState::Received);
        order.finish_time = Some(now);
        for line in &mut order.lines {
            if line.finish_receive_time.is_none() {
                line.finish_receive_time = Some(now);
            }
        }
        order.push_audit(now, actor, "receive");
        self.store.save(&order)?;

        let event = OrderEvent::Received {
            order_id: order.id,
            at: now,
        };
        if let Err(err) = self.dispatcher.dispatch(&event, &mut order) {
            warn!(serial = order.serial(), error = %err, "receive side effect failed; rolling back");
            self.store.save(&snapshot)?;
            return Err(err);
        }
        self.store.save(&order)?;
        info!(serial = order.serial(), "order received");
        Ok(())
    }

    /// Refund a single price line (one-shot).
    pub fn refund_price_line(
        &self,
        order_id: OrderId,
        price_line_id: PriceLineId,
    ) -> OrderResult<()> {
        let _guard = self.locks.acquire(&[order_key(order_id)]);
        let mut order = self.load(order_id)?;
        self.refund_one(&mut order, price_line_id)
    }

    /// Refund every still-refundable price line of one order line.
    pub fn refund_line(&self, order_id: OrderId, line_id: LineId) -> OrderResult<()> {
        let _guard = self.locks.acquire(&[order_key(order_id)]);
        let mut order = self.load(order_id)?;
        if order.line(line_id).is_none() {
            return Err(OrderError::NotFound);
        }

        let targets: Vec<PriceLineId> = order
            .price_lines
            .iter()
            .filter(|pl| pl.line_id == Some(line_id) && pl.can_refund_now())
            .map(|pl| pl.id)
            .collect();
        for id in targets {
            self.refund_one(&mut order, id)?;
        }
        Ok(())
    }

    /// Refund every still-refundable price line of the order.
    pub fn refund_order(&self, order_id: OrderId) -> OrderResult<()> {
        let _guard = self.locks.acquire(&[order_key(order_id)]);
        let mut order = self.load(order_id)?;

        let targets: Vec<PriceLineId> = order
            .price_lines
            .iter()
            .filter(|pl| pl.can_refund_now())
            .map(|pl| pl.id)
            .collect();
        for id in targets {
            self.refund_one(&mut order, id)?;
        }
        Ok(())
    }

    /// The refund pipeline for one price line:
    /// pre-refund event (external transfer) → flag → post-refund event.
    ///
    /// A failed transfer leaves `refund` unset, so the line is safe to retry.
    fn refund_one(&self, order: &mut Order, price_line_id: PriceLineId) -> OrderResult<()> {
        let line = order
            .price_line(price_line_id)
            .ok_or(OrderError::NotFound)?
            .clone();
        if !line.can_refund_now() {
            return Err(OrderError::state("price line not refundable"));
        }

        if line.is_cny() {
            let gateway = self
                .gateway
                .as_ref()
                .ok_or_else(|| OrderError::external("no payment gateway configured"))?;
            gateway
                .refund(order.serial(), line.amount(), "order refund")
                .map_err(|err| OrderError::external(err.to_string()))?;
        } else {
            let requested = OrderEvent::RefundRequested {
                order_id: order.id,
                price_line_id,
                at: Utc::now(),
            };
            self.dispatcher.dispatch(&requested, order).inspect_err(|err| {
                warn!(serial = order.serial(), %price_line_id, error = %err,
                    "refund transfer failed; line left unmarked");
            })?;
        }

        if let Some(line) = order.price_line_mut(price_line_id) {
            line.refund = true;
        }
        self.store.save(order)?;

        let refunded = OrderEvent::Refunded {
            order_id: order.id,
            price_line_id,
            at: Utc::now(),
        };
        self.dispatcher.dispatch(&refunded, order)?;
        info!(serial = order.serial(), %price_line_id, "price line refunded");
        Ok(())
    }
}
