//! Payment gateway reconciliation.
//!
//! Callbacks arrive at-least-once and out of order, so the success handler
//! is idempotent: a repeat for an already-paid order is acknowledged without
//! touching the one payment record written by the first delivery.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use tracing::{info, warn};

use vendo_core::{OrderError, OrderId, OrderResult};
use vendo_ledgers::{order_key, EntityLock};

use crate::event::{OrderDispatcher, OrderEvent};
use crate::model::{Order, PaymentRecord};
use crate::state::OrderState;
use crate::store::OrderStore;

/// Notification payload from the payment gateway.
#[derive(Debug, Clone)]
pub struct PaymentCallback {
    pub order_id: Option<OrderId>,
    pub serial: Option<String>,
    pub trade_no: String,
    pub amount: Decimal,
    pub paid_at: DateTime<Utc>,
}

pub struct PaymentCallbackService {
    store: Arc<dyn OrderStore>,
    dispatcher: Arc<OrderDispatcher>,
    locks: Arc<dyn EntityLock>,
}

impl PaymentCallbackService {
    pub fn new(
        store: Arc<dyn OrderStore>,
        dispatcher: Arc<OrderDispatcher>,
        locks: Arc<dyn EntityLock>,
    ) -> Self {
        Self {
            store,
            dispatcher,
            locks,
        }
    }

    /// Resolve by id first, falling back to the serial number; gateways
    /// differ in which reference they echo back.
    fn resolve(&self, callback: &PaymentCallback) -> OrderResult<Order> {
        if let Some(id) = callback.order_id {
            if let Some(order) = self.store.find(id)? {
                return Ok(order);
            }
        }
        if let Some(serial) = &callback.serial {
            if let Some(order) = self.store.find_by_serial(serial)? {
                return Ok(order);
            }
        }
        Err(OrderError::NotFound)
    }

    /// Settle a successful payment notification.
    pub fn on_success(&self, callback: &PaymentCallback) -> OrderResult<()> {
        let order = self.resolve(callback)?;
        let _guard = self.locks.acquire(&[order_key(order.id)]);

        // Reload under the lock; a concurrent delivery may have settled it.
        let mut order = self
            .store
            .find(order.id)?
            .ok_or(OrderError::NotFound)?;
        if order.state() == OrderState::Paid {
            info!(serial = order.serial(), trade_no = %callback.trade_no,
                "duplicate payment callback ignored");
            return Ok(());
        }
        if !order.state().is_unpaid() {
            return Err(OrderError::state(format!(
                "payment callback not accepted from {}",
                order.state()
            )));
        }

        let snapshot = order.clone();
        order.set_state(OrderState::Paid);
        order.trade_no = Some(callback.trade_no.clone());
        order.payment = Some(PaymentRecord {
            trade_no: callback.trade_no.clone(),
            amount: callback.amount,
            pay_time: callback.paid_at,
        });
        for line in &mut order.price_lines {
            if line.is_cny() && !line.paid {
                line.paid = true;
                line.can_refund = true;
            }
        }
        order.push_audit(callback.paid_at, None, "payment_callback");
        self.store.save(&order)?;

        let event = OrderEvent::Paid {
            order_id: order.id,
            at: callback.paid_at,
        };
        if let Err(err) = self.dispatcher.dispatch(&event, &mut order) {
            warn!(serial = order.serial(), error = %err,
                "paid side effect failed; rolling back settlement");
            self.store.save(&snapshot)?;
            return Err(err);
        }
        self.store.save(&order)?;
        info!(serial = order.serial(), trade_no = %callback.trade_no, "payment settled");
        Ok(())
    }

    /// A failed payment attempt returns a mid-payment order to `Init`;
    /// anything else is left untouched.
    pub fn on_failure(&self, callback: &PaymentCallback) -> OrderResult<()> {
        let order = self.resolve(callback)?;
        let _guard = self.locks.acquire(&[order_key(order.id)]);

        let mut order = self
            .store
            .find(order.id)?
            .ok_or(OrderError::NotFound)?;
        if order.state() != OrderState::Paying {
            return Ok(());
        }
        order.set_state(OrderState::Init);
        self.store.save(&order)?;
        info!(serial = order.serial(), trade_no = %callback.trade_no,
            "payment attempt failed; order back to init");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::OrderLine;
    use crate::store::MemoryOrderStore;
    use rust_decimal_macros::dec;
    use vendo_core::SkuId;
    use vendo_ledgers::LockRegistry;
    use vendo_pricing::{PriceKind, PriceLine};

    fn service(store: Arc<MemoryOrderStore>) -> PaymentCallbackService {
        PaymentCallbackService::new(
            store,
            Arc::new(OrderDispatcher::new()),
            Arc::new(LockRegistry::new()),
        )
    }

    fn pending_order(store: &MemoryOrderStore) -> Order {
        let mut order = Order::build("SO-77", "retail");
        let line = order.push_line(OrderLine::new(SkuId::new(), 1));
        order.push_price_line(
            PriceLine::new(PriceKind::Sale, "商品", dec!(100.00)).with_line(line),
        );
        store.save(&order).unwrap();
        order
    }

    fn callback_for(order: &Order, trade_no: &str) -> PaymentCallback {
        PaymentCallback {
            order_id: Some(order.id),
            serial: None,
            trade_no: trade_no.to_string(),
            amount: dec!(100.00),
            paid_at: Utc::now(),
        }
    }

    #[test]
    fn duplicate_callbacks_settle_exactly_once() {
        let store = Arc::new(MemoryOrderStore::new());
        let order = pending_order(&store);
        let svc = service(store.clone());

        svc.on_success(&callback_for(&order, "TN-1")).unwrap();
        svc.on_success(&callback_for(&order, "TN-2")).unwrap();

        let settled = store.find(order.id).unwrap().unwrap();
        assert_eq!(settled.state(), OrderState::Paid);
        // First delivery wins; the duplicate wrote nothing.
        assert_eq!(settled.payment.as_ref().unwrap().trade_no, "TN-1");
        assert_eq!(settled.trade_no.as_deref(), Some("TN-1"));
        assert!(settled.price_lines.iter().all(|pl| pl.paid && pl.can_refund));
    }

    #[test]
    fn callback_resolves_by_serial_when_id_is_absent() {
        let store = Arc::new(MemoryOrderStore::new());
        let order = pending_order(&store);
        let svc = service(store.clone());

        let callback = PaymentCallback {
            order_id: None,
            serial: Some("SO-77".to_string()),
            trade_no: "TN-9".to_string(),
            amount: dec!(100.00),
            paid_at: Utc::now(),
        };
        svc.on_success(&callback).unwrap();
        assert_eq!(store.find(order.id).unwrap().unwrap().state(), OrderState::Paid);
    }

    #[test]
    fn callback_for_unknown_order_is_not_found() {
        let store = Arc::new(MemoryOrderStore::new());
        let svc = service(store);
        let callback = PaymentCallback {
            order_id: Some(OrderId::new()),
            serial: Some("SO-missing".to_string()),
            trade_no: "TN-1".to_string(),
            amount: dec!(1.00),
            paid_at: Utc::now(),
        };
        assert_eq!(svc.on_success(&callback).unwrap_err(), OrderError::NotFound);
    }

    #[test]
    fn callback_on_canceled_order_is_rejected() {
        let store = Arc::new(MemoryOrderStore::new());
        let mut order = pending_order(&store);
        order.set_state(OrderState::Canceled);
        store.save(&order).unwrap();
        let svc = service(store.clone());

        let err = svc.on_success(&callback_for(&order, "TN-1")).unwrap_err();
        assert!(matches!(err, OrderError::StateNotAllowed(_)));
        assert!(store.find(order.id).unwrap().unwrap().payment.is_none());
    }

    #[test]
    fn failure_callback_returns_paying_order_to_init() {
        let store = Arc::new(MemoryOrderStore::new());
        let mut order = pending_order(&store);
        order.set_state(OrderState::Paying);
        store.save(&order).unwrap();
        let svc = service(store.clone());

        svc.on_failure(&callback_for(&order, "TN-1")).unwrap();
        assert_eq!(store.find(order.id).unwrap().unwrap().state(), OrderState::Init);

        // Not in Paying: a stray failure callback is a no-op.
        svc.on_failure(&callback_for(&order, "TN-2")).unwrap();
        assert_eq!(store.find(order.id).unwrap().unwrap().state(), OrderState::Init);
    }
}
