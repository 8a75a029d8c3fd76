//! Stock orchestration: hold on creation, commit on payment, release or
//! restock on cancellation.

use std::collections::BTreeMap;
use std::sync::Arc;

use tracing::{debug, warn};

use vendo_core::{OrderError, SkuId};
use vendo_events::Subscriber;
use vendo_ledgers::{sku_key, EntityLock, LedgerError, Movement, MovementKind, StockLedger};
use vendo_orders::{CreationGuard, Order, OrderEvent};

fn ledger_error(err: LedgerError) -> OrderError {
    match err {
        LedgerError::InsufficientStock { sku } => OrderError::insufficient_stock(sku),
        other => OrderError::external(other.to_string()),
    }
}

pub struct StockSubscriber {
    ledger: Arc<dyn StockLedger>,
    locks: Arc<dyn EntityLock>,
}

impl StockSubscriber {
    pub fn new(ledger: Arc<dyn StockLedger>, locks: Arc<dyn EntityLock>) -> Self {
        Self { ledger, locks }
    }

    /// Demand per SKU across the order's valid lines. BTreeMap keeps the
    /// derived lock keys and movements in a stable order.
    fn demand(order: &Order) -> BTreeMap<SkuId, i64> {
        let mut demand = BTreeMap::new();
        for line in order.valid_lines() {
            *demand.entry(line.sku).or_insert(0) += line.quantity;
        }
        demand
    }

    /// Movement over the surviving lines only. Cancelled lines settle their
    /// stock individually when the line-cancel event fires, so the hold
    /// tracked by the ledger always matches the valid demand.
    fn apply(&self, order: &Order, kind: MovementKind, note: &str) -> Result<(), OrderError> {
        self.apply_demand(order, Self::demand(order), kind, note)
    }

    fn apply_demand(
        &self,
        order: &Order,
        demand: BTreeMap<SkuId, i64>,
        kind: MovementKind,
        note: &str,
    ) -> Result<(), OrderError> {
        if demand.is_empty() {
            return Ok(());
        }
        let keys: Vec<String> = demand.keys().map(sku_key).collect();
        let _guard = self.locks.acquire(&keys);

        let movements: Vec<Movement> = demand
            .into_iter()
            .map(|(sku, qty)| Movement::new(kind, sku, qty, note))
            .collect();
        self.ledger.batch_process(movements).map_err(|err| {
            warn!(serial = order.serial(), ?kind, error = %err, "stock movement rejected");
            ledger_error(err)
        })?;
        debug!(serial = order.serial(), ?kind, "stock movement applied");
        Ok(())
    }
}

impl CreationGuard for StockSubscriber {
    fn name(&self) -> &'static str {
        "stock"
    }

    /// Unlocked pre-check; the authoritative check is the hold itself.
    fn check(&self, order: &mut Order) -> Result<(), OrderError> {
        for (sku, qty) in Self::demand(order) {
            let available = self.ledger.valid_stock(sku).map_err(ledger_error)?;
            if available < qty {
                return Err(OrderError::insufficient_stock(sku.to_string()));
            }
        }
        Ok(())
    }
}

impl Subscriber<OrderEvent> for StockSubscriber {
    type Ctx = Order;
    type Error = OrderError;

    fn name(&self) -> &'static str {
        "stock"
    }

    fn on_event(&self, event: &OrderEvent, order: &mut Order) -> Result<(), OrderError> {
        match event {
            OrderEvent::Created { .. } => {
                let demand = Self::demand(order);
                self.apply_demand(order, demand, MovementKind::Lock, order.serial())
            }
            OrderEvent::Paid { .. } => {
                // Convert the hold into a committed deduction.
                self.apply(order, MovementKind::Unlock, order.serial())?;
                self.apply(order, MovementKind::Deduct, order.serial())
            }
            OrderEvent::LineCanceled {
                line_id, was_paid, ..
            } => {
                let Some(line) = order.line(*line_id) else {
                    return Ok(());
                };
                // Before payment the line only held stock; after payment its
                // quantity was deducted and comes back as a restock.
                let kind = if *was_paid {
                    MovementKind::Return
                } else {
                    MovementKind::Unlock
                };
                let mut demand = BTreeMap::new();
                demand.insert(line.sku, line.quantity);
                self.apply_demand(order, demand, kind, order.serial())
            }
            OrderEvent::Canceled { was_paid, .. } => {
                // Unpaid orders only held stock; paid orders already deducted
                // it and need a restock.
                let kind = if *was_paid {
                    MovementKind::Return
                } else {
                    MovementKind::Unlock
                };
                self.apply(order, kind, order.serial())
            }
            _ => Ok(()),
        }
    }
}
