//! Sales counters, bumped when payment settles.

use std::collections::HashMap;
use std::sync::Mutex;

use tracing::debug;

use vendo_core::{OrderError, SkuId};
use vendo_events::Subscriber;
use vendo_orders::{Order, OrderEvent};

/// Per-SKU units-sold tally. Counts settled demand only, so a created but
/// never-paid order contributes nothing.
#[derive(Debug, Default)]
pub struct SalesCounter {
    sold: Mutex<HashMap<SkuId, i64>>,
}

impl SalesCounter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sold(&self, sku: SkuId) -> i64 {
        self.sold
            .lock()
            .expect("sales counters poisoned")
            .get(&sku)
            .copied()
            .unwrap_or(0)
    }
}

impl Subscriber<OrderEvent> for SalesCounter {
    type Ctx = Order;
    type Error = OrderError;

    fn name(&self) -> &'static str {
        "sales_counter"
    }

    fn on_event(&self, event: &OrderEvent, order: &mut Order) -> Result<(), OrderError> {
        if let OrderEvent::Paid { .. } = event {
            let mut sold = self.sold.lock().expect("sales counters poisoned");
            for line in order.valid_lines() {
                *sold.entry(line.sku).or_insert(0) += line.quantity;
            }
            debug!(serial = order.serial(), "sales counters updated");
        }
        Ok(())
    }
}
