//! Order persistence contract.

use std::collections::HashMap;
use std::sync::RwLock;

use vendo_core::{OrderError, OrderId, OrderResult};

use crate::model::Order;

/// Persistence seam for the order aggregate.
///
/// `save` persists the whole aggregate in one unit; callers rely on that for
/// all-or-nothing operations like `receive`.
pub trait OrderStore: Send + Sync {
    fn find(&self, id: OrderId) -> OrderResult<Option<Order>>;

    fn find_by_serial(&self, serial: &str) -> OrderResult<Option<Order>>;

    fn save(&self, order: &Order) -> OrderResult<()>;

    /// Remove an order entirely (rollback of a failed creation).
    fn remove(&self, id: OrderId) -> OrderResult<()>;
}

/// In-memory order store for tests and local wiring.
#[derive(Debug, Default)]
pub struct MemoryOrderStore {
    orders: RwLock<HashMap<OrderId, Order>>,
}

impl MemoryOrderStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.orders.read().expect("orders poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl OrderStore for MemoryOrderStore {
    fn find(&self, id: OrderId) -> OrderResult<Option<Order>> {
        let orders = self
            .orders
            .read()
            .map_err(|_| OrderError::external("order store poisoned"))?;
        Ok(orders.get(&id).cloned())
    }

    fn find_by_serial(&self, serial: &str) -> OrderResult<Option<Order>> {
        let orders = self
            .orders
            .read()
            .map_err(|_| OrderError::external("order store poisoned"))?;
        Ok(orders.values().find(|o| o.serial() == serial).cloned())
    }

    fn save(&self, order: &Order) -> OrderResult<()> {
        let mut orders = self
            .orders
            .write()
            .map_err(|_| OrderError::external("order store poisoned"))?;
        orders.insert(order.id, order.clone());
        Ok(())
    }

    fn remove(&self, id: OrderId) -> OrderResult<()> {
        let mut orders = self
            .orders
            .write()
            .map_err(|_| OrderError::external("order store poisoned"))?;
        orders.remove(&id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn save_find_and_find_by_serial() {
        let store = MemoryOrderStore::new();
        let order = Order::build("SO-42", "retail");
        let id = order.id;
        store.save(&order).unwrap();

        assert!(store.find(id).unwrap().is_some());
        assert!(store.find_by_serial("SO-42").unwrap().is_some());
        assert!(store.find_by_serial("SO-43").unwrap().is_none());

        store.remove(id).unwrap();
        assert!(store.find(id).unwrap().is_none());
    }
}
