//! Stock ledger contract: reservations and committed movements.

use std::collections::HashMap;
use std::sync::{Mutex, RwLock};

use serde::{Deserialize, Serialize};

use vendo_core::SkuId;

use crate::error::LedgerError;

/// Kind of stock movement.
///
/// `Lock`/`Unlock` manage a temporary hold without committing the deduction;
/// `Deduct` commits it and `Return` reverses a committed deduction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MovementKind {
    Lock,
    Unlock,
    Deduct,
    Return,
}

/// One stock movement against a single SKU.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Movement {
    pub kind: MovementKind,
    pub sku: SkuId,
    pub qty: i64,
    /// Free-form note, typically the order serial.
    pub note: String,
}

impl Movement {
    pub fn new(kind: MovementKind, sku: SkuId, qty: i64, note: impl Into<String>) -> Self {
        Self {
            kind,
            sku,
            qty,
            note: note.into(),
        }
    }
}

/// Consumed contract of the external stock service.
pub trait StockLedger: Send + Sync {
    /// Currently-valid stock (on hand minus holds) for a SKU.
    fn valid_stock(&self, sku: SkuId) -> Result<i64, LedgerError>;

    /// Apply a single movement.
    fn process(&self, movement: Movement) -> Result<(), LedgerError>;

    /// Apply a batch atomically: either every movement lands or none do.
    fn batch_process(&self, movements: Vec<Movement>) -> Result<(), LedgerError>;
}

#[derive(Debug, Clone, Copy, Default)]
struct SkuRecord {
    on_hand: i64,
    locked: i64,
}

/// In-memory stock ledger.
///
/// Keeps a journal of every accepted movement so tests can assert exactly
/// which movements an orchestration produced.
#[derive(Debug, Default)]
pub struct MemoryStockLedger {
    records: RwLock<HashMap<SkuId, SkuRecord>>,
    journal: Mutex<Vec<Movement>>,
}

impl MemoryStockLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a SKU with on-hand stock.
    pub fn put_stock(&self, sku: SkuId, qty: i64) {
        let mut records = self.records.write().expect("stock records poisoned");
        records.entry(sku).or_default().on_hand = qty;
    }

    /// Every accepted movement, in order.
    pub fn movements(&self) -> Vec<Movement> {
        self.journal.lock().expect("stock journal poisoned").clone()
    }

    fn apply(records: &mut HashMap<SkuId, SkuRecord>, movement: &Movement) -> Result<(), LedgerError> {
        if movement.qty <= 0 {
            return Err(LedgerError::InvariantViolation(
                "movement qty must be positive".into(),
            ));
        }
        let record = records.entry(movement.sku).or_default();
        match movement.kind {
            MovementKind::Lock => {
                if record.on_hand - record.locked < movement.qty {
                    return Err(LedgerError::InsufficientStock {
                        sku: movement.sku.to_string(),
                    });
                }
                record.locked += movement.qty;
            }
            MovementKind::Unlock => {
                if record.locked < movement.qty {
                    return Err(LedgerError::InvariantViolation(format!(
                        "unlock {} exceeds hold {}",
                        movement.qty, record.locked
                    )));
                }
                record.locked -= movement.qty;
            }
            MovementKind::Deduct => {
                if record.on_hand < movement.qty {
                    return Err(LedgerError::InsufficientStock {
                        sku: movement.sku.to_string(),
                    });
                }
                record.on_hand -= movement.qty;
            }
            MovementKind::Return => {
                record.on_hand += movement.qty;
            }
        }
        Ok(())
    }
}

impl StockLedger for MemoryStockLedger {
    fn valid_stock(&self, sku: SkuId) -> Result<i64, LedgerError> {
        let records = self.records.read().expect("stock records poisoned");
        Ok(records
            .get(&sku)
            .map(|r| r.on_hand - r.locked)
            .unwrap_or(0))
    }

    fn process(&self, movement: Movement) -> Result<(), LedgerError> {
        self.batch_process(vec![movement])
    }

    fn batch_process(&self, movements: Vec<Movement>) -> Result<(), LedgerError> {
        let mut records = self.records.write().expect("stock records poisoned");
        // Stage on a copy so a mid-batch failure leaves nothing applied.
        let mut staged = records.clone();
        for movement in &movements {
            Self::apply(&mut staged, movement)?;
        }
        *records = staged;
        self.journal
            .lock()
            .expect("stock journal poisoned")
            .extend(movements);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lock_reserves_without_deducting() {
        let ledger = MemoryStockLedger::new();
        let sku = SkuId::new();
        ledger.put_stock(sku, 10);

        ledger
            .process(Movement::new(MovementKind::Lock, sku, 4, "t"))
            .unwrap();
        assert_eq!(ledger.valid_stock(sku).unwrap(), 6);

        ledger
            .batch_process(vec![
                Movement::new(MovementKind::Unlock, sku, 4, "t"),
                Movement::new(MovementKind::Deduct, sku, 4, "t"),
            ])
            .unwrap();
        assert_eq!(ledger.valid_stock(sku).unwrap(), 6);
    }

    #[test]
    fn lock_beyond_valid_stock_is_rejected() {
        let ledger = MemoryStockLedger::new();
        let sku = SkuId::new();
        ledger.put_stock(sku, 3);

        let err = ledger
            .process(Movement::new(MovementKind::Lock, sku, 5, "t"))
            .unwrap_err();
        assert!(matches!(err, LedgerError::InsufficientStock { .. }));
    }

    #[test]
    fn failed_batch_applies_nothing() {
        let ledger = MemoryStockLedger::new();
        let sku = SkuId::new();
        ledger.put_stock(sku, 5);

        let err = ledger.batch_process(vec![
            Movement::new(MovementKind::Lock, sku, 2, "t"),
            Movement::new(MovementKind::Lock, sku, 9, "t"),
        ]);
        assert!(err.is_err());
        assert_eq!(ledger.valid_stock(sku).unwrap(), 5);
        assert!(ledger.movements().is_empty());
    }

    #[test]
    fn return_restores_committed_stock() {
        let ledger = MemoryStockLedger::new();
        let sku = SkuId::new();
        ledger.put_stock(sku, 5);

        ledger
            .process(Movement::new(MovementKind::Deduct, sku, 5, "t"))
            .unwrap();
        assert_eq!(ledger.valid_stock(sku).unwrap(), 0);
        ledger
            .process(Movement::new(MovementKind::Return, sku, 5, "t"))
            .unwrap();
        assert_eq!(ledger.valid_stock(sku).unwrap(), 5);
    }
}
