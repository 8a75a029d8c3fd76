//! CNY payment gateway contract (refund side only).
//!
//! Purchasing/settlement in CNY happens through external gateway callbacks;
//! the one thing this system drives directly is a refund instruction.

use std::sync::Mutex;

use rust_decimal::Decimal;

use crate::error::LedgerError;

pub trait PaymentGateway: Send + Sync {
    /// Instruct the gateway to refund `amount` against an order's trade.
    fn refund(&self, order_serial: &str, amount: Decimal, memo: &str) -> Result<(), LedgerError>;
}

/// Records refund instructions for assertions.
#[derive(Debug, Default)]
pub struct MemoryGateway {
    refunds: Mutex<Vec<(String, Decimal)>>,
}

impl MemoryGateway {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn refunds(&self) -> Vec<(String, Decimal)> {
        self.refunds.lock().expect("refunds poisoned").clone()
    }
}

impl PaymentGateway for MemoryGateway {
    fn refund(&self, order_serial: &str, amount: Decimal, _memo: &str) -> Result<(), LedgerError> {
        self.refunds
            .lock()
            .expect("refunds poisoned")
            .push((order_serial.to_string(), amount));
        Ok(())
    }
}
