//! Credit (virtual currency) ledger contract.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, RwLock};

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use vendo_core::UserId;

use crate::error::LedgerError;

/// A virtual currency known to the platform.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Currency {
    pub code: String,
    pub name: String,
}

/// Resolves a currency code to its definition.
pub trait CurrencyResolver: Send + Sync {
    fn by_code(&self, code: &str) -> Option<Currency>;
}

/// Fixed currency table.
#[derive(Debug, Clone, Default)]
pub struct StaticCurrencies {
    currencies: Vec<Currency>,
}

impl StaticCurrencies {
    pub fn new(currencies: Vec<Currency>) -> Self {
        Self { currencies }
    }

    pub fn with(mut self, code: impl Into<String>, name: impl Into<String>) -> Self {
        self.currencies.push(Currency {
            code: code.into(),
            name: name.into(),
        });
        self
    }
}

impl CurrencyResolver for StaticCurrencies {
    fn by_code(&self, code: &str) -> Option<Currency> {
        self.currencies.iter().find(|c| c.code == code).cloned()
    }
}

/// Reference to one account in the credit ledger.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AccountRef {
    pub name: String,
    pub currency: String,
}

impl AccountRef {
    pub fn new(name: impl Into<String>, currency: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            currency: currency.into(),
        }
    }
}

/// One executed transfer (journal entry).
#[derive(Debug, Clone, PartialEq)]
pub struct Transfer {
    pub from: AccountRef,
    pub to: AccountRef,
    pub amount: Decimal,
    pub memo: String,
}

/// Consumed contract of the external credit/virtual-currency service.
pub trait CreditLedger: Send + Sync {
    /// The user's account for a currency.
    fn account_of(&self, user: UserId, currency: &str) -> Result<AccountRef, LedgerError>;

    /// An account named by convention.
    fn named_account(&self, name: &str, currency: &str) -> Result<AccountRef, LedgerError>;

    /// The platform's settlement account for a currency
    /// (named `system:{code}` by convention).
    fn system_account(&self, currency: &str) -> Result<AccountRef, LedgerError> {
        self.named_account(&format!("system:{currency}"), currency)
    }

    fn balance_of(&self, account: &AccountRef) -> Result<Decimal, LedgerError>;

    fn transfer(
        &self,
        from: &AccountRef,
        to: &AccountRef,
        amount: Decimal,
        memo: &str,
    ) -> Result<(), LedgerError>;
}

/// In-memory credit ledger with a transfer journal.
///
/// `fail_next_transfer` lets tests exercise the rollback paths without a
/// bespoke failing stub.
#[derive(Debug, Default)]
pub struct MemoryCreditLedger {
    balances: RwLock<HashMap<AccountRef, Decimal>>,
    transfers: Mutex<Vec<Transfer>>,
    fail_next_transfer: AtomicBool,
}

impl MemoryCreditLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Open (or top up) an account.
    pub fn deposit(&self, account: AccountRef, amount: Decimal) {
        let mut balances = self.balances.write().expect("balances poisoned");
        *balances.entry(account).or_default() += amount;
    }

    pub fn transfers(&self) -> Vec<Transfer> {
        self.transfers.lock().expect("transfers poisoned").clone()
    }

    /// Make the next transfer fail with `TransferFailed`.
    pub fn fail_next_transfer(&self) {
        self.fail_next_transfer.store(true, Ordering::SeqCst);
    }
}

impl CreditLedger for MemoryCreditLedger {
    fn account_of(&self, user: UserId, currency: &str) -> Result<AccountRef, LedgerError> {
        Ok(AccountRef::new(format!("user:{user}"), currency))
    }

    fn named_account(&self, name: &str, currency: &str) -> Result<AccountRef, LedgerError> {
        Ok(AccountRef::new(name, currency))
    }

    fn balance_of(&self, account: &AccountRef) -> Result<Decimal, LedgerError> {
        let balances = self.balances.read().expect("balances poisoned");
        Ok(balances.get(account).copied().unwrap_or_default())
    }

    fn transfer(
        &self,
        from: &AccountRef,
        to: &AccountRef,
        amount: Decimal,
        memo: &str,
    ) -> Result<(), LedgerError> {
        if self.fail_next_transfer.swap(false, Ordering::SeqCst) {
            return Err(LedgerError::TransferFailed("injected failure".into()));
        }
        if amount <= Decimal::ZERO {
            return Err(LedgerError::InvariantViolation(
                "transfer amount must be positive".into(),
            ));
        }
        if from.currency != to.currency {
            return Err(LedgerError::InvariantViolation(
                "transfer crosses currency boundary".into(),
            ));
        }

        let mut balances = self.balances.write().expect("balances poisoned");
        let available = balances.get(from).copied().unwrap_or_default();
        if available < amount {
            return Err(LedgerError::InsufficientBalance {
                account: from.name.clone(),
            });
        }
        *balances.entry(from.clone()).or_default() -= amount;
        *balances.entry(to.clone()).or_default() += amount;
        drop(balances);

        self.transfers
            .lock()
            .expect("transfers poisoned")
            .push(Transfer {
                from: from.clone(),
                to: to.clone(),
                amount,
                memo: memo.to_string(),
            });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn transfer_moves_balance_and_journals() {
        let ledger = MemoryCreditLedger::new();
        let user = ledger.account_of(UserId::new(), "GOLD").unwrap();
        let system = ledger.system_account("GOLD").unwrap();
        ledger.deposit(user.clone(), dec!(100));

        ledger
            .transfer(&user, &system, dec!(40), "order pay")
            .unwrap();
        assert_eq!(ledger.balance_of(&user).unwrap(), dec!(60));
        assert_eq!(ledger.balance_of(&system).unwrap(), dec!(40));
        assert_eq!(ledger.transfers().len(), 1);
    }

    #[test]
    fn short_balance_rejects_transfer() {
        let ledger = MemoryCreditLedger::new();
        let user = ledger.account_of(UserId::new(), "GOLD").unwrap();
        let system = ledger.system_account("GOLD").unwrap();

        let err = ledger.transfer(&user, &system, dec!(1), "t").unwrap_err();
        assert!(matches!(err, LedgerError::InsufficientBalance { .. }));
        assert!(ledger.transfers().is_empty());
    }

    #[test]
    fn injected_failure_fires_once() {
        let ledger = MemoryCreditLedger::new();
        let user = ledger.account_of(UserId::new(), "GOLD").unwrap();
        let system = ledger.system_account("GOLD").unwrap();
        ledger.deposit(user.clone(), dec!(10));

        ledger.fail_next_transfer();
        assert!(ledger.transfer(&user, &system, dec!(1), "t").is_err());
        assert!(ledger.transfer(&user, &system, dec!(1), "t").is_ok());
    }

    #[test]
    fn resolver_rejects_unknown_codes() {
        let currencies = StaticCurrencies::default().with("GOLD", "金币");
        assert!(currencies.by_code("GOLD").is_some());
        assert!(currencies.by_code("SILVER").is_none());
    }
}
