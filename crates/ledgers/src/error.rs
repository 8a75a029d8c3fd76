use thiserror::Error;

/// Failure surfaced by a stock/credit/payment collaborator.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LedgerError {
    #[error("insufficient stock for sku {sku}")]
    InsufficientStock { sku: String },

    #[error("insufficient balance on account {account}")]
    InsufficientBalance { account: String },

    #[error("account not found: {0}")]
    AccountNotFound(String),

    #[error("unknown currency: {0}")]
    UnknownCurrency(String),

    #[error("invariant violated: {0}")]
    InvariantViolation(String),

    #[error("transfer failed: {0}")]
    TransferFailed(String),
}
