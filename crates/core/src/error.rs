//! Domain error model.

use thiserror::Error;

/// Result type used across the domain layer.
pub type OrderResult<T> = Result<T, OrderError>;

/// Domain-level error for order lifecycle and settlement operations.
///
/// Kinds map to distinct caller behavior: `NotFound` and `Validation` surface
/// immediately as client errors; the insufficient-resource variants abort a
/// creation before anything is persisted; `ExternalService` during a
/// synchronous side effect rolls back the triggering operation.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum OrderError {
    /// The order or line does not exist for the given identity/owner.
    #[error("order not found")]
    NotFound,

    /// The operation is not allowed in the current state
    /// (e.g. receive outside its window, refund of a non-refundable line).
    #[error("state not allowed: {0}")]
    StateNotAllowed(String),

    /// Requested quantity exceeds currently-valid stock.
    #[error("insufficient stock for sku {sku}")]
    InsufficientStock { sku: String },

    /// Account balance short for a currency bucket.
    #[error("insufficient credit in {currency}")]
    InsufficientCredit { currency: String },

    /// A ledger, transfer or gateway collaborator failed.
    #[error("external service failure: {0}")]
    ExternalService(String),

    /// Malformed boundary input.
    #[error("validation failed: {0}")]
    Validation(String),

    /// Concurrent modification conflict.
    #[error("conflict: {0}")]
    Conflict(String),
}

impl OrderError {
    pub fn not_found() -> Self {
        Self::NotFound
    }

    pub fn state(msg: impl Into<String>) -> Self {
        Self::StateNotAllowed(msg.into())
    }

    pub fn insufficient_stock(sku: impl Into<String>) -> Self {
        Self::InsufficientStock { sku: sku.into() }
    }

    pub fn insufficient_credit(currency: impl Into<String>) -> Self {
        Self::InsufficientCredit {
            currency: currency.into(),
        }
    }

    pub fn external(msg: impl Into<String>) -> Self {
        Self::ExternalService(msg.into())
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        Self::Conflict(msg.into())
    }
}
