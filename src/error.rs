//! Crate-wide error taxonomy.
//!
//! Mirrors the error kinds the kernel API surfaces to its callers (see
//! the spec's error-handling design): validation failures never mutate
//! state or emit events; persistence failures are reported but the
//! persisted log remains the system of record for recovery.

use crate::persistence::PersistenceError;
use uuid::Uuid;

/// Errors returned by the kernel's public operations.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum KernelError {
    /// Requested instrument is not the one this kernel instance serves.
    #[error("unknown instrument: {0}")]
    UnknownInstrument(String),

    /// Trader id not present in the trader store.
    #[error("unknown trader: {0}")]
    UnknownTrader(Uuid),

    /// Order failed validation: non-positive size, leverage out of range,
    /// or a limit order with a non-positive price.
    #[error("invalid order: {0}")]
    InvalidOrder(String),

    /// A market order matched only against the submitter's own resting
    /// orders and was cancelled without any trades.
    #[error("market order cancelled: all opposing liquidity belonged to the same trader")]
    SelfTradeOnly,

    /// Cancel requested for an order that is unknown or already terminal.
    #[error("order not found or not cancellable: {0}")]
    NotFound(Uuid),

    /// The persistence layer failed to durably apply a write.
    #[error("persistence failure: {0}")]
    PersistenceFailure(#[from] PersistenceError),
}

pub type KernelResult<T> = Result<T, KernelError>;
