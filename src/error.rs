use crate::payout_fsm::PayoutStatus;
use crate::persistence::redb_store::StoreError;
use thiserror::Error;

/// Error taxonomy for the settlement core.
///
/// Every public operation returns one of these as a structured value.
/// The core never mutates state to "correct" a caller's mistake: a
/// validation or transition failure leaves the record exactly as the
/// caller last read it.
#[derive(Error, Debug)]
pub enum SettlementError {
    /// Missing or invalid input. The caller can fix the request and retry.
    #[error("validation failed: {0}")]
    Validation(String),

    /// The requested transition is not an edge of the payout lifecycle.
    /// Terminal for this request.
    #[error("illegal payout transition: {from} -> {to}")]
    InvalidTransition { from: PayoutStatus, to: PayoutStatus },

    /// Lost a write race on the record. Safe to re-read and retry.
    #[error("concurrent modification: {0}")]
    ConcurrencyConflict(String),

    /// Unknown payout, account, or producer id. Terminal.
    #[error("not found: {0}")]
    NotFound(String),

    #[error("storage error: {0}")]
    Store(#[from] StoreError),
}

impl SettlementError {
    /// Stable machine-readable discriminant for API consumers.
    pub fn kind(&self) -> &'static str {
        match self {
            SettlementError::Validation(_) => "VALIDATION",
            SettlementError::InvalidTransition { .. } => "INVALID_TRANSITION",
            SettlementError::ConcurrencyConflict(_) => "CONCURRENCY_CONFLICT",
            SettlementError::NotFound(_) => "NOT_FOUND",
            SettlementError::Store(_) => "STORAGE",
        }
    }
}

pub type Result<T> = std::result::Result<T, SettlementError>;
