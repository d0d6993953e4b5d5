/// Payout Lifecycle FSM
///
/// Every payout batch passes through a deterministic set of states.
/// Transitions are guarded: an edge not in the table below is rejected
/// with a typed error and the record is left untouched.
///
/// State Diagram:
/// ```text
///   Pending → Scheduled → Processing → Completed
///                 ↓            ↓
///                 ↓→→→→→→→→ Failed
///                 ↓
///             Completed   (same-day disbursement, no processing step)
///
///   Terminal states: Completed, Failed
/// ```
use crate::error::SettlementError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Formal payout lifecycle states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PayoutStatus {
    /// Batch created from aggregated orders, awaiting a settlement date
    Pending,
    /// Settlement date assigned, awaiting disbursement
    Scheduled,
    /// Disbursement handed to the bank, awaiting confirmation
    Processing,
    /// Funds disbursed against a verified account — terminal
    Completed,
    /// Disbursement failed, orders released for re-aggregation — terminal
    Failed,
}

impl PayoutStatus {
    /// Returns true if this is a terminal (final) state.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }

    /// Returns the set of states reachable from this state.
    pub fn valid_transitions(&self) -> &'static [PayoutStatus] {
        use PayoutStatus::*;
        match self {
            Pending => &[Scheduled],
            Scheduled => &[Processing, Completed, Failed],
            Processing => &[Completed, Failed],
            // Terminal states cannot transition
            Completed => &[],
            Failed => &[],
        }
    }

    /// Check if transitioning to `next` is valid.
    pub fn can_transition_to(&self, next: &PayoutStatus) -> bool {
        self.valid_transitions().contains(next)
    }
}

impl fmt::Display for PayoutStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

/// One applied edge in a payout's audit trail.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusChange {
    pub from: PayoutStatus,
    pub to: PayoutStatus,
    pub at: DateTime<Utc>,
    pub reason: Option<String>,
}

/// Pure transition check: `(current, requested) -> new | error`.
///
/// Preconditions that depend on anything other than the two states
/// (verified bank account, non-empty reference, future schedule date)
/// belong to the settlement service, not here.
pub struct PayoutStateMachine;

impl PayoutStateMachine {
    pub fn transition(
        current: PayoutStatus,
        requested: PayoutStatus,
    ) -> Result<PayoutStatus, SettlementError> {
        if current.can_transition_to(&requested) {
            Ok(requested)
        } else {
            Err(SettlementError::InvalidTransition {
                from: current,
                to: requested,
            })
        }
    }
}
