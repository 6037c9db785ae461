use std::fmt;

use serde::Serialize;

use crate::lock::AcquisitionFailure;
use crate::store::StoreError;

/// What a committed run changed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Receipt {
    pub txn_id: u64,
    pub job_id: u64,
    pub previous_balance: i64,
    pub balance: i64,
}

/// Refusals that happen before anything is written.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Rejection {
    NotFound { account_id: String },
    InsufficientBalance { balance: i64, cost: u64 },
    LockUnavailable { failure: AcquisitionFailure },
}

impl Rejection {
    pub fn kind(&self) -> &'static str {
        match self {
            Rejection::NotFound { .. } => "not-found",
            Rejection::InsufficientBalance { .. } => "insufficient-balance",
            Rejection::LockUnavailable { .. } => "lock-unavailable",
        }
    }
}

impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Rejection::NotFound { account_id } => write!(f, "account {} not found", account_id),
            Rejection::InsufficientBalance { balance, cost } => {
                write!(f, "insufficient balance: have {}, need {}", balance, cost)
            }
            Rejection::LockUnavailable { failure } => write!(f, "{}", failure),
        }
    }
}

/// Infrastructure failures; every write of the run was rolled back.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AbortReason {
    TransactionTimeout { txn_id: u64 },
    WriteConflict { account_id: String, reason: String },
    StaleRead { account_id: String, expected: i64 },
    Store { error: StoreError },
}

impl AbortReason {
    pub fn kind(&self) -> &'static str {
        match self {
            AbortReason::TransactionTimeout { .. } => "transaction-timeout",
            AbortReason::WriteConflict { .. } => "write-conflict",
            AbortReason::StaleRead { .. } => "stale-read",
            AbortReason::Store { .. } => "store-error",
        }
    }
}

impl From<StoreError> for AbortReason {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::TransactionTimeout { txn_id } => AbortReason::TransactionTimeout { txn_id },
            StoreError::WriteConflict { account_id, reason } => {
                AbortReason::WriteConflict { account_id, reason }
            }
            error => AbortReason::Store { error },
        }
    }
}

impl fmt::Display for AbortReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AbortReason::TransactionTimeout { txn_id } => {
                write!(f, "transaction {} timed out and was rolled back", txn_id)
            }
            AbortReason::WriteConflict { account_id, reason } => {
                write!(f, "write conflict on {}: {}", account_id, reason)
            }
            AbortReason::StaleRead {
                account_id,
                expected,
            } => write!(
                f,
                "balance of {} changed since it was read as {}",
                account_id, expected
            ),
            AbortReason::Store { error } => write!(f, "{}", error),
        }
    }
}

/// Terminal result of one guarded run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "detail", rename_all = "snake_case")]
pub enum Outcome {
    Committed(Receipt),
    Rejected(Rejection),
    Aborted(AbortReason),
}

impl Outcome {
    pub fn is_committed(&self) -> bool {
        matches!(self, Outcome::Committed(_))
    }

    pub fn receipt(&self) -> Option<&Receipt> {
        match self {
            Outcome::Committed(receipt) => Some(receipt),
            _ => None,
        }
    }

    /// Stable label of the failure, `None` when committed.
    pub fn failure_kind(&self) -> Option<&'static str> {
        match self {
            Outcome::Committed(_) => None,
            Outcome::Rejected(rejection) => Some(rejection.kind()),
            Outcome::Aborted(reason) => Some(reason.kind()),
        }
    }

    /// Whether the failure came from locking or the store rather than from
    /// the account's own state.
    pub fn is_infrastructure(&self) -> bool {
        match self {
            Outcome::Committed(_) => false,
            Outcome::Rejected(Rejection::LockUnavailable { .. }) => true,
            Outcome::Rejected(_) => false,
            Outcome::Aborted(_) => true,
        }
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Outcome::Committed(receipt) => write!(
                f,
                "committed job {} ({} -> {})",
                receipt.job_id, receipt.previous_balance, receipt.balance
            ),
            Outcome::Rejected(rejection) => write!(f, "rejected: {}", rejection),
            Outcome::Aborted(reason) => write!(f, "aborted: {}", reason),
        }
    }
}

/// Terminal result of one optimistic balance adjustment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "detail", rename_all = "snake_case")]
pub enum AdjustOutcome {
    /// The first conditional write matched.
    Updated { previous: i64, current: i64 },
    /// A conditional write matched after at least one lost race.
    Retried {
        attempts: u32,
        previous: i64,
        current: i64,
    },
    Rejected(Rejection),
    Aborted(AbortReason),
}

impl AdjustOutcome {
    /// Balance change actually applied, `None` if nothing was written.
    pub fn applied_delta(&self) -> Option<i64> {
        match self {
            AdjustOutcome::Updated { previous, current }
            | AdjustOutcome::Retried {
                previous, current, ..
            } => Some(current - previous),
            _ => None,
        }
    }

    pub fn failure_kind(&self) -> Option<&'static str> {
        match self {
            AdjustOutcome::Updated { .. } | AdjustOutcome::Retried { .. } => None,
            AdjustOutcome::Rejected(rejection) => Some(rejection.kind()),
            AdjustOutcome::Aborted(reason) => Some(reason.kind()),
        }
    }
}

impl fmt::Display for AdjustOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AdjustOutcome::Updated { previous, current } => {
                write!(f, "updated ({} -> {})", previous, current)
            }
            AdjustOutcome::Retried {
                attempts,
                previous,
                current,
            } => write!(
                f,
                "updated after {} attempts ({} -> {})",
                attempts, previous, current
            ),
            AdjustOutcome::Rejected(rejection) => write!(f, "rejected: {}", rejection),
            AdjustOutcome::Aborted(reason) => write!(f, "aborted: {}", reason),
        }
    }
}
