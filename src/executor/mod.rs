//! Executors that mutate an account's balance under a chosen concurrency
//! control: the pessimistic [`GuardedExecutor`] and the optimistic
//! [`OptimisticUpdater`] it is compared against.

mod guarded;
mod optimistic;
mod outcome;

use std::time::Duration;

use serde::{Deserialize, Serialize};

pub use guarded::GuardedExecutor;
pub use optimistic::OptimisticUpdater;
pub use outcome::{AbortReason, AdjustOutcome, Outcome, Receipt, Rejection};

/// Which locks a guarded run takes before touching the balance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LockMode {
    DistributedOnly,
    RowOnly,
    Both,
    /// No exclusion at all; concurrent runs may lose updates.
    None,
}

impl LockMode {
    pub const ALL: [LockMode; 4] = [
        LockMode::DistributedOnly,
        LockMode::RowOnly,
        LockMode::Both,
        LockMode::None,
    ];

    pub fn uses_distributed_lock(self) -> bool {
        matches!(self, LockMode::DistributedOnly | LockMode::Both)
    }

    pub fn uses_row_lock(self) -> bool {
        matches!(self, LockMode::RowOnly | LockMode::Both)
    }
}

/// One unit of work to charge against an account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobRequest {
    pub account_id: String,
    pub title: String,
    pub cost: u64,
    pub lock_mode: LockMode,
    /// Time the work itself takes while the transaction is open.
    pub work: Duration,
}

impl JobRequest {
    pub fn new(account_id: impl Into<String>, title: impl Into<String>, cost: u64) -> Self {
        Self {
            account_id: account_id.into(),
            title: title.into(),
            cost,
            lock_mode: LockMode::RowOnly,
            work: Duration::ZERO,
        }
    }

    pub fn with_lock_mode(mut self, mode: LockMode) -> Self {
        self.lock_mode = mode;
        self
    }

    pub fn with_work(mut self, work: Duration) -> Self {
        self.work = work;
        self
    }
}
