//! Resource store: accounts, job records, and the transactional surface the
//! executors drive.
//!
//! ## Example
//!
//! ```ignore
//! use account_guard::store::{InMemoryStore, ResourceStore};
//! use std::time::Duration;
//!
//! let store = InMemoryStore::new();
//! store.upsert_account("acc-1", 100).await?;
//!
//! let mut txn = store.begin_transaction(Duration::from_secs(5)).await?;
//! store.lock_row_for_update(&mut txn, "acc-1").await?;
//! store.update_balance(&mut txn, "acc-1", 95).await?;
//! store.insert_job(&mut txn, "render", "acc-1").await?;
//! store.commit(txn).await?;
//! ```

mod in_memory;
mod resource_store;

use std::fmt;
use std::time::SystemTime;

use serde::{Deserialize, Serialize};

/// A balance-bearing entity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    pub id: String,
    pub balance: i64,
    pub created_at: SystemTime,
    pub updated_at: SystemTime,
}

impl Account {
    pub fn new(id: impl Into<String>, balance: i64) -> Self {
        let now = SystemTime::now();
        Account {
            id: id.into(),
            balance,
            created_at: now,
            updated_at: now,
        }
    }

    /// Whether debiting `cost` would keep the balance non-negative.
    pub fn can_afford(&self, cost: u64) -> bool {
        i64::try_from(cost).is_ok_and(|cost| cost <= self.balance)
    }
}

/// A unit of completed work charged to an account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Job {
    pub id: u64,
    pub title: String,
    pub account_id: String,
    pub created_at: SystemTime,
}

/// What produced a committed balance change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LedgerSource {
    Transaction { txn_id: u64 },
    ConditionalWrite,
}

/// Append-only record of one committed balance change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub seq: u64,
    pub account_id: String,
    pub previous: i64,
    pub current: i64,
    pub source: LedgerSource,
}

impl LedgerEntry {
    pub fn delta(&self) -> i64 {
        self.current - self.previous
    }
}

/// Error type for resource store operations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum StoreError {
    /// A table lock was poisoned during the named operation.
    Poisoned(&'static str),
    /// The transaction outlived its deadline; the store rolled it back.
    TransactionTimeout { txn_id: u64 },
    /// Commit found state it cannot apply over (row vanished, lease lost).
    WriteConflict { account_id: String, reason: String },
    /// The referenced account does not exist.
    NotFound { account_id: String },
    /// A write would leave the balance negative.
    NegativeBalance { account_id: String, balance: i64 },
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreError::Poisoned(operation) => {
                write!(f, "store lock poisoned during {}", operation)
            }
            StoreError::TransactionTimeout { txn_id } => {
                write!(f, "transaction {} exceeded its deadline and was rolled back", txn_id)
            }
            StoreError::WriteConflict { account_id, reason } => {
                write!(f, "write conflict on account {}: {}", account_id, reason)
            }
            StoreError::NotFound { account_id } => write!(f, "account not found: {}", account_id),
            StoreError::NegativeBalance {
                account_id,
                balance,
            } => write!(
                f,
                "balance of account {} would become negative ({})",
                account_id, balance
            ),
        }
    }
}

impl std::error::Error for StoreError {}

pub use in_memory::{InMemoryStore, InMemoryTxn};
pub use resource_store::{ResourceStore, Transaction};
