//! ResourceStore - transactional storage for accounts and job records.

use std::time::Duration;

use async_trait::async_trait;
use tokio::time::Instant;

use super::{Account, Job, LedgerEntry, StoreError};

/// An open, bounded-duration transaction.
pub trait Transaction: Send {
    fn id(&self) -> u64;

    /// Instant after which the store aborts this transaction.
    fn deadline(&self) -> Instant;
}

/// Transactional record store with row-scoped pessimistic locking and
/// conditional writes.
///
/// Writes made through a transaction are invisible to others until
/// [`commit`](ResourceStore::commit). Row locks taken inside a transaction are
/// released on commit, rollback, drop, or when the store aborts the
/// transaction at its deadline.
#[async_trait]
pub trait ResourceStore: Send + Sync {
    type Txn: Transaction + 'static;

    /// Open a transaction the store will abort once `timeout` has elapsed.
    async fn begin_transaction(&self, timeout: Duration) -> Result<Self::Txn, StoreError>;

    /// Take the exclusive row lock on `account_id`, waiting for any other holder.
    ///
    /// Waiting is bounded only by the transaction's own deadline.
    async fn lock_row_for_update(
        &self,
        txn: &mut Self::Txn,
        account_id: &str,
    ) -> Result<(), StoreError>;

    /// Read the latest committed account, overlaid with this transaction's own writes.
    async fn read_account(
        &self,
        txn: &mut Self::Txn,
        account_id: &str,
    ) -> Result<Option<Account>, StoreError>;

    /// Stage a new balance. Takes the row lock implicitly, as an SQL `UPDATE` does.
    async fn update_balance(
        &self,
        txn: &mut Self::Txn,
        account_id: &str,
        new_balance: i64,
    ) -> Result<(), StoreError>;

    /// Stage a job record. Returns the id it will carry once committed.
    async fn insert_job(
        &self,
        txn: &mut Self::Txn,
        title: &str,
        account_id: &str,
    ) -> Result<u64, StoreError>;

    /// Apply every staged write atomically.
    ///
    /// Fails with [`StoreError::TransactionTimeout`] past the deadline or
    /// [`StoreError::WriteConflict`] when staged writes can no longer apply;
    /// either way nothing is written.
    async fn commit(&self, txn: Self::Txn) -> Result<(), StoreError>;

    /// Discard every staged write and release the transaction's row locks.
    async fn rollback(&self, txn: Self::Txn) -> Result<(), StoreError>;

    /// Autocommit snapshot read of the latest committed account.
    async fn get_account(&self, account_id: &str) -> Result<Option<Account>, StoreError>;

    /// Autocommit compare-and-swap on the balance. Returns the number of rows matched (0 or 1).
    async fn conditional_update_balance(
        &self,
        account_id: &str,
        expected_balance: i64,
        new_balance: i64,
    ) -> Result<u64, StoreError>;

    /// Create the account with `balance` if absent; otherwise leave it untouched.
    async fn upsert_account(&self, account_id: &str, balance: i64) -> Result<Account, StoreError>;

    /// Committed job records for `account_id`, oldest first.
    async fn jobs(&self, account_id: &str) -> Result<Vec<Job>, StoreError>;

    /// Committed balance changes for `account_id`, oldest first.
    async fn ledger(&self, account_id: &str) -> Result<Vec<LedgerEntry>, StoreError>;

    /// Remove every account, job, ledger entry and row lock.
    async fn reset(&self) -> Result<(), StoreError>;
}
