//! InMemoryStore - HashMap-backed transactional store for the harness and tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, SystemTime};

use async_trait::async_trait;
use tokio::sync::Notify;
use tokio::time::Instant;
use tracing::debug;

use super::{Account, Job, LedgerEntry, LedgerSource, ResourceStore, StoreError, Transaction};

/// Exclusive hold on one account row, owned by a transaction.
///
/// A lease lapses at its owner's deadline: by then the store has aborted the
/// owner, so waiting transactions may take the row over.
struct RowLease {
    txn_id: u64,
    expires_at: Instant,
}

#[derive(Default)]
struct Tables {
    accounts: HashMap<String, Account>,
    jobs: Vec<Job>,
    ledger: Vec<LedgerEntry>,
    row_leases: HashMap<String, RowLease>,
}

impl Tables {
    /// Owner and expiry of the live lease on `account_id`, if any.
    fn lease_holder(&self, account_id: &str, now: Instant) -> Option<(u64, Instant)> {
        self.row_leases
            .get(account_id)
            .filter(|lease| lease.expires_at > now)
            .map(|lease| (lease.txn_id, lease.expires_at))
    }

    fn drop_leases(&mut self, txn_id: u64, rows: &[String]) {
        for row in rows {
            if self
                .row_leases
                .get(row)
                .is_some_and(|lease| lease.txn_id == txn_id)
            {
                self.row_leases.remove(row);
            }
        }
    }

    fn record_change(
        &mut self,
        account_id: &str,
        previous: i64,
        current: i64,
        source: LedgerSource,
    ) {
        let seq = self.ledger.len() as u64 + 1;
        self.ledger.push(LedgerEntry {
            seq,
            account_id: account_id.to_string(),
            previous,
            current,
            source,
        });
    }
}

struct Shared {
    tables: Mutex<Tables>,
    released: Notify,
    next_txn: AtomicU64,
    next_job: AtomicU64,
}

impl Shared {
    fn tables(&self, operation: &'static str) -> Result<MutexGuard<'_, Tables>, StoreError> {
        self.tables
            .lock()
            .map_err(|_| StoreError::Poisoned(operation))
    }

    fn release_rows(&self, txn_id: u64, rows: &[String]) {
        if rows.is_empty() {
            return;
        }
        if let Ok(mut tables) = self.tables.lock() {
            tables.drop_leases(txn_id, rows);
        }
        self.released.notify_waiters();
    }
}

/// Transaction handle for [`InMemoryStore`].
///
/// Dropping an unfinished handle releases its row locks, like a closed
/// connection would.
pub struct InMemoryTxn {
    id: u64,
    deadline: Instant,
    held_rows: Vec<String>,
    balance_writes: HashMap<String, i64>,
    pending_jobs: Vec<Job>,
    finished: bool,
    shared: Arc<Shared>,
}

impl InMemoryTxn {
    fn ensure_live(&self) -> Result<(), StoreError> {
        if Instant::now() >= self.deadline {
            Err(StoreError::TransactionTimeout { txn_id: self.id })
        } else {
            Ok(())
        }
    }
}

impl Transaction for InMemoryTxn {
    fn id(&self) -> u64 {
        self.id
    }

    fn deadline(&self) -> Instant {
        self.deadline
    }
}

impl Drop for InMemoryTxn {
    fn drop(&mut self) {
        if !self.finished {
            self.shared.release_rows(self.id, &self.held_rows);
        }
    }
}

/// In-memory resource store.
///
/// Reads are read-committed; writes stay private to their transaction until
/// commit. Clone-friendly via Arc: clones share the same tables.
#[derive(Clone)]
pub struct InMemoryStore {
    shared: Arc<Shared>,
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self {
            shared: Arc::new(Shared {
                tables: Mutex::new(Tables::default()),
                released: Notify::new(),
                next_txn: AtomicU64::new(1),
                next_job: AtomicU64::new(1),
            }),
        }
    }

    /// Wait until `account_id` is free of other transactions' leases, then take it.
    async fn acquire_row(&self, txn: &mut InMemoryTxn, account_id: &str) -> Result<(), StoreError> {
        loop {
            let (notified, wake_at) = {
                let mut tables = self.shared.tables("row lock")?;
                let now = Instant::now();
                txn.ensure_live()?;
                let held_before = txn.held_rows.iter().any(|row| row == account_id);

                match tables.lease_holder(account_id, now) {
                    Some((owner, _)) if owner == txn.id => return Ok(()),
                    // Whatever was read under the old lease may be stale now.
                    _ if held_before => {
                        return Err(StoreError::WriteConflict {
                            account_id: account_id.to_string(),
                            reason: "row lock lost".into(),
                        })
                    }
                    Some((_, expires_at)) => {
                        (self.shared.released.notified(), expires_at.min(txn.deadline))
                    }
                    None => {
                        tables.row_leases.insert(
                            account_id.to_string(),
                            RowLease {
                                txn_id: txn.id,
                                expires_at: txn.deadline,
                            },
                        );
                        txn.held_rows.push(account_id.to_string());
                        return Ok(());
                    }
                }
            };

            debug!(txn_id = txn.id, account_id, "waiting for row lock");
            tokio::select! {
                _ = notified => {}
                _ = tokio::time::sleep_until(wake_at) => {}
            }
        }
    }

    fn apply_commit(tables: &mut Tables, txn: &InMemoryTxn) -> Result<(), StoreError> {
        txn.ensure_live()?;

        for account_id in txn.balance_writes.keys() {
            if !tables.accounts.contains_key(account_id) {
                return Err(StoreError::WriteConflict {
                    account_id: account_id.clone(),
                    reason: "row no longer exists".into(),
                });
            }
            let owned = tables
                .row_leases
                .get(account_id)
                .is_some_and(|lease| lease.txn_id == txn.id);
            if !owned {
                return Err(StoreError::WriteConflict {
                    account_id: account_id.clone(),
                    reason: "row lock lost before commit".into(),
                });
            }
        }
        if let Some(job) = txn
            .pending_jobs
            .iter()
            .find(|job| !tables.accounts.contains_key(&job.account_id))
        {
            return Err(StoreError::WriteConflict {
                account_id: job.account_id.clone(),
                reason: "job references a missing account".into(),
            });
        }

        let now = SystemTime::now();
        for (account_id, &balance) in &txn.balance_writes {
            let previous = match tables.accounts.get_mut(account_id) {
                Some(account) => {
                    let previous = account.balance;
                    account.balance = balance;
                    account.updated_at = now;
                    previous
                }
                None => continue,
            };
            tables.record_change(
                account_id,
                previous,
                balance,
                LedgerSource::Transaction { txn_id: txn.id },
            );
        }
        tables.jobs.extend(txn.pending_jobs.iter().cloned());
        Ok(())
    }
}

#[async_trait]
impl ResourceStore for InMemoryStore {
    type Txn = InMemoryTxn;

    async fn begin_transaction(&self, timeout: Duration) -> Result<InMemoryTxn, StoreError> {
        let id = self.shared.next_txn.fetch_add(1, Ordering::Relaxed);
        debug!(txn_id = id, ?timeout, "transaction opened");
        Ok(InMemoryTxn {
            id,
            deadline: Instant::now() + timeout,
            held_rows: Vec::new(),
            balance_writes: HashMap::new(),
            pending_jobs: Vec::new(),
            finished: false,
            shared: Arc::clone(&self.shared),
        })
    }

    async fn lock_row_for_update(
        &self,
        txn: &mut InMemoryTxn,
        account_id: &str,
    ) -> Result<(), StoreError> {
        self.acquire_row(txn, account_id).await?;
        debug!(txn_id = txn.id, account_id, "row lock held");
        Ok(())
    }

    async fn read_account(
        &self,
        txn: &mut InMemoryTxn,
        account_id: &str,
    ) -> Result<Option<Account>, StoreError> {
        txn.ensure_live()?;
        let tables = self.shared.tables("read")?;
        Ok(tables.accounts.get(account_id).cloned().map(|mut account| {
            if let Some(&balance) = txn.balance_writes.get(account_id) {
                account.balance = balance;
            }
            account
        }))
    }

    async fn update_balance(
        &self,
        txn: &mut InMemoryTxn,
        account_id: &str,
        new_balance: i64,
    ) -> Result<(), StoreError> {
        if new_balance < 0 {
            return Err(StoreError::NegativeBalance {
                account_id: account_id.to_string(),
                balance: new_balance,
            });
        }
        self.acquire_row(txn, account_id).await?;
        txn.balance_writes.insert(account_id.to_string(), new_balance);
        Ok(())
    }

    async fn insert_job(
        &self,
        txn: &mut InMemoryTxn,
        title: &str,
        account_id: &str,
    ) -> Result<u64, StoreError> {
        txn.ensure_live()?;
        let exists = self.shared.tables("insert job")?.accounts.contains_key(account_id);
        if !exists {
            return Err(StoreError::NotFound {
                account_id: account_id.to_string(),
            });
        }
        let id = self.shared.next_job.fetch_add(1, Ordering::Relaxed);
        txn.pending_jobs.push(Job {
            id,
            title: title.to_string(),
            account_id: account_id.to_string(),
            created_at: SystemTime::now(),
        });
        Ok(id)
    }

    async fn commit(&self, mut txn: InMemoryTxn) -> Result<(), StoreError> {
        let result = {
            let mut tables = self.shared.tables("commit")?;
            let result = Self::apply_commit(&mut tables, &txn);
            tables.drop_leases(txn.id, &txn.held_rows);
            txn.finished = true;
            result
        };
        self.shared.released.notify_waiters();

        match &result {
            Ok(()) => debug!(txn_id = txn.id, "transaction committed"),
            Err(err) => debug!(txn_id = txn.id, error = %err, "commit rejected, rolled back"),
        }
        result
    }

    async fn rollback(&self, mut txn: InMemoryTxn) -> Result<(), StoreError> {
        {
            let mut tables = self.shared.tables("rollback")?;
            tables.drop_leases(txn.id, &txn.held_rows);
            txn.finished = true;
        }
        self.shared.released.notify_waiters();
        debug!(txn_id = txn.id, "transaction rolled back");
        Ok(())
    }

    async fn get_account(&self, account_id: &str) -> Result<Option<Account>, StoreError> {
        let tables = self.shared.tables("get account")?;
        Ok(tables.accounts.get(account_id).cloned())
    }

    async fn conditional_update_balance(
        &self,
        account_id: &str,
        expected_balance: i64,
        new_balance: i64,
    ) -> Result<u64, StoreError> {
        if new_balance < 0 {
            return Err(StoreError::NegativeBalance {
                account_id: account_id.to_string(),
                balance: new_balance,
            });
        }

        loop {
            let (notified, wake_at) = {
                let mut tables = self.shared.tables("conditional update")?;
                let now = Instant::now();

                let locked_until = tables
                    .lease_holder(account_id, now)
                    .map(|(_, expires_at)| expires_at);

                // A row locked by an open transaction blocks the statement.
                if let Some(expires_at) = locked_until {
                    (self.shared.released.notified(), expires_at)
                } else {
                    let matched = match tables.accounts.get_mut(account_id) {
                        Some(account) if account.balance == expected_balance => {
                            account.balance = new_balance;
                            account.updated_at = SystemTime::now();
                            true
                        }
                        _ => false,
                    };
                    if !matched {
                        return Ok(0);
                    }
                    tables.record_change(
                        account_id,
                        expected_balance,
                        new_balance,
                        LedgerSource::ConditionalWrite,
                    );
                    return Ok(1);
                }
            };

            tokio::select! {
                _ = notified => {}
                _ = tokio::time::sleep_until(wake_at) => {}
            }
        }
    }

    async fn upsert_account(&self, account_id: &str, balance: i64) -> Result<Account, StoreError> {
        let mut tables = self.shared.tables("upsert")?;
        let account = tables
            .accounts
            .entry(account_id.to_string())
            .or_insert_with(|| Account::new(account_id, balance));
        Ok(account.clone())
    }

    async fn jobs(&self, account_id: &str) -> Result<Vec<Job>, StoreError> {
        let tables = self.shared.tables("jobs")?;
        Ok(tables
            .jobs
            .iter()
            .filter(|job| job.account_id == account_id)
            .cloned()
            .collect())
    }

    async fn ledger(&self, account_id: &str) -> Result<Vec<LedgerEntry>, StoreError> {
        let tables = self.shared.tables("ledger")?;
        Ok(tables
            .ledger
            .iter()
            .filter(|entry| entry.account_id == account_id)
            .cloned()
            .collect())
    }

    async fn reset(&self) -> Result<(), StoreError> {
        {
            let mut tables = self.shared.tables("reset")?;
            *tables = Tables::default();
        }
        self.shared.released.notify_waiters();
        Ok(())
    }
}
