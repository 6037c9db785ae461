use std::sync::Arc;
use std::time::Duration;

use tracing::{info, warn};

use super::{JobRequest, Outcome, Receipt, Rejection};
use crate::lock::{account_lock_key, DistributedLockService, LockAcquirer};
use crate::store::{ResourceStore, StoreError, Transaction};

/// Runs a job against an account under the locks its [`LockMode`](super::LockMode) asks for.
///
/// The protocol per run:
///
/// 1. take the distributed lock `locks:account:{id}` (distributed modes)
/// 2. open a transaction bounded by `txn_timeout`
/// 3. take the row lock (row modes)
/// 4. read the account and check the balance covers the cost
/// 5. do the work, debit, record the job, commit
///
/// The distributed lock is released on every path out of steps 2-5.
pub struct GuardedExecutor<S, L: ?Sized> {
    store: Arc<S>,
    locks: LockAcquirer<L>,
    txn_timeout: Duration,
    lock_wait: Duration,
}

impl<S, L> GuardedExecutor<S, L>
where
    S: ResourceStore,
    L: DistributedLockService + ?Sized,
{
    pub fn new(store: Arc<S>, locks: LockAcquirer<L>) -> Self {
        Self {
            store,
            locks,
            txn_timeout: Duration::from_secs(5),
            lock_wait: Duration::from_secs(2),
        }
    }

    /// Set the deadline after which the store aborts the transaction.
    pub fn with_txn_timeout(mut self, timeout: Duration) -> Self {
        self.txn_timeout = timeout;
        self
    }

    /// Set how long to keep retrying the distributed lock.
    pub fn with_lock_wait(mut self, wait: Duration) -> Self {
        self.lock_wait = wait;
        self
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    pub fn locks(&self) -> &LockAcquirer<L> {
        &self.locks
    }

    pub fn txn_timeout(&self) -> Duration {
        self.txn_timeout
    }

    pub async fn execute(&self, request: &JobRequest) -> Outcome {
        let handle = if request.lock_mode.uses_distributed_lock() {
            let key = account_lock_key(&request.account_id);
            match self.locks.acquire(&key, self.lock_wait).await {
                Ok(handle) => Some(handle),
                Err(failure) => {
                    let outcome = Outcome::Rejected(Rejection::LockUnavailable { failure });
                    report(request, &outcome);
                    return outcome;
                }
            }
        } else {
            None
        };

        let outcome = match self.run_transaction(request).await {
            Ok(receipt) => Outcome::Committed(receipt),
            Err(outcome) => outcome,
        };

        if let Some(handle) = handle {
            // Another caller may already hold the key; see DESIGN.md on TTL vs. transaction length.
            if handle.is_expired() {
                warn!(
                    account_id = %request.account_id,
                    ttl = ?handle.ttl(),
                    "distributed lock expired before the run finished"
                );
            }
            if let Err(err) = self.locks.release(&handle).await {
                warn!(account_id = %request.account_id, error = %err, "lock release failed");
            }
        }

        report(request, &outcome);
        outcome
    }

    async fn run_transaction(&self, request: &JobRequest) -> Result<Receipt, Outcome> {
        let mut txn = self
            .store
            .begin_transaction(self.txn_timeout)
            .await
            .map_err(abort)?;

        match self.debit(&mut txn, request).await {
            Ok(receipt) => {
                self.store.commit(txn).await.map_err(abort)?;
                Ok(receipt)
            }
            Err(outcome) => {
                if let Err(err) = self.store.rollback(txn).await {
                    warn!(account_id = %request.account_id, error = %err, "rollback failed");
                }
                Err(outcome)
            }
        }
    }

    async fn debit(&self, txn: &mut S::Txn, request: &JobRequest) -> Result<Receipt, Outcome> {
        let account_id = request.account_id.as_str();

        if request.lock_mode.uses_row_lock() {
            self.store
                .lock_row_for_update(txn, account_id)
                .await
                .map_err(abort)?;
        }

        let account = self
            .store
            .read_account(txn, account_id)
            .await
            .map_err(abort)?
            .ok_or_else(|| {
                Outcome::Rejected(Rejection::NotFound {
                    account_id: account_id.to_string(),
                })
            })?;

        let balance = i64::try_from(request.cost)
            .ok()
            .and_then(|cost| account.balance.checked_sub(cost))
            .filter(|balance| *balance >= 0)
            .ok_or_else(|| {
                Outcome::Rejected(Rejection::InsufficientBalance {
                    balance: account.balance,
                    cost: request.cost,
                })
            })?;

        tokio::time::sleep(request.work).await;

        self.store
            .update_balance(txn, account_id, balance)
            .await
            .map_err(abort)?;
        let job_id = self
            .store
            .insert_job(txn, &request.title, account_id)
            .await
            .map_err(abort)?;

        Ok(Receipt {
            txn_id: txn.id(),
            job_id,
            previous_balance: account.balance,
            balance,
        })
    }
}

fn abort(err: StoreError) -> Outcome {
    Outcome::Aborted(err.into())
}

fn report(request: &JobRequest, outcome: &Outcome) {
    match outcome.failure_kind() {
        None => info!(
            account_id = %request.account_id,
            title = %request.title,
            mode = ?request.lock_mode,
            %outcome,
            "job committed"
        ),
        Some(kind) => warn!(
            account_id = %request.account_id,
            title = %request.title,
            mode = ?request.lock_mode,
            kind,
            %outcome,
            "job failed"
        ),
    }
}
