use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, warn};

use super::{AbortReason, AdjustOutcome, Rejection};
use crate::store::ResourceStore;

/// Adjusts a balance with a read followed by a compare-and-swap write.
///
/// No locks are taken. A write that matches zero rows lost a race; by default
/// that surfaces as [`AbortReason::StaleRead`] and nothing is retried.
pub struct OptimisticUpdater<S> {
    store: Arc<S>,
    think_time: Duration,
    max_retries: u32,
}

impl<S: ResourceStore> OptimisticUpdater<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self {
            store,
            think_time: Duration::ZERO,
            max_retries: 0,
        }
    }

    /// Pause between reading the balance and writing it back.
    pub fn with_think_time(mut self, think_time: Duration) -> Self {
        self.think_time = think_time;
        self
    }

    /// Re-read and retry after a lost race, up to `max` more times.
    pub fn with_max_retries(mut self, max: u32) -> Self {
        self.max_retries = max;
        self
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    /// Add `amount` (negative to debit) to the balance of `account_id`.
    pub async fn credit_or_debit(&self, account_id: &str, amount: i64) -> AdjustOutcome {
        let mut attempts = 0;
        loop {
            attempts += 1;

            let account = match self.store.get_account(account_id).await {
                Ok(Some(account)) => account,
                Ok(None) => {
                    return AdjustOutcome::Rejected(Rejection::NotFound {
                        account_id: account_id.to_string(),
                    })
                }
                Err(err) => return AdjustOutcome::Aborted(err.into()),
            };

            let Some(target) = account
                .balance
                .checked_add(amount)
                .filter(|balance| *balance >= 0)
            else {
                return AdjustOutcome::Rejected(Rejection::InsufficientBalance {
                    balance: account.balance,
                    cost: amount.unsigned_abs(),
                });
            };

            tokio::time::sleep(self.think_time).await;

            match self
                .store
                .conditional_update_balance(account_id, account.balance, target)
                .await
            {
                Ok(0) if attempts > self.max_retries => {
                    warn!(
                        account_id,
                        amount,
                        expected = account.balance,
                        "optimistic write lost the race"
                    );
                    return AdjustOutcome::Aborted(AbortReason::StaleRead {
                        account_id: account_id.to_string(),
                        expected: account.balance,
                    });
                }
                Ok(0) => {
                    debug!(account_id, amount, attempts, "stale read, retrying");
                }
                Ok(_) => {
                    info!(
                        account_id,
                        amount,
                        previous = account.balance,
                        current = target,
                        "balance adjusted"
                    );
                    return if attempts == 1 {
                        AdjustOutcome::Updated {
                            previous: account.balance,
                            current: target,
                        }
                    } else {
                        AdjustOutcome::Retried {
                            attempts,
                            previous: account.balance,
                            current: target,
                        }
                    };
                }
                Err(err) => return AdjustOutcome::Aborted(err.into()),
            }
        }
    }
}
