//! Shared wiring for the contention suite.

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use account_guard::{
    GuardedExecutor, InMemoryLockService, InMemoryStore, JobRequest, LockAcquirer, LockMode,
    OptimisticUpdater, ResourceStore, RetryPolicy, ScenarioDriver,
};

pub const ACCOUNT: &str = "acc-1";
pub const SEED: u64 = 7;

pub type Executor = GuardedExecutor<InMemoryStore, InMemoryLockService>;

/// One store and one lock service shared by every caller in a test.
pub struct Harness {
    pub store: Arc<InMemoryStore>,
    pub locks: Arc<InMemoryLockService>,
    pub executor: Arc<Executor>,
}

impl Harness {
    /// Stock timings: 5s transactions, 2s lock wait, 5s TTL, 200ms + up to 200ms retry pause.
    pub async fn new(balance: i64) -> Self {
        Self::with_policy(balance, RetryPolicy::default()).await
    }

    pub async fn with_policy(balance: i64, policy: RetryPolicy) -> Self {
        let store = Arc::new(InMemoryStore::new());
        store.upsert_account(ACCOUNT, balance).await.unwrap();
        let locks = Arc::new(InMemoryLockService::new());
        let acquirer = LockAcquirer::new(Arc::clone(&locks), policy).with_seed(SEED);
        let executor = GuardedExecutor::new(Arc::clone(&store), acquirer)
            .with_txn_timeout(Duration::from_secs(5))
            .with_lock_wait(Duration::from_secs(2));
        Harness {
            store,
            locks,
            executor: Arc::new(executor),
        }
    }

    pub fn updater(&self, think_time: Duration) -> OptimisticUpdater<InMemoryStore> {
        OptimisticUpdater::new(Arc::clone(&self.store)).with_think_time(think_time)
    }

    pub fn driver(
        &self,
        think_time: Duration,
    ) -> ScenarioDriver<InMemoryStore, InMemoryLockService> {
        ScenarioDriver::new(
            Arc::clone(&self.executor),
            Arc::new(self.updater(think_time)),
        )
    }

    pub async fn balance(&self) -> i64 {
        self.store.get_account(ACCOUNT).await.unwrap().unwrap().balance
    }

    pub async fn job_count(&self) -> usize {
        self.store.jobs(ACCOUNT).await.unwrap().len()
    }

    pub fn lock_held(&self) -> bool {
        self.locks
            .is_held(&account_guard::lock::account_lock_key(ACCOUNT))
            .unwrap()
    }
}

pub fn job(title: &str, cost: u64, mode: LockMode, work: Duration) -> JobRequest {
    JobRequest::new(ACCOUNT, title, cost)
        .with_lock_mode(mode)
        .with_work(work)
}
