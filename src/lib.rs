//! Concurrency-control harness for balance-bearing accounts.
//!
//! Jobs debit an account under a chosen [`LockMode`]: a distributed lock
//! taken through [`LockAcquirer`], a row lock held by the store transaction,
//! both, or neither. [`OptimisticUpdater`] offers the lock-free alternative
//! of read then compare-and-swap. [`ScenarioDriver`] runs compositions of
//! both against one account and reports whether any update was lost.
//!
//! ```no_run
//! use std::sync::Arc;
//! use account_guard::{
//!     GuardedExecutor, InMemoryLockService, InMemoryStore, JobRequest, LockAcquirer, LockMode,
//!     ResourceStore, RetryPolicy,
//! };
//!
//! # async fn run() -> Result<(), account_guard::StoreError> {
//! let store = Arc::new(InMemoryStore::new());
//! store.upsert_account("acc", 100).await?;
//!
//! let locks = LockAcquirer::new(Arc::new(InMemoryLockService::new()), RetryPolicy::default());
//! let executor = GuardedExecutor::new(Arc::clone(&store), locks);
//!
//! let request = JobRequest::new("acc", "render", 5).with_lock_mode(LockMode::Both);
//! assert!(executor.execute(&request).await.is_committed());
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod executor;
pub mod lock;
#[cfg(feature = "cli")]
pub mod logging;
pub mod scenario;
pub mod store;

pub use config::{ConfigError, HarnessConfig};
pub use executor::{
    AbortReason, AdjustOutcome, GuardedExecutor, JobRequest, LockMode, OptimisticUpdater,
    Outcome, Receipt, Rejection,
};
pub use lock::{
    AcquisitionFailure, DistributedLockService, InMemoryLockService, LockAcquirer, LockError,
    LockHandle, RetryPolicy,
};
pub use scenario::{canonical_scenarios, Scenario, ScenarioDriver, ScenarioReport, StepOutcome};
pub use store::{Account, InMemoryStore, Job, LedgerEntry, ResourceStore, StoreError};
