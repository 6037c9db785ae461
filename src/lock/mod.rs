//! Distributed locking: the lock-service capability and its retry policy.
//!
//! The quorum primitive itself is treated as a black box behind
//! [`DistributedLockService`]. [`InMemoryLockService`] is the single-process
//! stand-in used by the harness and its tests; a Redlock or etcd client can be
//! dropped in behind the same trait.

mod error;
mod in_memory;
mod lock_service;
mod retry;

pub use error::{AcquisitionFailure, LockError};
pub use in_memory::InMemoryLockService;
pub use lock_service::{DistributedLockService, LockHandle};
pub use retry::{LockAcquirer, RetryPolicy};

/// Lock key guarding an account's balance.
pub fn account_lock_key(account_id: &str) -> String {
    format!("locks:account:{}", account_id)
}
