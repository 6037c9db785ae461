use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use rand::Rng;
use tokio::time::Instant;

use super::{DistributedLockService, LockError, LockHandle};

struct Lease {
    token: String,
    expires_at: Instant,
}

/// Single-process stand-in for a quorum lock service.
///
/// Leases live in a `HashMap<String, Lease>` keyed by resource name and expire
/// on the tokio clock, so paused-time tests can step over a TTL without
/// sleeping for real.
pub struct InMemoryLockService {
    leases: Mutex<HashMap<String, Lease>>,
    injected_failures: AtomicU32,
}

impl InMemoryLockService {
    pub fn new() -> Self {
        InMemoryLockService {
            leases: Mutex::new(HashMap::new()),
            injected_failures: AtomicU32::new(0),
        }
    }

    /// Make the next `attempts` calls to `acquire` fail as if quorum was not reached.
    pub fn fail_next(&self, attempts: u32) {
        self.injected_failures.store(attempts, Ordering::SeqCst);
    }

    /// Whether an unexpired lease exists for `resource`.
    pub fn is_held(&self, resource: &str) -> Result<bool, LockError> {
        let leases = self
            .leases
            .lock()
            .map_err(|_| LockError::Poisoned("is_held"))?;
        let now = Instant::now();
        Ok(leases
            .get(resource)
            .is_some_and(|lease| lease.expires_at > now))
    }

    fn take_injected_failure(&self) -> bool {
        self.injected_failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }
}

impl Default for InMemoryLockService {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DistributedLockService for InMemoryLockService {
    async fn acquire(&self, resources: &[String], ttl: Duration) -> Result<LockHandle, LockError> {
        if resources.is_empty() || resources.iter().any(|r| r.is_empty()) {
            return Err(LockError::Invalid("resource names must be non-empty".into()));
        }
        if self.take_injected_failure() {
            return Err(LockError::Unavailable("quorum not reached".into()));
        }

        let mut leases = self
            .leases
            .lock()
            .map_err(|_| LockError::Poisoned("acquire"))?;
        let now = Instant::now();

        if let Some(busy) = resources
            .iter()
            .find(|r| leases.get(r.as_str()).is_some_and(|l| l.expires_at > now))
        {
            return Err(LockError::Contended(busy.clone()));
        }

        let token = new_token();
        for resource in resources {
            leases.insert(
                resource.clone(),
                Lease {
                    token: token.clone(),
                    expires_at: now + ttl,
                },
            );
        }

        Ok(LockHandle::new(resources.to_vec(), now, ttl, token))
    }

    async fn release(&self, handle: &LockHandle) -> Result<(), LockError> {
        let mut leases = self
            .leases
            .lock()
            .map_err(|_| LockError::Poisoned("release"))?;
        for resource in handle.resources() {
            // A reclaimed resource belongs to someone else now.
            if leases
                .get(resource)
                .is_some_and(|lease| lease.token == handle.token())
            {
                leases.remove(resource);
            }
        }
        Ok(())
    }
}

fn new_token() -> String {
    let mut rng = rand::thread_rng();
    format!("{:016x}{:016x}", rng.gen::<u64>(), rng.gen::<u64>())
}
