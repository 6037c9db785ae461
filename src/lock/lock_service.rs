use std::time::Duration;

use async_trait::async_trait;
use tokio::time::Instant;

use super::LockError;

/// Proof of ownership of one or more named resources for a bounded duration.
///
/// The handle does not keep the lock alive: once `ttl` elapses the service may
/// grant the same resources to another caller even if this handle was never
/// released.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LockHandle {
    resources: Vec<String>,
    acquired_at: Instant,
    ttl: Duration,
    token: String,
}

impl LockHandle {
    pub fn new(resources: Vec<String>, acquired_at: Instant, ttl: Duration, token: String) -> Self {
        LockHandle {
            resources,
            acquired_at,
            ttl,
            token,
        }
    }

    pub fn resources(&self) -> &[String] {
        &self.resources
    }

    pub fn acquired_at(&self) -> Instant {
        self.acquired_at
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Opaque value the service uses to match a release to its grant.
    pub fn token(&self) -> &str {
        &self.token
    }

    pub fn expires_at(&self) -> Instant {
        self.acquired_at + self.ttl
    }

    pub fn is_expired(&self) -> bool {
        Instant::now() >= self.expires_at()
    }
}

/// Capability interface for an external mutual-exclusion service.
///
/// Implementations might front a Redlock quorum, etcd leases, or Postgres
/// advisory locks. The contract every implementation must honour:
///
/// - `acquire` is all-or-nothing over `resources` and makes a single attempt;
///   retrying is the caller's concern (see [`LockAcquirer`](super::LockAcquirer)).
/// - At most one unexpired handle exists per resource name at any instant.
/// - `release` is idempotent and succeeds after expiry or reclamation.
#[async_trait]
pub trait DistributedLockService: Send + Sync {
    /// Try once to take every resource in `resources` for `ttl`.
    async fn acquire(&self, resources: &[String], ttl: Duration) -> Result<LockHandle, LockError>;

    /// Give up the resources held by `handle`.
    async fn release(&self, handle: &LockHandle) -> Result<(), LockError>;
}
