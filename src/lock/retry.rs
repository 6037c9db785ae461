use std::sync::{Arc, Mutex};
use std::time::Duration;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tokio::time::Instant;
use tracing::{debug, warn};

use super::{AcquisitionFailure, DistributedLockService, LockError, LockHandle};

/// Bounded, jittered fixed-delay retry settings for lock acquisition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first one.
    pub max_attempts: u32,
    /// Fixed pause between attempts.
    pub delay: Duration,
    /// Upper bound of the random extra pause added to `delay`.
    pub jitter: Duration,
    /// Lease length requested from the lock service on every attempt.
    pub ttl: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 10,
            delay: Duration::from_millis(200),
            jitter: Duration::from_millis(200),
            ttl: Duration::from_secs(5),
        }
    }
}

impl RetryPolicy {
    pub fn with_max_attempts(mut self, max: u32) -> Self {
        self.max_attempts = max;
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn with_jitter(mut self, jitter: Duration) -> Self {
        self.jitter = jitter;
        self
    }

    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }
}

/// Wraps a [`DistributedLockService`] with the retry policy, turning a series
/// of single attempts into one acquired-or-failed answer.
pub struct LockAcquirer<L: ?Sized> {
    service: Arc<L>,
    policy: RetryPolicy,
    rng: Mutex<StdRng>,
}

impl<L: DistributedLockService + ?Sized> LockAcquirer<L> {
    pub fn new(service: Arc<L>, policy: RetryPolicy) -> Self {
        LockAcquirer {
            service,
            policy,
            rng: Mutex::new(StdRng::from_entropy()),
        }
    }

    /// Seed the jitter source so retry timings are reproducible.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.rng = Mutex::new(StdRng::seed_from_u64(seed));
        self
    }

    pub fn service(&self) -> &Arc<L> {
        &self.service
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Acquire `resource`, retrying until the attempt budget or
    /// `overall_timeout` runs out, whichever comes first.
    pub async fn acquire(
        &self,
        resource: &str,
        overall_timeout: Duration,
    ) -> Result<LockHandle, AcquisitionFailure> {
        let started = Instant::now();
        let deadline = started + overall_timeout;
        let resources = [resource.to_string()];
        let max_attempts = self.policy.max_attempts.max(1);

        let mut attempts = 0;
        let mut cause = LockError::TimedOut;

        while attempts < max_attempts && Instant::now() < deadline {
            attempts += 1;
            let attempt = self.service.acquire(&resources, self.policy.ttl);
            match tokio::time::timeout_at(deadline, attempt).await {
                Ok(Ok(handle)) => {
                    debug!(resource, attempts, "distributed lock acquired");
                    return Ok(handle);
                }
                Ok(Err(err)) => {
                    debug!(resource, attempts, error = %err, "lock attempt failed");
                    let transient = err.is_transient();
                    cause = err;
                    if !transient {
                        break;
                    }
                }
                Err(_) => {
                    cause = LockError::TimedOut;
                    break;
                }
            }

            if attempts >= max_attempts {
                break;
            }
            let pause = self.next_pause();
            if Instant::now() + pause >= deadline {
                break;
            }
            tokio::time::sleep(pause).await;
        }

        let failure = AcquisitionFailure {
            resource: resource.to_string(),
            attempts,
            elapsed: started.elapsed(),
            cause,
        };
        warn!(resource, attempts, error = %failure.cause, "giving up on distributed lock");
        Err(failure)
    }

    /// Release through the underlying service. Releasing after expiry is a no-op.
    pub async fn release(&self, handle: &LockHandle) -> Result<(), LockError> {
        self.service.release(handle).await?;
        debug!(resources = ?handle.resources(), "distributed lock released");
        Ok(())
    }

    fn next_pause(&self) -> Duration {
        let jitter_ms = u64::try_from(self.policy.jitter.as_millis()).unwrap_or(u64::MAX);
        if jitter_ms == 0 {
            return self.policy.delay;
        }
        match self.rng.lock() {
            Ok(mut rng) => self.policy.delay + Duration::from_millis(rng.gen_range(0..=jitter_ms)),
            Err(_) => self.policy.delay,
        }
    }
}
