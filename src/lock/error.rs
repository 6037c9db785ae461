use std::fmt;
use std::time::Duration;

use serde::Serialize;

/// Error type for a single lock-service call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum LockError {
    /// Another holder owns an unexpired lease on the named resource.
    Contended(String),
    /// The service could not reach agreement (quorum not reached, network error).
    Unavailable(String),
    /// The attempt did not finish before the caller's deadline.
    TimedOut,
    /// The underlying lock table was poisoned (a thread panicked while holding it).
    Poisoned(&'static str),
    /// The request itself was malformed (e.g. an empty resource name).
    Invalid(String),
}

impl fmt::Display for LockError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LockError::Contended(resource) => write!(f, "lock contended: {}", resource),
            LockError::Unavailable(msg) => write!(f, "lock service unavailable: {}", msg),
            LockError::TimedOut => write!(f, "lock attempt timed out"),
            LockError::Poisoned(operation) => {
                write!(f, "lock table poisoned during {}", operation)
            }
            LockError::Invalid(msg) => write!(f, "invalid lock request: {}", msg),
        }
    }
}

impl std::error::Error for LockError {}

impl LockError {
    /// Whether another attempt could plausibly succeed.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            LockError::Contended(_) | LockError::Unavailable(_) | LockError::TimedOut
        )
    }
}

/// Terminal result of the retry policy when no handle could be obtained.
///
/// Carries the last underlying cause so callers can tell contention apart
/// from an unreachable service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AcquisitionFailure {
    pub resource: String,
    pub attempts: u32,
    pub elapsed: Duration,
    pub cause: LockError,
}

impl fmt::Display for AcquisitionFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "could not acquire {} after {} attempt(s) in {:?}: {}",
            self.resource, self.attempts, self.elapsed, self.cause
        )
    }
}

impl std::error::Error for AcquisitionFailure {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.cause)
    }
}
