//! Harness configuration.
//!
//! Every field has a default, so an empty JSON object is a valid config file.
//! Durations are given in milliseconds.

use std::fmt;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::lock::RetryPolicy;

/// Environment variable naming a JSON config file.
pub const CONFIG_ENV: &str = "ACCOUNT_GUARD_CONFIG";

#[derive(Debug)]
pub enum ConfigError {
    Io(std::io::Error),
    Parse(serde_json::Error),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Io(err) => write!(f, "cannot read config: {}", err),
            ConfigError::Parse(err) => write!(f, "invalid config: {}", err),
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::Io(err) => Some(err),
            ConfigError::Parse(err) => Some(err),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    pub max_attempts: u32,
    pub delay_ms: u64,
    pub jitter_ms: u64,
    /// Fixed seed for the jitter source; random when absent.
    pub seed: Option<u64>,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 10,
            delay_ms: 200,
            jitter_ms: 200,
            seed: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HarnessConfig {
    pub account_id: String,
    pub initial_balance: i64,
    pub job_cost: u64,
    /// Store-side deadline of every guarded transaction.
    pub txn_timeout_ms: u64,
    /// Overall budget for acquiring the distributed lock, retries included.
    pub lock_wait_ms: u64,
    pub lock_ttl_ms: u64,
    /// Simulated work of an ordinary job.
    pub work_ms: u64,
    /// Simulated work of the job meant to outlive its transaction.
    pub slow_work_ms: u64,
    /// Start offset of the second caller in staggered scenarios.
    pub stagger_ms: u64,
    /// Pause between read and conditional write in the optimistic scenario.
    pub think_time_ms: u64,
    pub optimistic_amounts: Vec<i64>,
    pub retry: RetryConfig,
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            account_id: "account-1".into(),
            initial_balance: 100,
            job_cost: 5,
            txn_timeout_ms: 5_000,
            lock_wait_ms: 2_000,
            lock_ttl_ms: 5_000,
            work_ms: 1_000,
            slow_work_ms: 6_000,
            stagger_ms: 100,
            think_time_ms: 50,
            optimistic_amounts: vec![10, 20, -5],
            retry: RetryConfig::default(),
        }
    }
}

impl HarnessConfig {
    /// Load from the file named by [`CONFIG_ENV`], or fall back to defaults.
    pub fn load() -> Result<Self, ConfigError> {
        match std::env::var_os(CONFIG_ENV) {
            Some(path) => Self::from_file(path),
            None => Ok(Self::default()),
        }
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(ConfigError::Io)?;
        Self::from_json(&raw)
    }

    pub fn from_json(raw: &str) -> Result<Self, ConfigError> {
        serde_json::from_str(raw).map_err(ConfigError::Parse)
    }

    pub fn with_account(mut self, id: impl Into<String>, balance: i64) -> Self {
        self.account_id = id.into();
        self.initial_balance = balance;
        self
    }

    pub fn with_txn_timeout(mut self, timeout: Duration) -> Self {
        self.txn_timeout_ms = millis(timeout);
        self
    }

    pub fn with_lock_ttl(mut self, ttl: Duration) -> Self {
        self.lock_ttl_ms = millis(ttl);
        self
    }

    pub fn with_retry_seed(mut self, seed: u64) -> Self {
        self.retry.seed = Some(seed);
        self
    }

    pub fn txn_timeout(&self) -> Duration {
        Duration::from_millis(self.txn_timeout_ms)
    }

    pub fn lock_wait(&self) -> Duration {
        Duration::from_millis(self.lock_wait_ms)
    }

    pub fn lock_ttl(&self) -> Duration {
        Duration::from_millis(self.lock_ttl_ms)
    }

    pub fn work(&self) -> Duration {
        Duration::from_millis(self.work_ms)
    }

    pub fn slow_work(&self) -> Duration {
        Duration::from_millis(self.slow_work_ms)
    }

    pub fn stagger(&self) -> Duration {
        Duration::from_millis(self.stagger_ms)
    }

    pub fn think_time(&self) -> Duration {
        Duration::from_millis(self.think_time_ms)
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::default()
            .with_max_attempts(self.retry.max_attempts)
            .with_delay(Duration::from_millis(self.retry.delay_ms))
            .with_jitter(Duration::from_millis(self.retry.jitter_ms))
            .with_ttl(self.lock_ttl())
    }
}

fn millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}
