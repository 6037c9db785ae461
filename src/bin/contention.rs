//! Runs the stock contention scenarios against in-memory backends and prints
//! a JSON summary to stdout.
//!
//! Usage: `contention [SCENARIO...]`. With no arguments every scenario runs.
//! Set `ACCOUNT_GUARD_CONFIG` to a JSON file to override the defaults and
//! `RUST_LOG` to change log verbosity.

use std::sync::Arc;

use account_guard::config::HarnessConfig;
use account_guard::executor::{GuardedExecutor, OptimisticUpdater};
use account_guard::lock::{InMemoryLockService, LockAcquirer};
use account_guard::logging;
use account_guard::scenario::{canonical_scenarios, ScenarioDriver};
use account_guard::store::InMemoryStore;
use tracing::{info, warn};

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    logging::init();
    let config = HarnessConfig::load()?;

    let store = Arc::new(InMemoryStore::new());
    let service = Arc::new(InMemoryLockService::new());
    let mut acquirer = LockAcquirer::new(service, config.retry_policy());
    if let Some(seed) = config.retry.seed {
        acquirer = acquirer.with_seed(seed);
    }

    let executor = GuardedExecutor::new(Arc::clone(&store), acquirer)
        .with_txn_timeout(config.txn_timeout())
        .with_lock_wait(config.lock_wait());
    let updater = OptimisticUpdater::new(store).with_think_time(config.think_time());
    let driver = ScenarioDriver::new(Arc::new(executor), Arc::new(updater));

    let wanted: Vec<String> = std::env::args().skip(1).collect();
    let scenarios: Vec<_> = canonical_scenarios(&config)
        .into_iter()
        .filter(|s| wanted.is_empty() || wanted.contains(&s.name))
        .collect();
    if scenarios.is_empty() {
        warn!(requested = ?wanted, "no matching scenario");
    }

    let reports = driver.run_all(&scenarios).await;
    let lost = reports.iter().filter(|r| !r.is_consistent()).count();
    info!(scenarios = reports.len(), lost_updates = lost, "all scenarios finished");

    println!("{}", serde_json::to_string_pretty(&reports)?);
    Ok(())
}
