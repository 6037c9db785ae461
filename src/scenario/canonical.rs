use std::time::Duration;

use super::Scenario;
use crate::config::HarnessConfig;
use crate::executor::{JobRequest, LockMode};

/// The stock contention scenarios, parameterised by `config`.
///
/// In order: a lone caller, two callers racing under both locks, a
/// transaction that outlives its lock TTL, a locked caller racing an
/// unlocked one, and concurrent optimistic writers.
pub fn canonical_scenarios(config: &HarnessConfig) -> Vec<Scenario> {
    vec![
        single_caller(config),
        two_way_contention(config),
        slow_transaction_vs_ttl(config),
        mixed_lock_usage(config),
        optimistic_writers(config),
    ]
}

fn job(config: &HarnessConfig, title: &str, mode: LockMode, work: Duration) -> JobRequest {
    JobRequest::new(config.account_id.as_str(), title, config.job_cost)
        .with_lock_mode(mode)
        .with_work(work)
}

fn single_caller(config: &HarnessConfig) -> Scenario {
    Scenario::new("single-caller", config.account_id.as_str(), config.initial_balance)
        .describe("one caller takes the row lock, debits and commits")
        .sequential()
        .job(job(config, "solo", LockMode::RowOnly, config.work()))
}

fn two_way_contention(config: &HarnessConfig) -> Scenario {
    Scenario::new(
        "two-way-contention",
        config.account_id.as_str(),
        config.initial_balance,
    )
    .describe("two callers start together, both under the distributed and row locks")
    .job(job(config, "first", LockMode::Both, config.work()))
    .job(job(config, "second", LockMode::Both, config.work()))
}

fn slow_transaction_vs_ttl(config: &HarnessConfig) -> Scenario {
    // Start the second caller so its retry window straddles the first lock's expiry.
    let offset = config.lock_ttl().saturating_sub(config.lock_wait() / 2);
    Scenario::new(
        "slow-transaction-vs-ttl",
        config.account_id.as_str(),
        config.initial_balance,
    )
    .describe("slow work outlasts deadline and lock TTL; a second caller takes the expired lock")
    .job(job(config, "slow", LockMode::Both, config.slow_work()))
    .job_after(offset, job(config, "late", LockMode::Both, config.work()))
}

fn mixed_lock_usage(config: &HarnessConfig) -> Scenario {
    Scenario::new(
        "mixed-lock-usage",
        config.account_id.as_str(),
        config.initial_balance,
    )
    .describe("a row-locking caller races one that takes no lock at all")
    .job(job(config, "locked", LockMode::RowOnly, config.work()))
    .job_after(
        config.stagger(),
        job(config, "unlocked", LockMode::None, config.work()),
    )
}

fn optimistic_writers(config: &HarnessConfig) -> Scenario {
    let scenario = Scenario::new(
        "optimistic-writers",
        config.account_id.as_str(),
        config.initial_balance,
    )
    .describe("concurrent read then compare-and-swap writers without locks");
    config
        .optimistic_amounts
        .iter()
        .fold(scenario, |scenario, amount| scenario.adjust(*amount))
}
