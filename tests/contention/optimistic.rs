use std::sync::Arc;
use std::time::Duration;

use account_guard::store::LedgerSource;
use account_guard::{AbortReason, AdjustOutcome, LockMode, ResourceStore};

use crate::support::{job, Harness, ACCOUNT};

const THINK: Duration = Duration::from_millis(50);

#[tokio::test(start_paused = true)]
async fn concurrent_writers_apply_exactly_once() {
    let harness = Harness::new(100).await;
    let updater = Arc::new(harness.updater(THINK));

    let handles: Vec<_> = [10, 20, -5]
        .into_iter()
        .map(|amount| {
            let updater = Arc::clone(&updater);
            tokio::spawn(async move { updater.credit_or_debit(ACCOUNT, amount).await })
        })
        .collect();
    let mut outcomes = Vec::new();
    for handle in handles {
        outcomes.push(handle.await.unwrap());
    }

    let applied: Vec<i64> = outcomes.iter().filter_map(|o| o.applied_delta()).collect();
    assert_eq!(applied.len(), 1);
    assert_eq!(
        outcomes
            .iter()
            .filter(|o| o.failure_kind() == Some("stale-read"))
            .count(),
        2
    );
    assert_eq!(harness.balance().await, 100 + applied[0]);

    let ledger = harness.store.ledger(ACCOUNT).await.unwrap();
    assert_eq!(ledger.len(), 1);
    assert_eq!(ledger[0].delta(), applied[0]);
    assert_eq!(ledger[0].source, LedgerSource::ConditionalWrite);
}

#[tokio::test(start_paused = true)]
async fn retrying_writers_all_land() {
    let harness = Harness::new(100).await;
    let updater = Arc::new(harness.updater(THINK).with_max_retries(5));

    let handles: Vec<_> = [10, 20, -5]
        .into_iter()
        .map(|amount| {
            let updater = Arc::clone(&updater);
            tokio::spawn(async move { updater.credit_or_debit(ACCOUNT, amount).await })
        })
        .collect();
    let mut outcomes = Vec::new();
    for handle in handles {
        outcomes.push(handle.await.unwrap());
    }

    assert!(outcomes.iter().all(|o| o.applied_delta().is_some()));
    assert!(outcomes
        .iter()
        .any(|o| matches!(o, AdjustOutcome::Retried { .. })));
    assert_eq!(harness.balance().await, 125);
    assert_eq!(harness.store.ledger(ACCOUNT).await.unwrap().len(), 3);
}

#[tokio::test(start_paused = true)]
async fn optimistic_write_behind_a_row_lock_sees_the_commit_and_backs_off() {
    let harness = Harness::new(100).await;
    let guarded = {
        let executor = harness.executor.clone();
        let request = job("guarded", 5, LockMode::RowOnly, Duration::from_secs(1));
        tokio::spawn(async move { executor.execute(&request).await })
    };
    tokio::time::sleep(Duration::from_millis(10)).await;

    let adjust = harness.updater(THINK).credit_or_debit(ACCOUNT, 10).await;
    assert!(guarded.await.unwrap().is_committed());

    assert_eq!(
        adjust,
        AdjustOutcome::Aborted(AbortReason::StaleRead {
            account_id: ACCOUNT.to_string(),
            expected: 100,
        })
    );
    assert_eq!(harness.balance().await, 95);
}

#[tokio::test(start_paused = true)]
async fn overdraft_is_refused_before_writing() {
    let harness = Harness::new(100).await;
    let outcome = harness.updater(THINK).credit_or_debit(ACCOUNT, -101).await;
    assert_eq!(outcome.failure_kind(), Some("insufficient-balance"));
    assert!(harness.store.ledger(ACCOUNT).await.unwrap().is_empty());
}
