use std::time::Duration;

use account_guard::{AbortReason, GuardedExecutor, LockAcquirer, LockMode, Outcome, RetryPolicy};
use tokio::time::Instant;

use crate::support::{job, Harness};

#[tokio::test(start_paused = true)]
async fn overlong_work_is_aborted_by_the_store() {
    for mode in LockMode::ALL {
        let harness = Harness::new(100).await;
        let started = Instant::now();
        let outcome = harness
            .executor
            .execute(&job("slow", 5, mode, Duration::from_secs(6)))
            .await;

        assert!(
            matches!(outcome, Outcome::Aborted(AbortReason::TransactionTimeout { .. })),
            "{:?}: {}",
            mode,
            outcome
        );
        // The store notices at the first statement after the work.
        assert_eq!(started.elapsed(), Duration::from_secs(6));
        assert_eq!(harness.balance().await, 100);
        assert_eq!(harness.job_count().await, 0);
        assert!(!harness.lock_held());
    }
}

#[tokio::test(start_paused = true)]
async fn lapsed_row_lock_is_taken_over_at_the_owner_deadline() {
    let harness = Harness::new(100).await;
    let slow = {
        let executor = harness.executor.clone();
        let request = job("slow", 5, LockMode::RowOnly, Duration::from_secs(6));
        tokio::spawn(async move { executor.execute(&request).await })
    };
    tokio::time::sleep(Duration::from_millis(100)).await;

    let started = Instant::now();
    let waiter = harness
        .executor
        .execute(&job("waiter", 5, LockMode::RowOnly, Duration::ZERO))
        .await;
    // Blocked from 0.1s until the slow transaction's deadline at 5s.
    assert_eq!(started.elapsed(), Duration::from_millis(4_900));
    assert_eq!(waiter.receipt().map(|r| r.previous_balance), Some(100));

    let slow = slow.await.unwrap();
    assert_eq!(slow.failure_kind(), Some("transaction-timeout"));
    assert_eq!(harness.balance().await, 95);
    assert_eq!(harness.job_count().await, 1);
}

#[tokio::test(start_paused = true)]
async fn waiter_times_out_if_its_own_deadline_comes_first() {
    let harness = Harness::new(100).await;
    let holder = {
        let executor = harness.executor.clone();
        let request = job("holder", 5, LockMode::RowOnly, Duration::from_secs(3));
        tokio::spawn(async move { executor.execute(&request).await })
    };
    tokio::time::sleep(Duration::from_millis(100)).await;

    let locks = LockAcquirer::new(harness.locks.clone(), RetryPolicy::default());
    let short = GuardedExecutor::new(harness.store.clone(), locks)
    .with_txn_timeout(Duration::from_secs(1));
    let waiter = short
        .execute(&job("impatient", 5, LockMode::RowOnly, Duration::ZERO))
        .await;

    assert_eq!(waiter.failure_kind(), Some("transaction-timeout"));
    assert!(holder.await.unwrap().is_committed());
    assert_eq!(harness.balance().await, 95);
}
