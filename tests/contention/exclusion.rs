use std::time::Duration;

use account_guard::{LockMode, Outcome};

use crate::support::{job, Harness};

async fn race(mode: LockMode) -> (Harness, Outcome, Outcome) {
    let harness = Harness::new(100).await;
    let spawn = |title: &'static str| {
        let executor = harness.executor.clone();
        let request = job(title, 5, mode, Duration::from_secs(1));
        tokio::spawn(async move { executor.execute(&request).await })
    };
    let first = spawn("first");
    let second = spawn("second");
    let first = first.await.unwrap();
    let second = second.await.unwrap();
    (harness, first, second)
}

async fn assert_serialized(mode: LockMode) {
    let (harness, first, second) = race(mode).await;
    assert!(first.is_committed(), "{:?}: {}", mode, first);
    assert!(second.is_committed(), "{:?}: {}", mode, second);

    let mut seen: Vec<i64> = [&first, &second]
        .iter()
        .map(|o| o.receipt().unwrap().previous_balance)
        .collect();
    seen.sort_unstable();
    assert_eq!(seen, vec![95, 100], "{:?}: each caller saw the other's commit", mode);

    assert_eq!(harness.balance().await, 90);
    assert_eq!(harness.job_count().await, 2);
}

#[tokio::test(start_paused = true)]
async fn both_locks_serialize_concurrent_jobs() {
    assert_serialized(LockMode::Both).await;
}

#[tokio::test(start_paused = true)]
async fn distributed_lock_alone_serializes_concurrent_jobs() {
    assert_serialized(LockMode::DistributedOnly).await;
}

#[tokio::test(start_paused = true)]
async fn row_lock_alone_serializes_concurrent_jobs() {
    assert_serialized(LockMode::RowOnly).await;
}

#[tokio::test(start_paused = true)]
async fn lock_wait_runs_out_behind_a_long_holder() {
    let harness = Harness::new(100).await;
    let holder = {
        let executor = harness.executor.clone();
        let request = job("long", 5, LockMode::DistributedOnly, Duration::from_secs(3));
        tokio::spawn(async move { executor.execute(&request).await })
    };
    tokio::time::sleep(Duration::from_millis(10)).await;

    let late = harness
        .executor
        .execute(&job("late", 5, LockMode::DistributedOnly, Duration::ZERO))
        .await;
    let holder = holder.await.unwrap();

    assert!(holder.is_committed());
    assert_eq!(late.failure_kind(), Some("lock-unavailable"));
    assert!(late.is_infrastructure());
    assert_eq!(harness.balance().await, 95);
    assert_eq!(harness.job_count().await, 1);
}
