use std::time::Duration;

use account_guard::{LockMode, ResourceStore};

use crate::support::{job, Harness, ACCOUNT};

#[tokio::test(start_paused = true)]
async fn unlocked_callers_lose_an_update() {
    let harness = Harness::new(100).await;
    let spawn = |title: &'static str| {
        let executor = harness.executor.clone();
        let request = job(title, 5, LockMode::None, Duration::from_secs(1));
        tokio::spawn(async move { executor.execute(&request).await })
    };
    let first = spawn("first");
    let second = spawn("second");
    let first = first.await.unwrap();
    let second = second.await.unwrap();

    // Both read 100 before either wrote.
    assert!(first.is_committed() && second.is_committed());
    assert_eq!(first.receipt().unwrap().previous_balance, 100);
    assert_eq!(second.receipt().unwrap().previous_balance, 100);

    assert_eq!(harness.balance().await, 95);
    assert_eq!(harness.job_count().await, 2);

    let deltas: Vec<i64> = harness
        .store
        .ledger(ACCOUNT)
        .await
        .unwrap()
        .iter()
        .map(|entry| entry.delta())
        .collect();
    assert_eq!(deltas, vec![-5, 0]);
}

#[tokio::test(start_paused = true)]
async fn one_locked_caller_does_not_protect_against_an_unlocked_one() {
    let harness = Harness::new(100).await;
    let locked = {
        let executor = harness.executor.clone();
        let request = job("locked", 5, LockMode::RowOnly, Duration::from_secs(1));
        tokio::spawn(async move { executor.execute(&request).await })
    };
    tokio::time::sleep(Duration::from_millis(100)).await;

    let unlocked = harness
        .executor
        .execute(&job("unlocked", 5, LockMode::None, Duration::from_secs(1)))
        .await;
    let locked = locked.await.unwrap();

    assert!(locked.is_committed());
    assert!(unlocked.is_committed());
    assert_eq!(unlocked.receipt().unwrap().previous_balance, 100);
    assert_eq!(harness.balance().await, 95);
    assert_eq!(harness.job_count().await, 2);
}
