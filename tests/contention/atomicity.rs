use std::time::Duration;

use account_guard::{JobRequest, LockMode, Outcome, Rejection, ResourceStore};

use crate::support::{job, Harness, ACCOUNT};

#[tokio::test(start_paused = true)]
async fn insufficient_balance_writes_nothing_in_any_mode() {
    for mode in LockMode::ALL {
        let harness = Harness::new(3).await;
        let outcome = harness
            .executor
            .execute(&job("too-expensive", 5, mode, Duration::from_millis(500)))
            .await;

        assert_eq!(
            outcome,
            Outcome::Rejected(Rejection::InsufficientBalance { balance: 3, cost: 5 }),
            "{:?}",
            mode
        );
        assert_eq!(harness.balance().await, 3);
        assert_eq!(harness.job_count().await, 0);
        assert!(harness.store.ledger(ACCOUNT).await.unwrap().is_empty());
        assert!(!harness.lock_held());
    }
}

#[tokio::test(start_paused = true)]
async fn exact_balance_can_be_spent() {
    let harness = Harness::new(5).await;
    let outcome = harness
        .executor
        .execute(&job("last", 5, LockMode::Both, Duration::ZERO))
        .await;
    assert_eq!(outcome.receipt().map(|r| r.balance), Some(0));
    assert_eq!(harness.balance().await, 0);
}

#[tokio::test(start_paused = true)]
async fn second_caller_is_refused_once_the_first_drains_the_account() {
    let harness = Harness::new(5).await;
    let spawn = |title: &'static str| {
        let executor = harness.executor.clone();
        let request = job(title, 5, LockMode::Both, Duration::from_millis(300));
        tokio::spawn(async move { executor.execute(&request).await })
    };
    let first = spawn("first");
    let second = spawn("second");
    let outcomes = [first.await.unwrap(), second.await.unwrap()];

    assert_eq!(outcomes.iter().filter(|o| o.is_committed()).count(), 1);
    assert!(outcomes
        .iter()
        .any(|o| o.failure_kind() == Some("insufficient-balance")));
    assert_eq!(harness.balance().await, 0);
    assert_eq!(harness.job_count().await, 1);
}

#[tokio::test(start_paused = true)]
async fn missing_account_is_not_created() {
    let harness = Harness::new(100).await;
    let request = JobRequest::new("nobody", "job", 1).with_lock_mode(LockMode::RowOnly);
    let outcome = harness.executor.execute(&request).await;

    assert_eq!(outcome.failure_kind(), Some("not-found"));
    assert!(harness.store.get_account("nobody").await.unwrap().is_none());
    assert!(harness.store.jobs("nobody").await.unwrap().is_empty());
}
