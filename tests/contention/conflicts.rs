use std::time::Duration;

use account_guard::{AbortReason, LockMode, Outcome, ResourceStore};

use crate::support::{job, Harness, ACCOUNT};

/// Wipe and reseed the account halfway through a guarded run's work.
async fn reset_mid_run(mode: LockMode) -> (Harness, Outcome) {
    let harness = Harness::new(100).await;
    let run = {
        let executor = harness.executor.clone();
        let request = job("interrupted", 5, mode, Duration::from_secs(1));
        tokio::spawn(async move { executor.execute(&request).await })
    };

    tokio::time::sleep(Duration::from_millis(500)).await;
    harness.store.reset().await.unwrap();
    harness.store.upsert_account(ACCOUNT, 100).await.unwrap();

    let outcome = run.await.unwrap();
    (harness, outcome)
}

#[tokio::test(start_paused = true)]
async fn losing_the_row_lock_aborts_with_write_conflict() {
    for mode in [LockMode::RowOnly, LockMode::Both] {
        let (harness, outcome) = reset_mid_run(mode).await;

        assert_eq!(outcome.failure_kind(), Some("write-conflict"), "{:?}", mode);
        match &outcome {
            Outcome::Aborted(AbortReason::WriteConflict { account_id, .. }) => {
                assert_eq!(account_id, ACCOUNT)
            }
            other => panic!("expected write-conflict, got {}", other),
        }
        assert!(outcome.is_infrastructure());
        assert_eq!(harness.balance().await, 100);
        assert_eq!(harness.job_count().await, 0);
        assert!(!harness.lock_held());
    }
}

#[tokio::test(start_paused = true)]
async fn unlocked_run_never_held_the_row_so_it_commits() {
    let (harness, outcome) = reset_mid_run(LockMode::None).await;

    assert!(outcome.is_committed(), "{}", outcome);
    assert_eq!(harness.balance().await, 95);
}
