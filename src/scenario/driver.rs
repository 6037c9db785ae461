use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{error, info, warn};

use super::{Scenario, ScenarioReport, Schedule, Step, StepOutcome, StepReport};
use crate::executor::{GuardedExecutor, OptimisticUpdater};
use crate::lock::DistributedLockService;
use crate::store::{Account, ResourceStore, StoreError};

/// Runs scenarios against a shared store and lock service.
///
/// Both executors are injected; the driver owns nothing process-wide.
pub struct ScenarioDriver<S, L: ?Sized> {
    executor: Arc<GuardedExecutor<S, L>>,
    updater: Arc<OptimisticUpdater<S>>,
}

impl<S, L> ScenarioDriver<S, L>
where
    S: ResourceStore + 'static,
    L: DistributedLockService + ?Sized + 'static,
{
    pub fn new(executor: Arc<GuardedExecutor<S, L>>, updater: Arc<OptimisticUpdater<S>>) -> Self {
        Self { executor, updater }
    }

    pub fn executor(&self) -> &Arc<GuardedExecutor<S, L>> {
        &self.executor
    }

    pub fn store(&self) -> &Arc<S> {
        self.executor.store()
    }

    /// Wipe the store and seed one account.
    pub async fn prepare(&self, account_id: &str, balance: i64) -> Result<Account, StoreError> {
        let store = self.store();
        store.reset().await?;
        store.upsert_account(account_id, balance).await
    }

    pub async fn run(&self, scenario: &Scenario) -> Result<ScenarioReport, StoreError> {
        self.prepare(&scenario.account_id, scenario.initial_balance)
            .await?;
        info!(scenario = %scenario.name, "{}", scenario.description);

        let started = Instant::now();
        let steps = match scenario.schedule {
            Schedule::Sequential => self.run_sequential(scenario, started).await,
            Schedule::Concurrent => self.run_concurrent(scenario, started).await,
        };

        let store = self.store();
        let final_balance = store
            .get_account(&scenario.account_id)
            .await?
            .map(|account| account.balance);
        let job_count = store.jobs(&scenario.account_id).await?.len();
        let ledger_net = store
            .ledger(&scenario.account_id)
            .await?
            .iter()
            .map(|entry| entry.delta())
            .sum();
        let expected_balance = scenario.initial_balance
            + steps
                .iter()
                .filter_map(|s| s.outcome.applied_delta())
                .sum::<i64>();

        let report = ScenarioReport {
            name: scenario.name.clone(),
            description: scenario.description.clone(),
            initial_balance: scenario.initial_balance,
            final_balance,
            expected_balance,
            job_count,
            ledger_net,
            steps,
        };

        if report.is_consistent() {
            info!(
                scenario = %report.name,
                final_balance = ?report.final_balance,
                jobs = report.job_count,
                "scenario finished"
            );
        } else {
            warn!(
                scenario = %report.name,
                final_balance = ?report.final_balance,
                expected = report.expected_balance,
                "scenario finished with a lost update"
            );
        }
        Ok(report)
    }

    /// Run every scenario in turn. A scenario that cannot be set up or read
    /// back is logged and skipped; the rest still run.
    pub async fn run_all(&self, scenarios: &[Scenario]) -> Vec<ScenarioReport> {
        let mut reports = Vec::with_capacity(scenarios.len());
        for scenario in scenarios {
            match self.run(scenario).await {
                Ok(report) => reports.push(report),
                Err(err) => error!(scenario = %scenario.name, error = %err, "scenario failed"),
            }
        }
        reports
    }

    async fn run_sequential(&self, scenario: &Scenario, started: Instant) -> Vec<StepReport> {
        let mut reports = Vec::with_capacity(scenario.steps.len());
        for (index, scheduled) in scenario.steps.iter().enumerate() {
            tokio::time::sleep(scheduled.start_after).await;
            let began = Instant::now();
            let outcome = run_step(&*self.executor, &*self.updater, &scheduled.step).await;
            reports.push(StepReport {
                index,
                label: scheduled.step.label(),
                started_ms: millis_since(started, began),
                finished_ms: millis_since(started, Instant::now()),
                outcome,
            });
        }
        reports
    }

    async fn run_concurrent(&self, scenario: &Scenario, started: Instant) -> Vec<StepReport> {
        let handles: Vec<JoinHandle<(Instant, StepOutcome, Instant)>> = scenario
            .steps
            .iter()
            .map(|scheduled| {
                let executor = Arc::clone(&self.executor);
                let updater = Arc::clone(&self.updater);
                let step = scheduled.step.clone();
                let start_at = started + scheduled.start_after;
                tokio::spawn(async move {
                    tokio::time::sleep_until(start_at).await;
                    let began = Instant::now();
                    let outcome = run_step(&*executor, &*updater, &step).await;
                    (began, outcome, Instant::now())
                })
            })
            .collect();

        let mut reports = Vec::with_capacity(handles.len());
        for (index, (scheduled, handle)) in scenario.steps.iter().zip(handles).enumerate() {
            let (began, outcome, finished) = match handle.await {
                Ok(result) => result,
                Err(err) => {
                    let now = Instant::now();
                    (now, StepOutcome::Panicked(err.to_string()), now)
                }
            };
            reports.push(StepReport {
                index,
                label: scheduled.step.label(),
                started_ms: millis_since(started, began),
                finished_ms: millis_since(started, finished),
                outcome,
            });
        }
        reports
    }
}

async fn run_step<S, L>(
    executor: &GuardedExecutor<S, L>,
    updater: &OptimisticUpdater<S>,
    step: &Step,
) -> StepOutcome
where
    S: ResourceStore,
    L: DistributedLockService + ?Sized,
{
    match step {
        Step::Job(request) => StepOutcome::Job(executor.execute(request).await),
        Step::Adjust { account_id, amount } => {
            StepOutcome::Adjust(updater.credit_or_debit(account_id, *amount).await)
        }
    }
}

fn millis_since(start: Instant, at: Instant) -> u64 {
    let elapsed: Duration = at.saturating_duration_since(start);
    u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX)
}
