//! Contention scenarios: compositions of guarded and optimistic runs with
//! controlled start times, run against a freshly reset account.

mod canonical;
mod driver;
mod report;

use std::time::Duration;

use serde::Serialize;

use crate::executor::JobRequest;

pub use canonical::canonical_scenarios;
pub use driver::ScenarioDriver;
pub use report::{ScenarioReport, StepOutcome, StepReport};

/// A single invocation inside a scenario.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Step {
    /// A guarded debit through the pessimistic executor.
    Job(JobRequest),
    /// An optimistic credit (positive) or debit (negative).
    Adjust { account_id: String, amount: i64 },
}

impl Step {
    pub fn label(&self) -> String {
        match self {
            Step::Job(request) => format!(
                "{} [{:?}, cost {}, work {:?}]",
                request.title, request.lock_mode, request.cost, request.work
            ),
            Step::Adjust { amount, .. } => format!("adjust {:+}", amount),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Schedule {
    /// Each step starts at its own offset from the scenario start, all in flight together.
    Concurrent,
    /// Each step starts after the previous one finished.
    Sequential,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScheduledStep {
    pub start_after: Duration,
    pub step: Step,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Scenario {
    pub name: String,
    pub description: String,
    pub account_id: String,
    pub initial_balance: i64,
    pub schedule: Schedule,
    pub steps: Vec<ScheduledStep>,
}

impl Scenario {
    pub fn new(
        name: impl Into<String>,
        account_id: impl Into<String>,
        initial_balance: i64,
    ) -> Self {
        Self {
            name: name.into(),
            description: String::new(),
            account_id: account_id.into(),
            initial_balance,
            schedule: Schedule::Concurrent,
            steps: Vec::new(),
        }
    }

    pub fn describe(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn sequential(mut self) -> Self {
        self.schedule = Schedule::Sequential;
        self
    }

    pub fn step(self, step: Step) -> Self {
        self.step_after(Duration::ZERO, step)
    }

    /// Add a step that starts `delay` after the scenario begins (concurrent
    /// schedule) or after the previous step finishes (sequential schedule).
    pub fn step_after(mut self, delay: Duration, step: Step) -> Self {
        self.steps.push(ScheduledStep {
            start_after: delay,
            step,
        });
        self
    }

    pub fn job(self, request: JobRequest) -> Self {
        self.step(Step::Job(request))
    }

    pub fn job_after(self, delay: Duration, request: JobRequest) -> Self {
        self.step_after(delay, Step::Job(request))
    }

    pub fn adjust(self, amount: i64) -> Self {
        let account_id = self.account_id.clone();
        self.step(Step::Adjust { account_id, amount })
    }
}
