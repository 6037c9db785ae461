use serde::Serialize;

use crate::executor::{AdjustOutcome, Outcome};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "result", rename_all = "snake_case")]
pub enum StepOutcome {
    Job(Outcome),
    Adjust(AdjustOutcome),
    /// The task running the step panicked or was cancelled.
    Panicked(String),
}

impl StepOutcome {
    /// Balance change this step believes it applied.
    pub fn applied_delta(&self) -> Option<i64> {
        match self {
            StepOutcome::Job(outcome) => outcome
                .receipt()
                .map(|receipt| receipt.balance - receipt.previous_balance),
            StepOutcome::Adjust(outcome) => outcome.applied_delta(),
            StepOutcome::Panicked(_) => None,
        }
    }

    pub fn failure_kind(&self) -> Option<&'static str> {
        match self {
            StepOutcome::Job(outcome) => outcome.failure_kind(),
            StepOutcome::Adjust(outcome) => outcome.failure_kind(),
            StepOutcome::Panicked(_) => Some("panicked"),
        }
    }

    pub fn succeeded(&self) -> bool {
        self.applied_delta().is_some()
    }

    pub fn job(&self) -> Option<&Outcome> {
        match self {
            StepOutcome::Job(outcome) => Some(outcome),
            _ => None,
        }
    }

    pub fn adjust(&self) -> Option<&AdjustOutcome> {
        match self {
            StepOutcome::Adjust(outcome) => Some(outcome),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StepReport {
    pub index: usize,
    pub label: String,
    /// Milliseconds from scenario start.
    pub started_ms: u64,
    pub finished_ms: u64,
    pub outcome: StepOutcome,
}

/// Everything observable about one scenario run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScenarioReport {
    pub name: String,
    pub description: String,
    pub initial_balance: i64,
    /// Committed balance after every step finished; `None` if the account vanished.
    pub final_balance: Option<i64>,
    /// Balance had the successful steps been applied one after another.
    pub expected_balance: i64,
    pub job_count: usize,
    /// Net of every committed ledger entry.
    pub ledger_net: i64,
    pub steps: Vec<StepReport>,
}

impl ScenarioReport {
    /// Whether the final balance matches the sequential application of every
    /// step that reported success. `false` means an update was lost.
    pub fn is_consistent(&self) -> bool {
        self.final_balance == Some(self.expected_balance)
    }

    pub fn succeeded(&self) -> usize {
        self.steps.iter().filter(|s| s.outcome.succeeded()).count()
    }

    /// Failure labels in step order.
    pub fn failures(&self) -> Vec<&'static str> {
        self.steps
            .iter()
            .filter_map(|s| s.outcome.failure_kind())
            .collect()
    }
}
