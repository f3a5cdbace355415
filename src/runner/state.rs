use serde::{Deserialize, Serialize};
use std::time::Instant;
use uuid::Uuid;

use crate::error::MacroError;
use crate::model::{Locator, Step, StepKind};

/// Replay executor status
///
/// `Idle` is initial; `Completed`, `Failed` and `Cancelled` are terminal.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ReplayStatus {
    Idle,
    Running,
    Completed,
    Failed,
    Cancelled,
}

impl ReplayStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ReplayStatus::Completed | ReplayStatus::Failed | ReplayStatus::Cancelled
        )
    }
}

/// Step execution status
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum StepStatus {
    Pending,
    Running,
    Passed,
    Failed { error: String },
    Skipped { reason: String },
}

impl StepStatus {
    pub fn is_skipped(&self) -> bool {
        matches!(self, StepStatus::Skipped { .. })
    }

    pub fn skip_reason(&self) -> Option<&str> {
        match self {
            StepStatus::Skipped { reason } => Some(reason),
            _ => None,
        }
    }
}

/// State for a single step of a replay
#[derive(Debug, Clone)]
pub struct StepState {
    pub sequence: usize,
    pub kind: StepKind,
    pub display: String,
    pub status: StepStatus,
    pub started_at: Option<Instant>,
    pub duration_ms: Option<u64>,
}

impl StepState {
    pub fn new(step: &Step) -> Self {
        Self {
            sequence: step.sequence,
            kind: step.kind,
            display: step.describe(),
            status: StepStatus::Pending,
            started_at: None,
            duration_ms: None,
        }
    }

    pub fn start(&mut self) {
        self.status = StepStatus::Running;
        self.started_at = Some(Instant::now());
    }

    pub fn pass(&mut self) {
        self.finish(StepStatus::Passed);
    }

    pub fn fail(&mut self, error: String) {
        self.finish(StepStatus::Failed { error });
    }

    pub fn skip(&mut self, reason: &str) {
        self.status = StepStatus::Skipped {
            reason: reason.to_string(),
        };
    }

    fn finish(&mut self, status: StepStatus) {
        self.status = status;
        if let Some(start) = self.started_at {
            self.duration_ms = Some(start.elapsed().as_millis() as u64);
        }
    }

    pub fn to_report(&self) -> StepStateReport {
        StepStateReport {
            sequence: self.sequence,
            kind: self.kind,
            display: self.display.clone(),
            status: self.status.clone(),
            duration_ms: self.duration_ms,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StepStateReport {
    pub sequence: usize,
    pub kind: StepKind,
    pub display: String,
    pub status: StepStatus,
    pub duration_ms: Option<u64>,
}

/// Why a replay stopped short
///
/// `step` is `None` when the run failed before its first step (navigation).
#[derive(Debug)]
pub struct ReplayFailure {
    pub step: Option<usize>,
    pub kind: Option<StepKind>,
    pub candidates: Vec<Locator>,
    pub error: MacroError,
}

impl ReplayFailure {
    pub fn at_step(step: &Step, error: MacroError) -> Self {
        Self {
            step: Some(step.sequence),
            kind: Some(step.kind),
            candidates: step.target.clone(),
            error,
        }
    }

    pub fn before_steps(error: MacroError) -> Self {
        Self {
            step: None,
            kind: None,
            candidates: Vec::new(),
            error,
        }
    }

    pub fn to_report(&self) -> ReplayFailureReport {
        ReplayFailureReport {
            step: self.step,
            kind: self.kind,
            candidates: self.candidates.clone(),
            error: self.error.to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReplayFailureReport {
    pub step: Option<usize>,
    pub kind: Option<StepKind>,
    pub candidates: Vec<Locator>,
    pub error: String,
}

/// State for one replay of a macro
#[derive(Debug)]
pub struct ReplayRun {
    pub macro_id: Uuid,
    pub macro_name: String,
    pub status: ReplayStatus,
    pub steps: Vec<StepState>,
    /// Steps dispatched successfully, in order
    pub completed: usize,
    pub failure: Option<ReplayFailure>,
    pub started_at: Option<Instant>,
    pub total_duration_ms: Option<u64>,
}

impl ReplayRun {
    pub fn new(macro_id: Uuid, macro_name: &str, steps: Vec<StepState>) -> Self {
        Self {
            macro_id,
            macro_name: macro_name.to_string(),
            status: ReplayStatus::Idle,
            steps,
            completed: 0,
            failure: None,
            started_at: None,
            total_duration_ms: None,
        }
    }

    pub fn start(&mut self) {
        self.status = ReplayStatus::Running;
        self.started_at = Some(Instant::now());
    }

    pub fn step_passed(&mut self, index: usize) {
        if let Some(step) = self.steps.get_mut(index) {
            step.pass();
        }
        self.completed += 1;
    }

    pub fn complete(&mut self) {
        self.finish(ReplayStatus::Completed);
    }

    pub fn fail(&mut self, failure: ReplayFailure) {
        if let Some(index) = failure.step {
            if let Some(step) = self.steps.iter_mut().find(|s| s.sequence == index) {
                step.fail(failure.error.to_string());
            }
        }
        self.skip_remaining("not executed after failure");
        self.failure = Some(failure);
        self.finish(ReplayStatus::Failed);
    }

    pub fn cancel(&mut self) {
        self.skip_remaining("replay cancelled");
        self.finish(ReplayStatus::Cancelled);
    }

    /// Sequence of the last step that completed, if any
    pub fn last_completed_step(&self) -> Option<usize> {
        self.completed.checked_sub(1)
    }

    fn skip_remaining(&mut self, reason: &str) {
        for step in &mut self.steps {
            if matches!(step.status, StepStatus::Pending) {
                step.skip(reason);
            }
        }
    }

    fn finish(&mut self, status: ReplayStatus) {
        self.status = status;
        if let Some(start) = self.started_at {
            self.total_duration_ms = Some(start.elapsed().as_millis() as u64);
        }
    }

    /// Serialize state for reporting
    pub fn to_report(&self) -> ReplayRunReport {
        ReplayRunReport {
            macro_id: self.macro_id,
            macro_name: self.macro_name.clone(),
            status: self.status,
            completed: self.completed,
            steps: self.steps.iter().map(|s| s.to_report()).collect(),
            failure: self.failure.as_ref().map(|f| f.to_report()),
            total_duration_ms: self.total_duration_ms,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReplayRunReport {
    pub macro_id: Uuid,
    pub macro_name: String,
    pub status: ReplayStatus,
    pub completed: usize,
    pub steps: Vec<StepStateReport>,
    pub failure: Option<ReplayFailureReport>,
    pub total_duration_ms: Option<u64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run_of(n: usize) -> ReplayRun {
        let steps = (0..n)
            .map(|i| {
                let mut step = Step::click(vec![Locator::Id(format!("b{i}"))]);
                step.sequence = i;
                StepState::new(&step)
            })
            .collect();
        ReplayRun::new(Uuid::new_v4(), "demo", steps)
    }

    #[test]
    fn test_failure_marks_rest_skipped() {
        let mut run = run_of(3);
        run.start();
        run.steps[0].start();
        run.step_passed(0);
        run.steps[1].start();
        let mut failing = Step::click(vec![Locator::Id("b1".into())]);
        failing.sequence = 1;
        run.fail(ReplayFailure::at_step(&failing, MacroError::ElementDisabled));

        assert_eq!(run.status, ReplayStatus::Failed);
        assert!(matches!(run.steps[1].status, StepStatus::Failed { .. }));
        assert!(matches!(run.steps[2].status, StepStatus::Skipped { .. }));
        assert_eq!(run.last_completed_step(), Some(0));
    }

    #[test]
    fn test_report_serializes() {
        let mut run = run_of(2);
        run.start();
        run.cancel();
        let report = serde_json::to_value(run.to_report()).unwrap();
        assert_eq!(report["status"], "cancelled");
        assert_eq!(report["completed"], 0);
        assert_eq!(report["steps"][1]["status"]["type"], "skipped");
        assert!(run.status.is_terminal());
    }
}
