// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Persisted operation records and the per-step state machine.

use crate::plan::{Plan, SourceSpec};
use crate::verb::Verb;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Longest backoff the throttle will ever impose, in seconds.
pub const MAX_BACKOFF_SECS: u64 = 300;

/// Lifecycle status of an operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OpStatus {
    Running,
    Succeeded,
    Failed,
}

impl OpStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, OpStatus::Succeeded | OpStatus::Failed)
    }
}

crate::str_enum! {
    OpStatus {
        Running => "running",
        Succeeded => "succeeded",
        Failed => "failed",
    }
}

/// Status of a single step within an operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    Pending,
    Running,
    Succeeded,
    Failed,
}

crate::str_enum! {
    StepStatus {
        Pending => "pending",
        Running => "running",
        Succeeded => "succeeded",
        Failed => "failed",
    }
}

/// Persisted state of one step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepState {
    pub status: StepStatus,
    pub attempts: u32,
    pub started_at: Option<u64>,
    pub finished_at: Option<u64>,
    pub last_error: Option<String>,
}

impl Default for StepState {
    fn default() -> Self {
        Self {
            status: StepStatus::Pending,
            attempts: 0,
            started_at: None,
            finished_at: None,
            last_error: None,
        }
    }
}

/// Captured output of the most recent verb execution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionRecord {
    pub exit_code: i32,
    /// Merged stdout+stderr of the child process.
    pub stdout: String,
    pub command: Vec<String>,
}

/// The distinct failure kinds surfaced through operation results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    UnsupportedVerb,
    ValidationFailure,
    WorkspaceBusy,
    PathJailing,
    SecurityPolicy,
    SourceFetch,
    VerbExecution,
    Cancelled,
    StaleLockRecovery,
    Throttled,
}

crate::str_enum! {
    FailureKind {
        UnsupportedVerb => "unsupported_verb",
        ValidationFailure => "validation_failure",
        WorkspaceBusy => "workspace_busy",
        PathJailing => "path_jailing",
        SecurityPolicy => "security_policy",
        SourceFetch => "source_fetch",
        VerbExecution => "verb_execution",
        Cancelled => "cancelled",
        StaleLockRecovery => "stale_lock_recovery",
        Throttled => "throttled",
    }
}

/// Terminal summary of an operation, success or failure.
///
/// Absent fields are omitted from the serialized form so a cached replay is
/// bit-equal to the original result.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OpResult {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<FailureKind>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub step: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exit_code: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stdout: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub command: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retry_after_secs: Option<u64>,
}

impl OpResult {
    /// Successful completion: the execution payload, nothing else.
    pub fn success(execution: Option<&ExecutionRecord>) -> Self {
        Self {
            exit_code: Some(execution.map(|e| e.exit_code).unwrap_or(0)),
            stdout: Some(execution.map(|e| e.stdout.clone()).unwrap_or_default()),
            command: Some(execution.map(|e| e.command.clone()).unwrap_or_default()),
            ..Self::default()
        }
    }

    pub fn failure(kind: FailureKind, step: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            kind: Some(kind),
            error: Some(error.into()),
            step: Some(step.into()),
            ..Self::default()
        }
    }

    /// Verb-execution failure: failure fields plus the execution payload.
    pub fn execution_failure(
        step: impl Into<String>,
        error: impl Into<String>,
        execution: &ExecutionRecord,
    ) -> Self {
        Self {
            kind: Some(FailureKind::VerbExecution),
            error: Some(error.into()),
            step: Some(step.into()),
            exit_code: Some(execution.exit_code),
            stdout: Some(execution.stdout.clone()),
            command: Some(execution.command.clone()),
            retry_after_secs: None,
        }
    }

    pub fn throttled(error: impl Into<String>, retry_after_secs: u64) -> Self {
        Self {
            kind: Some(FailureKind::Throttled),
            error: Some(error.into()),
            step: Some("throttling_check".to_string()),
            retry_after_secs: Some(retry_after_secs),
            ..Self::default()
        }
    }
}

/// The persisted, mutable state of one operation.
///
/// Created on first submission of an `op_id`, mutated only by the executor
/// (or the housekeeper during recovery), never deleted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperationRecord {
    pub op_id: String,
    pub verb: Verb,
    pub args: Vec<String>,
    #[serde(default)]
    pub source: SourceSpec,
    pub steps: Vec<String>,
    pub status: OpStatus,
    /// Wall-clock seconds at first observation.
    pub started_at: u64,
    pub finished_at: Option<u64>,
    #[serde(default)]
    pub last_attempt_at: u64,
    /// Cumulative run attempts across the record's lifetime.
    #[serde(default)]
    pub attempts: u32,
    /// Re-submissions of a record that already existed.
    #[serde(default)]
    pub retry_count: u32,
    #[serde(default)]
    pub step_state: HashMap<String, StepState>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub execution: Option<ExecutionRecord>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<OpResult>,
}

impl OperationRecord {
    /// Create a fresh record from a plan at first submission.
    pub fn new(plan: &Plan, now: u64) -> Self {
        Self {
            op_id: plan.op_id.clone(),
            verb: plan.verb,
            args: plan.args.clone(),
            source: plan.source.clone(),
            steps: plan.steps.clone(),
            status: OpStatus::Running,
            started_at: now,
            finished_at: None,
            last_attempt_at: now,
            attempts: 0,
            retry_count: 0,
            step_state: HashMap::new(),
            execution: None,
            result: None,
        }
    }

    /// Refresh identity fields from a re-submitted plan and count the retry.
    pub fn absorb_plan(&mut self, plan: &Plan) {
        self.verb = plan.verb;
        self.args = plan.args.clone();
        self.steps = plan.steps.clone();
        self.source = plan.source.clone();
        self.retry_count += 1;
    }

    /// Start a run attempt: back to `running`, bump the attempt counter.
    pub fn begin_attempt(&mut self, now: u64) {
        self.status = OpStatus::Running;
        self.last_attempt_at = now;
        self.attempts += 1;
        self.ensure_step_state();
    }

    /// Insert pending state for any step that has none yet.
    ///
    /// Existing entries are left untouched so a resumed retry still sees
    /// which steps already succeeded.
    pub fn ensure_step_state(&mut self) {
        for step in &self.steps {
            self.step_state.entry(step.clone()).or_default();
        }
    }

    pub fn step(&self, name: &str) -> Option<&StepState> {
        self.step_state.get(name)
    }

    pub fn step_succeeded(&self, name: &str) -> bool {
        self.step(name)
            .map(|s| s.status == StepStatus::Succeeded)
            .unwrap_or(false)
    }

    pub fn mark_step_running(&mut self, name: &str, now: u64) {
        let state = self.step_state.entry(name.to_string()).or_default();
        state.status = StepStatus::Running;
        state.attempts += 1;
        state.started_at = Some(now);
        state.last_error = None;
    }

    pub fn mark_step_succeeded(&mut self, name: &str, now: u64) {
        let state = self.step_state.entry(name.to_string()).or_default();
        state.status = StepStatus::Succeeded;
        state.finished_at = Some(now);
        state.last_error = None;
    }

    pub fn mark_step_failed(&mut self, name: &str, now: u64, error: impl Into<String>) {
        let state = self.step_state.entry(name.to_string()).or_default();
        state.status = StepStatus::Failed;
        state.finished_at = Some(now);
        state.last_error = Some(error.into());
    }

    /// Flip to terminal `failed` with the given result.
    pub fn fail(&mut self, now: u64, result: OpResult) {
        self.status = OpStatus::Failed;
        self.finished_at = Some(now);
        self.result = Some(result);
    }

    /// Flip to terminal `succeeded`.
    pub fn complete(&mut self, now: u64) {
        self.status = OpStatus::Succeeded;
        self.finished_at = Some(now);
    }

    /// Exponential backoff owed before the next attempt, in seconds.
    ///
    /// Zero until the record has more than one attempt, then
    /// `min(300, 2^attempts)`.
    pub fn backoff_secs(&self) -> u64 {
        if self.attempts <= 1 {
            return 0;
        }
        let exp = self.attempts.min(9);
        (1u64 << exp).min(MAX_BACKOFF_SECS)
    }
}

/// Test builder: a running doctor record with the knobs tests actually
/// turn (identity, workspace args, lifecycle status, attempt count).
#[cfg(any(test, feature = "test-support"))]
pub struct RecordBuilder {
    op_id: String,
    args: Vec<String>,
    status: OpStatus,
    attempts: u32,
}

#[cfg(any(test, feature = "test-support"))]
impl Default for RecordBuilder {
    fn default() -> Self {
        Self {
            op_id: "op-1".to_string(),
            args: Vec::new(),
            status: OpStatus::Running,
            attempts: 1,
        }
    }
}

#[cfg(any(test, feature = "test-support"))]
impl RecordBuilder {
    pub fn op_id(mut self, v: impl Into<String>) -> Self {
        self.op_id = v.into();
        self
    }

    pub fn args(mut self, v: Vec<String>) -> Self {
        self.args = v;
        self
    }

    pub fn status(mut self, v: OpStatus) -> Self {
        self.status = v;
        self
    }

    pub fn attempts(mut self, v: u32) -> Self {
        self.attempts = v;
        self
    }

    pub fn build(self) -> OperationRecord {
        OperationRecord {
            op_id: self.op_id,
            verb: Verb::Doctor,
            args: self.args,
            source: SourceSpec::Local,
            steps: vec![
                "validate_inputs".to_string(),
                "execute_doctor".to_string(),
                "record_result".to_string(),
            ],
            status: self.status,
            started_at: 1_000,
            finished_at: None,
            last_attempt_at: 1_000,
            attempts: self.attempts,
            retry_count: 0,
            step_state: HashMap::new(),
            execution: None,
            result: None,
        }
    }
}

#[cfg(any(test, feature = "test-support"))]
impl OperationRecord {
    /// Create a builder with test defaults.
    pub fn builder() -> RecordBuilder {
        RecordBuilder::default()
    }
}

/// Response status surfaced to the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutcomeStatus {
    Succeeded,
    Failed,
    Cached,
}

crate::str_enum! {
    OutcomeStatus {
        Succeeded => "succeeded",
        Failed => "failed",
        Cached => "cached",
    }
}

/// The core's response for one operation submission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Outcome {
    pub status: OutcomeStatus,
    pub op_id: String,
    pub verb: Verb,
    pub result: OpResult,
}

impl Outcome {
    pub fn succeeded(plan: &Plan, result: OpResult) -> Self {
        Self {
            status: OutcomeStatus::Succeeded,
            op_id: plan.op_id.clone(),
            verb: plan.verb,
            result,
        }
    }

    pub fn failed(plan: &Plan, result: OpResult) -> Self {
        Self {
            status: OutcomeStatus::Failed,
            op_id: plan.op_id.clone(),
            verb: plan.verb,
            result,
        }
    }

    pub fn cached(plan: &Plan, result: OpResult) -> Self {
        Self {
            status: OutcomeStatus::Cached,
            op_id: plan.op_id.clone(),
            verb: plan.verb,
            result,
        }
    }
}

#[cfg(test)]
#[path = "record_tests.rs"]
mod tests;
