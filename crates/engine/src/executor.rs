// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The operation executor: drives one plan to a terminal state.
//!
//! Each run proceeds in fixed phases (source resolution, path jailing,
//! cache lookup, throttling, lock-and-run) and then walks the step machine.
//! Every state mutation is persisted to the store and mirrored by exactly
//! one audit event, so the record is the latest-state truth and the log is
//! the reconstructable history.

use crate::command::synthesize;
use crate::config::EngineConfig;
use crate::exec::run_command;
use crate::lock::{LockError, WorkspaceLock};
use serde_json::{json, Value};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use tracing::{info, warn};
use wbab_core::{
    AuditEvent, Clock, EventType, ExecutionRecord, FailureKind, OpResult, OpStatus,
    OperationRecord, Outcome, OutcomeStatus, Plan, RequestContext, SourceSpec, SystemClock, Verb,
};
use wbab_scm::{sanitize_url, ProvisionedSource, SourceProvisioner};
use wbab_storage::{AuditError, AuditLog, OperationStore, StoreError};

const VALIDATE_STEP: &str = "validate_inputs";
const RECORD_STEP: &str = "record_result";

/// Infrastructure failures that surface to the caller as errors rather
/// than operation results.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("operation store error: {0}")]
    Store(#[from] StoreError),
    #[error("audit log error: {0}")]
    Audit(#[from] AuditError),
    #[error("workspace lock I/O error: {0}")]
    Lock(std::io::Error),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("unknown operation: {0}")]
    UnknownOperation(String),
    #[error("operation {0} is not running")]
    NotRunning(String),
}

/// Drives operations to completion exactly once per `op_id`.
///
/// Shared by all request workers; every method takes `&self` and the store
/// and audit log provide the cross-worker (and cross-process) safety.
pub struct Executor<C: Clock = SystemClock> {
    config: EngineConfig,
    store: Arc<OperationStore>,
    audit: Arc<AuditLog>,
    clock: C,
}

impl<C: Clock> Executor<C> {
    pub fn new(
        config: EngineConfig,
        store: Arc<OperationStore>,
        audit: Arc<AuditLog>,
        clock: C,
    ) -> Self {
        Self { config, store, audit, clock }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Run one plan to a terminal state and return the caller-facing
    /// outcome. Only store/audit I/O failures surface as `Err`.
    pub async fn run(&self, plan: Plan, ctx: &RequestContext) -> Result<Outcome, EngineError> {
        // Phase A: source resolution.
        let mut provisioned: Option<ProvisionedSource> = None;
        let effective_dir = match &plan.source {
            SourceSpec::Git { url, git_ref } => {
                let safe_url = sanitize_url(url);
                self.audit_plan(
                    ctx,
                    EventType::SourceFetch,
                    &plan,
                    "started",
                    "",
                    Some(json!({"url": safe_url, "ref": git_ref})),
                )?;
                let provisioner = SourceProvisioner::new(
                    self.config.sandbox_dir(),
                    self.config.git_timeout_secs,
                    self.config.allowed_hosts.clone(),
                );
                match provisioner.provision(url, git_ref).await {
                    Ok(source) => {
                        self.audit_plan(
                            ctx,
                            EventType::SourceFetch,
                            &plan,
                            "succeeded",
                            "",
                            Some(json!({"path": source.path().display().to_string()})),
                        )?;
                        let dir = rebase_into_checkout(source.path(), &plan.args);
                        provisioned = Some(source);
                        dir
                    }
                    Err(e) => {
                        self.audit_plan(
                            ctx,
                            EventType::SourceFetch,
                            &plan,
                            "failed",
                            "",
                            Some(json!({"error": e.to_string()})),
                        )?;
                        let kind = if e.is_security() {
                            FailureKind::SecurityPolicy
                        } else {
                            FailureKind::SourceFetch
                        };
                        return Ok(Outcome::failed(
                            &plan,
                            OpResult::failure(kind, "source_fetch", format!("Failed to fetch source: {e}")),
                        ));
                    }
                }
            }
            SourceSpec::Local => local_project_dir(&self.config.root_dir, &plan.args),
        };

        // Phase B: path jailing, before any further side effect.
        let project_dir = match jail_project_dir(&self.config.root_dir, &effective_dir) {
            Ok(dir) => dir,
            Err(message) => {
                return Ok(Outcome::failed(
                    &plan,
                    OpResult::failure(FailureKind::PathJailing, "path_jailing", message),
                ));
            }
        };

        // All later disk work uses the resolved absolute path as args[0].
        let mut runtime_plan = plan.clone();
        let resolved = project_dir.display().to_string();
        if runtime_plan.args.is_empty() {
            runtime_plan.args.push(resolved);
        } else {
            runtime_plan.args[0] = resolved;
        }

        // Phase C: cache lookup. Git sources never serve from cache.
        let existing = self.store.get(&plan.op_id)?;
        if let Some(record) = &existing {
            if record.status == OpStatus::Succeeded && !plan.source.is_git() {
                if outputs_present(plan.verb, &project_dir) {
                    self.audit_plan(ctx, EventType::OperationCached, &plan, "cached", "", None)?;
                    let result = record.result.clone().unwrap_or_default();
                    return Ok(Outcome::cached(&plan, result));
                }
                self.audit_plan(
                    ctx,
                    EventType::OperationCacheInvalidated,
                    &plan,
                    "running",
                    "",
                    Some(json!({"reason": "expected outputs missing from disk"})),
                )?;
            }
        }

        // Phase D: throttling, computed before taking the lock.
        if let Some(record) = &existing {
            let next_allowed = record.last_attempt_at.saturating_add(record.backoff_secs());
            let now = self.clock.epoch_secs();
            if now < next_allowed {
                let wait = next_allowed - now;
                return Ok(Outcome::failed(
                    &plan,
                    OpResult::throttled(format!("Retry throttled. Please wait {wait} seconds."), wait),
                ));
            }
        }

        // Phase E: lock and run.
        let lock = match WorkspaceLock::acquire(&project_dir) {
            Ok(guard) => guard,
            Err(LockError::Busy { path }) => {
                return Ok(Outcome::failed(
                    &plan,
                    OpResult::failure(
                        FailureKind::WorkspaceBusy,
                        "acquire_workspace_lock",
                        format!("Workspace is locked by another WBAB process: {}", path.display()),
                    ),
                ));
            }
            Err(LockError::Io(e)) => return Err(EngineError::Lock(e)),
        };

        let outcome = self.run_locked(&plan, &runtime_plan, existing, &project_dir, ctx).await;
        drop(lock);
        let outcome = outcome?;

        if plan.source.is_git() && outcome.status == OutcomeStatus::Succeeded {
            self.audit_plan(
                ctx,
                EventType::SourceArtifacts,
                &plan,
                "available",
                "",
                Some(json!({"location": project_dir.display().to_string()})),
            )?;
        }
        drop(provisioned);
        Ok(outcome)
    }

    /// The step machine, entered with the workspace lock held.
    async fn run_locked(
        &self,
        plan: &Plan,
        runtime_plan: &Plan,
        existing: Option<OperationRecord>,
        project_dir: &Path,
        ctx: &RequestContext,
    ) -> Result<Outcome, EngineError> {
        let now = self.clock.epoch_secs();
        let mut record = match existing {
            Some(mut record) => {
                record.absorb_plan(runtime_plan);
                record
            }
            None => OperationRecord::new(runtime_plan, now),
        };
        record.begin_attempt(now);
        self.store.upsert(&record.op_id, &record)?;
        self.audit_plan(
            ctx,
            EventType::OperationStarted,
            plan,
            "running",
            "",
            Some(json!({"attempt": record.attempts, "retry_count": record.retry_count})),
        )?;

        // validate_inputs: idempotent, skipped once succeeded.
        if !record.step_succeeded(VALIDATE_STEP) {
            self.begin_step(&mut record, VALIDATE_STEP, plan, ctx, None)?;
            // Validated against the submitted args, not the rewritten ones.
            if let Err(message) = validate_inputs(plan) {
                let result =
                    OpResult::failure(FailureKind::ValidationFailure, VALIDATE_STEP, message.as_str());
                return self.fail_step(record, plan, VALIDATE_STEP, result, &message, project_dir, ctx);
            }
            self.finish_step(&mut record, VALIDATE_STEP, plan, ctx, None)?;
        }

        // execute_<verb>: retried across submissions until it succeeds.
        let exec_step = plan.verb.exec_step();
        if !record.step_succeeded(&exec_step) {
            let argv = match synthesize(plan.verb, &runtime_plan.args, &self.config) {
                Ok(argv) => argv,
                Err(e) => {
                    self.begin_step(&mut record, &exec_step, plan, ctx, None)?;
                    let message = e.to_string();
                    let result = OpResult::failure(
                        FailureKind::ValidationFailure,
                        exec_step.as_str(),
                        message.as_str(),
                    );
                    return self.fail_step(record, plan, &exec_step, result, &message, project_dir, ctx);
                }
            };
            self.begin_step(&mut record, &exec_step, plan, ctx, Some(json!({"command": &argv})))?;

            let output =
                run_command(&argv, &self.config.root_dir, self.config.exec_timeout_secs).await;
            let execution = ExecutionRecord {
                exit_code: output.exit_code,
                stdout: output.output,
                command: argv,
            };
            record.execution = Some(execution.clone());

            if execution.exit_code != 0 {
                let message = format!("exit_code={}", execution.exit_code);
                let result =
                    OpResult::execution_failure(exec_step.as_str(), message.as_str(), &execution);
                return self.fail_step(record, plan, &exec_step, result, &message, project_dir, ctx);
            }
            self.finish_step(
                &mut record,
                &exec_step,
                plan,
                ctx,
                Some(json!({"exit_code": execution.exit_code})),
            )?;
        }

        // record_result: idempotent.
        if !record.step_succeeded(RECORD_STEP) {
            self.begin_step(&mut record, RECORD_STEP, plan, ctx, None)?;
            record.result = Some(OpResult::success(record.execution.as_ref()));
            self.finish_step(&mut record, RECORD_STEP, plan, ctx, None)?;
        }

        record.complete(self.clock.epoch_secs());
        self.store.upsert(&record.op_id, &record)?;
        let result = record.result.clone().unwrap_or_default();
        self.audit_plan(
            ctx,
            EventType::OperationSucceeded,
            plan,
            "succeeded",
            "",
            Some(result_details(&result)),
        )?;
        info!(op_id = %plan.op_id, verb = %plan.verb, "operation succeeded");
        Ok(Outcome::succeeded(plan, result))
    }

    /// Cancel a running operation: best-effort SIGTERM to the PID in its
    /// workspace lock, authoritative flip of the record to `failed`.
    pub fn cancel(&self, op_id: &str, ctx: &RequestContext) -> Result<Outcome, EngineError> {
        let mut record = self
            .store
            .get(op_id)?
            .ok_or_else(|| EngineError::UnknownOperation(op_id.to_string()))?;
        if record.status != OpStatus::Running {
            return Err(EngineError::NotRunning(op_id.to_string()));
        }

        let project_dir = record
            .args
            .first()
            .map(PathBuf::from)
            .unwrap_or_else(|| self.config.root_dir.clone());

        let (error, details) = if WorkspaceLock::lock_path(&project_dir).exists() {
            match WorkspaceLock::read_pid(&project_dir) {
                Some(pid) => {
                    signal_terminate(pid);
                    ("Cancelled by user".to_string(), json!({"signal": "SIGTERM", "pid": pid}))
                }
                None => (
                    "Cancelled by user".to_string(),
                    json!({"note": "no PID readable from workspace lock"}),
                ),
            }
        } else {
            (
                "Cancelled by user (no workspace lock found)".to_string(),
                json!({"note": "no workspace lock found"}),
            )
        };

        let result = OpResult::failure(FailureKind::Cancelled, "cancel", error.as_str());
        record.fail(self.clock.epoch_secs(), result.clone());
        self.store.upsert(op_id, &record)?;
        self.audit.emit(
            AuditEvent::of(EventType::OperationCancelled)
                .op_id(op_id)
                .verb(record.verb.as_str())
                .status("failed")
                .step("cancel")
                .details(details),
            ctx,
        )?;
        info!(op_id, "operation cancelled");

        Ok(Outcome {
            status: OutcomeStatus::Failed,
            op_id: op_id.to_string(),
            verb: record.verb,
            result,
        })
    }

    fn begin_step(
        &self,
        record: &mut OperationRecord,
        step: &str,
        plan: &Plan,
        ctx: &RequestContext,
        extra: Option<Value>,
    ) -> Result<(), EngineError> {
        record.mark_step_running(step, self.clock.epoch_secs());
        self.store.upsert(&record.op_id, record)?;
        let mut details = json!({
            "step_attempt": record.step(step).map(|s| s.attempts).unwrap_or(0),
        });
        if let (Some(obj), Some(Value::Object(extra))) = (details.as_object_mut(), extra) {
            obj.extend(extra);
        }
        self.audit_plan(ctx, EventType::StepStarted, plan, "running", step, Some(details))
    }

    fn finish_step(
        &self,
        record: &mut OperationRecord,
        step: &str,
        plan: &Plan,
        ctx: &RequestContext,
        details: Option<Value>,
    ) -> Result<(), EngineError> {
        record.mark_step_succeeded(step, self.clock.epoch_secs());
        self.store.upsert(&record.op_id, record)?;
        self.audit_plan(ctx, EventType::StepSucceeded, plan, "succeeded", step, details)
    }

    /// Fail the step and the operation, audit both, and roll back verb
    /// outputs when the verb step is the one that failed.
    #[allow(clippy::too_many_arguments)]
    fn fail_step(
        &self,
        mut record: OperationRecord,
        plan: &Plan,
        step: &str,
        result: OpResult,
        error: &str,
        project_dir: &Path,
        ctx: &RequestContext,
    ) -> Result<Outcome, EngineError> {
        let now = self.clock.epoch_secs();
        record.mark_step_failed(step, now, error);
        record.fail(now, result.clone());
        self.store.upsert(&record.op_id, &record)?;
        self.audit_plan(ctx, EventType::StepFailed, plan, "failed", step, Some(json!({"error": error})))?;
        self.audit_plan(ctx, EventType::OperationFailed, plan, "failed", step, Some(result_details(&result)))?;
        if step == plan.verb.exec_step() {
            self.rollback_outputs(plan, project_dir, ctx)?;
        }
        Ok(Outcome::failed(plan, result))
    }

    /// Remove whatever output directories the failed verb left behind.
    fn rollback_outputs(
        &self,
        plan: &Plan,
        project_dir: &Path,
        ctx: &RequestContext,
    ) -> Result<(), EngineError> {
        for name in ["out", "dist"] {
            let path = project_dir.join(name);
            if !path.is_dir() {
                continue;
            }
            match std::fs::remove_dir_all(&path) {
                Ok(()) => {
                    self.audit_plan(
                        ctx,
                        EventType::SystemRollback,
                        plan,
                        "",
                        "",
                        Some(json!({"path": path.display().to_string()})),
                    )?;
                }
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "failed to roll back output dir");
                }
            }
        }
        Ok(())
    }

    fn audit_plan(
        &self,
        ctx: &RequestContext,
        event_type: EventType,
        plan: &Plan,
        status: &str,
        step: &str,
        details: Option<Value>,
    ) -> Result<(), EngineError> {
        let mut event = AuditEvent::of(event_type)
            .op_id(plan.op_id.as_str())
            .verb(plan.verb.as_str())
            .status(status)
            .step(step);
        if let Some(details) = details {
            event = event.details(details);
        }
        self.audit.emit(event, ctx)?;
        Ok(())
    }
}

/// `smoke` needs the installer path; everything else validates trivially.
fn validate_inputs(plan: &Plan) -> Result<(), String> {
    if plan.verb == Verb::Smoke && plan.args.is_empty() {
        return Err("smoke requires installer path argument".to_string());
    }
    Ok(())
}

/// Expected outputs for the verb are all present on disk right now.
fn outputs_present(verb: Verb, project_dir: &Path) -> bool {
    verb.output_dirs().iter().all(|dir| project_dir.join(dir).exists())
}

fn local_project_dir(root: &Path, args: &[String]) -> PathBuf {
    match args.first().map(String::as_str) {
        None | Some("") | Some(".") => root.to_path_buf(),
        Some(arg) => root.join(arg),
    }
}

/// Join `args[0]` under the checkout, stripping only a leading `/`.
/// Leading dots are preserved: `.config` is a valid subdirectory.
fn rebase_into_checkout(checkout: &Path, args: &[String]) -> PathBuf {
    match args.first().map(String::as_str) {
        None | Some("") | Some(".") => checkout.to_path_buf(),
        Some(arg) => checkout.join(arg.trim_start_matches('/')),
    }
}

/// Canonicalize and confine the effective directory to the project root.
fn jail_project_dir(root: &Path, dir: &Path) -> Result<PathBuf, String> {
    let root = root
        .canonicalize()
        .map_err(|e| format!("project root {} cannot be resolved: {e}", root.display()))?;
    let resolved = dir
        .canonicalize()
        .map_err(|e| format!("project directory {} cannot be resolved: {e}", dir.display()))?;
    if !resolved.starts_with(&root) {
        return Err(format!(
            "project directory {} escapes the project root {}",
            resolved.display(),
            root.display()
        ));
    }
    Ok(resolved)
}

fn result_details(result: &OpResult) -> Value {
    serde_json::to_value(result).unwrap_or_else(|_| json!({}))
}

#[cfg(unix)]
fn signal_terminate(pid: u32) {
    use nix::sys::signal::{kill, Signal};
    use nix::unistd::Pid;
    if let Err(e) = kill(Pid::from_raw(pid as i32), Signal::SIGTERM) {
        warn!(pid, error = %e, "failed to deliver SIGTERM to lock holder");
    }
}

#[cfg(not(unix))]
fn signal_terminate(_pid: u32) {}

#[cfg(test)]
#[path = "executor_tests/mod.rs"]
mod tests;
