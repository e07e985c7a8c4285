//! Staged orchestration with planned halt-and-reconnect.
//!
//! The runner owns the session handle and lends it to one stage at a time.
//! After a stage that ends in a halt-inducing operation the handle is dropped
//! on the spot; the next stage is guaranteed (by plan validation) to ask for
//! a fresh one, and the runner settles before connecting it. Any error ends
//! the run: it is recorded against the failing stage's phase and nothing
//! after it executes.
use crate::operation::Operation;
use crate::plan::{Phase, ProvisionPlan, SessionPolicy, Stage};
use crate::provision::Provisioner;
use crate::report::{RunReport, StageRecord, StageStatus};
use crate::session::{ConnectError, Connector, Session};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use thiserror::Error;

/// Waits for the backend to finish tearing down a halted session.
pub trait Settle {
    fn settle(&mut self, before_stage: &str);
}

/// Blocking fixed-duration settle.
#[derive(Debug, Clone, Copy)]
pub struct FixedSettle(pub Duration);

impl Settle for FixedSettle {
    fn settle(&mut self, before_stage: &str) {
        tracing::info!(
            stage = before_stage,
            delay_ms = self.0.as_millis() as u64,
            "settling before reconnect"
        );
        std::thread::sleep(self.0);
    }
}

#[derive(Debug, Error)]
pub enum StageError {
    #[error(transparent)]
    Connect(#[from] ConnectError),
    #[error("{operation} failed: {cause:#}")]
    Operation {
        operation: &'static str,
        cause: anyhow::Error,
    },
    #[error("stage {stage} has no live session")]
    NoSession { stage: String },
}

impl StageError {
    /// This error followed by each underlying cause, joined with `: `.
    pub fn chain(&self) -> String {
        let mut text = self.to_string();
        let mut source = std::error::Error::source(self);
        while let Some(cause) = source {
            text.push_str(": ");
            text.push_str(&cause.to_string());
            source = cause.source();
        }
        text
    }
}

#[derive(Debug)]
pub struct StageFailure {
    pub phase: Phase,
    pub stage: String,
    pub cause: StageError,
}

/// Terminal result of one provisioning run.
#[derive(Debug)]
pub enum RunOutcome {
    Success,
    Failure(StageFailure),
}

impl RunOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, RunOutcome::Success)
    }
}

pub struct StageRunner<C, P, T> {
    connector: C,
    provisioner: P,
    settle: T,
    log: PathBuf,
}

impl<C, P, T> StageRunner<C, P, T>
where
    C: Connector,
    P: Provisioner<C::Session>,
    T: Settle,
{
    pub fn new(connector: C, provisioner: P, settle: T, log: impl Into<PathBuf>) -> Self {
        Self {
            connector,
            provisioner,
            settle,
            log: log.into(),
        }
    }

    /// Execute every stage in order, stopping at the first failure.
    pub fn run(&mut self, plan: &ProvisionPlan) -> (RunOutcome, RunReport) {
        let started = Instant::now();
        let mut records = Vec::with_capacity(plan.stages().len());
        let mut session: Option<C::Session> = None;
        let mut previous_halted = false;
        let mut outcome = RunOutcome::Success;

        for stage in plan.stages() {
            if let RunOutcome::Failure(_) = outcome {
                records.push(StageRecord::not_run(stage));
                continue;
            }

            let stage_started = Instant::now();
            let _span = tracing::info_span!("stage", stage = %stage.name, phase = %stage.phase)
                .entered();
            tracing::info!(operations = stage.operations.len(), "stage started");

            let result = self.run_stage(stage, &mut session, previous_halted);
            let session_id = session.as_ref().map(Session::id);
            let elapsed_ms = stage_started.elapsed().as_millis() as u64;

            match result {
                Ok(()) => {
                    previous_halted = stage.halts_session();
                    if previous_halted {
                        // The backend has ended this session; never reuse it.
                        session = None;
                        tracing::info!(session = ?session_id, "session halted as planned");
                    }
                    tracing::info!(elapsed_ms, "stage completed");
                    records.push(StageRecord::finished(
                        stage,
                        StageStatus::Completed,
                        session_id,
                        elapsed_ms,
                        None,
                    ));
                }
                Err(cause) => {
                    tracing::error!(elapsed_ms, error = %cause.chain(), "stage failed");
                    records.push(StageRecord::finished(
                        stage,
                        StageStatus::Failed,
                        session_id,
                        elapsed_ms,
                        Some(cause.chain()),
                    ));
                    session = None;
                    outcome = RunOutcome::Failure(StageFailure {
                        phase: stage.phase,
                        stage: stage.name.clone(),
                        cause,
                    });
                }
            }
        }

        let report = RunReport::new(&outcome, records, started.elapsed());
        (outcome, report)
    }

    fn run_stage(
        &mut self,
        stage: &Stage,
        session: &mut Option<C::Session>,
        previous_halted: bool,
    ) -> Result<(), StageError> {
        if stage.session == SessionPolicy::Fresh {
            if previous_halted {
                self.settle.settle(&stage.name);
            }
            let previous = session.take().map(|handle| handle.id());
            let handle = self.connector.connect(&self.log)?;
            tracing::info!(
                session = %handle.id(),
                replaces = ?previous,
                "connected"
            );
            *session = Some(handle);
        }

        let handle = session.as_mut().ok_or_else(|| StageError::NoSession {
            stage: stage.name.clone(),
        })?;
        for operation in &stage.operations {
            self.perform(handle, operation)?;
        }
        Ok(())
    }

    fn perform(&mut self, handle: &mut C::Session, operation: &Operation) -> Result<(), StageError> {
        tracing::debug!(session = %handle.id(), operation = operation.name(), "operation started");
        self.provisioner
            .perform(handle, operation)
            .map_err(|cause| StageError::Operation {
                operation: operation.name(),
                cause,
            })
    }

    pub fn log_path(&self) -> &Path {
        &self.log
    }
}

#[cfg(test)]
#[path = "runner_tests.rs"]
mod tests;
