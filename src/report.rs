//! Machine-readable record of a provisioning run.
use crate::plan::{Phase, Stage};
use crate::runner::RunOutcome;
use crate::session::SessionId;
use anyhow::{Context, Result};
use serde::Serialize;
use std::fs;
use std::path::Path;
use std::time::Duration;

pub const REPORT_SCHEMA_VERSION: u32 = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StageStatus {
    Completed,
    Failed,
    NotRun,
}

#[derive(Debug, Clone, Serialize)]
pub struct StageRecord {
    pub name: String,
    pub phase: Phase,
    pub status: StageStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session: Option<SessionId>,
    pub duration_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl StageRecord {
    pub fn finished(
        stage: &Stage,
        status: StageStatus,
        session: Option<SessionId>,
        duration_ms: u64,
        error: Option<String>,
    ) -> Self {
        Self {
            name: stage.name.clone(),
            phase: stage.phase,
            status,
            session,
            duration_ms,
            error,
        }
    }

    pub fn not_run(stage: &Stage) -> Self {
        Self::finished(stage, StageStatus::NotRun, None, 0, None)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub schema_version: u32,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failed_stage: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failed_phase: Option<Phase>,
    pub duration_ms: u64,
    pub stages: Vec<StageRecord>,
}

impl RunReport {
    pub fn new(outcome: &RunOutcome, stages: Vec<StageRecord>, elapsed: Duration) -> Self {
        let (failed_stage, failed_phase) = match outcome {
            RunOutcome::Success => (None, None),
            RunOutcome::Failure(failure) => (Some(failure.stage.clone()), Some(failure.phase)),
        };
        Self {
            schema_version: REPORT_SCHEMA_VERSION,
            success: outcome.is_success(),
            failed_stage,
            failed_phase,
            duration_ms: elapsed.as_millis() as u64,
            stages,
        }
    }

    /// Stages that actually ran (completed or failed), in order.
    pub fn executed(&self) -> impl Iterator<Item = &StageRecord> {
        self.stages
            .iter()
            .filter(|record| record.status != StageStatus::NotRun)
    }

    pub fn write(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
            fs::create_dir_all(parent).with_context(|| format!("create {}", parent.display()))?;
        }
        let text = serde_json::to_string_pretty(self).context("serialize run report")?;
        fs::write(path, text.as_bytes()).with_context(|| format!("write {}", path.display()))?;
        Ok(())
    }
}
