//! Stage definitions and the fixed provisioning sequence.
//!
//! A plan is validated once at construction so the runner can rely on its
//! shape: halting operations close their stage, and every stage after a halt
//! starts on a fresh session.
use crate::operation::{Clinic, Operation, Secret, SignatureSetup, UserAccount};
use crate::roster;
use serde::Serialize;
use std::collections::BTreeSet;
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

pub const DEFAULT_PATIENT_DATA: &str = "dataFiles/patdata0.csv";

/// Coarse run segment; each has its own failure sentinel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Connect,
    Users,
    Patients,
}

impl Phase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Phase::Connect => "connect",
            Phase::Users => "users",
            Phase::Patients => "patients",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionPolicy {
    /// Discard any current handle and connect before the stage runs.
    Fresh,
    /// Run on the handle left by the previous stage.
    Reuse,
}

#[derive(Debug, Clone, Serialize)]
pub struct Stage {
    pub name: String,
    pub phase: Phase,
    pub session: SessionPolicy,
    pub operations: Vec<Operation>,
}

impl Stage {
    pub fn new(name: impl Into<String>, phase: Phase, session: SessionPolicy) -> Self {
        Self {
            name: name.into(),
            phase,
            session,
            operations: Vec::new(),
        }
    }

    pub fn with(mut self, operation: Operation) -> Self {
        self.operations.push(operation);
        self
    }

    /// True when the stage's final operation leaves the session halted.
    pub fn halts_session(&self) -> bool {
        self.operations
            .last()
            .is_some_and(|operation| operation.halts_session())
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PlanError {
    #[error("plan has no stages")]
    Empty,
    #[error("first stage {0} must start on a fresh session")]
    FirstStageReuses(String),
    #[error("duplicate stage name {0}")]
    DuplicateStage(String),
    #[error("stage {stage} runs {operation} after a halting operation")]
    HaltNotLast { stage: String, operation: String },
    #[error("stage {stage} follows halting stage {previous} but reuses its session")]
    ReuseAfterHalt { stage: String, previous: String },
    #[error("stage {stage} ({phase}) is ordered after a {previous} stage")]
    PhaseOrder {
        stage: String,
        phase: Phase,
        previous: Phase,
    },
}

/// A statically ordered, validated list of stages.
#[derive(Debug, Clone, Serialize)]
pub struct ProvisionPlan {
    stages: Vec<Stage>,
}

impl ProvisionPlan {
    pub fn new(stages: Vec<Stage>) -> Result<Self, PlanError> {
        validate_stages(&stages)?;
        Ok(Self { stages })
    }

    pub fn stages(&self) -> &[Stage] {
        &self.stages
    }
}

fn validate_stages(stages: &[Stage]) -> Result<(), PlanError> {
    let first = stages.first().ok_or(PlanError::Empty)?;
    if first.session == SessionPolicy::Reuse {
        return Err(PlanError::FirstStageReuses(first.name.clone()));
    }

    let mut names = BTreeSet::new();
    let mut previous: Option<&Stage> = None;
    for stage in stages {
        if !names.insert(stage.name.as_str()) {
            return Err(PlanError::DuplicateStage(stage.name.clone()));
        }

        let mut halted = false;
        for operation in &stage.operations {
            if halted {
                return Err(PlanError::HaltNotLast {
                    stage: stage.name.clone(),
                    operation: operation.name().to_string(),
                });
            }
            halted = operation.halts_session();
        }

        if let Some(previous) = previous {
            if stage.phase < previous.phase {
                return Err(PlanError::PhaseOrder {
                    stage: stage.name.clone(),
                    phase: stage.phase,
                    previous: previous.phase,
                });
            }
            if previous.halts_session() && stage.session == SessionPolicy::Reuse {
                return Err(PlanError::ReuseAfterHalt {
                    stage: stage.name.clone(),
                    previous: previous.name.clone(),
                });
            }
        }
        previous = Some(stage);
    }
    Ok(())
}

/// Inputs the fixed provisioning sequence takes from the command line.
#[derive(Debug, Clone)]
pub struct PlanInputs {
    pub patient_data: PathBuf,
}

impl Default for PlanInputs {
    fn default() -> Self {
        Self {
            patient_data: PathBuf::from(DEFAULT_PATIENT_DATA),
        }
    }
}

/// Build the post-import provisioning sequence.
///
/// Accounts are created before permissions, permissions before signatures,
/// and signatures before patient registration. Clinic creation and each
/// signature handshake halt the backend, so each is the last operation of
/// its stage and the stage after it reconnects.
pub fn provisioning_plan(inputs: &PlanInputs) -> Result<ProvisionPlan, PlanError> {
    let mut users = Stage::new("users", Phase::Users, SessionPolicy::Reuse)
        .with(Operation::AddSystemManager)
        .with(Operation::SeedStrepTest)
        .with(Operation::SignOn {
            access: Secret::new(roster::SYSTEM_MANAGER_ACCESS),
            verify: Secret::new(roster::SYSTEM_MANAGER_VERIFY),
        });
    for account in roster::accounts() {
        users = users.with(Operation::AddUser(account));
    }
    let users = users
        .with(Operation::CreateOrderMenu)
        .with(Operation::GrantAllergiesPermission)
        .with(Operation::GrantTemplatePermission {
            initials: roster::TEMPLATE_EDITOR_INITIALS.to_string(),
        })
        .with(Operation::CreateClinic(Clinic {
            name: roster::CLINIC_NAME.to_string(),
            abbreviation: roster::CLINIC_ABBREVIATION.to_string(),
            kind: roster::CLINIC_KIND.to_string(),
        }));

    let mut stages = vec![
        Stage::new("connect", Phase::Connect, SessionPolicy::Fresh),
        users,
    ];
    for signer in roster::signers() {
        let stage = Stage::new(
            format!("{}-signature", signer.account.role.as_str()),
            Phase::Users,
            SessionPolicy::Fresh,
        )
        .with(Operation::SetupElectronicSignature(signature_setup(
            &signer.account,
            signer.new_verify,
            signer.signature,
        )));
        stages.push(stage);
    }
    stages.push(
        Stage::new("patients", Phase::Patients, SessionPolicy::Fresh).with(
            Operation::RegisterPatients {
                data_file: inputs.patient_data.clone(),
            },
        ),
    );

    ProvisionPlan::new(stages)
}

fn signature_setup(account: &UserAccount, new_verify: &str, signature: &str) -> SignatureSetup {
    SignatureSetup {
        access: account.access.clone(),
        verify: account.verify.clone(),
        new_verify: Secret::new(new_verify),
        signature: Secret::new(signature),
    }
}

#[cfg(test)]
#[path = "plan_tests.rs"]
mod tests;
