//! Outcome tokens read by the invoking shell.
//!
//! The shell compares the last line of stdout by string equality, so these
//! strings are fixed.
use crate::plan::Phase;
use crate::runner::RunOutcome;

pub const COMPLETE: &str = "PY Setup FileMan, User, Patient ... Complete OK";
pub const CANT_CONNECT: &str = "EXIT_PYS_CANT_CONNECT_TO_MUMPS";
pub const PROBLEM_SETTING_USERS: &str = "EXIT_PYS_PROBLEM_SETTING_USERS";
pub const CANT_SETUP_PATIENTS: &str = "EXIT_PYS_CANT_SETUP_PATIENTS";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Sentinel {
    Complete,
    CantConnect,
    UserSetupFailed,
    PatientSetupFailed,
}

impl Sentinel {
    pub fn for_outcome(outcome: &RunOutcome) -> Self {
        match outcome {
            RunOutcome::Success => Sentinel::Complete,
            RunOutcome::Failure(failure) => Self::for_phase(failure.phase),
        }
    }

    pub fn for_phase(phase: Phase) -> Self {
        match phase {
            Phase::Connect => Sentinel::CantConnect,
            Phase::Users => Sentinel::UserSetupFailed,
            Phase::Patients => Sentinel::PatientSetupFailed,
        }
    }

    pub fn token(&self) -> &'static str {
        match self {
            Sentinel::Complete => COMPLETE,
            Sentinel::CantConnect => CANT_CONNECT,
            Sentinel::UserSetupFailed => PROBLEM_SETTING_USERS,
            Sentinel::PatientSetupFailed => CANT_SETUP_PATIENTS,
        }
    }
}

/// Lines to print on stdout for an outcome; the token is always last.
pub fn stdout_lines(outcome: &RunOutcome) -> Vec<String> {
    let mut lines = Vec::new();
    if let RunOutcome::Failure(failure) = outcome {
        lines.push(format!("{}: {}", failure.stage, failure.cause.chain()));
    }
    lines.push(Sentinel::for_outcome(outcome).token().to_string());
    lines
}
