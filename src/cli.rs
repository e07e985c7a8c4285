//! CLI argument parsing for the provisioning run.
//!
//! There is no config file: every knob is a flag with a default that matches
//! the stock container layout.
use crate::plan::DEFAULT_PATIENT_DATA;
use crate::provision::DEFAULT_ROUTINE;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Session transcript location in the stock container image.
pub const DEFAULT_LOG_FILE: &str = "/home/nodevista/log/pySetupPU.txt";

/// Seconds to wait for the backend to tear down a halted session.
pub const DEFAULT_SETTLE_SECS: u64 = 10;

#[derive(Parser, Debug)]
#[command(
    name = "vprovision",
    version,
    about = "Provision users, clinic, signatures, and patients on a freshly imported VistA instance",
    after_help = "The last line of `run` output is one of:\n  PY Setup FileMan, User, Patient ... Complete OK\n  EXIT_PYS_CANT_CONNECT_TO_MUMPS\n  EXIT_PYS_PROBLEM_SETTING_USERS\n  EXIT_PYS_CANT_SETUP_PATIENTS\n\nExamples:\n  vprovision run\n  vprovision run --settle-secs 15 --report /tmp/provision.json\n  vprovision plan --json\n  vprovision check --backend-command 'ydb -dir'",
    subcommand_required = true,
    arg_required_else_help = true
)]
pub struct RootArgs {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    Run(RunArgs),
    Plan(PlanArgs),
    Check(CheckArgs),
}

/// Backend connection flags shared by `run` and `check`.
#[derive(clap::Args, Debug, Clone)]
pub struct BackendArgs {
    /// File receiving the backend session transcript
    #[arg(long, value_name = "PATH", default_value = DEFAULT_LOG_FILE)]
    pub log_file: PathBuf,

    /// Command starting a direct-mode session (default: $gtm_dist/mumps -direct)
    #[arg(long, value_name = "CMD")]
    pub backend_command: Option<String>,
}

#[derive(Parser, Debug)]
#[command(about = "Run every provisioning stage and print the outcome token")]
pub struct RunArgs {
    #[command(flatten)]
    pub backend: BackendArgs,

    /// Tabular patient data passed to patient registration
    #[arg(long, value_name = "PATH", default_value = DEFAULT_PATIENT_DATA)]
    pub patient_data: PathBuf,

    /// Seconds to wait after a halting operation before reconnecting
    #[arg(long, value_name = "SECS", default_value_t = DEFAULT_SETTLE_SECS)]
    pub settle_secs: u64,

    /// M routine holding the provisioning entry points
    #[arg(long, value_name = "NAME", default_value = DEFAULT_ROUTINE)]
    pub routine: String,

    /// Write a JSON run report
    #[arg(long, value_name = "PATH")]
    pub report: Option<PathBuf>,

    /// Emit debug diagnostics on stderr
    #[arg(long)]
    pub verbose: bool,
}

#[derive(Parser, Debug)]
#[command(about = "Print the stage sequence without connecting")]
pub struct PlanArgs {
    /// Tabular patient data passed to patient registration
    #[arg(long, value_name = "PATH", default_value = DEFAULT_PATIENT_DATA)]
    pub patient_data: PathBuf,

    /// Emit machine-readable JSON output
    #[arg(long)]
    pub json: bool,
}

#[derive(Parser, Debug)]
#[command(about = "Check that a backend session can be opened")]
pub struct CheckArgs {
    #[command(flatten)]
    pub backend: BackendArgs,

    /// Emit debug diagnostics on stderr
    #[arg(long)]
    pub verbose: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn run_defaults_match_container_layout() {
        let cli = RootArgs::try_parse_from(["vprovision", "run"]).expect("parse run");
        let Command::Run(args) = cli.command else {
            panic!("expected run subcommand");
        };
        assert_eq!(
            args.backend.log_file,
            PathBuf::from("/home/nodevista/log/pySetupPU.txt")
        );
        assert_eq!(args.settle_secs, DEFAULT_SETTLE_SECS);
        assert_eq!(args.routine, DEFAULT_ROUTINE);
        assert!(args.backend.backend_command.is_none());
    }
}
