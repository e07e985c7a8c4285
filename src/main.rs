use anyhow::{Context, Result};
use clap::Parser;
use std::time::Duration;

mod cli;
mod logging;
mod operation;
mod plan;
mod provision;
mod report;
mod roster;
mod runner;
mod sentinel;
mod session;

use cli::{CheckArgs, Command, PlanArgs, RootArgs, RunArgs};
use plan::{PlanInputs, ProvisionPlan, SessionPolicy};
use provision::RoutineProvisioner;
use runner::{FixedSettle, StageRunner};
use session::mumps::MumpsConnector;
use session::{Connector, Session};

fn main() -> Result<()> {
    let cli = RootArgs::parse();

    match cli.command {
        Command::Run(args) => cmd_run(args),
        Command::Plan(args) => cmd_plan(args),
        Command::Check(args) => cmd_check(args),
    }
}

fn cmd_run(args: RunArgs) -> Result<()> {
    logging::init_tracing(args.verbose)?;
    let plan = plan::provisioning_plan(&PlanInputs {
        patient_data: args.patient_data.clone(),
    })
    .context("build provisioning plan")?;
    let provisioner = RoutineProvisioner::new(args.routine.as_str())?;
    let connector = MumpsConnector::new(args.backend.backend_command.clone());
    let settle = FixedSettle(Duration::from_secs(args.settle_secs));

    let mut runner = StageRunner::new(connector, provisioner, settle, args.backend.log_file);
    tracing::info!(
        stages = plan.stages().len(),
        log = %runner.log_path().display(),
        "provisioning started"
    );
    let (outcome, report) = runner.run(&plan);
    tracing::info!(
        success = report.success,
        executed = report.executed().count(),
        duration_ms = report.duration_ms,
        "provisioning finished"
    );

    if let Some(path) = &args.report {
        // The outcome token is the contract; a missing report must not change it.
        if let Err(err) = report.write(path) {
            tracing::warn!(path = %path.display(), error = %format!("{err:#}"), "run report not written");
        }
    }

    for line in sentinel::stdout_lines(&outcome) {
        println!("{line}");
    }
    Ok(())
}

fn cmd_plan(args: PlanArgs) -> Result<()> {
    let plan = plan::provisioning_plan(&PlanInputs {
        patient_data: args.patient_data,
    })
    .context("build provisioning plan")?;

    if args.json {
        let text = serde_json::to_string_pretty(&plan)?;
        println!("{text}");
    } else {
        print!("{}", render_plan(&plan));
    }
    Ok(())
}

fn cmd_check(args: CheckArgs) -> Result<()> {
    logging::init_tracing(args.verbose)?;
    let mut connector = MumpsConnector::new(args.backend.backend_command);
    let session = connector
        .connect(&args.backend.log_file)
        .context("backend session could not be opened")?;
    println!(
        "backend ready: session {} (transcript: {})",
        session.id(),
        args.backend.log_file.display()
    );
    Ok(())
}

fn render_plan(plan: &ProvisionPlan) -> String {
    let mut out = String::new();
    for (index, stage) in plan.stages().iter().enumerate() {
        let session = match stage.session {
            SessionPolicy::Fresh => "fresh session",
            SessionPolicy::Reuse => "reuse session",
        };
        out.push_str(&format!(
            "{}. {} [{}, {}]\n",
            index + 1,
            stage.name,
            stage.phase,
            session
        ));
        for operation in &stage.operations {
            if operation.halts_session() {
                out.push_str(&format!("     {operation} (halts session)\n"));
            } else {
                out.push_str(&format!("     {operation}\n"));
            }
        }
    }
    out
}
