use ddx_core::engine::{ExecutionMode, Orchestrator, RunReport};
use ddx_core::report::{console, RunSummary};

use super::super::args::{CreateArgs, GlobalArgs, RunArgs, RunIdArgs, StartArgs};
use crate::exit_codes::{self, SUCCESS};

pub async fn run(global: &GlobalArgs, args: RunArgs) -> anyhow::Result<i32> {
    let (orch, mode) = super::context::build_orchestrator(global, Some(&args.engine))?;
    let run_id = orch.create_run(&args.group, &args.chat)?;
    println!("run {} created", run_id);
    execute(&orch, run_id, mode).await
}

pub fn create(global: &GlobalArgs, args: CreateArgs) -> anyhow::Result<i32> {
    let (orch, _) = super::context::build_orchestrator(global, None)?;
    let run_id = orch.create_run(&args.group, &args.chat)?;
    println!("{}", run_id);
    Ok(SUCCESS)
}

pub async fn start(global: &GlobalArgs, args: StartArgs) -> anyhow::Result<i32> {
    let (orch, mode) = super::context::build_orchestrator(global, Some(&args.engine))?;
    execute(&orch, args.run_id, mode).await
}

pub fn cancel(global: &GlobalArgs, args: RunIdArgs) -> anyhow::Result<i32> {
    let (orch, _) = super::context::build_orchestrator(global, None)?;
    orch.cancel_run(args.run_id)?;
    println!("run {} cancelled", args.run_id);
    Ok(SUCCESS)
}

/// Worker-pool runs go through the background dispatch path and are awaited.
async fn execute(orch: &Orchestrator, run_id: i64, mode: ExecutionMode) -> anyhow::Result<i32> {
    let report = match mode {
        ExecutionMode::Sequential => orch.start_run(run_id, mode).await?,
        ExecutionMode::WorkerPool { .. } => orch.dispatch(run_id, mode).wait().await?,
    };
    print_report(orch, &report)?;
    Ok(exit_codes::for_status(report.status))
}

fn print_report(orch: &Orchestrator, report: &RunReport) -> anyhow::Result<()> {
    let summary = RunSummary::from_store(orch.store(), report.run_id)?;
    console::print_summary(&summary);
    if report.skipped_diagnoses > 0 {
        eprintln!(
            "warning: {} diagnoses skipped because their pattern did not compile",
            report.skipped_diagnoses
        );
    }
    Ok(())
}
