use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

pub mod report;
pub mod run;
pub use report::*;
pub use run::*;

#[derive(Parser)]
#[command(
    name = "ddx",
    version,
    about = "Evaluate how well chat configurations rank expected differential diagnoses"
)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalArgs,

    #[command(subcommand)]
    pub cmd: Command,
}

#[derive(Args, Clone, Debug)]
pub struct GlobalArgs {
    /// Config file (defaults to ./ddx.yaml when present)
    #[arg(long, global = true, env = "DDX_CONFIG")]
    pub config: Option<PathBuf>,

    /// SQLite database path
    #[arg(long, global = true, env = "DDX_DB")]
    pub db: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Command {
    /// Load chats, groups and test cases from a fixtures file
    Import(ImportArgs),
    /// Create a run for a group and chat and execute it
    Run(RunArgs),
    /// Create a run without starting it
    Create(CreateArgs),
    /// Start a previously created run
    Start(StartArgs),
    /// Cancel a run that has not finished
    Cancel(RunIdArgs),
    /// Show the status of a run
    Status(RunIdArgs),
    /// Show the results of a run
    Report(ReportArgs),
    /// List recent runs
    Runs(RunsArgs),
}

#[derive(Parser, Clone, Debug)]
pub struct ImportArgs {
    pub file: PathBuf,
}

#[derive(Parser, Clone, Debug)]
pub struct RunIdArgs {
    pub run_id: i64,
}
