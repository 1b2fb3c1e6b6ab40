//! Run command arguments.

use clap::{Args, Parser};

#[derive(Args, Clone, Debug, Default)]
pub struct EngineArgs {
    /// Execute units on a worker pool instead of one after another
    #[arg(long)]
    pub worker: bool,

    /// Worker pool size, used with --worker
    #[arg(long, env = "DDX_PARALLEL")]
    pub parallel: Option<usize>,

    /// Upper bound on a single completion call
    #[arg(long, env = "DDX_TIMEOUT_SECONDS")]
    pub timeout_seconds: Option<u64>,

    /// What to do with a diagnosis whose pattern does not compile: skip|fail
    #[arg(long, value_parser = ["skip", "fail"])]
    pub pattern_errors: Option<String>,
}

#[derive(Parser, Clone, Debug)]
pub struct RunArgs {
    pub group: String,
    pub chat: String,

    #[command(flatten)]
    pub engine: EngineArgs,
}

#[derive(Parser, Clone, Debug)]
pub struct CreateArgs {
    pub group: String,
    pub chat: String,
}

#[derive(Parser, Clone, Debug)]
pub struct StartArgs {
    pub run_id: i64,

    #[command(flatten)]
    pub engine: EngineArgs,
}
