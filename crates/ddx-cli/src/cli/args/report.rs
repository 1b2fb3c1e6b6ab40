use clap::{Parser, ValueEnum};
use std::path::PathBuf;

#[derive(ValueEnum, Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ReportFormat {
    #[default]
    Console,
    Json,
}

#[derive(Parser, Clone, Debug)]
pub struct ReportArgs {
    pub run_id: i64,

    #[arg(long, value_enum, default_value_t = ReportFormat::Console)]
    pub format: ReportFormat,

    /// Write the report to a file instead of stdout
    #[arg(long)]
    pub out: Option<PathBuf>,
}

#[derive(Parser, Clone, Debug)]
pub struct RunsArgs {
    #[arg(long, default_value_t = 20)]
    pub limit: u32,
}
