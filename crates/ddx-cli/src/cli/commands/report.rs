use ddx_core::report::{console, json, RunSummary};

use super::super::args::{GlobalArgs, ReportArgs, ReportFormat};
use crate::exit_codes::SUCCESS;

pub fn run(global: &GlobalArgs, args: ReportArgs) -> anyhow::Result<i32> {
    let store = super::context::open_store(global)?;
    let summary = RunSummary::from_store(&store, args.run_id)?;

    match (args.format, args.out) {
        (ReportFormat::Json, Some(path)) => json::write_json(&summary, &path)?,
        (ReportFormat::Json, None) => println!("{}", json::to_json(&summary)?),
        (ReportFormat::Console, Some(path)) => {
            std::fs::write(&path, console::format_summary(&summary))?
        }
        (ReportFormat::Console, None) => console::print_summary(&summary),
    }
    Ok(SUCCESS)
}
