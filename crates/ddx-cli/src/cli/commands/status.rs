use super::super::args::{GlobalArgs, RunIdArgs, RunsArgs};
use crate::exit_codes::SUCCESS;

pub fn run(global: &GlobalArgs, args: RunIdArgs) -> anyhow::Result<i32> {
    let store = super::context::open_store(global)?;
    let status = store.run_status(args.run_id)?;
    println!("{}", status);
    Ok(SUCCESS)
}

pub fn list(global: &GlobalArgs, args: RunsArgs) -> anyhow::Result<i32> {
    let store = super::context::open_store(global)?;
    for run in store.list_runs(args.limit)? {
        println!(
            "{}\t{}\t{}\t{}\t{}",
            run.id, run.status, run.group, run.chat, run.created_at
        );
    }
    Ok(SUCCESS)
}
