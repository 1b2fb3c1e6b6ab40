use ddx_core::fixtures::{import, load_fixtures};

use super::super::args::{GlobalArgs, ImportArgs};
use crate::exit_codes::SUCCESS;

pub async fn run(global: &GlobalArgs, args: ImportArgs) -> anyhow::Result<i32> {
    let fixtures = load_fixtures(&args.file)?;
    let (orch, _) = super::context::build_orchestrator(global, None)?;
    let summary = import(&orch, &fixtures).await?;

    for (diagnosis, err) in &summary.invalid_patterns {
        eprintln!("warning: diagnosis '{}': {}", diagnosis, err);
    }
    println!(
        "imported {} chats, {} groups, {} cases",
        summary.chats, summary.groups, summary.cases
    );
    Ok(SUCCESS)
}
