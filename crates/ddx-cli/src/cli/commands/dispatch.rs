use super::super::args::*;

pub async fn dispatch(cli: Cli) -> anyhow::Result<i32> {
    let global = cli.global;
    match cli.cmd {
        Command::Import(args) => super::import::run(&global, args).await,
        Command::Run(args) => super::run::run(&global, args).await,
        Command::Create(args) => super::run::create(&global, args),
        Command::Start(args) => super::run::start(&global, args).await,
        Command::Cancel(args) => super::run::cancel(&global, args),
        Command::Status(args) => super::status::run(&global, args),
        Command::Report(args) => super::report::run(&global, args),
        Command::Runs(args) => super::status::list(&global, args),
    }
}
