mod cli;
mod commands;
mod credentials;
mod logging;

use std::process::ExitCode;

use clap::Parser;

use cli::{Cli, Commands};

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    let _log_guard = logging::init(cli.global.verbose);

    let result = match cli.command {
        Commands::Import(args) => commands::import::execute(args, &cli.global).await,
        Commands::Batch(args) => commands::batch::execute(args, &cli.global).await,
        Commands::Reconcile(args) => commands::reconcile::execute(args, &cli.global).await,
        Commands::Config(args) => commands::config::execute(args, &cli.global).await,
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}
