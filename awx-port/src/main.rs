mod api;
mod cli;
mod config;
mod error;
mod transfer;

use anyhow::Result;
use clap::Parser;

use cli::commands::export::handle_export_command;
use cli::commands::migrate::handle_migrate_command;
use cli::{Cli, Commands};

// one request in flight at a time, entities strictly in sequence
#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    log::debug!("Parsed arguments: {:?}", cli);

    match cli.command {
        Commands::Migrate(args) => handle_migrate_command(args).await,
        Commands::Export(args) => handle_export_command(args).await,
    }
}
