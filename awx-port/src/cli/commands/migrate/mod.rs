//! `migrate` subcommand

mod handler;

use std::path::PathBuf;

use clap::Args;

use super::SelectionArgs;

pub use handler::handle_migrate_command;

#[derive(Args, Debug, Clone)]
pub struct MigrateCommands {
    #[command(flatten)]
    pub selection: SelectionArgs,

    /// Credential secrets (JSON mapping of credential name to `inputs`)
    #[arg(long, default_value = "./credentials.json")]
    pub secrets: PathBuf,
}
