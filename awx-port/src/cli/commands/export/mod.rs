//! `export` subcommand

mod handler;

use std::path::PathBuf;

use clap::Args;

use super::SelectionArgs;

pub use handler::handle_export_command;

#[derive(Args, Debug, Clone)]
pub struct ExportCommands {
    #[command(flatten)]
    pub selection: SelectionArgs,

    /// Output document (defaults to ./<entity-type>.assets.yaml)
    #[arg(short, long)]
    pub output_file: Option<PathBuf>,
}
