//! Command line surface

pub mod commands;

use clap::{Parser, Subcommand};

use commands::export::ExportCommands;
use commands::migrate::MigrateCommands;

/// Migrate or export AWX / Tower configuration entities
#[derive(Parser, Debug)]
#[command(name = "awx-port", author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Copy entities of one type from the source store to the destination
    Migrate(MigrateCommands),
    /// Write entities of one type to a portable YAML document
    Export(ExportCommands),
}
