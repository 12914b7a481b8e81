//! Subcommand arguments and handlers

pub mod export;
pub mod migrate;

use std::path::PathBuf;

use clap::{Args, CommandFactory};
use colored::*;

use crate::cli::Cli;
use crate::transfer::{EntityType, RunOptions, RunSummary};

/// Options shared by every subcommand that walks a source listing
#[derive(Args, Debug, Clone)]
pub struct SelectionArgs {
    /// Entity type to process (e.g. inventory, host, job_template)
    pub entity_type: String,

    /// Process at most this many entities; zero or less means no limit
    #[arg(short, long, allow_negative_numbers = true)]
    pub limit: Option<i64>,

    /// Raw server-side filter appended to the listing URL
    #[arg(short, long)]
    pub query: Option<String>,

    /// Skip the entity with this name
    #[arg(short = 'x', long)]
    pub exclude: Option<String>,

    /// Skip this many entities of the listing first
    #[arg(short, long, default_value_t = 0)]
    pub start_from: usize,

    /// Log what would be written instead of writing it
    #[arg(long)]
    pub dry_run: bool,

    /// Settings file (YAML, or TOML by extension)
    #[arg(short, long, default_value = "./awx-port.yml")]
    pub config: PathBuf,
}

impl SelectionArgs {
    /// Parse the entity type, printing the valid set and usage when unknown
    pub fn parse_kind(&self) -> Option<EntityType> {
        match self.entity_type.parse::<EntityType>() {
            Ok(kind) => Some(kind),
            Err(e) => {
                eprintln!("{}", e.to_string().red());
                eprintln!();
                let _ = Cli::command().print_help();
                None
            }
        }
    }

    pub fn run_options(&self) -> RunOptions {
        RunOptions {
            limit: self
                .limit
                .and_then(|l| usize::try_from(l).ok())
                .filter(|l| *l > 0),
            query: self.query.clone(),
            start_from: self.start_from,
            exclude: self.exclude.clone(),
        }
    }
}

/// Print the end-of-run counters
pub fn print_summary(kind: EntityType, summary: &RunSummary) {
    println!();
    println!(
        "{} {}: {} processed, {} created, {} existing, {} skipped, {}",
        "Summary".bold(),
        kind.to_string().cyan(),
        summary.processed,
        summary.created.to_string().green(),
        summary.existing,
        summary.skipped.to_string().yellow(),
        if summary.failed > 0 {
            format!("{} failed", summary.failed).red().bold()
        } else {
            "0 failed".normal()
        }
    );
    if summary.link_failures > 0 {
        println!(
            "{}",
            format!("{} relation links failed, see log above", summary.link_failures).yellow()
        );
    }
}
