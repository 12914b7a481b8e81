//! Migrate command handler

use std::sync::Arc;

use anyhow::{Context, Result};
use colored::*;

use super::MigrateCommands;
use crate::api::{RunCache, StoreClient};
use crate::cli::commands::print_summary;
use crate::config::{Config, SecretSource};
use crate::transfer::{Driver, EntityType};

pub async fn handle_migrate_command(args: MigrateCommands) -> Result<()> {
    let selection = &args.selection;
    let Some(kind) = selection.parse_kind() else {
        return Ok(());
    };

    let config = Config::load(&selection.config)?;
    let destination_config = config.destination()?;

    // secrets must be readable before any entity is touched
    let secrets = if kind == EntityType::Credential {
        Some(SecretSource::load(&args.secrets)?)
    } else {
        None
    };

    let cache = Arc::new(RunCache::new());
    let source = StoreClient::connect(&config.source, &config, cache.clone())
        .context("Failed to set up source store client")?;
    let destination = StoreClient::connect(destination_config, &config, cache.clone())
        .context("Failed to set up destination store client")?
        .with_dry_run(selection.dry_run);

    println!(
        "Migrating {} from {} to {}{}",
        kind.to_string().cyan().bold(),
        source.id().as_str().dimmed(),
        destination.id().as_str().dimmed(),
        if selection.dry_run {
            " (dry run)".yellow().to_string()
        } else {
            String::new()
        }
    );

    let summary = Driver::new(&source, &config.organization)
        .migrate(kind, &selection.run_options(), &destination, secrets.as_ref())
        .await
        .with_context(|| format!("Migration of {} stopped", kind))?;

    let stats = cache.stats();
    log::debug!(
        "Cache: {} entries, {} hits, {} misses",
        stats.entries,
        stats.hits,
        stats.misses
    );

    print_summary(kind, &summary);
    Ok(())
}
