//! Export command handler

use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use colored::*;

use super::ExportCommands;
use crate::api::{RunCache, StoreClient};
use crate::cli::commands::print_summary;
use crate::config::Config;
use crate::transfer::{Driver, EntityType, PortableEntity};

pub async fn handle_export_command(args: ExportCommands) -> Result<()> {
    let selection = &args.selection;
    let Some(kind) = selection.parse_kind() else {
        return Ok(());
    };

    let config = Config::load(&selection.config)?;
    let cache = Arc::new(RunCache::new());
    let source = StoreClient::connect(&config.source, &config, cache)
        .context("Failed to set up source store client")?;

    println!(
        "Exporting {} from {}",
        kind.to_string().cyan().bold(),
        source.id().as_str().dimmed()
    );

    let (entities, summary) = Driver::new(&source, &config.organization)
        .export(kind, &selection.run_options())
        .await
        .with_context(|| format!("Export of {} stopped", kind))?;

    let document = render_document(&entities)?;
    if selection.dry_run {
        println!("{}", document);
    } else {
        let path = output_path(kind, args.output_file.as_ref());
        fs::write(&path, document)
            .with_context(|| format!("Failed to write export file: {}", path.display()))?;
        println!(
            "Wrote {} entities to {}",
            entities.len().to_string().green(),
            path.display().to_string().cyan()
        );
    }

    print_summary(kind, &summary);
    Ok(())
}

fn output_path(kind: EntityType, output_file: Option<&PathBuf>) -> PathBuf {
    output_file
        .cloned()
        .unwrap_or_else(|| PathBuf::from(format!("./{}.assets.yaml", kind)))
}

/// One YAML sequence, entities in source order
fn render_document(entities: &[PortableEntity]) -> Result<String> {
    serde_yaml::to_string(entities).context("Failed to serialize export document")
}
