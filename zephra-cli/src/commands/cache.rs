//! Caching worker commands.

use clap::Subcommand;
use comfy_table::{Table, presets::UTF8_FULL, modifiers::UTF8_ROUND_CORNERS, ContentArrangement};
use console::style;

use zephra_core::config::ConfigHandle;
use zephra_core::error::ZephraResult;
use zephra_services::ServiceManager;
use crate::OutputFormat;

#[derive(Subcommand)]
pub enum CacheAction {
    /// Show entry counts and sizes per cache.
    Stats,
    /// Clear one named cache, or every cache.
    Clear {
        /// Cache name (e.g. zephra-api). Clears all caches when omitted.
        name: Option<String>,
    },
}

pub async fn run(config: ConfigHandle, action: CacheAction, format: OutputFormat) -> ZephraResult<()> {
    let manager = super::start_manager(&config).await?;

    let result = match action {
        CacheAction::Stats => stats(&manager, format).await,
        CacheAction::Clear { name } => clear(&manager, name.as_deref(), format).await,
    };

    manager.shutdown().await;
    result
}

async fn clear(manager: &ServiceManager, name: Option<&str>, format: OutputFormat) -> ZephraResult<()> {
    let cleared = manager.worker().clear_cache(name).await?;

    match format {
        OutputFormat::Json => super::print_json(&serde_json::json!({ "cleared": cleared })),
        OutputFormat::Text => {
            if cleared.is_empty() {
                println!("Nothing to clear.");
            } else {
                println!("  {} Cleared {}", style("OK").green().bold(), cleared.join(", "));
            }
        }
    }

    Ok(())
}

async fn stats(manager: &ServiceManager, format: OutputFormat) -> ZephraResult<()> {
    let stats = manager.cache_stats().await?;

    match format {
        OutputFormat::Json => super::print_json(&stats),
        OutputFormat::Text => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .apply_modifier(UTF8_ROUND_CORNERS)
                .set_content_arrangement(ContentArrangement::Dynamic);
            table.set_header(vec!["Cache", "Entries", "Size"]);

            for cache in &stats.caches {
                table.add_row(vec![
                    cache.name.clone(),
                    cache.entries.to_string(),
                    super::format_bytes(cache.bytes),
                ]);
            }
            table.add_row(vec![
                style("total").bold().to_string(),
                stats.total_entries.to_string(),
                super::format_bytes(stats.total_bytes),
            ]);
            println!("{table}");
        }
    }

    Ok(())
}
