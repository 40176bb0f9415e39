//! App update commands.

use clap::Subcommand;
use comfy_table::{Table, presets::UTF8_FULL, modifiers::UTF8_ROUND_CORNERS, ContentArrangement};
use console::style;

use zephra_core::config::ConfigHandle;
use zephra_core::error::ZephraResult;
use zephra_services::ServiceManager;
use crate::OutputFormat;

#[derive(Subcommand)]
pub enum UpdateAction {
    /// Ask the API whether a newer version exists.
    Check,
    /// Show previously installed versions, newest first.
    History,
}

pub async fn run(config: ConfigHandle, action: UpdateAction, format: OutputFormat) -> ZephraResult<()> {
    let manager = super::start_manager(&config).await?;

    let result = match action {
        UpdateAction::Check => check(&manager, format).await,
        UpdateAction::History => {
            history(&manager, format);
            Ok(())
        }
    };

    manager.shutdown().await;
    result
}

async fn check(manager: &ServiceManager, format: OutputFormat) -> ZephraResult<()> {
    let info = manager.check_for_app_updates().await?;
    let status = manager.updates().get_update_status();

    match format {
        OutputFormat::Json => super::print_json(&status),
        OutputFormat::Text => match info {
            Some(info) => {
                let marker = if info.available.critical {
                    style("CRITICAL").red().bold()
                } else {
                    style("UPDATE").cyan().bold()
                };
                println!("  {} {} -> {}", marker, info.current_version, info.available_version());
                if let Some(notes) = &info.available.release_notes {
                    println!();
                    println!("  {notes}");
                }
            }
            None => {
                println!(
                    "  {} {} is the latest version.",
                    style("OK").green().bold(),
                    status.current_version
                );
            }
        },
    }

    Ok(())
}

fn history(manager: &ServiceManager, format: OutputFormat) {
    let mut history = manager.updates().version_history();
    history.reverse();

    match format {
        OutputFormat::Json => super::print_json(&history),
        OutputFormat::Text => {
            if history.is_empty() {
                println!("No updates installed yet.");
                return;
            }

            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .apply_modifier(UTF8_ROUND_CORNERS)
                .set_content_arrangement(ContentArrangement::Dynamic);
            table.set_header(vec!["Version", "Previous", "Installed"]);
            for entry in &history {
                table.add_row(vec![
                    entry.version.clone(),
                    entry.previous_version.clone().unwrap_or_else(|| "-".into()),
                    super::format_timestamp(entry.installed_at),
                ]);
            }
            println!("{table}");
        }
    }
}
