//! Background sync queue commands.

use std::time::Duration;

use clap::Subcommand;
use comfy_table::{Table, presets::UTF8_FULL, modifiers::UTF8_ROUND_CORNERS, ContentArrangement};
use console::style;

use zephra_core::config::ConfigHandle;
use zephra_core::error::ZephraResult;
use zephra_models::{SyncPriority, SyncType};
use zephra_services::{BackgroundSyncService, QueueOptions};
use crate::OutputFormat;

#[derive(Subcommand)]
pub enum QueueAction {
    /// List pending items in delivery order.
    List,
    /// Queue an operation for background delivery.
    Add {
        /// Operation type (air-quality-request, user-preference, location-update, analytics-event).
        sync_type: SyncType,
        /// JSON payload.
        payload: String,
        /// Priority tier (high, medium, low).
        #[arg(short, long, default_value = "medium")]
        priority: SyncPriority,
        /// Attempts before the item is dropped.
        #[arg(long)]
        max_retries: Option<u32>,
        /// Lifetime in seconds; expired items are discarded unsent.
        #[arg(long)]
        expires_in: Option<i64>,
    },
    /// Remove every pending item.
    Clear,
    /// Deliver pending items now.
    Flush,
}

/// Startup and online triggers drain in the background; wait for them so
/// the process does not exit mid-delivery.
async fn wait_for_drain(sync: &BackgroundSyncService) {
    while sync.queue_status().await.processing {
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
}

pub async fn run(config: ConfigHandle, action: QueueAction, format: OutputFormat) -> ZephraResult<()> {
    let manager = super::start_manager(&config).await?;
    let sync = manager.sync();

    match action {
        QueueAction::List => {
            let items = sync.queue_items().await;
            match format {
                OutputFormat::Json => super::print_json(&items),
                OutputFormat::Text => {
                    if items.is_empty() {
                        println!("Sync queue is empty.");
                    } else {
                        let mut table = Table::new();
                        table
                            .load_preset(UTF8_FULL)
                            .apply_modifier(UTF8_ROUND_CORNERS)
                            .set_content_arrangement(ContentArrangement::Dynamic);
                        table.set_header(vec!["ID", "Type", "Priority", "Queued", "Retries", "Expires", "Payload"]);

                        for item in &items {
                            table.add_row(vec![
                                super::truncate(&item.id, 12),
                                item.sync_type.to_string(),
                                item.priority.to_string(),
                                super::format_timestamp(item.timestamp),
                                format!("{}/{}", item.retry_count, item.max_retries),
                                item.expires_at.map(super::format_timestamp).unwrap_or_else(|| "never".into()),
                                super::truncate(&item.payload.to_string(), 40),
                            ]);
                        }
                        println!("{table}");
                    }
                }
            }
        }
        QueueAction::Add { sync_type, payload, priority, max_retries, expires_in } => {
            let payload: serde_json::Value = serde_json::from_str(&payload)?;
            let options = QueueOptions {
                max_retries,
                expires_in_ms: expires_in.map(|secs| secs.saturating_mul(1_000)),
            };
            let id = sync.add_to_queue(sync_type, payload, priority, options).await;
            sync.process_sync_queue().await;
            wait_for_drain(sync).await;
            let delivered = !sync.queue_items().await.iter().any(|item| item.id == id);

            match format {
                OutputFormat::Json => {
                    super::print_json(&serde_json::json!({
                        "id": id,
                        "syncType": sync_type,
                        "priority": priority,
                        "delivered": delivered,
                        "pending": sync.queue_len().await,
                    }));
                }
                OutputFormat::Text => {
                    if delivered {
                        println!("  {} Delivered {} ({})", style("OK").green().bold(), id, priority);
                    } else {
                        println!("  {} Queued {} ({})", style("OK").green().bold(), id, priority);
                        if !manager.network().is_online() {
                            println!("  API unreachable; the item will be sent on the next run while online.");
                        }
                    }
                }
            }
        }
        QueueAction::Clear => {
            let removed = sync.clear_queue().await;
            match format {
                OutputFormat::Json => super::print_json(&serde_json::json!({ "removed": removed })),
                OutputFormat::Text => {
                    println!("  {} Removed {} item(s).", style("OK").green().bold(), removed);
                }
            }
        }
        QueueAction::Flush => {
            let before = sync.queue_len().await;
            manager.force_sync_all().await;
            wait_for_drain(sync).await;
            let remaining = sync.queue_len().await;
            let delivered = before.saturating_sub(remaining);

            match format {
                OutputFormat::Json => {
                    super::print_json(&serde_json::json!({
                        "online": manager.network().is_online(),
                        "delivered": delivered,
                        "remaining": remaining,
                    }));
                }
                OutputFormat::Text => {
                    if !manager.network().is_online() {
                        println!(
                            "  {} API unreachable, {} item(s) left queued.",
                            style("OFFLINE").yellow().bold(),
                            before
                        );
                    } else {
                        println!(
                            "  {} Delivered {} of {} item(s), {} remaining.",
                            style("SYNC").cyan().bold(),
                            delivered,
                            before,
                            remaining
                        );
                    }
                }
            }
        }
    }

    manager.shutdown().await;
    Ok(())
}
