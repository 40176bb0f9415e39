//! Status command - show connectivity and per-manager status.

use console::style;

use zephra_core::config::ConfigHandle;
use zephra_core::error::ZephraResult;
use zephra_core::platform::Platform;
use crate::OutputFormat;

fn flag(on: bool, yes: &str, no: &str) -> String {
    if on {
        style(yes).green().to_string()
    } else {
        style(no).yellow().to_string()
    }
}

/// Run the status command.
pub async fn run(config: ConfigHandle, format: OutputFormat) -> ZephraResult<()> {
    let manager = super::start_manager(&config).await?;
    let status = manager.get_status().await;
    let (base_url, store_path, push_configured) = {
        let cfg = config.read().await;
        (cfg.api.base_url.clone(), cfg.effective_store_path()?, cfg.is_push_configured())
    };
    let store_stats = super::init_store(&config)
        .await
        .and_then(|store| store.database().stats())
        .ok();

    match format {
        OutputFormat::Json => {
            let mut json = serde_json::to_value(&status)?;
            json["apiBaseUrl"] = serde_json::json!(base_url);
            json["platform"] = serde_json::json!(Platform::current().id());
            if let Some(stats) = &store_stats {
                json["localStore"] = serde_json::json!({
                    "path": store_path.display().to_string(),
                    "entries": stats.entries,
                    "bytes": stats.bytes,
                });
            }
            super::print_json(&json);
        }
        OutputFormat::Text => {
            println!("{}", style("Connection").bold().underlined());
            println!("  Platform:  {}", Platform::current());
            println!("  API:       {}", base_url);
            println!("  Network:   {}", flag(status.online, "online", "offline"));

            println!();
            println!("{}", style("Sync Queue").bold().underlined());
            println!(
                "  Pending:   {} (high {}, medium {}, low {})",
                status.sync.pending, status.sync.high, status.sync.medium, status.sync.low
            );
            if let Some(oldest) = status.sync.oldest_timestamp {
                println!("  Oldest:    {}", super::format_timestamp(oldest));
            }
            if status.sync.retry_pending {
                println!("  Retry:     {}", style("scheduled").yellow());
            }

            println!();
            println!("{}", style("Caching Worker").bold().underlined());
            println!("  Supported: {}", flag(status.worker.supported, "yes", "no"));
            println!("  Registered: {}", flag(status.worker.registered, "yes", "no"));
            if let Some(scope) = &status.worker.scope {
                println!("  Scope:     {scope}");
            }
            if status.worker.update_available {
                println!("  Update:    {}", style("waiting to activate").yellow());
            }

            println!();
            println!("{}", style("Notifications").bold().underlined());
            println!("  Supported: {}", flag(status.push.supported, "yes", "no"));
            println!("  Permission: {}", status.push.permission.as_str());
            println!("  Push:      {}", flag(status.push.subscribed, "subscribed", "not subscribed"));
            if !push_configured {
                println!("  VAPID key: {}", style("not configured").yellow());
            }

            println!();
            println!("{}", style("App Version").bold().underlined());
            println!("  Current:   {}", status.updates.current_version);
            match &status.updates.available_version {
                Some(v) if status.updates.update_available => {
                    let label = if status.updates.critical {
                        style(format!("{v} (critical)")).red().bold().to_string()
                    } else {
                        style(v.clone()).cyan().to_string()
                    };
                    println!("  Available: {label}");
                }
                _ => println!("  Available: up to date"),
            }
            if let Some(checked) = status.updates.last_checked {
                println!("  Checked:   {}", super::format_timestamp(checked));
            }

            if let Some(stats) = &store_stats {
                println!();
                println!("{}", style("Local Store").bold().underlined());
                println!("  Path:      {}", store_path.display());
                println!("  Entries:   {}", stats.entries);
                println!("  Size:      {}", super::format_bytes(stats.bytes.max(0) as u64));
            }

            let unhealthy: Vec<_> = status.services.iter().filter(|s| !s.healthy).collect();
            if !unhealthy.is_empty() {
                println!();
                println!("{}", style("Degraded Services").bold().underlined());
                for s in unhealthy {
                    println!("  {:<20} {}", s.name, style(s.state.to_string()).red());
                }
            }
        }
    }

    manager.shutdown().await;
    Ok(())
}
