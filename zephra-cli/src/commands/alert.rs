//! AQI alert lookup.

use console::style;

use zephra_core::config::ConfigHandle;
use zephra_core::error::ZephraResult;
use zephra_models::AlertLevel;
use zephra_services::{PushService, ServiceManager};
use crate::OutputFormat;

async fn show(manager: &ServiceManager, aqi: f64, location: &str) -> ZephraResult<()> {
    let push = manager.push();
    push.request_permission().await?;
    push.show_notification(&PushService::air_quality_notification(aqi, location)).await
}

pub async fn run(
    config: ConfigHandle,
    aqi: f64,
    location: String,
    notify: bool,
    format: OutputFormat,
) -> ZephraResult<()> {
    let descriptor = AlertLevel::from_aqi(aqi).descriptor();

    let notified = if notify {
        let manager = super::start_manager(&config).await?;
        let shown = show(&manager, aqi, &location).await;
        manager.shutdown().await;
        shown?;
        true
    } else {
        false
    };

    match format {
        OutputFormat::Json => {
            super::print_json(&serde_json::json!({
                "aqi": aqi,
                "location": location,
                "alert": descriptor,
                "notified": notified,
            }));
        }
        OutputFormat::Text => {
            println!(
                "  {} {} - {}",
                descriptor.icon,
                style(descriptor.label).bold(),
                descriptor.severity
            );
            println!("  AQI:        {aqi:.0}");
            println!("  Action:     {}", descriptor.action);
            println!("  Pollutants: {}", descriptor.pollutants.join(", "));
            if notified {
                println!("  {} Notification shown.", style("OK").green().bold());
            }
        }
    }

    Ok(())
}
