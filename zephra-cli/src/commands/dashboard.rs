//! Dashboard and location commands.

use comfy_table::{Table, presets::UTF8_FULL, modifiers::UTF8_ROUND_CORNERS, ContentArrangement};
use console::style;
use indicatif::{ProgressBar, ProgressStyle};

use zephra_core::config::ConfigHandle;
use zephra_core::error::{ZephraError, ZephraResult};
use zephra_models::{AlertLevel, DashboardQuery};
use crate::OutputFormat;

fn spinner(message: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("  {spinner} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    pb.set_message(message.to_string());
    pb.enable_steady_tick(std::time::Duration::from_millis(100));
    pb
}

/// Fetch and print the dashboard for a location or coordinate pair.
pub async fn run(
    config: ConfigHandle,
    location: Option<String>,
    lat: Option<f64>,
    lon: Option<f64>,
    format: OutputFormat,
) -> ZephraResult<()> {
    let query = match (location, lat, lon) {
        (Some(name), _, _) => DashboardQuery::named(name),
        (None, Some(lat), Some(lon)) => DashboardQuery::coordinates(lat, lon),
        _ => {
            return Err(ZephraError::Config(
                "pass --location or both --lat and --lon".into(),
            ))
        }
    };

    let api = super::create_api_client(&config).await?;
    let pb = spinner("Fetching dashboard...");
    let result = api.get_dashboard(&query).await;
    pb.finish_and_clear();
    let data = result?;

    match format {
        OutputFormat::Json => super::print_json(&data),
        OutputFormat::Text => {
            let info = &data.location_info;
            println!("{}", style(&info.name).bold().underlined());
            if let [lat, lon, ..] = info.coordinates.as_slice() {
                println!("  Coordinates: {lat:.4}, {lon:.4}");
            }
            if let Some(country) = &info.country {
                println!("  Country:     {country}");
            }

            match data.latest_aqi() {
                Some(aqi) => {
                    let level = AlertLevel::from_aqi(aqi);
                    println!(
                        "  Latest AQI:  {} ({} {})",
                        style(format!("{aqi:.0}")).bold(),
                        level.descriptor().icon,
                        level.label()
                    );
                }
                None => println!("  Latest AQI:  no readings"),
            }

            if !data.air_quality.is_empty() {
                println!();
                let mut table = Table::new();
                table
                    .load_preset(UTF8_FULL)
                    .apply_modifier(UTF8_ROUND_CORNERS)
                    .set_content_arrangement(ContentArrangement::Dynamic);
                table.set_header(vec!["Time", "AQI", "PM2.5", "PM10", "O3", "NO2"]);

                let opt = |v: Option<f64>| v.map(|v| format!("{v:.1}")).unwrap_or_else(|| "-".into());
                for r in data.air_quality.iter().rev().take(12) {
                    table.add_row(vec![
                        r.timestamp.clone(),
                        format!("{:.0}", r.aqi),
                        opt(r.pm25),
                        opt(r.pm10),
                        opt(r.o3),
                        opt(r.no2),
                    ]);
                }
                println!("{table}");
            }
        }
    }

    Ok(())
}

/// List every location the API serves.
pub async fn list_locations(config: ConfigHandle, format: OutputFormat) -> ZephraResult<()> {
    let api = super::create_api_client(&config).await?;
    let response = api.get_locations().await?;

    match format {
        OutputFormat::Json => super::print_json(&response.locations),
        OutputFormat::Text => {
            if response.locations.is_empty() {
                println!("No locations available.");
                return Ok(());
            }

            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .apply_modifier(UTF8_ROUND_CORNERS)
                .set_content_arrangement(ContentArrangement::Dynamic);
            table.set_header(vec!["Name", "Country", "Lat", "Lon", "Timezone"]);

            for l in &response.locations {
                table.add_row(vec![
                    l.name.clone(),
                    l.country.clone(),
                    format!("{:.4}", l.lat),
                    format!("{:.4}", l.lon),
                    l.timezone.clone(),
                ]);
            }
            println!("{table}");
            println!(
                "  {} location(s)",
                style(response.locations.len()).bold()
            );
        }
    }

    Ok(())
}
