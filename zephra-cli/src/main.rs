//! Zephra CLI - Command-line front end for the Zephra offline client.
//!
//! Drives the same service manager the desktop shell uses: inspect and
//! flush the background sync queue, look at worker caches, check for app
//! updates and query the air-quality API from the terminal.

mod commands;

use clap::{Parser, Subcommand};
use tracing::info;

use zephra_core::config::{AppConfig, ConfigHandle};
use zephra_core::error::ZephraResult;
use zephra_core::logging;

/// Zephra - air-quality dashboards that keep working offline.
#[derive(Parser)]
#[command(
    name = "zephra",
    version,
    about = "Zephra offline client CLI",
    long_about = "A command-line interface for the Zephra client.\n\
                   Manages the offline sync queue, worker caches, notifications and app updates."
)]
struct Cli {
    /// Path to the configuration file.
    #[arg(short, long, global = true)]
    config: Option<String>,

    /// Enable verbose logging (debug level).
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Output format (text, json).
    #[arg(short = 'f', long, global = true, default_value = "text")]
    format: OutputFormat,

    #[command(subcommand)]
    command: Commands,
}

/// Output format for command results.
#[derive(Debug, Clone, Copy, clap::ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// Show connectivity, queue, worker, push and update status.
    Status,
    /// Fetch the air-quality dashboard for a location.
    Dashboard {
        /// Named location (e.g. "Delhi").
        #[arg(short, long, conflicts_with_all = ["lat", "lon"])]
        location: Option<String>,
        /// Latitude, used together with --lon.
        #[arg(long, requires = "lon", allow_hyphen_values = true)]
        lat: Option<f64>,
        /// Longitude, used together with --lat.
        #[arg(long, requires = "lat", allow_hyphen_values = true)]
        lon: Option<f64>,
    },
    /// List the locations the API knows about.
    Locations,
    /// Inspect and manage the background sync queue.
    Queue {
        #[command(subcommand)]
        action: commands::queue::QueueAction,
    },
    /// Inspect and clear the caching worker's caches.
    Cache {
        #[command(subcommand)]
        action: commands::cache::CacheAction,
    },
    /// Check for app updates and show install history.
    Update {
        #[command(subcommand)]
        action: commands::update::UpdateAction,
    },
    /// Describe the alert tier for an AQI value.
    Alert {
        /// Air quality index value.
        aqi: f64,
        /// Location named in the notification.
        #[arg(short, long, default_value = "current location")]
        location: String,
        /// Also raise a desktop notification.
        #[arg(long)]
        notify: bool,
    },
}

#[tokio::main]
async fn main() -> ZephraResult<()> {
    let cli = Cli::parse();

    // Load configuration
    let config = match cli.config.as_deref() {
        Some(path) => AppConfig::load_from_file(std::path::Path::new(path))?,
        None => AppConfig::load_default()?,
    };

    // Initialize logging
    let log_dir = config
        .effective_log_dir()
        .unwrap_or_else(|_| std::path::PathBuf::from("logs"));
    let _guard = logging::init_logging(&config.logging, &log_dir, cli.verbose)?;

    let config_handle = ConfigHandle::new(config);

    info!("Zephra CLI v{}", zephra_core::constants::APP_VERSION);

    match cli.command {
        Commands::Status => commands::status::run(config_handle, cli.format).await,
        Commands::Dashboard { location, lat, lon } => {
            commands::dashboard::run(config_handle, location, lat, lon, cli.format).await
        }
        Commands::Locations => commands::dashboard::list_locations(config_handle, cli.format).await,
        Commands::Queue { action } => commands::queue::run(config_handle, action, cli.format).await,
        Commands::Cache { action } => commands::cache::run(config_handle, action, cli.format).await,
        Commands::Update { action } => {
            commands::update::run(config_handle, action, cli.format).await
        }
        Commands::Alert { aqi, location, notify } => {
            commands::alert::run(config_handle, aqi, location, notify, cli.format).await
        }
    }
}
