//! `LedgerLens` Realtime Dispatcher
//!
//! Maintains the dashboard, analytics and notification WebSocket channels
//! against a `LedgerLens` server, reconnecting on a fixed timer and routing
//! typed updates into the shared dashboard state.

#![forbid(unsafe_code)]
#![warn(
    clippy::all,
    clippy::pedantic,
    clippy::nursery,
    missing_docs,
    rust_2018_idioms
)]

use clap::{Parser, Subcommand};
use ledgerlens_realtime::{
    ChannelKind, RealtimeConfig, RealtimeError, RealtimeService, Result, connection,
};
use std::path::PathBuf;
use tokio::signal;
use tracing::{info, warn};

/// Command line interface for the realtime dispatcher
#[derive(Parser)]
#[command(
    name = "ledgerlens-realtime",
    version = env!("CARGO_PKG_VERSION"),
    about = "Realtime update dispatcher for the LedgerLens dashboard",
    long_about = "Maintains the dashboard, analytics and notification WebSocket channels against a LedgerLens server, reconnecting on a fixed timer and routing typed updates into the shared dashboard state."
)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, default_value = "info")]
    log_level: String,

    /// Log format (json, pretty)
    #[arg(long, default_value = "pretty")]
    log_format: String,

    /// Enable structured JSON logging
    #[arg(long)]
    json: bool,

    /// Subcommand
    #[command(subcommand)]
    command: Option<Commands>,
}

/// Available subcommands
#[derive(Subcommand)]
enum Commands {
    /// Run the dispatcher in the foreground
    Run {
        /// Override the server base URL
        #[arg(long, value_name = "URL")]
        base_url: Option<String>,

        /// Override the user ID for per-user channels
        #[arg(long, value_name = "ID")]
        user_id: Option<i64>,
    },

    /// Validate configuration
    Config {
        /// Show resolved configuration
        #[arg(short, long)]
        show: bool,

        /// Validate configuration values
        #[arg(short, long)]
        validate: bool,
    },

    /// Probe channel endpoints for reachability
    Probe {
        /// Probe a single channel (dashboard, analytics, notifications)
        #[arg(value_name = "CHANNEL")]
        channel: Option<String>,
    },
}

/// Main entry point for the dispatcher
///
/// # Errors
///
/// Returns error if service initialization or execution fails
#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if it exists (for development convenience)
    if let Err(e) = dotenvy::dotenv() {
        // It's okay if .env doesn't exist
        eprintln!("Note: .env file not loaded: {e}");
    }

    let cli = Cli::parse();

    // Initialize logging
    init_logging(&cli);

    // Load configuration
    let config = load_config(cli.config.as_deref()).await?;

    match cli.command {
        Some(Commands::Run { base_url, user_id }) => {
            run_dispatcher(with_overrides(config, base_url, user_id)).await
        }
        Some(Commands::Config { show, validate }) => handle_config_command(&config, show, validate),
        Some(Commands::Probe { channel }) => probe_channels(&config, channel.as_deref()).await,
        None => {
            // Default: run in foreground
            run_dispatcher(config).await
        }
    }
}

/// Initialize logging system
fn init_logging(cli: &Cli) {
    use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_level));

    let subscriber = tracing_subscriber::registry().with(env_filter);

    if cli.json || cli.log_format == "json" {
        subscriber
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        subscriber
            .with(tracing_subscriber::fmt::layer().pretty())
            .init();
    }

    info!(
        version = env!("CARGO_PKG_VERSION"),
        log_level = cli.log_level,
        "LedgerLens realtime dispatcher starting"
    );
}

/// Load configuration from file or environment
///
/// # Errors
///
/// Returns error if the configuration file cannot be read or parsed
async fn load_config(config_path: Option<&std::path::Path>) -> Result<RealtimeConfig> {
    if let Some(path) = config_path {
        info!("Loading configuration from: {}", path.display());

        let config_content = tokio::fs::read_to_string(path).await.map_err(|e| {
            RealtimeError::configuration(format!(
                "Failed to read config file {}: {}",
                path.display(),
                e
            ))
        })?;

        let config: RealtimeConfig = toml::from_str(&config_content)
            .map_err(|e| RealtimeError::configuration(format!("Failed to parse config file: {e}")))?;

        config.validate()?;
        Ok(config)
    } else {
        info!("Loading default configuration");
        RealtimeConfig::load()
    }
}

/// Apply CLI overrides to the loaded configuration
fn with_overrides(
    mut config: RealtimeConfig,
    base_url: Option<String>,
    user_id: Option<i64>,
) -> RealtimeConfig {
    if let Some(url) = base_url {
        config.server.base_url = url;
    }
    if let Some(id) = user_id {
        config.server.user_id = id;
    }
    config
}

/// Run the dispatcher and wait for shutdown
///
/// # Errors
///
/// Returns error if the service cannot be started
async fn run_dispatcher(config: RealtimeConfig) -> Result<()> {
    info!(
        base_url = %config.server.base_url,
        user_id = config.server.user_id,
        reconnect_delay_s = config.reconnect.delay_seconds,
        "Starting realtime dispatcher"
    );

    let service = ledgerlens_realtime::init_with_config(config)?;
    service.start()?;
    info!("Dispatcher is running. Press Ctrl+C to stop.");

    wait_for_shutdown_signal(&service).await;

    service.stop().await;
    info!("Dispatcher stopped successfully");
    Ok(())
}

/// Wait for shutdown signal (Ctrl+C or service shutdown)
async fn wait_for_shutdown_signal(service: &RealtimeService) {
    tokio::select! {
        _ = signal::ctrl_c() => {
            info!("Received Ctrl+C, shutting down gracefully");
        }
        () = service.wait_for_shutdown() => {
            info!("Service requested shutdown");
        }
    }
}

/// Handle configuration commands
///
/// # Errors
///
/// Returns error if configuration cannot be serialized
fn handle_config_command(config: &RealtimeConfig, show: bool, validate: bool) -> Result<()> {
    if validate {
        config.validate()?;
        info!("Configuration is valid");
    }

    if show {
        let config_toml = toml::to_string_pretty(config).map_err(|e| {
            RealtimeError::configuration(format!("Failed to serialize configuration: {e}"))
        })?;
        println!("{config_toml}");
    }

    Ok(())
}

/// Resolve a channel name given on the command line
fn parse_channel(name: &str) -> Result<ChannelKind> {
    ChannelKind::all()
        .into_iter()
        .find(|kind| kind.as_str() == name)
        .ok_or_else(|| RealtimeError::configuration(format!("Unknown channel: {name}")))
}

/// Probe one or all enabled channels and report reachability
///
/// # Errors
///
/// Returns error if a channel name is unknown or a probe fails
async fn probe_channels(config: &RealtimeConfig, channel: Option<&str>) -> Result<()> {
    let channels = match channel {
        Some(name) => vec![parse_channel(name)?],
        None => config.enabled_channels(),
    };

    let mut failures = 0_usize;
    for kind in channels {
        let url = config.channel_url(kind);
        match connection::probe(kind, &url, config.reconnect.connect_timeout()).await {
            Ok(()) => println!("{kind}: reachable ({url})"),
            Err(e) => {
                warn!(channel = %kind, error = %e, "Probe failed");
                println!("{kind}: unreachable ({url})");
                failures += 1;
            }
        }
    }

    if failures > 0 {
        return Err(RealtimeError::connection(
            "probe",
            format!("{failures} channel(s) unreachable"),
        ));
    }
    Ok(())
}
