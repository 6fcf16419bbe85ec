//! Main entry point for the ladder engine service
//!
//! Production entry point that initializes and runs the complete
//! matchmaking service with proper error handling, logging, and graceful
//! shutdown.

use anyhow::Result;
use clap::Parser;
use ladder_engine::config::AppConfig;
use ladder_engine::service::AppState;
use ladder_engine::types::Discipline;
use std::path::PathBuf;
use tokio::signal;
use tracing::{error, info, warn};

/// Ladder Engine - wave-based two-discipline matchmaking service
#[derive(Parser)]
#[command(
    name = "ladder-engine",
    version,
    about = "Wave-based matchmaking engine for a two-discipline competitive ladder",
    long_about = "Ladder Engine pairs queued participants across two disciplines in periodic \
                 epoch-aligned waves, maintains authoritative in-memory Elo ratings with an \
                 asynchronous durable write path, and publishes match lifecycle events over AMQP."
)]
struct Args {
    /// Configuration file path
    #[arg(
        short,
        long,
        value_name = "FILE",
        help = "Path to configuration file (TOML format)"
    )]
    config: Option<PathBuf>,

    /// Log level override
    #[arg(
        short,
        long,
        value_name = "LEVEL",
        help = "Override log level (trace, debug, info, warn, error)"
    )]
    log_level: Option<String>,

    /// AMQP URL override
    #[arg(long, value_name = "URL", help = "Override AMQP connection URL")]
    amqp_url: Option<String>,

    /// Health/metrics port override
    #[arg(long, value_name = "PORT", help = "Override health server port")]
    health_port: Option<u16>,

    /// Wave interval override in seconds
    #[arg(long, value_name = "SECONDS", help = "Override wave interval")]
    wave_interval: Option<u64>,

    /// Enable debug mode
    #[arg(short, long, help = "Enable debug mode with verbose logging")]
    debug: bool,

    /// Dry run mode (validate config and exit)
    #[arg(
        long,
        help = "Validate configuration and exit without starting service"
    )]
    dry_run: bool,

    /// Health check mode
    #[arg(long, help = "Perform a health check and exit")]
    health_check: bool,
}

/// Initialize structured logging with the configured level
fn init_logging(log_level: &str) -> Result<()> {
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| log_level.into()),
        )
        .with_target(false)
        .with_thread_ids(true)
        .with_line_number(true)
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .map_err(|e| anyhow::anyhow!("Failed to initialize logging: {}", e))?;

    Ok(())
}

/// Perform health check and return appropriate exit code
async fn perform_health_check(config: AppConfig) -> Result<()> {
    info!("Performing health check...");

    // Initialize minimal app state for health check
    let app_state = AppState::new(config).await?;
    let engine = app_state.engine();

    match engine.queue_len() {
        Ok(queued) => {
            println!("Health Check: healthy");
            println!("  Participants queued: {}", queued);
            for discipline in Discipline::ALL {
                let rated = engine.leaderboard(discipline)?;
                println!("  Rated participants ({}): {}", discipline, rated.len());
            }
            std::process::exit(0);
        }
        Err(e) => {
            error!("Health check failed: {}", e);
            std::process::exit(1);
        }
    }
}

/// Wait for shutdown signals (SIGINT, SIGTERM)
async fn wait_for_shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received SIGINT (Ctrl+C) signal");
        },
        _ = terminate => {
            info!("Received SIGTERM signal");
        },
    }
}

/// Display startup banner with service information
fn display_startup_banner(config: &AppConfig) {
    info!("Ladder Engine Matchmaking Service");
    info!("   Service: {}", config.service.name);
    info!("   Log level: {}", config.service.log_level);
    info!("   Health port: {}", config.service.health_port);
    info!(
        "   AMQP: {}",
        if config.amqp.enabled {
            config.amqp.url.as_str()
        } else {
            "disabled"
        }
    );
    info!(
        "   Wave interval: {}s (epoch-aligned)",
        config.matchmaking.wave_interval_seconds
    );
    info!("   Map pool: {} maps", config.matchmaking.map_pool.len());
}

/// Load and merge configuration from environment and CLI arguments
fn load_config(args: &Args) -> Result<AppConfig> {
    let mut config = if let Some(config_path) = &args.config {
        info!("Loading configuration from: {}", config_path.display());
        AppConfig::from_file(config_path)?
    } else {
        AppConfig::from_env()?
    };

    if let Some(log_level) = &args.log_level {
        config.service.log_level = log_level.clone();
    }
    if args.debug {
        config.service.log_level = "debug".to_string();
    }
    if let Some(amqp_url) = &args.amqp_url {
        config.amqp.url = amqp_url.clone();
        config.amqp.enabled = true;
    }
    if let Some(health_port) = args.health_port {
        config.service.health_port = health_port;
    }
    if let Some(wave_interval) = args.wave_interval {
        config.matchmaking.wave_interval_seconds = wave_interval;
    }

    Ok(config)
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config = load_config(&args).unwrap_or_else(|e| {
        eprintln!("Configuration error: {}", e);
        std::process::exit(1);
    });

    if let Err(e) = init_logging(&config.service.log_level) {
        eprintln!("Failed to initialize logging: {}", e);
        std::process::exit(1);
    }

    if args.dry_run {
        ladder_engine::config::validate_config(&config)?;
        info!("Configuration validation successful");
        display_startup_banner(&config);
        info!("Dry run completed - exiting without starting service");
        return Ok(());
    }

    if args.health_check {
        return perform_health_check(config).await;
    }

    display_startup_banner(&config);

    info!("Initializing service components...");
    let mut app_state = match AppState::new(config.clone()).await {
        Ok(state) => state,
        Err(e) => {
            error!("Failed to initialize application: {}", e);
            std::process::exit(1);
        }
    };

    if let Err(e) = app_state.start().await {
        error!("Failed to start service: {}", e);
        std::process::exit(1);
    }

    info!("Ladder engine service is running");
    info!("Press Ctrl+C to shutdown gracefully...");

    wait_for_shutdown_signal().await;

    info!("Shutdown signal received, beginning graceful shutdown...");
    let shutdown_timeout = config.shutdown_timeout();
    match tokio::time::timeout(shutdown_timeout, app_state.shutdown()).await {
        Ok(Ok(())) => info!("Graceful shutdown completed successfully"),
        Ok(Err(e)) => error!("Shutdown error: {}", e),
        Err(_) => warn!("Shutdown timeout exceeded, forcing exit"),
    }

    info!("Ladder engine service stopped");
    Ok(())
}
