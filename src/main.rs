//! Gossip chat daemon - Main binary

use clap::{Parser, Subcommand};
use gossipd_core::{Config, Server};
use std::path::PathBuf;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

/// Gossip chat daemon - a single-server IRC-style chat server
#[derive(Parser)]
#[command(name = "gossipd")]
#[command(about = "A single-server IRC-style chat daemon")]
#[command(version)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, default_value = "config.toml")]
    config: PathBuf,

    /// Log level
    #[arg(short, long, default_value = "info")]
    log_level: String,

    /// Override the listening port
    #[arg(short, long)]
    port: Option<u16>,

    /// Override the bind address
    #[arg(short, long)]
    bind: Option<String>,

    /// Test configuration and exit
    #[arg(long)]
    test_config: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate a default configuration file
    Config {
        /// Output file path
        #[arg(short, long, default_value = "config.toml")]
        output: PathBuf,
    },
    /// Show server information
    Info,
    /// Show version information
    Version,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    init_logging(&cli.log_level)?;

    // Handle subcommands
    if let Some(command) = cli.command {
        match command {
            Commands::Config { output } => {
                generate_config(&output)?;
                return Ok(());
            }
            Commands::Info => {
                show_info();
                return Ok(());
            }
            Commands::Version => {
                show_version();
                return Ok(());
            }
        }
    }

    // Load configuration
    let mut config = if cli.config.exists() {
        info!("Loading configuration from {:?}", cli.config);
        Config::from_file(&cli.config)?
    } else {
        info!("Configuration file not found, using defaults");
        Config::default()
    };

    if let Some(port) = cli.port {
        config.connection.port = port;
    }
    if let Some(bind) = cli.bind {
        config.connection.bind_address = bind;
    }

    // Test configuration if requested
    if cli.test_config {
        config.validate()?;
        info!("Configuration is valid");
        return Ok(());
    }

    let server = Server::new(config)?;

    // Stop accepting on Ctrl-C and let sessions close cleanly
    let signal_server = server.clone();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("Interrupt received, shutting down");
                signal_server.shutdown();
            }
            Err(e) => error!("Failed to listen for interrupt: {}", e),
        }
    });

    info!("Starting gossipd...");
    server.start().await?;

    Ok(())
}

/// Initialize logging. `RUST_LOG` wins over `--log-level` when set.
fn init_logging(level: &str) -> anyhow::Result<()> {
    let log_level = match level.to_lowercase().as_str() {
        "trace" => tracing::Level::TRACE,
        "debug" => tracing::Level::DEBUG,
        "info" => tracing::Level::INFO,
        "warn" => tracing::Level::WARN,
        "error" => tracing::Level::ERROR,
        _ => tracing::Level::INFO,
    };

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(log_level.as_str().to_lowercase()));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(true)
        .with_thread_names(true)
        .try_init()
        .map_err(|e| anyhow::anyhow!("Failed to initialize logging: {}", e))?;

    Ok(())
}

/// Generate default configuration file
fn generate_config(output: &PathBuf) -> anyhow::Result<()> {
    let config = Config::default();
    config.to_file(output)?;
    println!("Generated default configuration file: {:?}", output);
    Ok(())
}

/// Show server information
fn show_info() {
    println!("gossipd");
    println!("=======");
    println!("Version: {}", env!("CARGO_PKG_VERSION"));
    println!("Description: {}", env!("CARGO_PKG_DESCRIPTION"));
    println!("Repository: {}", env!("CARGO_PKG_REPOSITORY"));
    println!("License: {}", env!("CARGO_PKG_LICENSE"));
    println!();
    println!("Features:");
    println!("  - RFC 1459 line protocol");
    println!("  - Atomic nickname and channel registry");
    println!("  - Channel operators, keys and ban masks");
    println!("  - Per-session outbound queues with slow consumer cutoff");
    println!("  - Ping based liveness checks");
}

/// Show version information
fn show_version() {
    println!("gossipd {}", env!("CARGO_PKG_VERSION"));
}
