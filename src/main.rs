use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::net::SocketAddr;
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use satellite_hub::commands::{check_config, hub_server, ServeParams};
use satellite_hub::config::Config;

#[derive(Parser)]
#[command(
    name = "satellite-hub",
    version,
    about = "Hub that fans resource queries out to satellite clusters and proxies satellite traffic",
    long_about = None
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file
    #[arg(short, long, global = true, default_value = "config.toml")]
    config: PathBuf,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Log format (text, json), overrides the configuration file
    #[arg(long, global = true)]
    log_format: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the hub server
    Serve {
        /// Bind address, overrides the configuration file
        #[arg(short, long)]
        bind: Option<SocketAddr>,

        /// Timeout for one satellite list call in seconds
        #[arg(long)]
        leaf_timeout: Option<u64>,

        /// Disable CORS
        #[arg(long, default_value = "false")]
        no_cors: bool,

        /// Disable request logging
        #[arg(long, default_value = "false")]
        no_request_logging: bool,
    },

    /// Validate the configuration file and exit
    CheckConfig,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Serve {
            bind,
            leaf_timeout,
            no_cors,
            no_request_logging,
        } => {
            let config = Config::load(&cli.config)
                .with_context(|| format!("Failed to load {}", cli.config.display()))?;

            let format = cli.log_format.as_deref().unwrap_or(&config.logging.format);
            setup_tracing(format, &config.logging.level, cli.verbose)?;

            tracing::info!(
                config = %cli.config.display(),
                satellites = config.satellites.len(),
                "satellite-hub starting"
            );

            hub_server(
                config,
                ServeParams {
                    config_path: cli.config,
                    bind_address: bind,
                    leaf_timeout,
                    disable_cors: no_cors,
                    disable_request_logging: no_request_logging,
                },
            )
            .await?;
        }

        Commands::CheckConfig => {
            setup_tracing(cli.log_format.as_deref().unwrap_or("text"), "info", cli.verbose)?;
            check_config(&cli.config)?;
        }
    }

    Ok(())
}

fn setup_tracing(format: &str, level: &str, verbose: bool) -> Result<()> {
    let env_filter = if verbose {
        tracing_subscriber::EnvFilter::new("satellite_hub=debug,tower_http=debug,info")
    } else {
        tracing_subscriber::EnvFilter::try_from_default_env()
            .or_else(|_| {
                tracing_subscriber::EnvFilter::try_new(format!("satellite_hub={level},warn"))
            })
            .context("Invalid log level")?
    };

    match format {
        "json" => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().json())
                .init();
        }
        _ => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().pretty())
                .init();
        }
    }

    Ok(())
}
