use anyhow::{Context, Result};
use std::net::SocketAddr;
use std::path::PathBuf;

use crate::config::Config;
use crate::hub::HubServer;
use crate::metrics;

// ============================================================================
// Hub Server
// ============================================================================

/// Command line overrides for the hub server
#[derive(Debug, Clone, Default)]
pub struct ServeParams {
    pub config_path: PathBuf,
    pub bind_address: Option<SocketAddr>,
    pub leaf_timeout: Option<u64>,
    pub disable_cors: bool,
    pub disable_request_logging: bool,
}

impl ServeParams {
    /// Apply the overrides on top of the loaded configuration
    pub fn apply(&self, config: &mut Config) {
        if let Some(addr) = self.bind_address {
            config.server.bind_address = addr;
        }
        if let Some(secs) = self.leaf_timeout {
            config.server.leaf_timeout_secs = secs;
        }
        if self.disable_cors {
            config.server.enable_cors = false;
        }
        if self.disable_request_logging {
            config.server.enable_request_logging = false;
        }
    }
}

/// Start the hub server
pub async fn hub_server(mut config: Config, params: ServeParams) -> Result<()> {
    params.apply(&mut config);
    config.validate().context("Invalid configuration")?;

    metrics::init_metrics();

    let server = HubServer::from_config(&config).context("Failed to create hub server")?;
    server
        .reload_on_sighup(params.config_path.clone())
        .context("Failed to install SIGHUP handler")?;

    println!("{}", server.info().display());
    println!();
    println!("API Endpoints:");
    println!("  GET  /api/health                - Health check");
    println!("  GET  /api/satellites            - Registered satellites");
    println!("  GET  /metrics                   - Prometheus metrics endpoint");
    println!("  GET  /api/resources/_           - Resources from all selected clusters");
    println!("  ANY  /api/resources?satellite=  - Proxied to one satellite");
    println!("  GET  /api/resources/logs        - Proxied log stream");
    println!("  GET  /api/resources/terminal    - Proxied terminal (WebSocket)");
    println!("  GET  /api/resources/file        - Proxied file download and upload");
    println!();
    println!(
        "Hub server listening on http://{}",
        config.server.bind_address
    );
    println!("Send SIGHUP to reload satellites, Ctrl+C to stop.\n");

    // Start with graceful shutdown
    server
        .start_with_shutdown(async {
            match tokio::signal::ctrl_c().await {
                Ok(()) => {
                    tracing::info!("Shutdown signal received");
                }
                Err(e) => {
                    tracing::error!("Failed to wait for Ctrl+C: {}", e);
                }
            }
        })
        .await?;

    println!("Hub server stopped.");
    Ok(())
}
