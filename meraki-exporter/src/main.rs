//! Prometheus exporter for Meraki dashboard organizations.

use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use secrecy::SecretString;
use tokio::sync::watch;
use tracing::{error, info};

use meraki_dashboard::DashboardClient;
use meraki_exporter::{ExporterConfig, HttpServer, Scraper, init_tracing};

/// Prometheus exporter for Meraki dashboard organizations.
#[derive(Parser, Debug)]
#[command(name = "meraki-exporter")]
#[command(about = "Export Meraki dashboard telemetry as Prometheus metrics")]
#[command(version)]
struct Args {
    /// Dashboard API key.
    #[arg(short = 'k', long, env = "MERAKI_API_KEY", hide_env_values = true)]
    api_key: Option<String>,

    /// HTTP listen port (overrides config).
    #[arg(short, long)]
    port: Option<u16>,

    /// HTTP bind address (overrides config).
    #[arg(short = 'i', long)]
    bind: Option<IpAddr>,

    /// Collect site-to-site VPN metrics.
    #[arg(long)]
    vpn: bool,

    /// Collect switch port and wireless usage metrics.
    #[arg(long)]
    usage: bool,

    /// Path to configuration file (JSON5 format).
    #[arg(short, long)]
    config: Option<String>,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long)]
    log_level: Option<String>,

    /// Per-scrape deadline in seconds (overrides config).
    #[arg(long)]
    scrape_timeout: Option<u64>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Load configuration
    let mut config = if let Some(config_path) = &args.config {
        ExporterConfig::load_from_file(config_path)?
    } else {
        ExporterConfig::default()
    };

    apply_overrides(&mut config, &args)?;
    config.validate()?;

    init_tracing(&config.logging);

    let api_key = args
        .api_key
        .clone()
        .or_else(|| config.dashboard.api_key.clone())
        .filter(|key| !key.is_empty())
        .ok_or_else(|| anyhow::anyhow!("No API key: pass --api-key or set MERAKI_API_KEY"))?;

    info!(
        vpn = config.collect.vpn,
        usage = config.collect.usage,
        "Starting Meraki exporter"
    );

    let client = DashboardClient::new(&config.dashboard.transport(SecretString::from(api_key)))?;
    let scraper = Arc::new(Scraper::new(client, &config));
    let http_server = HttpServer::new(scraper, config.exporter.listen_addr()?);

    // Create shutdown signal
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let http_task = tokio::spawn(async move {
        if let Err(e) = http_server.run(shutdown_rx).await {
            error!("HTTP server error: {}", e);
        }
    });

    // Wait for shutdown signal
    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl+C, shutting down...");
        }
        _ = terminate() => {
            info!("Received SIGTERM, shutting down...");
        }
    }

    shutdown_tx.send(true)?;

    let _ = tokio::time::timeout(Duration::from_secs(5), http_task).await;

    info!("Exporter stopped");
    Ok(())
}

fn apply_overrides(config: &mut ExporterConfig, args: &Args) -> anyhow::Result<()> {
    if args.port.is_some() || args.bind.is_some() {
        let current = config.exporter.listen_addr()?;
        let addr = SocketAddr::new(
            args.bind.unwrap_or(current.ip()),
            args.port.unwrap_or(current.port()),
        );
        config.exporter.listen = addr.to_string();
    }
    if args.vpn {
        config.collect.vpn = true;
    }
    if args.usage {
        config.collect.usage = true;
    }
    if let Some(level) = &args.log_level {
        config.logging.level = level.clone();
    }
    if let Some(secs) = args.scrape_timeout {
        config.scrape.timeout_secs = secs;
    }
    Ok(())
}

async fn terminate() {
    #[cfg(unix)]
    {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!("Cannot listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    }
    #[cfg(not(unix))]
    {
        std::future::pending::<()>().await;
    }
}
