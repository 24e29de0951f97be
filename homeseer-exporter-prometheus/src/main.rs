//! Prometheus exporter for HomeSeer device status.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use homeseer_status::StatusClient;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use homeseer_exporter_prometheus::{
    Bridge, BridgeOptions, ExporterConfig, HttpServer, Scheduler, init_tracing,
};

/// Prometheus exporter for HomeSeer device status.
#[derive(Parser, Debug)]
#[command(name = "homeseer-exporter-prometheus")]
#[command(about = "Export HomeSeer device readings as Prometheus metrics")]
#[command(version)]
struct Args {
    /// Path to configuration file (JSON5 format).
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// HTTP listen address (overrides config).
    #[arg(long)]
    listen: Option<String>,

    /// HomeSeer host:port (overrides config).
    #[arg(long)]
    hs4: Option<String>,

    /// HomeSeer username (overrides config).
    #[arg(long)]
    user: Option<String>,

    /// HomeSeer password (overrides config).
    #[arg(long)]
    pass: Option<String>,

    /// Log level (trace, debug, info, warn, error). Overrides config.
    #[arg(long)]
    log_level: Option<String>,
}

impl Args {
    fn apply(self, config: &mut ExporterConfig) {
        if let Some(listen) = self.listen {
            config.prometheus.listen = listen;
        }
        if let Some(hs4) = self.hs4 {
            config.homeseer.host_port = hs4;
        }
        if let Some(user) = self.user {
            config.homeseer.username = user;
        }
        if let Some(pass) = self.pass {
            config.homeseer.password = pass;
        }
        if let Some(level) = self.log_level {
            config.logging.level = level;
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Load configuration, then let the command line win
    let mut config = match &args.config {
        Some(path) => ExporterConfig::load_from_file(path)?,
        None => ExporterConfig::default(),
    };
    args.apply(&mut config);
    config.validate()?;

    init_tracing(&config.logging)?;

    info!(
        hub = %config.homeseer.host_port,
        mode = ?config.polling.mode,
        "Starting HomeSeer Prometheus Exporter"
    );

    let listen_addr: SocketAddr = config
        .prometheus
        .listen
        .parse()
        .map_err(|e| anyhow::anyhow!("Invalid listen address: {}", e))?;

    let client = StatusClient::new(
        config.homeseer.host_port.clone(),
        config.homeseer.credentials()?,
    );
    let bridge = Arc::new(Bridge::new(
        BridgeOptions::from(&config),
        Arc::new(client),
        |e| error!(error = %e, "Polling HomeSeer failed"),
    )?);

    let shutdown = CancellationToken::new();

    let scheduler = Scheduler::start(
        config.polling.mode,
        bridge.clone(),
        Duration::from_secs(config.polling.interval_secs),
        &shutdown,
    );

    let http_server = HttpServer::new(
        bridge.clone(),
        listen_addr,
        config.prometheus.path.clone(),
        config.polling.mode,
    );
    let http_shutdown = shutdown.child_token();
    let http_task = tokio::spawn(async move {
        if let Err(e) = http_server.run(http_shutdown).await {
            error!("HTTP server error: {}", e);
        }
    });

    wait_for_signal().await?;

    shutdown.cancel();
    scheduler.close().await;

    if tokio::time::timeout(Duration::from_secs(5), http_task)
        .await
        .is_err()
    {
        error!("HTTP server did not stop within 5s");
    }

    let stats = bridge.stats();
    info!(
        polls_attempted = stats.polls_attempted,
        polls_failed = stats.polls_failed,
        devices_published = stats.devices_published,
        devices_skipped = stats.devices_skipped,
        series_count = bridge.registry().series_count(),
        "Final statistics"
    );

    info!("Exporter stopped");
    Ok(())
}

async fn wait_for_signal() -> anyhow::Result<()> {
    #[cfg(unix)]
    {
        let mut sigterm =
            tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())?;
        tokio::select! {
            result = tokio::signal::ctrl_c() => {
                result?;
                info!("Received Ctrl+C, shutting down...");
            }
            _ = sigterm.recv() => {
                info!("Received SIGTERM, shutting down...");
            }
        }
    }

    #[cfg(not(unix))]
    {
        tokio::signal::ctrl_c().await?;
        info!("Received Ctrl+C, shutting down...");
    }

    Ok(())
}
