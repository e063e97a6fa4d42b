// src/main.rs
mod config;
mod net;
mod session;

use anyhow::Result;
use packet_log::PacketLog;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    // -------- logging ----------
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env()
                .add_directive("world_relay=info".parse()?)
                .add_directive("packet_log=info".parse()?)
                .add_directive("tokio=warn".parse()?),
        )
        .compact()
        .init();

    // -------- config + capture ----------
    let cfg = config::Cli::parse_and_build_config()?;
    info!(?cfg, "world relay starting");

    packet_log::configure(cfg.capture.clone());
    let log = PacketLog::instance();
    log.initialize();

    // -------- listener ----------
    let listener = net::tcp::bind(&cfg).await?;
    info!(addr = %cfg.bind_addr, capture = log.can_log_packet(), "listening. Press Ctrl+C to stop");

    // -------- graceful shutdown ----------
    tokio::select! {
        res = session::accept_loop(listener, log) => {
            if let Err(e) = res {
                warn!("accept loop ended: {e:#}");
            }
        }
        res = tokio::signal::ctrl_c() => {
            if let Err(e) = res {
                warn!(?e, "failed to install Ctrl+C handler");
            }
            info!("shutdown signal received; exiting.");
        }
    }

    log.shutdown();
    let stats = log.stats();
    info!(
        records = stats.records_written,
        bytes = stats.bytes_written,
        failures = stats.write_failures,
        "packet capture summary"
    );
    Ok(())
}
