//! Zones Game Server
//!
//! Authoritative server binary: one process, one match. Players join over
//! WebSocket with their real-world coordinates; the server shrinks the safe
//! zone every two minutes and damages anyone caught outside every five
//! seconds.

use anyhow::Context;
use tracing::info;
use tracing_subscriber::EnvFilter;

use zones::network::{GameServer, ServerConfig};
use zones::{DAMAGE_INTERVAL_SECS, VERSION, ZONE_INTERVAL_SECS};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let port: u16 = match std::env::var("PORT") {
        Ok(raw) => raw.parse().context("PORT must be a valid port number")?,
        Err(_) => 2567,
    };

    let config = ServerConfig {
        bind_addr: ([0, 0, 0, 0], port).into(),
        ..Default::default()
    };

    info!("Zones Server v{}", VERSION);
    info!("Zone interval: {}s", ZONE_INTERVAL_SECS);
    info!("Damage interval: {}s", DAMAGE_INTERVAL_SECS);

    let server = GameServer::new(config);
    server.run().await?;

    Ok(())
}
