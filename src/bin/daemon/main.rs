//! gnmd - GlassNet management daemon
//!
//! Tracks the online state, addressing and firmware of GlassNet receivers
//! that hold a persistent TCP session with the daemon.

mod config;
mod lifecycle;
mod receiver;
mod server;
mod store;
mod utils;

use async_std::task;
use clap::Parser;
use std::path::PathBuf;
use tracing::{error, info};

use config::{Config, DEFAULT_CONFIG_PATH};
use lifecycle::{LifecycleDriver, ShutdownToken};
use receiver::coordinator::Coordinator;
use server::server::CommandServer;
use store::{DeviceStore, SqlDeviceStore};
use utils::error::Result;

/// GlassNet receiver management daemon
#[derive(Parser, Debug)]
#[command(name = "gnmd", version, about, long_about = None)]
struct Args {
    /// Configuration file
    #[arg(long, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,
}

#[async_std::main]
async fn main() -> std::result::Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    let config = Config::load(&args.config)?;
    let _log_guard = utils::tracing::setup_tracing(&config.logging)?;

    if let Err(e) = run(config).await {
        error!("gnmd stopped: {}", e);
        return Err(e.into());
    }
    Ok(())
}

async fn run(config: Config) -> Result<()> {
    info!("Starting gnmd {}", env!("CARGO_PKG_VERSION"));

    let store = SqlDeviceStore::connect(
        &config.mysql.connection_url(),
        config.mysql.max_connections,
    )
    .await?;
    store.ping().await?;

    let (server, events) = CommandServer::bind(
        config.server.listen_address(),
        config.server.max_line_length,
    )
    .await?;
    info!("Listening for receivers on {}", server.local_addr()?);

    let mut coordinator = Coordinator::new(store, server.handle());
    // Clear whatever a previous run left behind
    coordinator.reset_all_offline().await?;

    let token = ShutdownToken::new();
    let signals = lifecycle::listen_for_signals(token.clone())?;

    task::spawn(server.run());

    let result = LifecycleDriver::new(&config.lifecycle, token)
        .run(&mut coordinator, events)
        .await;
    signals.close();

    info!("gnmd exiting");
    result
}
