//! channeld - multi-channel chat daemon
//!
//! Every configured channel listens on its own port with a fixed capacity
//! and a FIFO admission queue. An operator console on stdin can mute, kick,
//! empty channels and shut the server down.

mod admin;
mod broadcaster;
mod config;
mod error;
mod http;
mod metrics;
mod network;
mod state;
mod telemetry;

use crate::admin::{AdminController, ConsoleExit};
use crate::config::{LogFormat, Settings, load_channels};
use crate::network::Gateway;
use crate::state::ChannelTable;
use anyhow::Context;
use std::sync::Arc;
use tokio::io::BufReader;
use tokio::sync::broadcast;
use tokio_util::task::TaskTracker;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

const USAGE: &str = "usage: channeld <channel-config> [settings.toml]";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args: Vec<String> = std::env::args().skip(1).collect();
    let (channel_path, settings_path) = match args.as_slice() {
        [channels] => (channels.as_str(), None),
        [channels, settings] => (channels.as_str(), Some(settings.as_str())),
        _ => anyhow::bail!(USAGE),
    };

    let settings = match settings_path {
        Some(path) => Settings::load(path)?,
        None => Settings::default(),
    };

    init_tracing(settings.logging.format);

    if let Err(errors) = config::validation::validate(&settings) {
        for e in &errors {
            error!(error = %e, "Invalid setting");
        }
        anyhow::bail!("{} invalid setting(s)", errors.len());
    }

    let definitions = load_channels(channel_path, &settings.channels).map_err(|e| {
        error!(path = %channel_path, error = %e, "Failed to load channel config");
        e
    })?;
    let table = Arc::new(ChannelTable::new(definitions));
    let server = Arc::new(settings.server);

    info!(channels = table.count(), bind = %server.bind_address, "Starting channeld");

    if let Some(port) = server.metrics_port.filter(|&p| p != 0) {
        metrics::init();
        tokio::spawn(http::run_http_server(server.bind_address, port));
    }

    let gateway = Gateway::bind(Arc::clone(&table), Arc::clone(&server))
        .await
        .context("failed to start listeners")?;

    let tracker = TaskTracker::new();
    let (shutdown_tx, _) = broadcast::channel::<()>(1);
    let acceptors = gateway.spawn(&tracker, &shutdown_tx);

    let console = AdminController::new(Arc::clone(&table));
    let stdin = BufReader::new(tokio::io::stdin());
    tokio::select! {
        exit = console.run(stdin) => match exit {
            ConsoleExit::Shutdown => info!("Shutdown requested from console"),
            ConsoleExit::Closed => {
                warn!("Console input closed; waiting for Ctrl-C");
                wait_for_ctrl_c().await;
            }
        },
        _ = wait_for_ctrl_c() => {}
    }

    // Stop accepting, then close every session.
    let _ = shutdown_tx.send(());
    for acceptor in acceptors {
        let _ = acceptor.await;
    }
    admin::shutdown(&table);

    tracker.close();
    if tokio::time::timeout(server.shutdown_grace(), tracker.wait())
        .await
        .is_err()
    {
        warn!(remaining = tracker.len(), "Shutdown grace period elapsed");
    }
    info!("Shutdown complete");

    // The blocking stdin reader cannot be cancelled; exit without waiting on it.
    std::process::exit(0);
}

fn init_tracing(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(true);
    match format {
        LogFormat::Pretty => builder.init(),
        LogFormat::Json => builder.json().init(),
    }
}

async fn wait_for_ctrl_c() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(error = %e, "Failed to listen for Ctrl-C");
        std::future::pending::<()>().await;
    }
    info!("Ctrl-C received");
}
