//! Gateway - per-channel TCP listeners that accept incoming connections.
//!
//! Every channel gets its own listener on its configured port. Each accepted
//! connection becomes a [`Session`] task tracked by the shared `TaskTracker`,
//! so shutdown can wait for sessions to flush their final notices.

use crate::config::ServerConfig;
use crate::network::Session;
use crate::state::{Channel, ChannelTable, SessionIdGenerator};
use crate::telemetry::spans;
use anyhow::Context;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio_util::task::TaskTracker;
use tracing::{Instrument, error, info};

/// Bound listeners for every channel in the table.
pub struct Gateway {
    listeners: Vec<(Arc<Channel>, TcpListener)>,
    table: Arc<ChannelTable>,
    config: Arc<ServerConfig>,
    ids: Arc<SessionIdGenerator>,
}

impl Gateway {
    /// Bind one listener per channel.
    ///
    /// Fails on the first port that cannot be bound.
    pub async fn bind(table: Arc<ChannelTable>, config: Arc<ServerConfig>) -> anyhow::Result<Self> {
        let mut listeners = Vec::with_capacity(table.count());
        for channel in table.iter() {
            let addr = SocketAddr::new(config.bind_address, channel.port());
            let listener = TcpListener::bind(addr)
                .await
                .with_context(|| format!("failed to bind channel '{}' on {addr}", channel.name()))?;
            println!("Channel '{}' started on port {}", channel.name(), channel.port());
            info!(channel = %channel.name(), %addr, capacity = channel.capacity(), "Listener bound");
            listeners.push((Arc::clone(channel), listener));
        }

        Ok(Self {
            listeners,
            table,
            config,
            ids: Arc::new(SessionIdGenerator::new()),
        })
    }

    /// Start one acceptor task per channel.
    ///
    /// Acceptors stop when `shutdown` fires; sessions are spawned on
    /// `tracker`.
    pub fn spawn(self, tracker: &TaskTracker, shutdown: &broadcast::Sender<()>) -> Vec<JoinHandle<()>> {
        self.listeners
            .into_iter()
            .map(|(channel, listener)| {
                let span = spans::acceptor(channel.name(), channel.port());
                let acceptor = Acceptor {
                    channel,
                    listener,
                    table: Arc::clone(&self.table),
                    config: Arc::clone(&self.config),
                    ids: Arc::clone(&self.ids),
                    tracker: tracker.clone(),
                };
                tokio::spawn(acceptor.run(shutdown.subscribe()).instrument(span))
            })
            .collect()
    }
}

struct Acceptor {
    channel: Arc<Channel>,
    listener: TcpListener,
    table: Arc<ChannelTable>,
    config: Arc<ServerConfig>,
    ids: Arc<SessionIdGenerator>,
    tracker: TaskTracker,
}

impl Acceptor {
    async fn run(self, mut shutdown: broadcast::Receiver<()>) {
        loop {
            tokio::select! {
                _ = shutdown.recv() => {
                    info!("Acceptor stopping");
                    break;
                }
                accepted = self.listener.accept() => match accepted {
                    Ok((stream, addr)) => {
                        let id = self.ids.next();
                        info!(session = %id, %addr, "Connection accepted");
                        let session = Session::new(
                            id,
                            stream,
                            addr,
                            Arc::clone(&self.channel),
                            Arc::clone(&self.table),
                            Arc::clone(&self.config),
                        );
                        self.tracker.spawn(session.run());
                    }
                    Err(e) => {
                        error!(error = %e, "Failed to accept connection");
                    }
                },
            }
        }
    }
}
