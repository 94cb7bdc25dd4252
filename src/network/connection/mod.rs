//! Session - Handles one client connection from accept to close.
//!
//! Each session runs in its own Tokio task and moves through these phases:
//!
//! ```text
//! Negotiating ──(username)──▶ Queued ──(admitted)──▶ Active ──▶ Closed
//!      │                        ▲                       │
//!      └──(rejected)──▶ Closed  └──────(/switch)────────┘
//! ```
//!
//! Other tasks reach a session only through its [`SessionHandle`]: lines and
//! files are pushed into the bounded outbox, and a disconnect request is a
//! `Notify` permit. The session task alone writes to the socket.

mod admission;
mod command;
mod dispatch;
mod event_loop;
mod inbound;

use admission::Waited;
use event_loop::Transition;
use inbound::Inbound;

use crate::broadcaster::{self, server_line};
use crate::config::ServerConfig;
use crate::error::{ChannelError, SessionError};
use crate::state::{Channel, ChannelTable, Outbound, Presence, SessionHandle, SessionId};
use crate::telemetry::SessionGauge;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;
use tokio::net::tcp::OwnedWriteHalf;
use tokio::sync::{Notify, mpsc};
use tracing::{debug, info, instrument, warn};

/// Longest accepted username, in bytes.
pub const MAX_USERNAME_LEN: usize = 32;

/// Why an active or queued session ended.
#[derive(Debug)]
enum Departure {
    /// `/quit`.
    Quit,
    /// Idle timeout elapsed.
    Afk,
    /// Peer closed the connection.
    Disconnected,
    /// Kicked, emptied or shut down by the operator.
    Closed,
    /// Connection error.
    Fault(SessionError),
}

impl Departure {
    fn reason(&self) -> &'static str {
        match self {
            Self::Quit => "quit",
            Self::Afk => "afk",
            Self::Disconnected => "disconnected",
            Self::Closed => "closed",
            Self::Fault(_) => "fault",
        }
    }
}

/// A client connection handler.
pub struct Session {
    id: SessionId,
    addr: SocketAddr,
    table: Arc<ChannelTable>,
    config: Arc<ServerConfig>,
    /// The channel this session is queued in or a member of.
    channel: Arc<Channel>,
    inbound: Inbound,
    writer: OwnedWriteHalf,
    outbox_tx: mpsc::Sender<Outbound>,
    outbox_rx: mpsc::Receiver<Outbound>,
    disconnect: Arc<Notify>,
}

impl Session {
    pub fn new(
        id: SessionId,
        stream: TcpStream,
        addr: SocketAddr,
        channel: Arc<Channel>,
        table: Arc<ChannelTable>,
        config: Arc<ServerConfig>,
    ) -> Self {
        let (reader, writer) = stream.into_split();
        let (outbox_tx, outbox_rx) = mpsc::channel(config.outbox_capacity);
        Self {
            id,
            addr,
            inbound: Inbound::new(reader, config.read_chunk_size),
            table,
            config,
            channel,
            writer,
            outbox_tx,
            outbox_rx,
            disconnect: Arc::new(Notify::new()),
        }
    }

    /// Run the session to completion.
    #[instrument(skip(self), fields(session = %self.id, addr = %self.addr, channel = %self.channel.name()), name = "session")]
    pub async fn run(mut self) {
        let _gauge = SessionGauge::open();
        info!("Client connected");

        let handle = match self.negotiate().await {
            Ok(handle) => handle,
            Err(e) => {
                crate::metrics::record_session_error(e.error_code());
                match &e {
                    SessionError::Rejected(reason) => info!(reason = %reason, "Admission rejected"),
                    _ => debug!(error = %e, "Negotiation failed"),
                }
                let _ = self.writer.shutdown().await;
                return;
            }
        };

        let departure = loop {
            match self.await_admission(&handle).await {
                Waited::Admitted => {}
                Waited::Closed(departure) => break departure,
            }

            info!(user = %handle.username(), channel = %self.channel.name(), "Admitted");

            match self.active_loop(&handle).await {
                Transition::Switched(channel) => self.channel = channel,
                Transition::Closed(departure) => break departure,
            }
        };

        self.teardown(&handle, departure).await;
    }

    /// Read the username and enter the channel's admission queue.
    async fn negotiate(&mut self) -> Result<SessionHandle, SessionError> {
        let timeout = self.config.idle_timeout();
        let username = match tokio::time::timeout(timeout, self.inbound.next_message()).await {
            Ok(Ok(Some(username))) => username,
            Ok(Ok(None)) => return Err(SessionError::Disconnected),
            Ok(Err(e)) => return Err(e.into()),
            Err(_) => return Err(SessionError::NegotiationTimeout(timeout)),
        };

        if !is_valid_username(&username) {
            let error = ChannelError::InvalidUsername(self.channel.name().to_string());
            self.reply(&error.to_string()).await?;
            return Err(SessionError::Rejected(error));
        }

        let handle = SessionHandle::new(
            self.id,
            &username,
            self.outbox_tx.clone(),
            Arc::clone(&self.disconnect),
        );
        let channel = Arc::clone(&self.channel);
        if let Err(error) = channel.enqueue(handle.clone()) {
            self.reply(&error.to_string()).await?;
            return Err(SessionError::Rejected(error));
        }
        self.greet(&channel, &handle).await?;
        Ok(handle)
    }

    /// Send the welcome line for a freshly queued session.
    ///
    /// On a write failure the session is taken back out of `channel`.
    async fn greet(&mut self, channel: &Channel, handle: &SessionHandle) -> Result<(), SessionError> {
        let welcome = format!(
            "Welcome to the {} channel, {}.",
            channel.name(),
            handle.username()
        );
        if let Err(e) = self.reply(&welcome).await {
            channel.remove(handle.id());
            return Err(e);
        }
        Ok(())
    }

    /// Leave the current channel and close the connection.
    ///
    /// Only the actor that actually removes a member announces the
    /// departure; after a kick or `/empty` the removal here is a no-op.
    async fn teardown(&mut self, handle: &SessionHandle, departure: Departure) {
        let user = handle.username();
        let presence = self.channel.remove(handle.id());

        if presence == Some(Presence::Member) {
            let notice = match departure {
                Departure::Afk => format!("{user} went AFK."),
                _ => format!("{user} has left the channel."),
            };
            broadcaster::notify(&self.channel, &notice, None);
        }

        crate::metrics::record_session_closed(departure.reason());
        match &departure {
            Departure::Fault(e) => {
                crate::metrics::record_session_error(e.error_code());
                warn!(user = %user, error = %e, "Session ended by connection error");
            }
            other => info!(user = %user, reason = other.reason(), "Session closed"),
        }

        let _ = self.writer.shutdown().await;
    }

    /// Write a server message to this session's connection.
    async fn reply(&mut self, text: &str) -> Result<(), SessionError> {
        self.write_line(&server_line(text)).await
    }

    async fn write_line(&mut self, line: &str) -> Result<(), SessionError> {
        let mut framed = String::with_capacity(line.len() + 1);
        framed.push_str(line);
        framed.push('\n');
        self.writer.write_all(framed.as_bytes()).await?;
        Ok(())
    }

    async fn write_outbound(&mut self, message: Outbound) -> Result<(), SessionError> {
        match message {
            Outbound::Line(line) => self.write_line(&line).await,
            Outbound::File(contents) => {
                self.writer.write_all(&contents).await?;
                // Keep the next line from joining the file's last line.
                if !contents.ends_with(b"\n") {
                    self.writer.write_all(b"\n").await?;
                }
                Ok(())
            }
        }
    }

    /// Best-effort write of everything already queued, before closing.
    async fn flush_outbox(&mut self) {
        while let Ok(message) = self.outbox_rx.try_recv() {
            if self.write_outbound(message).await.is_err() {
                break;
            }
        }
    }
}

/// Non-empty, bounded, and free of whitespace and `:`.
fn is_valid_username(name: &str) -> bool {
    !name.is_empty()
        && name.len() <= MAX_USERNAME_LEN
        && !name.chars().any(|c| c.is_whitespace() || c == ':')
}
