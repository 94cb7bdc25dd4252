//! Operator console: reads admin commands from a line stream (stdin in the
//! server) and applies them to channel state.
//!
//! Replies go to the console transcript. Mutations take the same channel
//! guards as client sessions; affected sessions are reached only through
//! their handles.

mod command;

pub use command::AdminCommand;

use crate::broadcaster::{self, server_line};
use crate::error::ChannelError;
use crate::state::ChannelTable;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tracing::{info, warn};

/// Why the console loop stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsoleExit {
    /// `/shutdown` was entered.
    Shutdown,
    /// The input stream ended.
    Closed,
}

pub struct AdminController {
    table: Arc<ChannelTable>,
}

impl AdminController {
    pub fn new(table: Arc<ChannelTable>) -> Self {
        Self { table }
    }

    /// Process console lines until `/shutdown` or end of input.
    ///
    /// Shutdown itself is left to the caller; see [`shutdown`].
    pub async fn run<R>(&self, input: R) -> ConsoleExit
    where
        R: AsyncBufRead + Unpin,
    {
        let mut lines = input.lines();
        loop {
            let line = match lines.next_line().await {
                Ok(Some(line)) => line,
                Ok(None) => return ConsoleExit::Closed,
                Err(e) => {
                    warn!(error = %e, "Console read failed");
                    return ConsoleExit::Closed;
                }
            };
            let line = line.trim();
            if line.is_empty() {
                continue;
            }

            let command = match line.parse::<AdminCommand>() {
                Ok(command) => command,
                Err(e) => {
                    broadcaster::announce(&e.to_string());
                    continue;
                }
            };
            if command == AdminCommand::Shutdown {
                crate::metrics::record_admin_command(command.name());
                return ConsoleExit::Shutdown;
            }

            match self.execute(command) {
                Ok(reply) => broadcaster::announce(&reply),
                Err(e) => broadcaster::announce(&e.to_string()),
            }
        }
    }

    /// Apply a channel command, returning the console reply.
    pub fn execute(&self, command: AdminCommand) -> Result<String, ChannelError> {
        let _span = crate::telemetry::spans::admin_command(command.name()).entered();
        crate::metrics::record_admin_command(command.name());

        match command {
            AdminCommand::Shutdown => {
                shutdown(&self.table);
                Ok("Shutdown requested.".to_string())
            }
            AdminCommand::Mute {
                channel,
                user,
                seconds,
            } => self.mute(&channel, &user, seconds),
            AdminCommand::Kick { channel, user } => self.kick(&channel, &user),
            AdminCommand::Empty { channel } => self.empty(&channel),
        }
    }

    fn mute(&self, channel: &str, user: &str, seconds: u32) -> Result<String, ChannelError> {
        let channel = self.table.lookup(channel)?;
        let target = channel
            .mute(user, Duration::from_secs(u64::from(seconds)))
            .ok_or_else(|| ChannelError::UserNotHere(user.to_string()))?;

        target.send_line(server_line(&format!(
            "You have been muted for {seconds} seconds."
        )));
        broadcaster::fan_out(
            channel,
            &server_line(&format!("{user} has been muted for {seconds} seconds.")),
            Some(target.id()),
        );
        info!(channel = %channel.name(), user, seconds, "User muted");
        Ok(format!("Muted {user} for {seconds} seconds."))
    }

    fn kick(&self, channel_name: &str, user: &str) -> Result<String, ChannelError> {
        let channel = self.table.lookup(channel_name)?;
        let kicked = channel
            .kick(user)
            .ok_or_else(|| ChannelError::NotInChannel {
                user: user.to_string(),
                channel: channel_name.to_string(),
            })?;

        let notice = server_line(&format!("{user} has left the channel."));
        kicked.send_line(notice.clone());
        kicked.disconnect();
        broadcaster::fan_out(channel, &notice, None);
        info!(channel = %channel_name, user, "User kicked");
        Ok(format!("Kicked {user}."))
    }

    fn empty(&self, channel_name: &str) -> Result<String, ChannelError> {
        let channel = self.table.lookup(channel_name)?;
        let evicted = channel.evict_all();
        for handle in &evicted {
            handle.disconnect();
        }
        info!(channel = %channel_name, evicted = evicted.len(), "Channel emptied");
        Ok(format!("{channel_name} has been emptied."))
    }
}

/// Close every session in every channel, members and queue alike, and
/// print the shutdown notice.
pub fn shutdown(table: &ChannelTable) {
    let notice = server_line("The server is shutting down.");
    let mut closed = 0;
    for channel in table.iter() {
        for handle in channel.evict_all() {
            handle.send_line(notice.clone());
            handle.disconnect();
            closed += 1;
        }
    }
    broadcaster::echo(&notice);
    info!(sessions = closed, "Shutdown: all sessions closed");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ChannelDefinition;
    use crate::state::SessionIdGenerator;
    use crate::state::testing::TestSession;

    fn table() -> Arc<ChannelTable> {
        Arc::new(
            ChannelTable::new(vec![
                ChannelDefinition {
                    name: "general".into(),
                    port: 80,
                    capacity: 5,
                },
                ChannelDefinition {
                    name: "lobby".into(),
                    port: 81,
                    capacity: 5,
                },
            ]),
        )
    }

    fn member(table: &ChannelTable, ids: &SessionIdGenerator, channel: &str, name: &str) -> TestSession {
        let session = TestSession::new(ids, name);
        let channel = table.get(channel).unwrap();
        channel.enqueue(session.handle.clone()).unwrap();
        channel.try_admit(session.handle.id(), None);
        session
    }

    #[test]
    fn test_mute_notifies_target_and_channel() {
        let ids = SessionIdGenerator::new();
        let table = table();
        let admin = AdminController::new(Arc::clone(&table));
        let mut alice = member(&table, &ids, "general", "alice");
        let mut bob = member(&table, &ids, "general", "bob");

        let reply = admin
            .execute("/mute general:alice 30".parse().unwrap())
            .unwrap();
        assert_eq!(reply, "Muted alice for 30 seconds.");

        let to_alice = alice.lines();
        assert_eq!(to_alice.len(), 1);
        assert!(to_alice[0].ends_with("You have been muted for 30 seconds."));
        let to_bob = bob.lines();
        assert_eq!(to_bob.len(), 1);
        assert!(to_bob[0].ends_with("alice has been muted for 30 seconds."));

        let remaining = table.get("general").unwrap().mute_remaining("alice").unwrap();
        assert!(remaining > Duration::from_secs(29));
    }

    #[test]
    fn test_mute_reports_absent_targets() {
        let table = table();
        let admin = AdminController::new(Arc::clone(&table));

        let err = admin
            .execute("/mute general:ghost 10".parse().unwrap())
            .unwrap_err();
        assert_eq!(err.to_string(), "ghost is not here.");

        let err = admin
            .execute("/mute attic:ghost 10".parse().unwrap())
            .unwrap_err();
        assert_eq!(err.to_string(), "attic does not exist.");
    }

    #[tokio::test]
    async fn test_kick_notifies_and_disconnects() {
        let ids = SessionIdGenerator::new();
        let table = table();
        let admin = AdminController::new(Arc::clone(&table));
        let mut alice = member(&table, &ids, "general", "alice");
        let mut bob = member(&table, &ids, "general", "bob");

        assert_eq!(
            admin.execute("/kick general:bob".parse().unwrap()).unwrap(),
            "Kicked bob."
        );

        assert!(bob.lines()[0].ends_with("bob has left the channel."));
        tokio::time::timeout(Duration::from_millis(100), bob.disconnect.notified())
            .await
            .expect("kicked session should be told to disconnect");
        assert!(alice.lines()[0].ends_with("bob has left the channel."));
        assert_eq!(table.get("general").unwrap().occupancy().members, 1);
    }

    #[test]
    fn test_kick_absent_user_changes_nothing() {
        let ids = SessionIdGenerator::new();
        let table = table();
        let admin = AdminController::new(Arc::clone(&table));
        let mut alice = member(&table, &ids, "general", "alice");

        let err = admin
            .execute("/kick general:bob".parse().unwrap())
            .unwrap_err();
        assert_eq!(err.to_string(), "bob is not in general.");
        assert!(alice.lines().is_empty());
        assert_eq!(table.get("general").unwrap().occupancy().members, 1);
    }

    #[test]
    fn test_empty_clears_only_that_channel() {
        let ids = SessionIdGenerator::new();
        let table = table();
        let admin = AdminController::new(Arc::clone(&table));
        let _members: Vec<_> = (0..6)
            .map(|i| member(&table, &ids, "general", &format!("u{i}")))
            .collect();
        let _other = member(&table, &ids, "lobby", "carol");

        assert_eq!(
            admin.execute("/empty general".parse().unwrap()).unwrap(),
            "general has been emptied."
        );
        assert_eq!(table.listing(), "[ Channel ] general 0/5/0\n[ Channel ] lobby 1/5/0");

        let err = admin.execute("/empty attic".parse().unwrap()).unwrap_err();
        assert_eq!(err.to_string(), "attic does not exist.");
    }

    #[tokio::test]
    async fn test_run_stops_on_shutdown_or_eof() {
        let admin = AdminController::new(table());
        let input: &[u8] = b"\n/bogus\n/shutdown\n/empty general\n";
        assert_eq!(admin.run(input).await, ConsoleExit::Shutdown);

        let input: &[u8] = b"/empty general\n";
        assert_eq!(admin.run(input).await, ConsoleExit::Closed);
    }

    #[test]
    fn test_shutdown_closes_members_and_queue() {
        let ids = SessionIdGenerator::new();
        let table = table();
        let mut sessions: Vec<_> = (0..6)
            .map(|i| member(&table, &ids, "general", &format!("u{i}")))
            .collect();

        shutdown(&table);

        for session in &mut sessions {
            assert!(session.lines()[0].ends_with("The server is shutting down."));
        }
        assert_eq!(table.get("general").unwrap().occupancy().queued, 0);
        assert_eq!(table.get("general").unwrap().occupancy().members, 0);
    }
}
