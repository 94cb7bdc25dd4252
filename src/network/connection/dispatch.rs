//! Client command dispatch for active sessions.

use super::command::ClientCommand;
use super::event_loop::Transition;
use super::{Departure, Session};
use crate::broadcaster;
use crate::error::{ChannelError, SessionError};
use crate::state::{Outbound, Presence, SessionHandle};
use bytes::Bytes;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

impl Session {
    /// Handle one inbound message.
    ///
    /// `Ok(Some(_))` ends the active loop; errors are connection faults.
    pub(super) async fn dispatch(
        &mut self,
        handle: &SessionHandle,
        text: &str,
    ) -> Result<Option<Transition>, SessionError> {
        let command = ClientCommand::parse(text);
        crate::metrics::record_command(command.name());

        if let Some(remaining) = self.channel.mute_remaining(handle.username()) {
            let notice = format!("You are still muted for {} seconds.", ceil_secs(remaining));
            self.reply(&notice).await?;
            return Ok(None);
        }

        match command {
            ClientCommand::Quit => return Ok(Some(Transition::Closed(Departure::Quit))),
            ClientCommand::List => {
                let listing = self.table.listing();
                self.write_line(&listing).await?;
            }
            ClientCommand::Switch(target) => return self.switch(handle, &target).await,
            ClientCommand::Send { target, path } => {
                self.send_file(handle, &target, &path).await?
            }
            ClientCommand::Whisper { target, text } => self.whisper(handle, &target, &text).await?,
            ClientCommand::Say(text) => {
                broadcaster::relay(&self.channel, handle, &text);
            }
            ClientCommand::Usage(usage) => self.reply(usage).await?,
        }
        Ok(None)
    }

    /// Move into another channel's admission queue.
    ///
    /// The origin guard and the destination guard are taken one after the
    /// other, never together. If the name is taken in the destination between
    /// the check and the enqueue, the session goes to the back of its origin
    /// queue instead.
    async fn switch(
        &mut self,
        handle: &SessionHandle,
        target: &str,
    ) -> Result<Option<Transition>, SessionError> {
        let destination = match self.table.lookup(target) {
            Ok(channel) => Arc::clone(channel),
            Err(error) => {
                self.reject("switch", error).await?;
                return Ok(None);
            }
        };
        if destination.holds(handle.username()) {
            self.reject("switch", ChannelError::SwitchRejected(target.to_string()))
                .await?;
            return Ok(None);
        }

        let origin = Arc::clone(&self.channel);
        if origin.remove(handle.id()) == Some(Presence::Member) {
            broadcaster::notify(
                &origin,
                &format!("{} has left the channel.", handle.username()),
                None,
            );
        }

        if destination.enqueue(handle.clone()).is_err() {
            debug!(user = %handle.username(), to = %destination.name(), "Switch lost a race, requeueing");
            let rejoin = origin.enqueue(handle.clone());
            self.reject("switch", ChannelError::SwitchRejected(target.to_string()))
                .await?;
            return Ok(Some(match rejoin {
                Ok(()) => Transition::Switched(origin),
                Err(_) => Transition::Closed(Departure::Closed),
            }));
        }

        self.greet(&destination, handle).await?;
        info!(user = %handle.username(), from = %origin.name(), to = %destination.name(), "Switched channel");
        Ok(Some(Transition::Switched(destination)))
    }

    /// Relay a file's bytes to another member.
    async fn send_file(
        &mut self,
        handle: &SessionHandle,
        target: &str,
        path: &str,
    ) -> Result<(), SessionError> {
        let Some(recipient) = self.channel.find_member(target) else {
            return self
                .reject("send", ChannelError::UserNotHere(target.to_string()))
                .await;
        };

        let contents = match tokio::fs::read(path).await {
            Ok(contents) => Bytes::from(contents),
            Err(e) => {
                debug!(path = %path, error = %e, "File unavailable");
                return self
                    .reject("send", ChannelError::NoSuchFile(path.to_string()))
                    .await;
            }
        };

        let size = contents.len();
        if !recipient.deliver(Outbound::File(contents)) {
            return self
                .reject(
                    "send",
                    ChannelError::DeliveryFailed {
                        path: path.to_string(),
                        target: target.to_string(),
                    },
                )
                .await;
        }
        self.reply(&format!("You sent {path} to {target}.")).await?;
        broadcaster::announce(&format!(
            "{} sent {} to {}.",
            handle.username(),
            path,
            target
        ));
        debug!(bytes = size, "File relayed");
        Ok(())
    }

    async fn whisper(
        &mut self,
        handle: &SessionHandle,
        target: &str,
        text: &str,
    ) -> Result<(), SessionError> {
        let Some(recipient) = self.channel.find_member(target) else {
            return self
                .reject("whisper", ChannelError::UserNotHere(target.to_string()))
                .await;
        };
        recipient.send_line(broadcaster::whisper_line(handle.username(), text));
        broadcaster::echo(&broadcaster::whisper_transcript(
            handle.username(),
            target,
            text,
        ));
        Ok(())
    }

    /// Report a failed command to the client.
    async fn reject(&mut self, command: &'static str, error: ChannelError) -> Result<(), SessionError> {
        crate::metrics::record_command_error(command, error.error_code());
        debug!(command, error = %error, "Command rejected");
        self.reply(&error.to_string()).await
    }
}

/// Whole seconds, rounded up.
fn ceil_secs(duration: Duration) -> u64 {
    duration.as_secs() + u64::from(duration.subsec_nanos() > 0)
}
