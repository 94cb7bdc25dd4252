//! Waiting in a channel's admission queue.

use super::{Departure, Session};
use crate::broadcaster::{self, server_line};
use crate::state::{Admission, SessionHandle};
use std::sync::Arc;
use tokio::time::MissedTickBehavior;
use tracing::debug;

pub(super) enum Waited {
    Admitted,
    Closed(Departure),
}

impl Session {
    /// Block until this session is promoted into its channel.
    ///
    /// Promotion announces the join to the channel's other members.
    ///
    /// Wakes on every departure from the channel and on each poll tick; the
    /// tick also reports the current queue position to the client. Input
    /// arriving meanwhile is buffered, not processed.
    pub(super) async fn await_admission(&mut self, handle: &SessionHandle) -> Waited {
        let channel = Arc::clone(&self.channel);
        let mut ticker = tokio::time::interval(self.config.queue_poll_interval());
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            // Registered before checking, so a departure in between is not missed.
            let vacancy = channel.vacancy().notified();
            tokio::pin!(vacancy);
            vacancy.as_mut().enable();

            let joined = server_line(&format!("{} has joined the channel.", handle.username()));
            match channel.try_admit(handle.id(), Some(&joined)) {
                Admission::Admitted => {
                    broadcaster::echo(&joined);
                    return Waited::Admitted;
                }
                Admission::Absent => {
                    self.flush_outbox().await;
                    return Waited::Closed(Departure::Closed);
                }
                Admission::Waiting(_) => {}
            }

            tokio::select! {
                biased;

                Some(message) = self.outbox_rx.recv() => {
                    if let Err(e) = self.write_outbound(message).await {
                        return Waited::Closed(Departure::Fault(e));
                    }
                }

                _ = self.disconnect.notified() => {
                    self.flush_outbox().await;
                    return Waited::Closed(Departure::Closed);
                }

                _ = &mut vacancy => {
                    debug!(channel = %channel.name(), "Vacancy signalled");
                }

                _ = ticker.tick() => {
                    if let Some(position) = channel.position(handle.id()) {
                        let notice = format!(
                            "You are in the waiting queue and there are {position} user(s) ahead of you."
                        );
                        if let Err(e) = self.reply(&notice).await {
                            return Waited::Closed(Departure::Fault(e));
                        }
                    }
                }

                read = self.inbound.fill(), if self.inbound.has_room() => match read {
                    Ok(true) => {}
                    Ok(false) => return Waited::Closed(Departure::Disconnected),
                    Err(e) => return Waited::Closed(Departure::Fault(e.into())),
                },
            }
        }
    }
}
