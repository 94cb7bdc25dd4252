//! The active message loop of an admitted session.

use super::{Departure, Session};
use crate::state::{Channel, SessionHandle};
use std::sync::Arc;
use tokio::time::Instant;
use tracing::{debug, info};

/// How the active loop ended.
pub(super) enum Transition {
    /// Enqueued in another channel; wait for admission there.
    Switched(Arc<Channel>),
    Closed(Departure),
}

impl Session {
    /// Relay outbox traffic and process client input until the session
    /// leaves this channel.
    ///
    /// Outbox traffic is polled first so notices queued ahead of a
    /// disconnect request (a kick notice, say) reach the client before the
    /// connection closes.
    pub(super) async fn active_loop(&mut self, handle: &SessionHandle) -> Transition {
        let idle = self.config.idle_timeout();
        let mut deadline = Instant::now() + idle;

        loop {
            tokio::select! {
                biased;

                Some(message) = self.outbox_rx.recv() => {
                    if let Err(e) = self.write_outbound(message).await {
                        return Transition::Closed(Departure::Fault(e));
                    }
                }

                _ = self.disconnect.notified() => {
                    debug!(user = %handle.username(), "Disconnect requested");
                    self.flush_outbox().await;
                    return Transition::Closed(Departure::Closed);
                }

                read = self.inbound.next_message() => match read {
                    Ok(Some(text)) => {
                        deadline = Instant::now() + idle;
                        match self.dispatch(handle, &text).await {
                            Ok(None) => {}
                            Ok(Some(transition)) => return transition,
                            Err(e) => return Transition::Closed(Departure::Fault(e)),
                        }
                    }
                    Ok(None) => return Transition::Closed(Departure::Disconnected),
                    Err(e) => return Transition::Closed(Departure::Fault(e.into())),
                },

                _ = tokio::time::sleep_until(deadline) => {
                    info!(user = %handle.username(), idle_secs = idle.as_secs(), "Idle timeout");
                    return Transition::Closed(Departure::Afk);
                }
            }
        }
    }
}
