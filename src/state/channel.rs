//! Channel runtime state: membership, admission queue and mutes.
//!
//! All three live in one struct behind one mutex per channel. Nothing
//! outside this module sees the raw containers; callers get copies
//! (`SessionHandle` clones) and do their I/O after the guard is released.

use crate::config::ChannelDefinition;
use crate::error::ChannelError;
use crate::state::session::{SessionHandle, SessionId};
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use std::time::{Duration, Instant};
use tokio::sync::Notify;

/// Result of an admission attempt for a queued session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    /// Promoted into membership.
    Admitted,
    /// Still queued, with this many sessions ahead.
    Waiting(usize),
    /// No longer queued (evicted by an operator).
    Absent,
}

/// Which list a removed session was taken from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Presence {
    Member,
    Queued,
}

/// Point-in-time counts for `/list`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Occupancy {
    pub members: usize,
    pub capacity: usize,
    pub queued: usize,
}

#[derive(Debug, Default)]
struct ChannelState {
    members: Vec<SessionHandle>,
    queue: VecDeque<SessionHandle>,
    muted: HashMap<String, Instant>,
}

impl ChannelState {
    fn holds(&self, username: &str) -> bool {
        self.members.iter().any(|m| m.username() == username)
            || self.queue.iter().any(|q| q.username() == username)
    }
}

/// A chat channel.
#[derive(Debug)]
pub struct Channel {
    name: String,
    port: u16,
    capacity: usize,
    state: Mutex<ChannelState>,
    /// Signalled whenever a member or queued session leaves.
    vacancy: Notify,
}

impl Channel {
    pub fn new(definition: &ChannelDefinition) -> Self {
        Self {
            name: definition.name.clone(),
            port: definition.port,
            capacity: definition.capacity,
            state: Mutex::new(ChannelState::default()),
            vacancy: Notify::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Wake condition for queued sessions.
    pub fn vacancy(&self) -> &Notify {
        &self.vacancy
    }

    /// Append a session to the back of the admission queue.
    ///
    /// Fails if the username is already a member or queued here.
    pub fn enqueue(&self, handle: SessionHandle) -> Result<(), ChannelError> {
        let mut state = self.state.lock();
        if state.holds(handle.username()) {
            return Err(ChannelError::DuplicateUsername(self.name.clone()));
        }
        state.queue.push_back(handle);
        self.record_occupancy(&state);
        Ok(())
    }

    /// Promote the session if it heads the queue and a slot is free.
    ///
    /// On promotion, `joined` is queued for every other member before the
    /// guard is released, so it always precedes any later departure notice
    /// for the same session.
    pub fn try_admit(&self, id: SessionId, joined: Option<&str>) -> Admission {
        let mut state = self.state.lock();
        match state.queue.iter().position(|q| q.id() == id) {
            None => Admission::Absent,
            Some(0) if state.members.len() < self.capacity => {
                if let Some(handle) = state.queue.pop_front() {
                    state.members.push(handle);
                }
                if let Some(line) = joined {
                    let others: Vec<&SessionHandle> =
                        state.members.iter().filter(|m| m.id() != id).collect();
                    crate::metrics::record_fanout(others.len());
                    for member in others {
                        member.send_line(line.to_string());
                    }
                }
                self.record_occupancy(&state);
                Admission::Admitted
            }
            Some(position) => Admission::Waiting(position),
        }
    }

    /// Zero-based distance from the head of the queue.
    pub fn position(&self, id: SessionId) -> Option<usize> {
        self.state.lock().queue.iter().position(|q| q.id() == id)
    }

    /// Remove a session from whichever list holds it.
    ///
    /// Removing an absent session is a no-op and returns `None`.
    pub fn remove(&self, id: SessionId) -> Option<Presence> {
        let presence = {
            let mut state = self.state.lock();
            let presence = if let Some(i) = state.members.iter().position(|m| m.id() == id) {
                state.members.remove(i);
                Some(Presence::Member)
            } else if let Some(i) = state.queue.iter().position(|q| q.id() == id) {
                state.queue.remove(i);
                Some(Presence::Queued)
            } else {
                None
            };
            if presence.is_some() {
                self.record_occupancy(&state);
            }
            presence
        };
        if presence.is_some() {
            self.vacancy.notify_waiters();
        }
        presence
    }

    /// Whether `username` is a member or queued here.
    pub fn holds(&self, username: &str) -> bool {
        self.state.lock().holds(username)
    }

    /// Look up an active member by username.
    pub fn find_member(&self, username: &str) -> Option<SessionHandle> {
        self.state
            .lock()
            .members
            .iter()
            .find(|m| m.username() == username)
            .cloned()
    }

    /// Snapshot of current members in join order, minus `exclude`.
    pub fn recipients(&self, exclude: Option<SessionId>) -> Vec<SessionHandle> {
        self.state
            .lock()
            .members
            .iter()
            .filter(|m| Some(m.id()) != exclude)
            .cloned()
            .collect()
    }

    pub fn occupancy(&self) -> Occupancy {
        let state = self.state.lock();
        Occupancy {
            members: state.members.len(),
            capacity: self.capacity,
            queued: state.queue.len(),
        }
    }

    /// Mute `username` for `duration`.
    ///
    /// Returns the muted session's handle, or `None` if the user is neither
    /// a member nor queued.
    pub fn mute(&self, username: &str, duration: Duration) -> Option<SessionHandle> {
        let mut state = self.state.lock();
        let target = state
            .members
            .iter()
            .chain(state.queue.iter())
            .find(|s| s.username() == username)
            .cloned()?;
        let expiry = Instant::now().checked_add(duration)?;
        state.muted.insert(username.to_string(), expiry);
        Some(target)
    }

    /// Time left on a mute. Expired entries are purged.
    pub fn mute_remaining(&self, username: &str) -> Option<Duration> {
        let mut state = self.state.lock();
        let expiry = *state.muted.get(username)?;
        let now = Instant::now();
        if expiry > now {
            Some(expiry - now)
        } else {
            state.muted.remove(username);
            None
        }
    }

    /// Remove an active member by username.
    pub fn kick(&self, username: &str) -> Option<SessionHandle> {
        let kicked = {
            let mut state = self.state.lock();
            let index = state.members.iter().position(|m| m.username() == username)?;
            let handle = state.members.remove(index);
            self.record_occupancy(&state);
            handle
        };
        self.vacancy.notify_waiters();
        Some(kicked)
    }

    /// Clear members, queue and mutes, returning everyone evicted.
    pub fn evict_all(&self) -> Vec<SessionHandle> {
        let evicted: Vec<SessionHandle> = {
            let mut state = self.state.lock();
            let mut evicted: Vec<SessionHandle> = state.members.drain(..).collect();
            evicted.extend(state.queue.drain(..));
            state.muted.clear();
            self.record_occupancy(&state);
            evicted
        };
        self.vacancy.notify_waiters();
        evicted
    }

    fn record_occupancy(&self, state: &ChannelState) {
        crate::metrics::set_channel_occupancy(&self.name, state.members.len(), state.queue.len());
    }
}
