//! State management module.
//!
//! Contains the channel table, per-channel state and session handles.

mod channel;
mod session;
mod table;

pub use channel::{Admission, Channel, Presence};
pub use session::{Outbound, SessionHandle, SessionId, SessionIdGenerator};
pub use table::ChannelTable;

#[cfg(test)]
pub(crate) use session::testing;
