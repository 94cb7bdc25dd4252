//! Network layer: per-channel listeners and client sessions.

mod connection;
mod gateway;

pub use connection::Session;
pub use gateway::Gateway;
