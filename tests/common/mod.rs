//! Integration test common infrastructure.
//!
//! Provides utilities for spawning the daemon, driving its operator console,
//! and connecting line-based chat clients.

#[allow(dead_code)]
pub mod client;
#[allow(dead_code)]
pub mod server;

#[allow(unused_imports)]
pub use client::TestClient;
#[allow(unused_imports)]
pub use server::{ChannelSpec, TestServer};
