//! Configuration loading and management.
//!
//! - [`channels`]: the channel definition file (`channel <name> <port> <capacity>`)
//! - [`types`]: optional TOML settings (session tuning, metrics, logging)
//! - [`validation`]: startup checks on loaded settings

mod channels;
mod types;
pub mod validation;

pub use channels::{ChannelDefinition, load_channels};
pub use types::{LogFormat, ServerConfig, Settings};
