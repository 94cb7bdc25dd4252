//! The channel table: every configured channel, built once at startup.

use crate::config::ChannelDefinition;
use crate::error::ChannelError;
use crate::state::channel::Channel;
use std::collections::HashMap;
use std::sync::Arc;

/// Registry of channels, in configuration order.
///
/// Immutable after construction; only the channels' inner state changes.
#[derive(Debug)]
pub struct ChannelTable {
    channels: Vec<Arc<Channel>>,
    by_name: HashMap<String, usize>,
}

impl ChannelTable {
    /// Build the table from definitions already checked by
    /// [`load_channels`](crate::config::load_channels): names and ports are
    /// unique and there is at least one channel.
    ///
    /// Only names are indexed. Each listener owns its channel directly, so
    /// nothing looks a channel up by port.
    pub fn new(definitions: Vec<ChannelDefinition>) -> Self {
        let channels: Vec<Arc<Channel>> = definitions
            .iter()
            .map(|definition| Arc::new(Channel::new(definition)))
            .collect();
        let by_name = channels
            .iter()
            .enumerate()
            .map(|(index, channel)| (channel.name().to_string(), index))
            .collect();
        Self { channels, by_name }
    }

    pub fn get(&self, name: &str) -> Option<&Arc<Channel>> {
        self.by_name.get(name).map(|&i| &self.channels[i])
    }

    /// Like [`get`](Self::get), with the client-facing error.
    pub fn lookup(&self, name: &str) -> Result<&Arc<Channel>, ChannelError> {
        self.get(name)
            .ok_or_else(|| ChannelError::NoSuchChannel(name.to_string()))
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<Channel>> {
        self.channels.iter()
    }

    pub fn count(&self) -> usize {
        self.channels.len()
    }

    /// The `/list` reply: one `name members/capacity/queued` line per channel.
    pub fn listing(&self) -> String {
        self.channels
            .iter()
            .map(|channel| {
                let occ = channel.occupancy();
                format!(
                    "[ Channel ] {} {}/{}/{}",
                    channel.name(),
                    occ.members,
                    occ.capacity,
                    occ.queued
                )
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}
