//! Operator console input, parsed into an [`AdminCommand`].

use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AdminCommand {
    Shutdown,
    Mute {
        channel: String,
        user: String,
        seconds: u32,
    },
    Kick {
        channel: String,
        user: String,
    },
    Empty {
        channel: String,
    },
}

impl AdminCommand {
    /// Static label for metrics and spans.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Shutdown => "shutdown",
            Self::Mute { .. } => "mute",
            Self::Kick { .. } => "kick",
            Self::Empty { .. } => "empty",
        }
    }
}

/// Console input that is not a valid command. `Display` is the console reply.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AdminParseError {
    #[error("Usage: /mute <channel>:<user> <seconds>")]
    MuteUsage,

    #[error("Invalid mute time.")]
    InvalidMuteTime,

    #[error("Usage: /kick <channel>:<user>")]
    KickUsage,

    #[error("Usage: /empty <channel>")]
    EmptyUsage,

    #[error("Unknown command: {0}")]
    Unknown(String),
}

impl FromStr for AdminCommand {
    type Err = AdminParseError;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let mut words = line.split_whitespace();
        let keyword = words.next().unwrap_or_default();
        let args: Vec<&str> = words.collect();

        match keyword {
            "/shutdown" => Ok(Self::Shutdown),
            "/mute" => {
                let [target, seconds] = args[..] else {
                    return Err(AdminParseError::MuteUsage);
                };
                let (channel, user) = split_target(target).ok_or(AdminParseError::MuteUsage)?;
                let seconds = seconds
                    .parse::<u32>()
                    .ok()
                    .filter(|&s| s > 0)
                    .ok_or(AdminParseError::InvalidMuteTime)?;
                Ok(Self::Mute {
                    channel,
                    user,
                    seconds,
                })
            }
            "/kick" => {
                let [target] = args[..] else {
                    return Err(AdminParseError::KickUsage);
                };
                let (channel, user) = split_target(target).ok_or(AdminParseError::KickUsage)?;
                Ok(Self::Kick { channel, user })
            }
            "/empty" => {
                let [channel] = args[..] else {
                    return Err(AdminParseError::EmptyUsage);
                };
                Ok(Self::Empty {
                    channel: channel.to_string(),
                })
            }
            other => Err(AdminParseError::Unknown(other.to_string())),
        }
    }
}

/// `<channel>:<user>`, both non-empty.
fn split_target(target: &str) -> Option<(String, String)> {
    let (channel, user) = target.split_once(':')?;
    if channel.is_empty() || user.is_empty() {
        return None;
    }
    Some((channel.to_string(), user.to_string()))
}
