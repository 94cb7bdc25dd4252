//! Unified error handling for channeld.
//!
//! Channel errors double as the client-visible reply text: their `Display`
//! output is wrapped in a server-message line and sent to the requester.
//! Session errors end only the affected connection.

use thiserror::Error;

// ============================================================================
// Channel Errors (state operations)
// ============================================================================

/// Errors raised by channel and table operations.
///
/// Covers both rejected admissions and lookups of absent targets. None of
/// these are fatal; they are reported to whoever asked.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ChannelError {
    #[error("{0} does not exist.")]
    NoSuchChannel(String),

    #[error("{0} is not here.")]
    UserNotHere(String),

    #[error("{user} is not in {channel}.")]
    NotInChannel { user: String, channel: String },

    #[error("Cannot connect to the {0} channel.")]
    DuplicateUsername(String),

    #[error("Cannot connect to the {0} channel.")]
    InvalidUsername(String),

    #[error("Cannot switch to the {0} channel.")]
    SwitchRejected(String),

    #[error("{0} does not exist.")]
    NoSuchFile(String),

    #[error("Could not send {path} to {target}.")]
    DeliveryFailed { path: String, target: String },
}

impl ChannelError {
    /// Get a static error code string for metrics labeling.
    #[inline]
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::NoSuchChannel(_) => "no_such_channel",
            Self::UserNotHere(_) => "user_not_here",
            Self::NotInChannel { .. } => "not_in_channel",
            Self::DuplicateUsername(_) => "duplicate_username",
            Self::InvalidUsername(_) => "invalid_username",
            Self::SwitchRejected(_) => "switch_rejected",
            Self::NoSuchFile(_) => "no_such_file",
            Self::DeliveryFailed { .. } => "delivery_failed",
        }
    }
}

// ============================================================================
// Session Errors (connection faults)
// ============================================================================

/// Errors that terminate a single client session.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("admission rejected: {0}")]
    Rejected(ChannelError),

    #[error("peer disconnected during negotiation")]
    Disconnected,

    #[error("no username received within {0:?}")]
    NegotiationTimeout(std::time::Duration),
}

impl SessionError {
    /// Get a static error code string for metrics labeling.
    #[inline]
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Io(_) => "io",
            Self::Rejected(e) => e.error_code(),
            Self::Disconnected => "disconnected",
            Self::NegotiationTimeout(_) => "negotiation_timeout",
        }
    }
}
