//! Telemetry utilities for session accounting and span naming.

/// Guard counting a connection in the connected-sessions gauge.
///
/// Decrements when dropped, so every exit path of a session task is covered.
pub struct SessionGauge;

impl SessionGauge {
    pub fn open() -> Self {
        crate::metrics::session_opened();
        Self
    }
}

impl Drop for SessionGauge {
    fn drop(&mut self) {
        crate::metrics::session_closed();
    }
}

/// Standardized span constructors.
pub mod spans {
    use tracing::{Span, info_span};

    /// Span for a channel's accept loop.
    pub fn acceptor(channel: &str, port: u16) -> Span {
        info_span!("acceptor", channel = %channel, port = port)
    }

    /// Span for one operator console command.
    pub fn admin_command(name: &str) -> Span {
        info_span!("admin_command", name = %name)
    }
}
