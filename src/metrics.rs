//! Prometheus metrics collection for channeld.
//!
//! Collectors live in `OnceLock`s and are only populated by [`init`], which
//! runs when a metrics port is configured. Every recording helper is a no-op
//! until then, so state-level code can call them unconditionally.
//!
//! - `chat_sessions_connected` - open client connections
//! - `chat_channel_members{channel}` / `chat_channel_queued{channel}`
//! - `chat_message_fanout` - recipients per broadcast
//! - `chat_sessions_closed_total{reason}` - quit, afk, kicked, ...

use prometheus::{
    Encoder, Histogram, HistogramOpts, IntCounter, IntCounterVec, IntGauge, IntGaugeVec, Opts,
    Registry, TextEncoder,
};
use std::sync::OnceLock;

/// Global Prometheus registry for all metrics.
pub static REGISTRY: OnceLock<Registry> = OnceLock::new();

pub fn registry() -> &'static Registry {
    REGISTRY.get_or_init(Registry::new)
}

// ========================================================================
// Counters
// ========================================================================

/// User messages relayed to a channel.
pub static MESSAGES_RELAYED: OnceLock<IntCounter> = OnceLock::new();

/// Deliveries dropped because a recipient's outbox was full.
pub static DELIVERIES_DROPPED: OnceLock<IntCounter> = OnceLock::new();

/// Client commands processed by type.
pub static COMMAND_COUNTER: OnceLock<IntCounterVec> = OnceLock::new();

/// Client command errors by type and error kind.
pub static COMMAND_ERRORS: OnceLock<IntCounterVec> = OnceLock::new();

/// Operator console commands by type.
pub static ADMIN_COMMANDS: OnceLock<IntCounterVec> = OnceLock::new();

/// Sessions closed, by reason.
pub static SESSIONS_CLOSED: OnceLock<IntCounterVec> = OnceLock::new();

/// Sessions that ended in an error, by error code.
pub static SESSION_ERRORS: OnceLock<IntCounterVec> = OnceLock::new();

// ========================================================================
// Gauges
// ========================================================================

/// Currently open client connections.
pub static CONNECTED_SESSIONS: OnceLock<IntGauge> = OnceLock::new();

/// Active members per channel.
pub static CHANNEL_MEMBERS: OnceLock<IntGaugeVec> = OnceLock::new();

/// Queued sessions per channel.
pub static CHANNEL_QUEUED: OnceLock<IntGaugeVec> = OnceLock::new();

/// Recipients per broadcast.
pub static MESSAGE_FANOUT: OnceLock<Histogram> = OnceLock::new();

/// Initialize the Prometheus metrics registry.
///
/// Must be called once at startup before the HTTP endpoint is served.
pub fn init() {
    let r = registry();

    macro_rules! register {
        ($metric:ident, $init:expr) => {
            let m = $init.expect(concat!(stringify!($metric), " creation failed"));
            if let Err(e) = r.register(Box::new(m.clone())) {
                tracing::warn!(error = %e, concat!("Failed to register metric ", stringify!($metric)));
            }
            let _ = $metric.set(m);
        };
    }

    register!(MESSAGES_RELAYED, IntCounter::new("chat_messages_relayed_total", "User messages relayed to a channel"));
    register!(DELIVERIES_DROPPED, IntCounter::new("chat_deliveries_dropped_total", "Deliveries dropped due to a full outbox"));
    register!(COMMAND_COUNTER, IntCounterVec::new(Opts::new("chat_command_total", "Client commands processed by type"), &["command"]));
    register!(COMMAND_ERRORS, IntCounterVec::new(Opts::new("chat_command_errors_total", "Client command errors by type"), &["command", "error"]));
    register!(ADMIN_COMMANDS, IntCounterVec::new(Opts::new("chat_admin_commands_total", "Operator console commands by type"), &["command"]));
    register!(SESSIONS_CLOSED, IntCounterVec::new(Opts::new("chat_sessions_closed_total", "Sessions closed by reason"), &["reason"]));
    register!(SESSION_ERRORS, IntCounterVec::new(Opts::new("chat_session_errors_total", "Sessions ended by an error"), &["error"]));
    register!(CONNECTED_SESSIONS, IntGauge::new("chat_sessions_connected", "Currently open client connections"));
    register!(CHANNEL_MEMBERS, IntGaugeVec::new(Opts::new("chat_channel_members", "Active members per channel"), &["channel"]));
    register!(CHANNEL_QUEUED, IntGaugeVec::new(Opts::new("chat_channel_queued", "Queued sessions per channel"), &["channel"]));
    register!(MESSAGE_FANOUT, Histogram::with_opts(
        HistogramOpts::new("chat_message_fanout", "Recipients per broadcast")
            .buckets(vec![0.0, 1.0, 2.0, 5.0, 10.0, 25.0, 50.0, 100.0])));
}

/// Encode all registered metrics in the Prometheus text format.
pub fn gather_metrics() -> String {
    let encoder = TextEncoder::new();
    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&registry().gather(), &mut buffer) {
        tracing::error!(error = %e, "Failed to encode metrics");
        return String::new();
    }
    String::from_utf8(buffer).unwrap_or_default()
}

// ========================================================================
// Recording helpers
// ========================================================================

pub fn set_channel_occupancy(channel: &str, members: usize, queued: usize) {
    if let Some(m) = CHANNEL_MEMBERS.get() {
        m.with_label_values(&[channel]).set(members as i64);
    }
    if let Some(m) = CHANNEL_QUEUED.get() {
        m.with_label_values(&[channel]).set(queued as i64);
    }
}

pub fn record_fanout(recipients: usize) {
    if let Some(m) = MESSAGE_FANOUT.get() {
        m.observe(recipients as f64);
    }
}

pub fn record_relayed() {
    if let Some(m) = MESSAGES_RELAYED.get() {
        m.inc();
    }
}

pub fn record_dropped_delivery() {
    if let Some(m) = DELIVERIES_DROPPED.get() {
        m.inc();
    }
}

pub fn record_command(command: &str) {
    if let Some(m) = COMMAND_COUNTER.get() {
        m.with_label_values(&[command]).inc();
    }
}

pub fn record_command_error(command: &str, error: &str) {
    if let Some(m) = COMMAND_ERRORS.get() {
        m.with_label_values(&[command, error]).inc();
    }
}

pub fn record_admin_command(command: &str) {
    if let Some(m) = ADMIN_COMMANDS.get() {
        m.with_label_values(&[command]).inc();
    }
}

pub fn record_session_closed(reason: &str) {
    if let Some(m) = SESSIONS_CLOSED.get() {
        m.with_label_values(&[reason]).inc();
    }
}

pub fn record_session_error(code: &str) {
    if let Some(m) = SESSION_ERRORS.get() {
        m.with_label_values(&[code]).inc();
    }
}

pub fn session_opened() {
    if let Some(m) = CONNECTED_SESSIONS.get() {
        m.inc();
    }
}

pub fn session_closed() {
    if let Some(m) = CONNECTED_SESSIONS.get() {
        m.dec();
    }
}
