//! Settings validation.
//!
//! Runs once at startup, after loading, so that nonsense values fail fast
//! instead of surfacing as stuck sessions.

use super::Settings;
use thiserror::Error;

/// Validation errors for settings.
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("server.idle_timeout_secs must be greater than 0")]
    ZeroIdleTimeout,
    #[error("server.queue_poll_interval_ms must be greater than 0")]
    ZeroPollInterval,
    #[error("server.read_chunk_size must be between 1 and 65536, got {0}")]
    InvalidChunkSize(usize),
    #[error("server.outbox_capacity must be greater than 0")]
    ZeroOutboxCapacity,
}

/// Validate settings, returning all errors found.
pub fn validate(settings: &Settings) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();
    let server = &settings.server;

    if server.idle_timeout_secs == 0 {
        errors.push(ValidationError::ZeroIdleTimeout);
    }
    if server.queue_poll_interval_ms == 0 {
        errors.push(ValidationError::ZeroPollInterval);
    }
    if server.read_chunk_size == 0 || server.read_chunk_size > 65536 {
        errors.push(ValidationError::InvalidChunkSize(server.read_chunk_size));
    }
    if server.outbox_capacity == 0 {
        errors.push(ValidationError::ZeroOutboxCapacity);
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
