use std::time::Duration;
use thiserror::Error;

/// Failure delivering one message to a downstream channel.
///
/// Never surfaces to Start/Stop/Status callers; it is handed to the
/// configured [`crate::publisher::PublishErrorSink`].
#[derive(Error, Debug)]
pub enum PublishError {
    #[error("bus topic '{topic}' rejected message: {reason}")]
    Rejected { topic: String, reason: String },

    #[error("bus publish to '{topic}' timed out after {timeout:?}")]
    Timeout { topic: String, timeout: Duration },

    #[error("outbox full, record {identifier} dropped")]
    OutboxFull { identifier: String },

    #[error("outbox closed, record {identifier} dropped")]
    OutboxClosed { identifier: String },

    #[error("record {identifier} abandoned at shutdown before reaching the bus")]
    Abandoned { identifier: String },

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Invalid generator or server configuration. Fatal at startup.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{key} must be greater than zero")]
    Zero { key: &'static str },

    #[error("{key} must not be empty")]
    Empty { key: &'static str },

    #[error("{key}: cannot parse '{value}' as {expected}")]
    Parse {
        key: &'static str,
        value: String,
        expected: &'static str,
    },
}
