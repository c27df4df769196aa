//! Error surface for the public API.
//!
//! Throttle-drop and no-subscribers are deliberately *not* variants here:
//! both return `Ok(true)`. They are successful no-ops, not errors.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum NetBusError {
    #[error("invalid topic name: {0}")]
    InvalidTopicName(String),

    #[error("node already advertises '{0}'")]
    AlreadyAdvertised(String),

    #[error("message type '{actual}' does not match advertised type '{expected}'")]
    TypeMismatch { expected: String, actual: String },

    #[error("discovery rejected the request: {0}")]
    DiscoveryFailed(String),

    #[error("failed to serialize message for remote send: {0}")]
    SerializationFailed(String),

    #[error("service '{0}' is not known to discovery")]
    UnknownService(String),

    #[error("request to service '{0}' timed out")]
    RequestTimedOut(String),
}

pub type Result<T> = std::result::Result<T, NetBusError>;
