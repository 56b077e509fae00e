//! Error types for the conversation crate.
//!
//! - `AdapterError`: inbound payloads that cannot be normalized
//! - `SessionStoreError`: session storage failures

use switchboard_core::Channel;
use std::fmt;

/// Errors from normalizing an inbound channel payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AdapterError {
    /// The payload lacks an extractable identity or text body.
    MalformedPayload { channel: Channel, reason: String },
}

impl AdapterError {
    pub(crate) fn malformed(channel: Channel, reason: impl Into<String>) -> Self {
        Self::MalformedPayload {
            channel,
            reason: reason.into(),
        }
    }
}

impl fmt::Display for AdapterError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MalformedPayload { channel, reason } => {
                write!(f, "malformed {channel} payload: {reason}")
            }
        }
    }
}

impl std::error::Error for AdapterError {}

/// Errors from session store operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionStoreError {
    /// No session exists for the key.
    NotFound { identity: String, channel: Channel },
    /// The backing store cannot be reached or failed mid-operation.
    Unavailable { reason: String },
}

impl SessionStoreError {
    /// Returns true if the store itself failed (as opposed to a missing session).
    #[must_use]
    pub fn is_unavailable(&self) -> bool {
        matches!(self, Self::Unavailable { .. })
    }
}

impl fmt::Display for SessionStoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotFound { identity, channel } => {
                write!(f, "no {channel} session for {identity}")
            }
            Self::Unavailable { reason } => {
                write!(f, "session store unavailable: {reason}")
            }
        }
    }
}

impl std::error::Error for SessionStoreError {}
