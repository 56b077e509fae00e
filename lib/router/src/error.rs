//! Error types for the router crate.

use std::fmt;
use switchboard_conversation::{AdapterError, SessionStoreError};

/// Errors that fail an inbound request.
///
/// Agent failures are not errors here: they become a fallback or the
/// agent's own refusal text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RouteError {
    /// The inbound payload could not be normalized.
    Malformed(AdapterError),
    /// The session store failed; the request is abandoned.
    StoreUnavailable { reason: String },
    /// The caller cancelled; nothing was recorded for the agent's result.
    Cancelled,
}

impl fmt::Display for RouteError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Malformed(err) => write!(f, "{err}"),
            Self::StoreUnavailable { reason } => write!(f, "session store unavailable: {reason}"),
            Self::Cancelled => write!(f, "request cancelled"),
        }
    }
}

impl std::error::Error for RouteError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Malformed(err) => Some(err),
            _ => None,
        }
    }
}

impl From<AdapterError> for RouteError {
    fn from(err: AdapterError) -> Self {
        Self::Malformed(err)
    }
}

impl From<SessionStoreError> for RouteError {
    fn from(err: SessionStoreError) -> Self {
        match err {
            SessionStoreError::Unavailable { reason } => Self::StoreUnavailable { reason },
            missing @ SessionStoreError::NotFound { .. } => Self::StoreUnavailable {
                reason: missing.to_string(),
            },
        }
    }
}
