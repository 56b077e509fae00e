//! Error types for the telephony crate.
//!
//! - `ConfigurationError`: missing or invalid telephony settings
//! - `ProviderError`: transport-level failures talking to the provider
//! - `BridgeError`: what callers of the bridge see

use std::fmt;

/// Telephony configuration is incomplete or invalid.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigurationError {
    /// A required setting is absent or blank.
    Missing { setting: &'static str },
    /// The provider host is not a ws(s) or http(s) URL.
    InvalidHost { host: String },
}

impl fmt::Display for ConfigurationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Missing { setting } => write!(f, "missing telephony setting {setting}"),
            Self::InvalidHost { host } => {
                write!(f, "telephony host must be a ws(s):// or http(s):// URL, got {host}")
            }
        }
    }
}

impl std::error::Error for ConfigurationError {}

/// Failures talking to the telephony provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProviderError {
    /// The provider could not be reached.
    Unreachable { reason: String },
    /// The request timed out.
    Timeout,
    /// The provider rejected the access token.
    Unauthorized,
    /// The provider returned an error.
    Api { status: u16, code: String, message: String },
    /// The provider's response could not be parsed.
    InvalidResponse { reason: String },
    /// A signing key or client could not be set up.
    Setup { reason: String },
}

impl fmt::Display for ProviderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unreachable { reason } => write!(f, "telephony provider unreachable: {reason}"),
            Self::Timeout => write!(f, "telephony provider request timed out"),
            Self::Unauthorized => write!(f, "telephony provider rejected the credentials"),
            Self::Api {
                status,
                code,
                message,
            } => write!(f, "telephony provider error {code} (HTTP {status}): {message}"),
            Self::InvalidResponse { reason } => {
                write!(f, "invalid telephony provider response: {reason}")
            }
            Self::Setup { reason } => write!(f, "telephony client setup failed: {reason}"),
        }
    }
}

impl std::error::Error for ProviderError {}

/// Errors from telephony bridge operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BridgeError {
    /// The room could not be created; no call was attempted.
    RoomCreationFailed { room: String, reason: String },
    /// The call could not be placed for a transport reason.
    CallPlacementFailed { room: String, reason: String },
    /// A room could not be released.
    RoomReleaseFailed { room: String, reason: String },
    /// Rooms could not be listed.
    RoomListFailed { reason: String },
}

impl fmt::Display for BridgeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::RoomCreationFailed { room, reason } => {
                write!(f, "failed to create voice room {room}: {reason}")
            }
            Self::CallPlacementFailed { room, reason } => {
                write!(f, "failed to place call into {room}: {reason}")
            }
            Self::RoomReleaseFailed { room, reason } => {
                write!(f, "failed to release voice room {room}: {reason}")
            }
            Self::RoomListFailed { reason } => write!(f, "failed to list voice rooms: {reason}"),
        }
    }
}

impl std::error::Error for BridgeError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn configuration_error_names_setting() {
        let err = ConfigurationError::Missing {
            setting: "TELEPHONY__SIP_TRUNK_ID",
        };
        assert!(err.to_string().contains("TELEPHONY__SIP_TRUNK_ID"));
    }

    #[test]
    fn bridge_error_display() {
        let err = BridgeError::RoomCreationFailed {
            room: "outbound-1-0".to_string(),
            reason: ProviderError::Timeout.to_string(),
        };
        assert!(err.to_string().contains("outbound-1-0"));
        assert!(err.to_string().contains("timed out"));
    }
}
