//! Strongly-typed ID types for domain entities.
//!
//! All IDs use ULID (Universally Unique Lexicographically Sortable Identifier) format
//! and display with a short type prefix (`sess_`, `turn_`, `call_`).

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use ulid::Ulid;

/// An ID string that is neither `<prefix>_<ulid>` nor a bare ULID.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseIdError {
    pub id_type: &'static str,
    pub reason: String,
}

impl fmt::Display for ParseIdError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid {}: {}", self.id_type, self.reason)
    }
}

impl std::error::Error for ParseIdError {}

fn parse_prefixed(s: &str, prefix: &str, id_type: &'static str) -> Result<Ulid, ParseIdError> {
    let raw = s
        .strip_prefix(prefix)
        .and_then(|rest| rest.strip_prefix('_'))
        .unwrap_or(s);
    Ulid::from_str(raw).map_err(|e| ParseIdError {
        id_type,
        reason: e.to_string(),
    })
}

/// Declares ULID-backed ID newtypes that display as `<prefix>_<ulid>`.
macro_rules! ids {
    ($($(#[$meta:meta])* $name:ident => $prefix:literal;)+) => {$(
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(Ulid);

        impl $name {
            /// Generates a fresh ID.
            #[must_use]
            pub fn new() -> Self {
                Self(Ulid::new())
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, concat!($prefix, "_{}"), self.0)
            }
        }

        impl FromStr for $name {
            type Err = ParseIdError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                parse_prefixed(s, $prefix, stringify!($name)).map(Self)
            }
        }
    )+};
}

ids! {
    /// A conversation session.
    ConversationSessionId => "sess";
    /// One turn within a conversation.
    TurnId => "turn";
    /// One outbound call attempt.
    CallAttemptId => "call";
}
