//! Turns: the unit appended to a conversation session.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use switchboard_core::TurnId;

/// Who produced a turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TurnRole {
    /// The customer (inbound message).
    Customer,
    /// The agent (outbound reply).
    Assistant,
    /// Platform-generated note.
    System,
}

/// One message appended to a conversation session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Turn {
    /// Unique turn identifier.
    pub id: TurnId,
    /// Who produced the turn.
    pub role: TurnRole,
    /// Message text.
    pub text: String,
    /// When the turn was recorded.
    pub timestamp: DateTime<Utc>,
}

impl Turn {
    /// Creates a turn stamped with the current time.
    #[must_use]
    pub fn new(role: TurnRole, text: impl Into<String>) -> Self {
        Self::at(role, text, Utc::now())
    }

    /// Creates a turn with an explicit timestamp.
    #[must_use]
    pub fn at(role: TurnRole, text: impl Into<String>, timestamp: DateTime<Utc>) -> Self {
        Self {
            id: TurnId::new(),
            role,
            text: text.into(),
            timestamp,
        }
    }

    /// Creates a customer turn.
    #[must_use]
    pub fn customer(text: impl Into<String>) -> Self {
        Self::new(TurnRole::Customer, text)
    }

    /// Creates an assistant turn.
    #[must_use]
    pub fn assistant(text: impl Into<String>) -> Self {
        Self::new(TurnRole::Assistant, text)
    }
}
