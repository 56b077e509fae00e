//! Conversation sessions.
//!
//! A session holds one customer's turns on one channel. Sessions are owned
//! by a [`SessionStore`](crate::store::SessionStore); the router only ever
//! sees copies returned by the store.

use crate::turn::{Turn, TurnRole};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use switchboard_core::{AgentPersona, Channel, ConversationSessionId, CustomerIdentity};

/// The key a session is stored under: one session per (identity, channel).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionKey {
    /// The customer.
    pub identity: CustomerIdentity,
    /// The channel the customer is using.
    pub channel: Channel,
}

impl SessionKey {
    /// Creates a session key.
    #[must_use]
    pub fn new(identity: CustomerIdentity, channel: Channel) -> Self {
        Self { identity, channel }
    }
}

impl fmt::Display for SessionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.channel, self.identity)
    }
}

/// Lifecycle state of a session, derived lazily rather than polled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    /// Created, no successful reply yet.
    New,
    /// At least one reply, traffic within the idle threshold.
    Active,
    /// No traffic for the idle threshold; eligible for eviction.
    Idle,
    /// Evicted from the store.
    Expired,
}

impl SessionState {
    /// Returns the string representation used in logs and responses.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::New => "new",
            Self::Active => "active",
            Self::Idle => "idle",
            Self::Expired => "expired",
        }
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A conversation session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationSession {
    /// Unique session identifier.
    pub id: ConversationSessionId,
    /// The customer this session belongs to.
    pub identity: CustomerIdentity,
    /// The channel this session is on.
    pub channel: Channel,
    /// Persona answering this session.
    pub persona: AgentPersona,
    /// Turns in arrival order.
    pub turns: Vec<Turn>,
    /// When the session was created.
    pub created_at: DateTime<Utc>,
    /// When the last turn was appended (or creation time).
    pub last_active_at: DateTime<Utc>,
}

impl ConversationSession {
    /// Creates an empty session.
    #[must_use]
    pub fn new(key: SessionKey, persona: AgentPersona) -> Self {
        Self::new_at(key, persona, Utc::now())
    }

    /// Creates an empty session with an explicit creation time.
    #[must_use]
    pub fn new_at(key: SessionKey, persona: AgentPersona, now: DateTime<Utc>) -> Self {
        Self {
            id: ConversationSessionId::new(),
            identity: key.identity,
            channel: key.channel,
            persona,
            turns: Vec::new(),
            created_at: now,
            last_active_at: now,
        }
    }

    /// Returns the store key for this session.
    #[must_use]
    pub fn key(&self) -> SessionKey {
        SessionKey::new(self.identity.clone(), self.channel)
    }

    /// Appends a turn.
    ///
    /// The turn's timestamp is raised to the previous turn's timestamp if it
    /// is earlier, so the turn list stays ordered by timestamp in arrival
    /// order. Only session stores call this.
    pub fn append(&mut self, mut turn: Turn) {
        if let Some(last) = self.turns.last() {
            if turn.timestamp < last.timestamp {
                turn.timestamp = last.timestamp;
            }
        }
        if turn.timestamp > self.last_active_at {
            self.last_active_at = turn.timestamp;
        }
        self.turns.push(turn);
    }

    /// Returns the number of turns.
    #[must_use]
    pub fn turn_count(&self) -> usize {
        self.turns.len()
    }

    /// Returns the last turn, if any.
    #[must_use]
    pub fn last_turn(&self) -> Option<&Turn> {
        self.turns.last()
    }

    /// Returns the most recent `limit` turns, oldest first.
    #[must_use]
    pub fn history(&self, limit: usize) -> &[Turn] {
        let start = self.turns.len().saturating_sub(limit);
        &self.turns[start..]
    }

    /// Returns true once the agent has replied at least once.
    #[must_use]
    pub fn has_replied(&self) -> bool {
        self.turns.iter().any(|t| t.role == TurnRole::Assistant)
    }

    /// Returns true if the session has seen no traffic for longer than
    /// `idle_threshold`.
    #[must_use]
    pub fn is_idle(&self, now: DateTime<Utc>, idle_threshold: Duration) -> bool {
        now - self.last_active_at > idle_threshold
    }

    /// Derives the lifecycle state at `now`.
    #[must_use]
    pub fn state(&self, now: DateTime<Utc>, idle_threshold: Duration) -> SessionState {
        if self.is_idle(now, idle_threshold) {
            SessionState::Idle
        } else if self.has_replied() {
            SessionState::Active
        } else {
            SessionState::New
        }
    }
}
