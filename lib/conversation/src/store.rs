//! The session storage contract.

use crate::error::SessionStoreError;
use crate::session::{ConversationSession, SessionKey};
use crate::turn::Turn;
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use switchboard_core::AgentPersona;

/// Durable mapping from (customer identity, channel) to conversation state.
///
/// This is the only synchronization point shared between in-flight
/// requests. Implementations must serialize appends per key in arrival
/// order; no ordering is promised across different keys.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Gets the session for a key.
    ///
    /// # Errors
    ///
    /// Returns [`SessionStoreError::NotFound`] if no session exists.
    async fn get(&self, key: &SessionKey) -> Result<ConversationSession, SessionStoreError>;

    /// Returns the session for a key, creating it with `default_persona` if
    /// absent. An existing session is returned unchanged.
    async fn create_or_get(
        &self,
        key: &SessionKey,
        default_persona: AgentPersona,
    ) -> Result<ConversationSession, SessionStoreError>;

    /// Atomically appends a batch of turns and returns the updated session.
    ///
    /// The batch lands contiguously: no concurrent append interleaves with it.
    async fn append_turns(
        &self,
        key: &SessionKey,
        turns: Vec<Turn>,
    ) -> Result<ConversationSession, SessionStoreError>;

    /// Atomically appends one turn and returns the updated session.
    async fn append_turn(
        &self,
        key: &SessionKey,
        turn: Turn,
    ) -> Result<ConversationSession, SessionStoreError> {
        self.append_turns(key, vec![turn]).await
    }

    /// Explicitly reassigns the persona of an existing session.
    async fn reassign_persona(
        &self,
        key: &SessionKey,
        persona: AgentPersona,
    ) -> Result<ConversationSession, SessionStoreError>;

    /// Removes sessions whose last activity is more than `idle_threshold`
    /// before `now`. Returns the number evicted.
    async fn evict_idle(
        &self,
        now: DateTime<Utc>,
        idle_threshold: Duration,
    ) -> Result<usize, SessionStoreError>;
}
