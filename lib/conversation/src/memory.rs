//! In-memory session store.
//!
//! Each session sits behind its own async mutex, so appends for one key
//! serialize in arrival order while other keys proceed independently. The
//! map itself is guarded by a short-lived `RwLock` that is never held
//! across an await point.

use crate::error::SessionStoreError;
use crate::session::{ConversationSession, SessionKey};
use crate::store::SessionStore;
use crate::turn::Turn;
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};
use switchboard_core::AgentPersona;
use tokio::sync::Mutex;
use tracing::debug;

type Slot = Arc<Mutex<ConversationSession>>;

/// A process-local [`SessionStore`].
#[derive(Debug, Default)]
pub struct InMemorySessionStore {
    sessions: RwLock<HashMap<SessionKey, Slot>>,
}

impl InMemorySessionStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of stored sessions.
    pub fn len(&self) -> Result<usize, SessionStoreError> {
        Ok(self.read_map()?.len())
    }

    /// Returns true if no sessions are stored.
    pub fn is_empty(&self) -> Result<bool, SessionStoreError> {
        Ok(self.read_map()?.is_empty())
    }

    fn read_map(&self) -> Result<RwLockReadGuard<'_, HashMap<SessionKey, Slot>>, SessionStoreError> {
        self.sessions.read().map_err(|_| poisoned())
    }

    fn write_map(
        &self,
    ) -> Result<RwLockWriteGuard<'_, HashMap<SessionKey, Slot>>, SessionStoreError> {
        self.sessions.write().map_err(|_| poisoned())
    }

    fn slot(&self, key: &SessionKey) -> Result<Slot, SessionStoreError> {
        self.read_map()?
            .get(key)
            .cloned()
            .ok_or_else(|| not_found(key))
    }

    /// Returns true if `slot` is still the live entry for `key`.
    fn is_current(&self, key: &SessionKey, slot: &Slot) -> Result<bool, SessionStoreError> {
        Ok(self
            .read_map()?
            .get(key)
            .is_some_and(|current| Arc::ptr_eq(current, slot)))
    }
}

fn poisoned() -> SessionStoreError {
    SessionStoreError::Unavailable {
        reason: "session map lock poisoned".to_string(),
    }
}

fn not_found(key: &SessionKey) -> SessionStoreError {
    SessionStoreError::NotFound {
        identity: key.identity.to_string(),
        channel: key.channel,
    }
}

#[async_trait]
impl SessionStore for InMemorySessionStore {
    async fn get(&self, key: &SessionKey) -> Result<ConversationSession, SessionStoreError> {
        let slot = self.slot(key)?;
        let session = slot.lock().await;
        Ok(session.clone())
    }

    async fn create_or_get(
        &self,
        key: &SessionKey,
        default_persona: AgentPersona,
    ) -> Result<ConversationSession, SessionStoreError> {
        let existing = self.read_map()?.get(key).cloned();
        let slot = match existing {
            Some(slot) => slot,
            None => {
                let mut map = self.write_map()?;
                map.entry(key.clone())
                    .or_insert_with(|| {
                        debug!(session = %key, persona = %default_persona, "creating session");
                        Arc::new(Mutex::new(ConversationSession::new(
                            key.clone(),
                            default_persona,
                        )))
                    })
                    .clone()
            }
        };

        let session = slot.lock().await;
        Ok(session.clone())
    }

    async fn append_turns(
        &self,
        key: &SessionKey,
        turns: Vec<Turn>,
    ) -> Result<ConversationSession, SessionStoreError> {
        let slot = self.slot(key)?;
        let mut session = slot.lock().await;

        // Eviction may have removed the entry between lookup and lock.
        if !self.is_current(key, &slot)? {
            return Err(not_found(key));
        }

        for turn in turns {
            session.append(turn);
        }
        Ok(session.clone())
    }

    async fn reassign_persona(
        &self,
        key: &SessionKey,
        persona: AgentPersona,
    ) -> Result<ConversationSession, SessionStoreError> {
        let slot = self.slot(key)?;
        let mut session = slot.lock().await;
        if !self.is_current(key, &slot)? {
            return Err(not_found(key));
        }

        session.persona = persona;
        Ok(session.clone())
    }

    async fn evict_idle(
        &self,
        now: DateTime<Utc>,
        idle_threshold: Duration,
    ) -> Result<usize, SessionStoreError> {
        let mut map = self.write_map()?;
        let before = map.len();

        // A slot that is locked has an operation in flight and is not idle.
        map.retain(|_, slot| match slot.try_lock() {
            Ok(session) => !session.is_idle(now, idle_threshold),
            Err(_) => true,
        });

        Ok(before - map.len())
    }
}
