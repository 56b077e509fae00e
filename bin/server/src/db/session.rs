//! PostgreSQL-backed conversation session store.
//!
//! Sessions live in `conversation_sessions`, one row per (identity, channel)
//! with the turn list as JSONB. Appends lock the row with
//! `SELECT ... FOR UPDATE` inside a transaction, so appends to one session
//! serialize and an eviction waits for an in-flight append to commit.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use sqlx::{FromRow, PgPool, Postgres, Transaction};
use std::str::FromStr;
use switchboard_conversation::{
    ConversationSession, SessionKey, SessionStore, SessionStoreError, Turn,
};
use switchboard_core::{AgentPersona, Channel, ConversationSessionId, CustomerIdentity};
use tracing::{debug, instrument};

/// Table holding conversation sessions.
pub const SESSIONS_TABLE: &str = "conversation_sessions";

/// Row type for session queries.
#[derive(Debug, FromRow)]
struct SessionRow {
    id: String,
    identity: String,
    channel: String,
    persona: String,
    turns: serde_json::Value,
    created_at: DateTime<Utc>,
    last_active_at: DateTime<Utc>,
}

impl SessionRow {
    fn try_into_session(self) -> Result<ConversationSession, SessionStoreError> {
        let id = ConversationSessionId::from_str(&self.id)
            .map_err(|e| corrupt(&self.id, e.to_string()))?;
        let identity =
            CustomerIdentity::new(&self.identity).map_err(|e| corrupt(&self.id, e.to_string()))?;
        let channel = Channel::from_str_value(&self.channel)
            .ok_or_else(|| corrupt(&self.id, format!("unknown channel '{}'", self.channel)))?;
        let persona = AgentPersona::from_str_value(&self.persona)
            .ok_or_else(|| corrupt(&self.id, format!("unknown persona '{}'", self.persona)))?;
        let turns: Vec<Turn> =
            serde_json::from_value(self.turns).map_err(|e| corrupt(&self.id, e.to_string()))?;

        Ok(ConversationSession {
            id,
            identity,
            channel,
            persona,
            turns,
            created_at: self.created_at,
            last_active_at: self.last_active_at,
        })
    }
}

fn corrupt(id: &str, reason: String) -> SessionStoreError {
    SessionStoreError::Unavailable {
        reason: format!("invalid session row '{id}': {reason}"),
    }
}

fn unavailable(err: sqlx::Error) -> SessionStoreError {
    SessionStoreError::Unavailable {
        reason: err.to_string(),
    }
}

fn not_found(key: &SessionKey) -> SessionStoreError {
    SessionStoreError::NotFound {
        identity: key.identity.to_string(),
        channel: key.channel,
    }
}

/// Session store backed by PostgreSQL.
#[derive(Debug, Clone)]
pub struct PgSessionStore {
    pool: PgPool,
}

impl PgSessionStore {
    /// Creates a new session store.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Returns true if the sessions table exists.
    ///
    /// # Errors
    ///
    /// Returns [`SessionStoreError::Unavailable`] if the database cannot be
    /// queried.
    pub async fn table_exists(&self) -> Result<bool, SessionStoreError> {
        sqlx::query_scalar(
            r#"
            SELECT EXISTS (
                SELECT 1 FROM information_schema.tables
                WHERE table_schema = current_schema() AND table_name = $1
            )
            "#,
        )
        .bind(SESSIONS_TABLE)
        .fetch_one(&self.pool)
        .await
        .map_err(unavailable)
    }

    async fn lock_row(
        tx: &mut Transaction<'_, Postgres>,
        key: &SessionKey,
    ) -> Result<ConversationSession, SessionStoreError> {
        let row: Option<SessionRow> = sqlx::query_as(
            r#"
            SELECT id, identity, channel, persona, turns, created_at, last_active_at
            FROM conversation_sessions
            WHERE identity = $1 AND channel = $2
            FOR UPDATE
            "#,
        )
        .bind(key.identity.as_str())
        .bind(key.channel.as_str())
        .fetch_optional(&mut **tx)
        .await
        .map_err(unavailable)?;

        row.ok_or_else(|| not_found(key))?.try_into_session()
    }
}

#[async_trait]
impl SessionStore for PgSessionStore {
    async fn get(&self, key: &SessionKey) -> Result<ConversationSession, SessionStoreError> {
        let row: Option<SessionRow> = sqlx::query_as(
            r#"
            SELECT id, identity, channel, persona, turns, created_at, last_active_at
            FROM conversation_sessions
            WHERE identity = $1 AND channel = $2
            "#,
        )
        .bind(key.identity.as_str())
        .bind(key.channel.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(unavailable)?;

        row.ok_or_else(|| not_found(key))?.try_into_session()
    }

    #[instrument(skip(self), fields(session = %key))]
    async fn create_or_get(
        &self,
        key: &SessionKey,
        default_persona: AgentPersona,
    ) -> Result<ConversationSession, SessionStoreError> {
        let fresh = ConversationSession::new(key.clone(), default_persona);
        let inserted = sqlx::query(
            r#"
            INSERT INTO conversation_sessions
                (id, identity, channel, persona, turns, created_at, last_active_at)
            VALUES ($1, $2, $3, $4, '[]'::jsonb, $5, $6)
            ON CONFLICT (identity, channel) DO NOTHING
            "#,
        )
        .bind(fresh.id.to_string())
        .bind(key.identity.as_str())
        .bind(key.channel.as_str())
        .bind(default_persona.as_str())
        .bind(fresh.created_at)
        .bind(fresh.last_active_at)
        .execute(&self.pool)
        .await
        .map_err(unavailable)?;

        if inserted.rows_affected() == 1 {
            debug!(persona = %default_persona, "session created");
            return Ok(fresh);
        }
        self.get(key).await
    }

    #[instrument(skip(self, turns), fields(session = %key, count = turns.len()))]
    async fn append_turns(
        &self,
        key: &SessionKey,
        turns: Vec<Turn>,
    ) -> Result<ConversationSession, SessionStoreError> {
        let mut tx = self.pool.begin().await.map_err(unavailable)?;
        let mut session = Self::lock_row(&mut tx, key).await?;
        for turn in turns {
            session.append(turn);
        }

        let turns_json = serde_json::to_value(&session.turns).map_err(|e| {
            SessionStoreError::Unavailable {
                reason: format!("failed to encode turns: {e}"),
            }
        })?;
        sqlx::query(
            r#"
            UPDATE conversation_sessions
            SET turns = $2, last_active_at = $3
            WHERE id = $1
            "#,
        )
        .bind(session.id.to_string())
        .bind(turns_json)
        .bind(session.last_active_at)
        .execute(&mut *tx)
        .await
        .map_err(unavailable)?;
        tx.commit().await.map_err(unavailable)?;

        Ok(session)
    }

    #[instrument(skip(self), fields(session = %key))]
    async fn reassign_persona(
        &self,
        key: &SessionKey,
        persona: AgentPersona,
    ) -> Result<ConversationSession, SessionStoreError> {
        let row: Option<SessionRow> = sqlx::query_as(
            r#"
            UPDATE conversation_sessions
            SET persona = $3
            WHERE identity = $1 AND channel = $2
            RETURNING id, identity, channel, persona, turns, created_at, last_active_at
            "#,
        )
        .bind(key.identity.as_str())
        .bind(key.channel.as_str())
        .bind(persona.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(unavailable)?;

        row.ok_or_else(|| not_found(key))?.try_into_session()
    }

    async fn evict_idle(
        &self,
        now: DateTime<Utc>,
        idle_threshold: Duration,
    ) -> Result<usize, SessionStoreError> {
        let result = sqlx::query(
            r#"
            DELETE FROM conversation_sessions
            WHERE last_active_at < $1
            "#,
        )
        .bind(now - idle_threshold)
        .execute(&self.pool)
        .await
        .map_err(unavailable)?;

        Ok(usize::try_from(result.rows_affected()).unwrap_or(usize::MAX))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn row() -> SessionRow {
        let now = Utc::now();
        SessionRow {
            id: ConversationSessionId::new().to_string(),
            identity: "+19145551234".to_string(),
            channel: "sms".to_string(),
            persona: "sms_specialist".to_string(),
            turns: serde_json::to_value(vec![Turn::customer("Hi, I need a DJ for my wedding")])
                .expect("encode"),
            created_at: now,
            last_active_at: now,
        }
    }

    #[test]
    fn row_converts_to_session() {
        let session = row().try_into_session().expect("valid row");
        assert_eq!(session.channel, Channel::Sms);
        assert_eq!(session.persona, AgentPersona::SmsSpecialist);
        assert_eq!(session.identity.as_str(), "+19145551234");
        assert_eq!(session.turns.len(), 1);
    }

    #[test]
    fn unknown_channel_is_reported() {
        let err = SessionRow {
            channel: "fax".to_string(),
            ..row()
        }
        .try_into_session()
        .unwrap_err();
        assert!(err.is_unavailable());
        assert!(err.to_string().contains("unknown channel 'fax'"));
    }

    #[test]
    fn malformed_turns_are_reported() {
        let err = SessionRow {
            turns: json!({ "not": "a list" }),
            ..row()
        }
        .try_into_session()
        .unwrap_err();
        assert!(err.is_unavailable());
    }
}
