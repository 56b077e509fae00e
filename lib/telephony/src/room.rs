//! Voice rooms and room naming.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// Generates room names that are never reused within the process.
///
/// Names are `<prefix>-<millis>-<seq>`. `millis` is wall-clock time forced to
/// increase strictly with each name, so two names never share it even when
/// generated within the same millisecond or after the clock steps back.
/// `seq` counts names issued by this namer.
#[derive(Debug, Default)]
pub struct RoomNamer {
    last_millis: AtomicU64,
    seq: AtomicU64,
}

impl RoomNamer {
    /// Creates a namer.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the next room name for `prefix`.
    pub fn next_name(&self, prefix: &str) -> String {
        let now = u64::try_from(Utc::now().timestamp_millis()).unwrap_or_default();
        let previous = self
            .last_millis
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |last| {
                Some(now.max(last + 1))
            })
            .unwrap_or_else(|last| last);
        let millis = now.max(previous + 1);
        let seq = self.seq.fetch_add(1, Ordering::SeqCst);

        format!("{}-{millis}-{seq}", prefix.trim_end_matches('-'))
    }
}

/// What to ask the provider for when creating a room.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoomSpec {
    pub name: String,
    /// How long the room stays open with nobody in it.
    pub empty_timeout: Duration,
    pub max_participants: u32,
}

/// A room as reported by the provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoomInfo {
    /// Provider-assigned id.
    pub sid: String,
    pub name: String,
    pub empty_timeout: Duration,
    pub max_participants: u32,
    pub num_participants: u32,
    pub created_at: DateTime<Utc>,
}

/// A voice room created for exactly one outbound call attempt.
///
/// Not `Clone`: the call attempt that created the room owns it.
#[derive(Debug, PartialEq, Eq, Serialize)]
pub struct VoiceRoom {
    pub(crate) sid: String,
    pub(crate) name: String,
    pub(crate) created_at: DateTime<Utc>,
    pub(crate) empty_timeout: Duration,
    pub(crate) max_participants: u32,
}

impl VoiceRoom {
    pub(crate) fn from_info(info: RoomInfo) -> Self {
        Self {
            sid: info.sid,
            name: info.name,
            created_at: info.created_at,
            empty_timeout: info.empty_timeout,
            max_participants: info.max_participants,
        }
    }

    /// Provider-assigned id.
    #[must_use]
    pub fn sid(&self) -> &str {
        &self.sid
    }

    /// Room name, unique per call attempt.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    #[must_use]
    pub fn empty_timeout(&self) -> Duration {
        self.empty_timeout
    }

    #[must_use]
    pub fn max_participants(&self) -> u32 {
        self.max_participants
    }
}
