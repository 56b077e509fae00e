//! SIP participant placement types.

use crate::room::VoiceRoom;
use serde::{Deserialize, Serialize};
use switchboard_core::CallAttemptId;

/// A request to dial a number into a voice room.
///
/// Only constructible from an existing [`VoiceRoom`], and consumed by value
/// when placed, so each request is dialed at most once.
#[derive(Debug, PartialEq, Eq, Serialize)]
pub struct SipParticipantRequest {
    attempt: CallAttemptId,
    trunk_id: String,
    destination_number: String,
    room_name: String,
    participant_identity: String,
    play_dialtone: bool,
    wait_until_answered: bool,
}

impl SipParticipantRequest {
    /// Creates a request to dial `destination_number` into `room` through
    /// `trunk_id`.
    ///
    /// Defaults: participant identity `sip-<digits>`, no dial tone, wait
    /// until answered.
    #[must_use]
    pub fn for_room(
        room: &VoiceRoom,
        trunk_id: impl Into<String>,
        destination_number: impl Into<String>,
    ) -> Self {
        let destination_number = destination_number.into();
        let digits: String = destination_number
            .chars()
            .filter(char::is_ascii_digit)
            .collect();

        Self {
            attempt: CallAttemptId::new(),
            trunk_id: trunk_id.into(),
            participant_identity: format!("sip-{digits}"),
            destination_number,
            room_name: room.name().to_string(),
            play_dialtone: false,
            wait_until_answered: true,
        }
    }

    /// Sets the identity the dialed participant joins as.
    #[must_use]
    pub fn with_participant_identity(mut self, identity: impl Into<String>) -> Self {
        self.participant_identity = identity.into();
        self
    }

    /// Plays a dial tone into the room while the call rings.
    #[must_use]
    pub fn with_dialtone(mut self, play: bool) -> Self {
        self.play_dialtone = play;
        self
    }

    /// Waits for the callee to answer before the placement returns.
    #[must_use]
    pub fn wait_until_answered(mut self, wait: bool) -> Self {
        self.wait_until_answered = wait;
        self
    }

    #[must_use]
    pub fn attempt(&self) -> CallAttemptId {
        self.attempt
    }

    #[must_use]
    pub fn trunk_id(&self) -> &str {
        &self.trunk_id
    }

    #[must_use]
    pub fn destination_number(&self) -> &str {
        &self.destination_number
    }

    #[must_use]
    pub fn room_name(&self) -> &str {
        &self.room_name
    }

    #[must_use]
    pub fn participant_identity(&self) -> &str {
        &self.participant_identity
    }

    #[must_use]
    pub fn plays_dialtone(&self) -> bool {
        self.play_dialtone
    }

    #[must_use]
    pub fn waits_until_answered(&self) -> bool {
        self.wait_until_answered
    }
}

/// A SIP participant that joined the room.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallResult {
    pub participant_id: String,
    pub participant_identity: String,
    pub room_name: String,
    pub sip_call_id: Option<String>,
}

/// The provider or carrier declined the call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SipRejection {
    pub room_name: String,
    pub destination_number: String,
    /// SIP response code, e.g. 404 or 486, when the carrier gave one.
    pub sip_status_code: Option<u16>,
    pub reason: String,
}

/// How a placement attempt ended.
///
/// A rejection is an expected outcome: verification probes dial known-bad
/// numbers on purpose.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum CallOutcome {
    Connected(CallResult),
    Rejected(SipRejection),
}

impl CallOutcome {
    /// Returns true if the call connected.
    #[must_use]
    pub fn is_connected(&self) -> bool {
        matches!(self, Self::Connected(_))
    }
}
