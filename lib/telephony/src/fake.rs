//! In-memory telephony provider for tests and dry runs.

use crate::error::ProviderError;
use crate::provider::TelephonyProvider;
use crate::room::{RoomInfo, RoomSpec};
use crate::sip::{CallOutcome, CallResult, SipParticipantRequest, SipRejection};
use async_trait::async_trait;
use chrono::Utc;
use std::sync::{Mutex, MutexGuard, PoisonError};

#[derive(Debug, Default)]
struct State {
    rooms: Vec<RoomInfo>,
    deleted: Vec<String>,
    placements: Vec<String>,
    next_sid: u64,
}

#[derive(Debug, Clone)]
enum CallBehavior {
    Connect,
    Reject {
        sip_status_code: Option<u16>,
        reason: String,
    },
    Fail(ProviderError),
}

/// A [`TelephonyProvider`] that keeps rooms in memory.
///
/// Calls connect by default; [`FakeTelephonyProvider::reject_calls`] and
/// [`FakeTelephonyProvider::fail_calls`] change that. Placements into a room
/// that does not exist are rejected, as the real provider does.
#[derive(Debug)]
pub struct FakeTelephonyProvider {
    state: Mutex<State>,
    room_failure: Option<ProviderError>,
    calls: CallBehavior,
}

impl Default for FakeTelephonyProvider {
    fn default() -> Self {
        Self {
            state: Mutex::new(State::default()),
            room_failure: None,
            calls: CallBehavior::Connect,
        }
    }
}

impl FakeTelephonyProvider {
    /// Creates a provider where everything succeeds.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Fails every room creation with `err`.
    #[must_use]
    pub fn fail_room_creation(mut self, err: ProviderError) -> Self {
        self.room_failure = Some(err);
        self
    }

    /// Rejects every placement.
    #[must_use]
    pub fn reject_calls(mut self, sip_status_code: Option<u16>, reason: impl Into<String>) -> Self {
        self.calls = CallBehavior::Reject {
            sip_status_code,
            reason: reason.into(),
        };
        self
    }

    /// Fails every placement with `err`.
    #[must_use]
    pub fn fail_calls(mut self, err: ProviderError) -> Self {
        self.calls = CallBehavior::Fail(err);
        self
    }

    /// Rooms currently open.
    #[must_use]
    pub fn rooms(&self) -> Vec<RoomInfo> {
        self.state().rooms.clone()
    }

    /// Names passed to `delete_room`, in order.
    #[must_use]
    pub fn deleted(&self) -> Vec<String> {
        self.state().deleted.clone()
    }

    /// Room names placements were attempted into, in order.
    #[must_use]
    pub fn placements(&self) -> Vec<String> {
        self.state().placements.clone()
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl TelephonyProvider for FakeTelephonyProvider {
    async fn create_room(&self, spec: &RoomSpec) -> Result<RoomInfo, ProviderError> {
        if let Some(err) = &self.room_failure {
            return Err(err.clone());
        }

        let mut state = self.state();
        if let Some(existing) = state.rooms.iter().find(|r| r.name == spec.name) {
            return Ok(existing.clone());
        }

        state.next_sid += 1;
        let info = RoomInfo {
            sid: format!("RM_{}", state.next_sid),
            name: spec.name.clone(),
            empty_timeout: spec.empty_timeout,
            max_participants: spec.max_participants,
            num_participants: 0,
            created_at: Utc::now(),
        };
        state.rooms.push(info.clone());
        Ok(info)
    }

    async fn list_rooms(&self) -> Result<Vec<RoomInfo>, ProviderError> {
        Ok(self.rooms())
    }

    async fn delete_room(&self, name: &str) -> Result<(), ProviderError> {
        let mut state = self.state();
        state.rooms.retain(|r| r.name != name);
        state.deleted.push(name.to_string());
        Ok(())
    }

    async fn create_sip_participant(
        &self,
        request: &SipParticipantRequest,
    ) -> Result<CallOutcome, ProviderError> {
        let mut state = self.state();
        state.placements.push(request.room_name().to_string());

        let rejection = |sip_status_code, reason: &str| {
            CallOutcome::Rejected(SipRejection {
                room_name: request.room_name().to_string(),
                destination_number: request.destination_number().to_string(),
                sip_status_code,
                reason: reason.to_string(),
            })
        };

        match &self.calls {
            CallBehavior::Fail(err) => Err(err.clone()),
            _ if !state.rooms.iter().any(|r| r.name == request.room_name()) => {
                Ok(rejection(None, "room not found"))
            }
            CallBehavior::Reject {
                sip_status_code,
                reason,
            } => Ok(rejection(*sip_status_code, reason)),
            CallBehavior::Connect => {
                if let Some(room) = state
                    .rooms
                    .iter_mut()
                    .find(|r| r.name == request.room_name())
                {
                    room.num_participants += 1;
                }
                Ok(CallOutcome::Connected(CallResult {
                    participant_id: format!("PA_{}", request.attempt()),
                    participant_identity: request.participant_identity().to_string(),
                    room_name: request.room_name().to_string(),
                    sip_call_id: Some(format!("SCL_{}", request.attempt())),
                }))
            }
        }
    }

    fn name(&self) -> &str {
        "fake"
    }
}
