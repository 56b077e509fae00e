//! Telephony bridge.
//!
//! Creates one voice room per outbound call attempt and dials a SIP
//! participant into it. A room is always created before a placement is
//! attempted: [`SipParticipantRequest`] can only be built from a
//! [`VoiceRoom`]. Placements are never retried.

use crate::config::ProviderSettings;
use crate::error::{BridgeError, ProviderError};
use crate::provider::TelephonyProvider;
use crate::room::{RoomInfo, RoomNamer, RoomSpec, VoiceRoom};
use crate::sip::{CallOutcome, SipParticipantRequest};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, instrument, warn};

/// Places outbound calls through a [`TelephonyProvider`].
pub struct TelephonyBridge {
    provider: Arc<dyn TelephonyProvider>,
    namer: RoomNamer,
    sip_trunk_id: String,
}

impl std::fmt::Debug for TelephonyBridge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TelephonyBridge")
            .field("provider", &self.provider.name())
            .field("sip_trunk_id", &self.sip_trunk_id)
            .finish_non_exhaustive()
    }
}

impl TelephonyBridge {
    /// Creates a bridge dialing through `sip_trunk_id`.
    #[must_use]
    pub fn new(provider: Arc<dyn TelephonyProvider>, sip_trunk_id: impl Into<String>) -> Self {
        Self {
            provider,
            namer: RoomNamer::new(),
            sip_trunk_id: sip_trunk_id.into(),
        }
    }

    /// Creates a bridge from validated settings.
    #[must_use]
    pub fn from_settings(provider: Arc<dyn TelephonyProvider>, settings: &ProviderSettings) -> Self {
        Self::new(provider, settings.sip_trunk_id.clone())
    }

    /// Creates a room named `<name_prefix>-<millis>-<seq>`.
    ///
    /// If the provider's answer is lost (timeout, unreadable response) the
    /// room may exist anyway; it is deleted on a best-effort basis so a
    /// failed creation leaves nothing behind.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::RoomCreationFailed`] on any provider failure.
    #[instrument(skip(self))]
    pub async fn create_voice_room(
        &self,
        name_prefix: &str,
        empty_timeout: Duration,
        max_participants: u32,
    ) -> Result<VoiceRoom, BridgeError> {
        let spec = RoomSpec {
            name: self.namer.next_name(name_prefix),
            empty_timeout,
            max_participants,
        };

        match self.provider.create_room(&spec).await {
            Ok(info) => {
                info!(room = %info.name, sid = %info.sid, "voice room created");
                Ok(VoiceRoom::from_info(info))
            }
            Err(err) => {
                warn!(room = %spec.name, error = %err, "voice room creation failed");
                if matches!(
                    err,
                    ProviderError::Timeout | ProviderError::InvalidResponse { .. }
                ) {
                    if let Err(cleanup) = self.provider.delete_room(&spec.name).await {
                        warn!(room = %spec.name, error = %cleanup, "cleanup of half-created room failed");
                    }
                }
                Err(BridgeError::RoomCreationFailed {
                    room: spec.name,
                    reason: err.to_string(),
                })
            }
        }
    }

    /// Builds a request to dial `destination_number` into `room` through the
    /// configured trunk.
    #[must_use]
    pub fn outbound_request(
        &self,
        room: &VoiceRoom,
        destination_number: impl Into<String>,
    ) -> SipParticipantRequest {
        SipParticipantRequest::for_room(room, &self.sip_trunk_id, destination_number)
    }

    /// Dials the request's participant into its room, once.
    ///
    /// A carrier or provider rejection is returned as
    /// [`CallOutcome::Rejected`]; the room stays valid.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::CallPlacementFailed`] if the provider could
    /// not be reached or failed.
    #[instrument(
        skip(self, request),
        fields(room = %request.room_name(), attempt = %request.attempt())
    )]
    pub async fn place_outbound_call(
        &self,
        request: SipParticipantRequest,
    ) -> Result<CallOutcome, BridgeError> {
        match self.provider.create_sip_participant(&request).await {
            Ok(CallOutcome::Connected(result)) => {
                info!(participant = %result.participant_identity, "call connected");
                Ok(CallOutcome::Connected(result))
            }
            Ok(CallOutcome::Rejected(rejection)) => {
                warn!(
                    sip_status = ?rejection.sip_status_code,
                    reason = %rejection.reason,
                    "call rejected"
                );
                Ok(CallOutcome::Rejected(rejection))
            }
            Err(err) => {
                warn!(error = %err, "call placement failed");
                Err(BridgeError::CallPlacementFailed {
                    room: request.room_name().to_string(),
                    reason: err.to_string(),
                })
            }
        }
    }

    /// Deletes a room after its call attempt is over.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::RoomReleaseFailed`] if the provider fails.
    #[instrument(skip(self, room), fields(room = %room.name()))]
    pub async fn release_room(&self, room: VoiceRoom) -> Result<(), BridgeError> {
        if let Err(err) = self.provider.delete_room(room.name()).await {
            return Err(BridgeError::RoomReleaseFailed {
                room: room.name,
                reason: err.to_string(),
            });
        }
        info!("voice room released");
        Ok(())
    }

    /// Lists open rooms whose name starts with `<prefix>-`.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::RoomListFailed`] if the provider fails.
    pub async fn list_rooms(&self, prefix: &str) -> Result<Vec<RoomInfo>, BridgeError> {
        let wanted = format!("{}-", prefix.trim_end_matches('-'));
        let rooms = self
            .provider
            .list_rooms()
            .await
            .map_err(|err| BridgeError::RoomListFailed {
                reason: err.to_string(),
            })?;
        Ok(rooms
            .into_iter()
            .filter(|room| room.name.starts_with(&wanted))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fake::FakeTelephonyProvider;
    use crate::sip::SipRejection;

    fn bridge(provider: &Arc<FakeTelephonyProvider>) -> TelephonyBridge {
        TelephonyBridge::new(Arc::clone(provider) as Arc<dyn TelephonyProvider>, "ST_abc")
    }

    #[tokio::test]
    async fn creates_room_then_places_call() {
        let provider = Arc::new(FakeTelephonyProvider::new());
        let bridge = bridge(&provider);

        let room = bridge
            .create_voice_room("outbound", Duration::from_secs(300), 2)
            .await
            .expect("room");
        assert!(room.name().starts_with("outbound-"));
        assert_eq!(room.max_participants(), 2);

        let outcome = bridge
            .place_outbound_call(bridge.outbound_request(&room, "+19015551234"))
            .await
            .expect("place");
        assert!(outcome.is_connected());
        assert_eq!(provider.placements(), vec![room.name().to_string()]);
    }

    #[tokio::test]
    async fn room_creation_failure_reports_room() {
        let provider = Arc::new(FakeTelephonyProvider::new().fail_room_creation(
            ProviderError::Api {
                status: 500,
                code: "internal".to_string(),
                message: "boom".to_string(),
            },
        ));
        let err = bridge(&provider)
            .create_voice_room("outbound", Duration::from_secs(300), 2)
            .await
            .unwrap_err();

        assert!(matches!(err, BridgeError::RoomCreationFailed { .. }));
        assert!(provider.rooms().is_empty());
        assert!(provider.deleted().is_empty());
    }

    #[tokio::test]
    async fn lost_creation_answer_cleans_up() {
        let provider =
            Arc::new(FakeTelephonyProvider::new().fail_room_creation(ProviderError::Timeout));
        let err = bridge(&provider)
            .create_voice_room("outbound", Duration::from_secs(300), 2)
            .await
            .unwrap_err();

        let BridgeError::RoomCreationFailed { room, .. } = err else {
            panic!("expected room creation failure");
        };
        assert_eq!(provider.deleted(), vec![room]);
    }

    #[tokio::test]
    async fn rejection_is_data_and_room_survives() {
        let provider = Arc::new(FakeTelephonyProvider::new().reject_calls(Some(404), "Not Found"));
        let bridge = bridge(&provider);

        let room = bridge
            .create_voice_room("outbound", Duration::from_secs(300), 2)
            .await
            .expect("room");
        let outcome = bridge
            .place_outbound_call(bridge.outbound_request(&room, "+15555555555"))
            .await
            .expect("rejection is not an error");

        assert_eq!(
            outcome,
            CallOutcome::Rejected(SipRejection {
                room_name: room.name().to_string(),
                destination_number: "+15555555555".to_string(),
                sip_status_code: Some(404),
                reason: "Not Found".to_string(),
            })
        );
        let rooms = bridge.list_rooms("outbound").await.expect("list");
        assert_eq!(rooms.len(), 1);
        assert_eq!(rooms[0].name, room.name());
    }

    #[tokio::test]
    async fn transport_failure_is_placement_failure() {
        let provider = Arc::new(FakeTelephonyProvider::new().fail_calls(ProviderError::Timeout));
        let bridge = bridge(&provider);
        let room = bridge
            .create_voice_room("outbound", Duration::from_secs(300), 2)
            .await
            .expect("room");

        let err = bridge
            .place_outbound_call(bridge.outbound_request(&room, "+15555555555"))
            .await
            .unwrap_err();
        assert!(matches!(err, BridgeError::CallPlacementFailed { .. }));
        assert_eq!(provider.placements().len(), 1);
    }

    #[tokio::test]
    async fn release_and_list_by_prefix() {
        let provider = Arc::new(FakeTelephonyProvider::new());
        let bridge = bridge(&provider);
        let outbound = bridge
            .create_voice_room("outbound", Duration::from_secs(60), 2)
            .await
            .expect("room");
        bridge
            .create_voice_room("inbound", Duration::from_secs(60), 2)
            .await
            .expect("room");

        assert_eq!(bridge.list_rooms("outbound").await.expect("list").len(), 1);

        let name = outbound.name().to_string();
        bridge.release_room(outbound).await.expect("release");
        assert!(bridge.list_rooms("outbound").await.expect("list").is_empty());
        assert_eq!(provider.deleted(), vec![name]);
    }

    #[tokio::test]
    async fn concurrent_attempts_get_distinct_rooms() {
        let provider = Arc::new(FakeTelephonyProvider::new());
        let bridge = Arc::new(bridge(&provider));

        let attempts = (0..20).map(|_| {
            let bridge = Arc::clone(&bridge);
            async move {
                bridge
                    .create_voice_room("outbound", Duration::from_secs(60), 2)
                    .await
                    .expect("room")
                    .name()
                    .to_string()
            }
        });
        let mut names = futures::future::join_all(attempts).await;
        names.sort();
        names.dedup();
        assert_eq!(names.len(), 20);
    }
}
