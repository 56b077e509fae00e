//! The telephony provider contract.

use crate::error::ProviderError;
use crate::room::{RoomInfo, RoomSpec};
use crate::sip::{CallOutcome, SipParticipantRequest};
use async_trait::async_trait;

/// Room management and SIP placement at a telephony provider.
///
/// Implementations normalize their wire errors into [`ProviderError`]; a
/// call the provider or carrier declines is [`CallOutcome::Rejected`], not
/// an error.
#[async_trait]
pub trait TelephonyProvider: Send + Sync {
    /// Creates a room.
    async fn create_room(&self, spec: &RoomSpec) -> Result<RoomInfo, ProviderError>;

    /// Lists open rooms.
    async fn list_rooms(&self) -> Result<Vec<RoomInfo>, ProviderError>;

    /// Deletes a room by name.
    async fn delete_room(&self, name: &str) -> Result<(), ProviderError>;

    /// Dials a SIP participant into a room.
    async fn create_sip_participant(
        &self,
        request: &SipParticipantRequest,
    ) -> Result<CallOutcome, ProviderError>;

    /// Returns a short name for logs.
    fn name(&self) -> &str;
}
