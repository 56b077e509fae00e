//! Voice rooms and outbound SIP calls.
//!
//! [`TelephonyBridge`] creates a fresh room per call attempt and dials a SIP
//! participant into it through a [`TelephonyProvider`]. [`LiveKitClient`]
//! talks to LiveKit; [`FakeTelephonyProvider`] keeps everything in memory.

pub mod bridge;
pub mod config;
pub mod error;
pub mod fake;
pub mod livekit;
pub mod provider;
pub mod room;
pub mod sip;
pub mod token;

pub use bridge::TelephonyBridge;
pub use config::{ProviderSettings, TelephonyConfig, api_url};
pub use error::{BridgeError, ConfigurationError, ProviderError};
pub use fake::FakeTelephonyProvider;
pub use livekit::LiveKitClient;
pub use provider::TelephonyProvider;
pub use room::{RoomInfo, RoomNamer, RoomSpec, VoiceRoom};
pub use sip::{CallOutcome, CallResult, SipParticipantRequest, SipRejection};
pub use token::AccessToken;
