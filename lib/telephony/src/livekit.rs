//! LiveKit server API client.
//!
//! Speaks Twirp over JSON: every call is a `POST` to
//! `{api_url}/twirp/livekit.<Service>/<Method>` with a freshly minted server
//! access token as bearer.

use crate::config::ProviderSettings;
use crate::error::ProviderError;
use crate::provider::TelephonyProvider;
use crate::room::{RoomInfo, RoomSpec};
use crate::sip::{CallOutcome, CallResult, SipParticipantRequest, SipRejection};
use crate::token::AccessToken;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;
use tracing::{debug, instrument, warn};

const ROOM_SERVICE: &str = "livekit.RoomService";
const SIP_SERVICE: &str = "livekit.SIP";

/// LiveKit implementation of [`TelephonyProvider`].
#[derive(Debug, Clone)]
pub struct LiveKitClient {
    http: Client,
    api_url: String,
    api_key: String,
    api_secret: String,
}

#[derive(Debug, Serialize)]
struct CreateRoomRequest<'a> {
    name: &'a str,
    empty_timeout: u64,
    max_participants: u32,
}

#[derive(Debug, Serialize)]
struct ListRoomsRequest {}

#[derive(Debug, Serialize)]
struct DeleteRoomRequest<'a> {
    room: &'a str,
}

#[derive(Debug, Serialize)]
struct CreateSipParticipantRequest<'a> {
    sip_trunk_id: &'a str,
    sip_call_to: &'a str,
    room_name: &'a str,
    participant_identity: &'a str,
    play_dialtone: bool,
    wait_until_answered: bool,
}

#[derive(Debug, Deserialize)]
struct ApiRoom {
    #[serde(default)]
    sid: String,
    name: String,
    #[serde(default, alias = "emptyTimeout")]
    empty_timeout: u64,
    #[serde(default, alias = "maxParticipants")]
    max_participants: u32,
    #[serde(default, alias = "numParticipants")]
    num_participants: u32,
    /// Seconds since the epoch; protojson encodes int64 as a string.
    #[serde(default, alias = "creationTime")]
    creation_time: Option<serde_json::Value>,
}

impl ApiRoom {
    fn into_info(self) -> RoomInfo {
        let created_at = self
            .creation_time
            .as_ref()
            .and_then(|v| match v {
                serde_json::Value::String(s) => s.parse::<i64>().ok(),
                other => other.as_i64(),
            })
            .and_then(|secs| DateTime::<Utc>::from_timestamp(secs, 0))
            .unwrap_or_else(Utc::now);

        RoomInfo {
            sid: self.sid,
            name: self.name,
            empty_timeout: Duration::from_secs(self.empty_timeout),
            max_participants: self.max_participants,
            num_participants: self.num_participants,
            created_at,
        }
    }
}

#[derive(Debug, Deserialize)]
struct ListRoomsResponse {
    #[serde(default)]
    rooms: Vec<ApiRoom>,
}

#[derive(Debug, Deserialize)]
struct SipParticipantInfo {
    #[serde(default, alias = "participantId")]
    participant_id: String,
    #[serde(default, alias = "participantIdentity")]
    participant_identity: String,
    #[serde(default, alias = "roomName")]
    room_name: String,
    #[serde(default, alias = "sipCallId")]
    sip_call_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TwirpError {
    code: String,
    #[serde(default)]
    msg: String,
    #[serde(default)]
    meta: HashMap<String, String>,
}

/// A failed Twirp call: either the request never got a Twirp answer, or
/// the server answered with a Twirp error.
#[derive(Debug)]
enum CallError {
    Transport(ProviderError),
    Twirp { status: StatusCode, error: TwirpError },
}

impl From<CallError> for ProviderError {
    fn from(err: CallError) -> Self {
        match err {
            CallError::Transport(e) => e,
            CallError::Twirp { error, .. } if error.code == "unauthenticated" => Self::Unauthorized,
            CallError::Twirp { status, error } => Self::Api {
                status: status.as_u16(),
                code: error.code,
                message: error.msg,
            },
        }
    }
}

impl LiveKitClient {
    /// Creates a client from validated settings.
    ///
    /// # Errors
    ///
    /// Returns [`ProviderError::Setup`] if the HTTP client cannot be built.
    pub fn new(settings: &ProviderSettings) -> Result<Self, ProviderError> {
        let http = Client::builder()
            .timeout(settings.request_timeout)
            .build()
            .map_err(|e| ProviderError::Setup {
                reason: e.to_string(),
            })?;

        Ok(Self {
            http,
            api_url: settings.api_url.clone(),
            api_key: settings.api_key.clone(),
            api_secret: settings.api_secret.clone(),
        })
    }

    async fn call<Req, Resp>(&self, service: &str, method: &str, body: &Req) -> Result<Resp, CallError>
    where
        Req: Serialize + Sync,
        Resp: DeserializeOwned,
    {
        let token = AccessToken::server(&self.api_key, &self.api_secret)
            .to_jwt()
            .map_err(CallError::Transport)?;
        let url = format!("{}/twirp/{service}/{method}", self.api_url);

        let response = self
            .http
            .post(&url)
            .bearer_auth(token)
            .json(body)
            .send()
            .await
            .map_err(|e| {
                CallError::Transport(if e.is_timeout() {
                    ProviderError::Timeout
                } else {
                    ProviderError::Unreachable {
                        reason: e.to_string(),
                    }
                })
            })?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(match serde_json::from_str::<TwirpError>(&text) {
                Ok(error) => CallError::Twirp { status, error },
                Err(_) if status == StatusCode::UNAUTHORIZED => {
                    CallError::Transport(ProviderError::Unauthorized)
                }
                Err(_) => CallError::Transport(ProviderError::Api {
                    status: status.as_u16(),
                    code: "unknown".to_string(),
                    message: text,
                }),
            });
        }

        response.json().await.map_err(|e| {
            CallError::Transport(ProviderError::InvalidResponse {
                reason: e.to_string(),
            })
        })
    }
}

/// A Twirp error is a carrier rejection only when it carries the SIP
/// response code; anything else (unknown trunk, bad request) is a provider
/// failure.
fn sip_rejection(request: &SipParticipantRequest, error: &TwirpError) -> Option<SipRejection> {
    let sip_status_code = error
        .meta
        .get("sip_status_code")
        .and_then(|code| code.parse::<u16>().ok())?;

    let reason = match error.meta.get("sip_status") {
        Some(status) if !status.is_empty() => format!("{}: {status}", error.msg),
        _ => error.msg.clone(),
    };
    Some(SipRejection {
        room_name: request.room_name().to_string(),
        destination_number: request.destination_number().to_string(),
        sip_status_code: Some(sip_status_code),
        reason,
    })
}

#[async_trait]
impl TelephonyProvider for LiveKitClient {
    #[instrument(skip(self, spec), fields(room = %spec.name))]
    async fn create_room(&self, spec: &RoomSpec) -> Result<RoomInfo, ProviderError> {
        let body = CreateRoomRequest {
            name: &spec.name,
            empty_timeout: spec.empty_timeout.as_secs(),
            max_participants: spec.max_participants,
        };
        let room: ApiRoom = self.call(ROOM_SERVICE, "CreateRoom", &body).await?;
        debug!(sid = %room.sid, "room created");
        Ok(room.into_info())
    }

    #[instrument(skip(self))]
    async fn list_rooms(&self) -> Result<Vec<RoomInfo>, ProviderError> {
        let response: ListRoomsResponse =
            self.call(ROOM_SERVICE, "ListRooms", &ListRoomsRequest {}).await?;
        Ok(response.rooms.into_iter().map(ApiRoom::into_info).collect())
    }

    #[instrument(skip(self))]
    async fn delete_room(&self, name: &str) -> Result<(), ProviderError> {
        let _: serde_json::Value = self
            .call(ROOM_SERVICE, "DeleteRoom", &DeleteRoomRequest { room: name })
            .await?;
        Ok(())
    }

    #[instrument(
        skip(self, request),
        fields(room = %request.room_name(), attempt = %request.attempt())
    )]
    async fn create_sip_participant(
        &self,
        request: &SipParticipantRequest,
    ) -> Result<CallOutcome, ProviderError> {
        let body = CreateSipParticipantRequest {
            sip_trunk_id: request.trunk_id(),
            sip_call_to: request.destination_number(),
            room_name: request.room_name(),
            participant_identity: request.participant_identity(),
            play_dialtone: request.plays_dialtone(),
            wait_until_answered: request.waits_until_answered(),
        };

        match self
            .call::<_, SipParticipantInfo>(SIP_SERVICE, "CreateSIPParticipant", &body)
            .await
        {
            Ok(info) => Ok(CallOutcome::Connected(CallResult {
                participant_id: info.participant_id,
                participant_identity: info.participant_identity,
                room_name: info.room_name,
                sip_call_id: info.sip_call_id.filter(|id| !id.is_empty()),
            })),
            Err(CallError::Twirp { status, error }) => match sip_rejection(request, &error) {
                Some(rejection) => Ok(CallOutcome::Rejected(rejection)),
                None => {
                    warn!(code = %error.code, "SIP placement failed");
                    Err(CallError::Twirp { status, error }.into())
                }
            },
            Err(err) => Err(err.into()),
        }
    }

    fn name(&self) -> &str {
        "livekit"
    }
}
