//! Provider access tokens.
//!
//! LiveKit server API calls are authorized by an HS256 JWT signed with the
//! API secret, issued by the API key, and carrying `video` and `sip` grants.

use crate::error::ProviderError;
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use chrono::Utc;
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use std::time::Duration;

/// Room permissions.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoGrant {
    #[serde(default, skip_serializing_if = "is_false")]
    pub room_create: bool,
    #[serde(default, skip_serializing_if = "is_false")]
    pub room_list: bool,
    #[serde(default, skip_serializing_if = "is_false")]
    pub room_admin: bool,
    /// Room the admin grant applies to; all rooms when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub room: Option<String>,
}

/// SIP permissions.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SipGrant {
    #[serde(default, skip_serializing_if = "is_false")]
    pub admin: bool,
    #[serde(default, skip_serializing_if = "is_false")]
    pub call: bool,
}

fn is_false(value: &bool) -> bool {
    !*value
}

/// Token claims.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    pub iss: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sub: Option<String>,
    pub nbf: i64,
    pub exp: i64,
    pub video: VideoGrant,
    pub sip: SipGrant,
}

#[derive(Serialize)]
struct Header {
    alg: &'static str,
    typ: &'static str,
}

/// Builder for a signed access token.
#[derive(Debug, Clone)]
pub struct AccessToken {
    api_key: String,
    api_secret: String,
    identity: Option<String>,
    ttl: Duration,
    video: VideoGrant,
    sip: SipGrant,
}

impl AccessToken {
    /// Creates a token with no grants and a ten-minute lifetime.
    #[must_use]
    pub fn new(api_key: impl Into<String>, api_secret: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            api_secret: api_secret.into(),
            identity: None,
            ttl: Duration::from_secs(600),
            video: VideoGrant::default(),
            sip: SipGrant::default(),
        }
    }

    /// Creates a token for server-side room administration and SIP calls.
    #[must_use]
    pub fn server(api_key: impl Into<String>, api_secret: impl Into<String>) -> Self {
        Self::new(api_key, api_secret)
            .with_video_grant(VideoGrant {
                room_create: true,
                room_list: true,
                room_admin: true,
                room: None,
            })
            .with_sip_grant(SipGrant {
                admin: true,
                call: true,
            })
    }

    #[must_use]
    pub fn with_identity(mut self, identity: impl Into<String>) -> Self {
        self.identity = Some(identity.into());
        self
    }

    #[must_use]
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    #[must_use]
    pub fn with_video_grant(mut self, grant: VideoGrant) -> Self {
        self.video = grant;
        self
    }

    #[must_use]
    pub fn with_sip_grant(mut self, grant: SipGrant) -> Self {
        self.sip = grant;
        self
    }

    /// Returns the claims a token minted now would carry.
    #[must_use]
    pub fn claims(&self) -> Claims {
        let now = Utc::now().timestamp();
        let ttl = i64::try_from(self.ttl.as_secs()).unwrap_or(i64::MAX);
        Claims {
            iss: self.api_key.clone(),
            sub: self.identity.clone(),
            nbf: now,
            exp: now.saturating_add(ttl),
            video: self.video.clone(),
            sip: self.sip.clone(),
        }
    }

    /// Signs the token.
    ///
    /// # Errors
    ///
    /// Returns [`ProviderError::Setup`] if the claims cannot be encoded or
    /// the secret cannot key the MAC.
    pub fn to_jwt(&self) -> Result<String, ProviderError> {
        let header = encode_json(&Header {
            alg: "HS256",
            typ: "JWT",
        })?;
        let claims = encode_json(&self.claims())?;
        let signing_input = format!("{header}.{claims}");

        let mut mac = Hmac::<Sha256>::new_from_slice(self.api_secret.as_bytes()).map_err(|e| {
            ProviderError::Setup {
                reason: e.to_string(),
            }
        })?;
        mac.update(signing_input.as_bytes());
        let signature = URL_SAFE_NO_PAD.encode(mac.finalize().into_bytes());

        Ok(format!("{signing_input}.{signature}"))
    }
}

fn encode_json<T: Serialize>(value: &T) -> Result<String, ProviderError> {
    let json = serde_json::to_vec(value).map_err(|e| ProviderError::Setup {
        reason: e.to_string(),
    })?;
    Ok(URL_SAFE_NO_PAD.encode(json))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decode<T: for<'de> Deserialize<'de>>(part: &str) -> T {
        let bytes = URL_SAFE_NO_PAD.decode(part).expect("base64");
        serde_json::from_slice(&bytes).expect("json")
    }

    #[test]
    fn server_token_carries_admin_and_sip_grants() {
        let jwt = AccessToken::server("APIkey", "secret")
            .to_jwt()
            .expect("sign");
        let parts: Vec<_> = jwt.split('.').collect();
        assert_eq!(parts.len(), 3);

        let header: serde_json::Value = decode(parts[0]);
        assert_eq!(header["alg"], "HS256");

        let claims: Claims = decode(parts[1]);
        assert_eq!(claims.iss, "APIkey");
        assert_eq!(claims.exp - claims.nbf, 600);
        assert!(claims.video.room_create && claims.video.room_list && claims.video.room_admin);
        assert!(claims.sip.admin && claims.sip.call);
    }

    #[test]
    fn signature_verifies_with_secret() {
        let jwt = AccessToken::server("APIkey", "secret")
            .to_jwt()
            .expect("sign");
        let (signing_input, signature) = jwt.rsplit_once('.').expect("signature");

        let mut mac = Hmac::<Sha256>::new_from_slice(b"secret").expect("key");
        mac.update(signing_input.as_bytes());
        let expected = URL_SAFE_NO_PAD.decode(signature).expect("base64");
        assert!(mac.verify_slice(&expected).is_ok());
    }

    #[test]
    fn grants_serialize_camel_case_and_omit_false() {
        let json = serde_json::to_value(VideoGrant {
            room_create: true,
            ..VideoGrant::default()
        })
        .expect("serialize");
        assert_eq!(json, serde_json::json!({ "roomCreate": true }));
    }

    #[test]
    fn identity_and_ttl() {
        let claims = AccessToken::new("APIkey", "secret")
            .with_identity("probe")
            .with_ttl(Duration::from_secs(60))
            .claims();
        assert_eq!(claims.sub.as_deref(), Some("probe"));
        assert_eq!(claims.exp - claims.nbf, 60);
    }
}
