//! Channel adapter.
//!
//! Turns the raw payload of each channel into one [`InboundMessage`] shape.
//! Normalization is pure: it parses and validates, nothing else.

use crate::error::AdapterError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use switchboard_core::{Channel, CustomerIdentity};

/// A message from any channel, normalized.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InboundMessage {
    /// Who sent it.
    pub identity: CustomerIdentity,
    /// Where it arrived.
    pub channel: Channel,
    /// Message body, trimmed and non-empty.
    pub text: String,
    /// When the adapter accepted it.
    pub received_at: DateTime<Utc>,
    /// Provider message id, when the channel supplies one (e.g. `MessageSid`).
    pub external_id: Option<String>,
}

/// Normalizes a raw channel payload.
///
/// Expected shapes:
///
/// - SMS: Twilio webhook fields `From`, `Body` and optionally `MessageSid`.
/// - Web chat: `{ sessionToken?, messages: [{ role, content }], leadData? }`.
///   The identity is the first present of `leadData.phone`,
///   `leadData.email` and `sessionToken`; the text is the last `user`
///   message.
/// - Voice: `{ identity | participantIdentity, transcript }`.
///
/// # Errors
///
/// Returns [`AdapterError::MalformedPayload`] if no identity or no
/// non-blank text can be extracted.
pub fn normalize(channel: Channel, payload: &Value) -> Result<InboundMessage, AdapterError> {
    if !payload.is_object() {
        return Err(AdapterError::malformed(channel, "payload is not an object"));
    }

    let (identity, text, external_id) = match channel {
        Channel::Sms => normalize_sms(payload)?,
        Channel::WebChat => normalize_web_chat(payload)?,
        Channel::Voice => normalize_voice(payload)?,
    };

    Ok(InboundMessage {
        identity,
        channel,
        text,
        received_at: Utc::now(),
        external_id,
    })
}

type Parts = (CustomerIdentity, String, Option<String>);

fn normalize_sms(payload: &Value) -> Result<Parts, AdapterError> {
    let from = string_field(payload, "From")
        .ok_or_else(|| AdapterError::malformed(Channel::Sms, "missing From"))?;
    let identity = CustomerIdentity::phone(from)
        .map_err(|e| AdapterError::malformed(Channel::Sms, e.to_string()))?;
    let text = string_field(payload, "Body")
        .ok_or_else(|| AdapterError::malformed(Channel::Sms, "missing Body"))?;
    let external_id = string_field(payload, "MessageSid").map(str::to_string);

    Ok((identity, text.to_string(), external_id))
}

fn normalize_web_chat(payload: &Value) -> Result<Parts, AdapterError> {
    let lead = payload.get("leadData");
    let identity = lead
        .and_then(|l| string_field(l, "phone"))
        .and_then(|p| CustomerIdentity::phone(p).ok())
        .or_else(|| {
            lead.and_then(|l| string_field(l, "email"))
                .and_then(|e| CustomerIdentity::new(e.to_lowercase()).ok())
        })
        .or_else(|| string_field(payload, "sessionToken").and_then(|t| CustomerIdentity::new(t).ok()))
        .ok_or_else(|| {
            AdapterError::malformed(
                Channel::WebChat,
                "no phone, email or session token to identify the customer",
            )
        })?;

    let messages = payload
        .get("messages")
        .and_then(Value::as_array)
        .ok_or_else(|| AdapterError::malformed(Channel::WebChat, "missing messages"))?;
    let text = messages
        .iter()
        .rev()
        .find(|m| m.get("role").and_then(Value::as_str) == Some("user"))
        .and_then(|m| string_field(m, "content"))
        .ok_or_else(|| AdapterError::malformed(Channel::WebChat, "no user message content"))?;

    Ok((identity, text.to_string(), None))
}

fn normalize_voice(payload: &Value) -> Result<Parts, AdapterError> {
    let raw = string_field(payload, "identity")
        .or_else(|| string_field(payload, "participantIdentity"))
        .ok_or_else(|| AdapterError::malformed(Channel::Voice, "missing identity"))?;

    // SIP participants are identified by number; anything else stays opaque.
    let identity = if looks_like_phone(raw) {
        CustomerIdentity::phone(raw)
    } else {
        CustomerIdentity::new(raw)
    }
    .map_err(|e| AdapterError::malformed(Channel::Voice, e.to_string()))?;

    let text = string_field(payload, "transcript")
        .ok_or_else(|| AdapterError::malformed(Channel::Voice, "missing transcript"))?;

    Ok((identity, text.to_string(), None))
}

/// Returns a trimmed, non-blank string field.
fn string_field<'a>(value: &'a Value, name: &str) -> Option<&'a str> {
    value
        .get(name)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
}

fn looks_like_phone(raw: &str) -> bool {
    raw.chars()
        .all(|c| c.is_ascii_digit() || matches!(c, '+' | ' ' | '-' | '(' | ')' | '.'))
}
