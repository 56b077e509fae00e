//! Agent personas.

use crate::channel::Channel;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A named agent configuration selecting behavior for a channel or intent.
///
/// The persona is stored on the conversation session and stays fixed for
/// the session's lifetime unless it is explicitly reassigned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentPersona {
    /// General-purpose assistant for the website chat.
    General,
    /// Assistant tuned for short SMS replies.
    SmsSpecialist,
    /// Assistant answering transcribed voice calls.
    VoiceConcierge,
}

impl AgentPersona {
    /// Returns the default persona for conversations on a channel.
    #[must_use]
    pub const fn for_channel(channel: Channel) -> Self {
        match channel {
            Channel::WebChat => Self::General,
            Channel::Sms => Self::SmsSpecialist,
            Channel::Voice => Self::VoiceConcierge,
        }
    }

    /// Returns the storage representation of this persona.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::General => "general",
            Self::SmsSpecialist => "sms_specialist",
            Self::VoiceConcierge => "voice_concierge",
        }
    }

    /// Parses the storage representation of a persona.
    #[must_use]
    pub fn from_str_value(s: &str) -> Option<Self> {
        match s {
            "general" => Some(Self::General),
            "sms_specialist" => Some(Self::SmsSpecialist),
            "voice_concierge" => Some(Self::VoiceConcierge),
            _ => None,
        }
    }
}

impl fmt::Display for AgentPersona {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
