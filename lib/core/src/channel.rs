//! Inbound channels.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A channel a customer can reach the platform through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Channel {
    /// Website chat widget.
    WebChat,
    /// SMS text messages.
    Sms,
    /// Voice calls (transcribed turns).
    Voice,
}

impl Channel {
    /// All channels, in a stable order.
    pub const ALL: [Channel; 3] = [Channel::WebChat, Channel::Sms, Channel::Voice];

    /// Returns the storage representation of this channel.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::WebChat => "web_chat",
            Self::Sms => "sms",
            Self::Voice => "voice",
        }
    }

    /// Parses the storage representation of a channel.
    #[must_use]
    pub fn from_str_value(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|c| c.as_str() == s)
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn storage_value_roundtrips() {
        for channel in Channel::ALL {
            assert_eq!(Channel::from_str_value(channel.as_str()), Some(channel));
        }
        assert_eq!(Channel::from_str_value("fax"), None);
    }

    #[test]
    fn serde_matches_storage_value() {
        let json = serde_json::to_string(&Channel::WebChat).expect("serialize");
        assert_eq!(json, "\"web_chat\"");
    }
}
