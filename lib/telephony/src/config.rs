//! Telephony configuration.

use crate::error::ConfigurationError;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Telephony settings as read from the environment.
///
/// Every credential is optional here; [`TelephonyConfig::validate`] turns
/// this into [`ProviderSettings`] or names the first missing setting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TelephonyConfig {
    /// Provider host, `wss://project.livekit.cloud` or an http(s) URL.
    #[serde(default)]
    pub host: Option<String>,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default)]
    pub api_secret: Option<String>,
    /// Outbound SIP trunk id.
    #[serde(default)]
    pub sip_trunk_id: Option<String>,
    /// Number dialed by verification probes.
    #[serde(default = "default_test_number")]
    pub test_number: String,
    #[serde(default = "default_room_prefix")]
    pub room_prefix: String,
    #[serde(default = "default_empty_timeout_secs")]
    pub empty_timeout_secs: u32,
    #[serde(default = "default_max_participants")]
    pub max_participants: u32,
    /// Timeout for each provider request.
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

fn default_test_number() -> String {
    "+15555555555".to_string()
}

fn default_room_prefix() -> String {
    "outbound".to_string()
}

fn default_empty_timeout_secs() -> u32 {
    300
}

fn default_max_participants() -> u32 {
    2
}

fn default_request_timeout_secs() -> u64 {
    15
}

impl Default for TelephonyConfig {
    fn default() -> Self {
        Self {
            host: None,
            api_key: None,
            api_secret: None,
            sip_trunk_id: None,
            test_number: default_test_number(),
            room_prefix: default_room_prefix(),
            empty_timeout_secs: default_empty_timeout_secs(),
            max_participants: default_max_participants(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

/// Validated provider settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderSettings {
    /// Server API base URL (http or https).
    pub api_url: String,
    pub api_key: String,
    pub api_secret: String,
    pub sip_trunk_id: String,
    pub test_number: String,
    pub room_prefix: String,
    pub empty_timeout: Duration,
    pub max_participants: u32,
    pub request_timeout: Duration,
}

impl TelephonyConfig {
    /// Validates the configuration.
    ///
    /// Checks host, then trunk id, then the API key pair.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigurationError`] naming the first missing or invalid
    /// setting.
    pub fn validate(&self) -> Result<ProviderSettings, ConfigurationError> {
        let host = required(self.host.as_deref(), "TELEPHONY__HOST")?;
        let sip_trunk_id = required(self.sip_trunk_id.as_deref(), "TELEPHONY__SIP_TRUNK_ID")?;
        let api_key = required(self.api_key.as_deref(), "TELEPHONY__API_KEY")?;
        let api_secret = required(self.api_secret.as_deref(), "TELEPHONY__API_SECRET")?;

        Ok(ProviderSettings {
            api_url: api_url(host)?,
            api_key: api_key.to_string(),
            api_secret: api_secret.to_string(),
            sip_trunk_id: sip_trunk_id.to_string(),
            test_number: self.test_number.clone(),
            room_prefix: self.room_prefix.clone(),
            empty_timeout: Duration::from_secs(u64::from(self.empty_timeout_secs)),
            max_participants: self.max_participants,
            request_timeout: Duration::from_secs(self.request_timeout_secs),
        })
    }
}

fn required<'a>(value: Option<&'a str>, setting: &'static str) -> Result<&'a str, ConfigurationError> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .ok_or(ConfigurationError::Missing { setting })
}

/// Rewrites a realtime host (`wss://`, `ws://`) to the server API URL.
///
/// # Errors
///
/// Returns [`ConfigurationError::InvalidHost`] for any other scheme.
pub fn api_url(host: &str) -> Result<String, ConfigurationError> {
    let host = host.trim().trim_end_matches('/');
    let rewritten = if let Some(rest) = host.strip_prefix("wss://") {
        format!("https://{rest}")
    } else if let Some(rest) = host.strip_prefix("ws://") {
        format!("http://{rest}")
    } else if host.starts_with("https://") || host.starts_with("http://") {
        host.to_string()
    } else {
        return Err(ConfigurationError::InvalidHost {
            host: host.to_string(),
        });
    };

    if rewritten.ends_with("://") {
        return Err(ConfigurationError::InvalidHost {
            host: host.to_string(),
        });
    }
    Ok(rewritten)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn complete() -> TelephonyConfig {
        TelephonyConfig {
            host: Some("wss://m10dj.livekit.cloud".to_string()),
            api_key: Some("APIkey".to_string()),
            api_secret: Some("secret".to_string()),
            sip_trunk_id: Some("ST_abc123".to_string()),
            ..TelephonyConfig::default()
        }
    }

    #[test]
    fn defaults() {
        let config = TelephonyConfig::default();
        assert_eq!(config.test_number, "+15555555555");
        assert_eq!(config.room_prefix, "outbound");
        assert_eq!(config.empty_timeout_secs, 300);
        assert_eq!(config.max_participants, 2);
        assert_eq!(config.request_timeout_secs, 15);
    }

    #[test]
    fn validate_complete_config() {
        let settings = complete().validate().expect("valid");
        assert_eq!(settings.api_url, "https://m10dj.livekit.cloud");
        assert_eq!(settings.sip_trunk_id, "ST_abc123");
        assert_eq!(settings.empty_timeout, Duration::from_secs(300));
    }

    #[test]
    fn missing_host_is_reported_first() {
        let config = TelephonyConfig {
            host: None,
            sip_trunk_id: None,
            ..complete()
        };
        assert_eq!(
            config.validate().unwrap_err(),
            ConfigurationError::Missing {
                setting: "TELEPHONY__HOST"
            }
        );
    }

    #[test]
    fn blank_trunk_id_is_missing() {
        let config = TelephonyConfig {
            sip_trunk_id: Some("  ".to_string()),
            ..complete()
        };
        assert_eq!(
            config.validate().unwrap_err(),
            ConfigurationError::Missing {
                setting: "TELEPHONY__SIP_TRUNK_ID"
            }
        );
    }

    #[test]
    fn host_rewriting() {
        assert_eq!(
            api_url("wss://project.livekit.cloud/").expect("valid"),
            "https://project.livekit.cloud"
        );
        assert_eq!(
            api_url("ws://localhost:7880").expect("valid"),
            "http://localhost:7880"
        );
        assert_eq!(
            api_url("https://project.livekit.cloud").expect("valid"),
            "https://project.livekit.cloud"
        );
        assert!(api_url("project.livekit.cloud").is_err());
        assert!(api_url("wss://").is_err());
    }
}
