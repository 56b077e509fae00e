//! Verification CLIs for switchboard.
//!
//! - `sip-probe`: creates a voice room, dials the test number through the
//!   configured SIP trunk and prints `{"roomName", "sipConfigured"}`
//! - `smoke`: runs the built-in harness scenarios and writes a JSON report
//!
//! Both read configuration from the environment (`TELEPHONY__*`,
//! `AGENT__*`, `SMOKE_REPORT_PATH`).

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use switchboard_ai::{AgentConfig, AgentInvoker, LlmError, OpenAiBackend, PersonaCatalog};
use switchboard_harness::{Harness, Scenario, ScenarioResult, scenarios};
use switchboard_telephony::{
    CallOutcome, ConfigurationError, LiveKitClient, ProviderError, ProviderSettings,
    TelephonyBridge, TelephonyConfig, TelephonyProvider,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Exit code for configuration errors.
pub const EXIT_CONFIGURATION: u8 = 2;

/// Exit code for failures after configuration was accepted.
pub const EXIT_FAILURE: u8 = 1;

/// CLI configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ProbeConfig {
    #[serde(default)]
    pub telephony: TelephonyConfig,

    #[serde(default)]
    pub agent: AgentConfig,

    /// Where `smoke` writes its JSON report.
    #[serde(default = "default_smoke_report_path")]
    pub smoke_report_path: String,
}

fn default_smoke_report_path() -> String {
    "smoke-results.json".to_string()
}

impl ProbeConfig {
    /// Loads configuration from environment variables.
    ///
    /// Values are kept as strings until deserialized so phone numbers keep
    /// their leading `+`.
    ///
    /// # Errors
    ///
    /// Returns an error if the environment cannot be deserialized.
    pub fn from_env() -> Result<Self, config::ConfigError> {
        Self::from_source(config::Environment::default().separator("__"))
    }

    fn from_source(source: config::Environment) -> Result<Self, config::ConfigError> {
        config::Config::builder()
            .add_source(source)
            .build()?
            .try_deserialize()
    }
}

/// Installs stderr logging, `warn` unless `RUST_LOG` says otherwise, so
/// stdout stays machine-readable.
pub fn init_logging() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "warn".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

/// Why a probe could not run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProbeError {
    /// Telephony settings are missing or invalid; nothing was attempted.
    Configuration(ConfigurationError),
    /// The provider client could not be built.
    Provider(ProviderError),
}

impl ProbeError {
    #[must_use]
    pub fn exit_code(&self) -> u8 {
        match self {
            Self::Configuration(_) => EXIT_CONFIGURATION,
            Self::Provider(_) => EXIT_FAILURE,
        }
    }
}

impl fmt::Display for ProbeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Configuration(err) => write!(f, "{err}"),
            Self::Provider(err) => write!(f, "{err}"),
        }
    }
}

impl std::error::Error for ProbeError {}

/// What `sip-probe` prints.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProbeOutput {
    /// The room created for the probe call, if creation succeeded.
    pub room_name: Option<String>,
    /// True once the trunk answered the placement, connected or rejected.
    pub sip_configured: bool,
    /// Carrier rejection reason, when the trunk answered with a SIP error.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rejection: Option<String>,
    /// Why the probe could not complete.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Connects to LiveKit with validated settings.
///
/// # Errors
///
/// Returns [`ProviderError`] if the HTTP client cannot be built.
pub fn livekit(settings: &ProviderSettings) -> Result<Arc<dyn TelephonyProvider>, ProviderError> {
    Ok(Arc::new(LiveKitClient::new(settings)?))
}

/// Validates `config`, connects, and builds a bridge.
///
/// # Errors
///
/// Returns [`ProbeError::Configuration`] before `connect` is called if the
/// configuration is incomplete.
pub fn telephony_bridge<F>(
    config: &TelephonyConfig,
    connect: F,
) -> Result<(Arc<TelephonyBridge>, ProviderSettings), ProbeError>
where
    F: FnOnce(&ProviderSettings) -> Result<Arc<dyn TelephonyProvider>, ProviderError>,
{
    let settings = config.validate().map_err(ProbeError::Configuration)?;
    let provider = connect(&settings).map_err(ProbeError::Provider)?;
    let bridge = TelephonyBridge::from_settings(provider, &settings);
    Ok((Arc::new(bridge), settings))
}

/// Runs the SIP trunk probe.
///
/// A carrier rejection of the test number still proves the trunk is
/// configured. Room or placement failures are reported in the output, not
/// as errors.
///
/// # Errors
///
/// Returns [`ProbeError`] if configuration is incomplete or the provider
/// client cannot be built; no room is created in that case.
pub async fn run_probe<F>(config: &TelephonyConfig, connect: F) -> Result<ProbeOutput, ProbeError>
where
    F: FnOnce(&ProviderSettings) -> Result<Arc<dyn TelephonyProvider>, ProviderError>,
{
    let (bridge, settings) = telephony_bridge(config, connect)?;

    let room = match bridge
        .create_voice_room(
            &settings.room_prefix,
            settings.empty_timeout,
            settings.max_participants,
        )
        .await
    {
        Ok(room) => room,
        Err(err) => {
            return Ok(ProbeOutput {
                room_name: None,
                sip_configured: false,
                rejection: None,
                error: Some(err.to_string()),
            });
        }
    };
    let room_name = room.name().to_string();

    let request = bridge.outbound_request(&room, &settings.test_number);
    let mut output = ProbeOutput {
        room_name: Some(room_name),
        sip_configured: false,
        rejection: None,
        error: None,
    };
    match bridge.place_outbound_call(request).await {
        Ok(CallOutcome::Connected(_)) => output.sip_configured = true,
        Ok(CallOutcome::Rejected(rejection)) => {
            output.sip_configured = true;
            output.rejection = Some(rejection.reason);
        }
        Err(err) => output.error = Some(err.to_string()),
    }

    if let Err(err) = bridge.release_room(room).await {
        tracing::warn!(error = %err, "failed to release probe room");
    }
    Ok(output)
}

/// Builds the agent invoker from configuration.
///
/// # Errors
///
/// Returns [`LlmError`] if the HTTP client cannot be built.
pub fn agent_invoker(config: &AgentConfig) -> Result<AgentInvoker, LlmError> {
    let backend = OpenAiBackend::new(&config.base_url, &config.api_key, config.timeout())?;
    Ok(AgentInvoker::new(
        Arc::new(backend),
        PersonaCatalog::new(&config.model),
        config,
    ))
}

/// Registers the built-in smoke scenarios.
///
/// A component that could not be set up still gets its scenarios, failing
/// with the setup error, so the report lists every check.
#[must_use]
pub fn smoke_harness(
    agent: Result<AgentInvoker, String>,
    telephony: Result<(Arc<TelephonyBridge>, ProviderSettings), String>,
) -> Harness {
    let mut harness = Harness::new();

    match agent {
        Ok(invoker) => {
            harness
                .add(scenarios::general_agent(invoker.clone()))
                .add(scenarios::sms_persona(invoker));
        }
        Err(reason) => {
            harness
                .add(setup_failure("general agent replies", &reason))
                .add(setup_failure("sms persona replies", &reason));
        }
    }

    match telephony {
        Ok((bridge, settings)) => {
            harness.add(scenarios::room_and_call(bridge, settings));
        }
        Err(reason) => {
            harness.add(setup_failure("voice room and outbound call", &reason));
        }
    }

    harness
}

fn setup_failure(name: &str, reason: &str) -> Scenario {
    let reason = reason.to_string();
    Scenario::new(name, move || {
        let result: ScenarioResult = Err(reason.clone().into());
        std::future::ready(result)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use switchboard_ai::ScriptedBackend;
    use switchboard_telephony::FakeTelephonyProvider;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn complete() -> TelephonyConfig {
        TelephonyConfig {
            host: Some("wss://m10dj.livekit.cloud".to_string()),
            api_key: Some("APIkey".to_string()),
            api_secret: Some("secret".to_string()),
            sip_trunk_id: Some("ST_abc123".to_string()),
            ..TelephonyConfig::default()
        }
    }

    fn fake(
        provider: &Arc<FakeTelephonyProvider>,
    ) -> impl FnOnce(&ProviderSettings) -> Result<Arc<dyn TelephonyProvider>, ProviderError> {
        let provider = Arc::clone(provider);
        move |_| Ok(provider as Arc<dyn TelephonyProvider>)
    }

    #[tokio::test]
    async fn missing_host_exits_before_room_creation() {
        let provider = Arc::new(FakeTelephonyProvider::new());
        let config = TelephonyConfig {
            host: None,
            ..complete()
        };

        let err = run_probe(&config, fake(&provider)).await.unwrap_err();
        assert_eq!(err.exit_code(), EXIT_CONFIGURATION);
        assert!(err.to_string().contains("TELEPHONY__HOST"));
        assert!(provider.rooms().is_empty());
        assert!(provider.placements().is_empty());
    }

    #[tokio::test]
    async fn missing_trunk_is_a_configuration_error() {
        let provider = Arc::new(FakeTelephonyProvider::new());
        let config = TelephonyConfig {
            sip_trunk_id: None,
            ..complete()
        };

        let err = run_probe(&config, fake(&provider)).await.unwrap_err();
        assert_eq!(
            err,
            ProbeError::Configuration(ConfigurationError::Missing {
                setting: "TELEPHONY__SIP_TRUNK_ID"
            })
        );
        assert!(provider.placements().is_empty());
    }

    #[tokio::test]
    async fn sip_rejection_still_means_configured() {
        let provider =
            Arc::new(FakeTelephonyProvider::new().reject_calls(Some(404), "Not Found"));
        let output = run_probe(&complete(), fake(&provider)).await.expect("probe");

        assert!(output.sip_configured);
        assert_eq!(output.rejection.as_deref(), Some("Not Found"));
        let room_name = output.room_name.clone().expect("room");
        assert!(room_name.starts_with("outbound-"));
        assert_eq!(provider.placements(), vec![room_name.clone()]);
        assert_eq!(provider.deleted(), vec![room_name]);

        let json = serde_json::to_value(&output).expect("encode");
        assert_eq!(json["sipConfigured"], true);
        assert!(json["roomName"].is_string());
    }

    #[tokio::test]
    async fn connected_call_is_configured() {
        let provider = Arc::new(FakeTelephonyProvider::new());
        let output = run_probe(&complete(), fake(&provider)).await.expect("probe");
        assert!(output.sip_configured);
        assert_eq!(output.error, None);
    }

    #[tokio::test]
    async fn room_failure_is_reported_without_placement() {
        let provider = Arc::new(FakeTelephonyProvider::new().fail_room_creation(
            ProviderError::Unauthorized,
        ));
        let output = run_probe(&complete(), fake(&provider)).await.expect("probe");

        assert!(!output.sip_configured);
        assert_eq!(output.room_name, None);
        assert!(output.error.is_some());
        assert!(provider.placements().is_empty());
    }

    #[tokio::test]
    async fn placement_failure_is_not_configured() {
        let provider = Arc::new(FakeTelephonyProvider::new().fail_calls(ProviderError::Timeout));
        let output = run_probe(&complete(), fake(&provider)).await.expect("probe");

        assert!(!output.sip_configured);
        assert!(output.room_name.is_some());
        assert!(output.error.is_some_and(|e| e.contains("timed out")));
    }

    #[tokio::test]
    async fn unknown_trunk_is_not_configured() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/twirp/livekit.RoomService/CreateRoom"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "sid": "RM_trunk",
                "name": "outbound-1-0",
                "empty_timeout": 300,
                "max_participants": 2
            })))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/twirp/livekit.SIP/CreateSIPParticipant"))
            .respond_with(ResponseTemplate::new(404).set_body_json(serde_json::json!({
                "code": "not_found",
                "msg": "requested sip trunk does not exist"
            })))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/twirp/livekit.RoomService/DeleteRoom"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({})))
            .expect(1)
            .mount(&server)
            .await;

        let config = TelephonyConfig {
            host: Some(server.uri()),
            sip_trunk_id: Some("ST_missing".to_string()),
            ..complete()
        };
        let output = run_probe(&config, livekit).await.expect("probe");

        assert!(!output.sip_configured);
        assert_eq!(output.rejection, None);
        assert!(
            output
                .error
                .is_some_and(|e| e.contains("requested sip trunk does not exist"))
        );
    }

    #[tokio::test]
    async fn smoke_harness_reports_setup_failures() {
        let invoker = AgentInvoker::new(
            Arc::new(ScriptedBackend::always("Hello from M10!")),
            PersonaCatalog::default(),
            &AgentConfig::default(),
        );
        let harness = smoke_harness(
            Ok(invoker),
            Err("missing telephony setting TELEPHONY__HOST".to_string()),
        );
        assert_eq!(harness.len(), 3);

        let report = harness.run_all().await;
        assert_eq!(report.summary.passed, 2);
        assert_eq!(report.summary.failed, 1);
        assert_eq!(
            report.summary.errors[0].error,
            "missing telephony setting TELEPHONY__HOST"
        );
    }

    #[tokio::test]
    async fn smoke_harness_runs_everything_when_configured() {
        let provider = Arc::new(FakeTelephonyProvider::new());
        let telephony = telephony_bridge(&complete(), fake(&provider)).map_err(|e| e.to_string());
        let invoker = AgentInvoker::new(
            Arc::new(ScriptedBackend::always("Hello from M10!")),
            PersonaCatalog::default(),
            &AgentConfig::default(),
        );

        let report = smoke_harness(Ok(invoker), telephony).run_all().await;
        assert!(report.all_passed(), "{}", report.render());
        assert_eq!(provider.placements().len(), 1);
    }

    #[test]
    fn config_keeps_phone_numbers_as_strings() {
        let env: HashMap<String, String> = [
            ("TELEPHONY__HOST", "wss://m10dj.livekit.cloud"),
            ("TELEPHONY__TEST_NUMBER", "+19015550123"),
            ("TELEPHONY__EMPTY_TIMEOUT_SECS", "120"),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();

        let config = ProbeConfig::from_source(
            config::Environment::default()
                .separator("__")
                .source(Some(env)),
        )
        .expect("config");
        assert_eq!(config.telephony.test_number, "+19015550123");
        assert_eq!(config.telephony.empty_timeout_secs, 120);
        assert_eq!(config.smoke_report_path, "smoke-results.json");
    }
}
