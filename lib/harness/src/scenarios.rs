//! Built-in smoke scenarios.
//!
//! Each drives one component directly against whatever backend or provider
//! it was given.

use crate::harness::{Scenario, ScenarioResult};
use std::sync::Arc;
use switchboard_ai::AgentInvoker;
use switchboard_conversation::{ConversationSession, SessionKey};
use switchboard_core::{AgentPersona, Channel, CustomerIdentity};
use switchboard_telephony::{CallOutcome, ProviderSettings, TelephonyBridge};
use tracing::{info, warn};

/// Identity used for the synthetic sessions the agent scenarios build.
const SMOKE_IDENTITY: &str = "+19145551234";

fn smoke_session(channel: Channel, persona: AgentPersona) -> ScenarioResult<ConversationSession> {
    let identity = CustomerIdentity::phone(SMOKE_IDENTITY)?;
    Ok(ConversationSession::new(
        SessionKey::new(identity, channel),
        persona,
    ))
}

async fn expect_reply(
    invoker: &AgentInvoker,
    persona: AgentPersona,
    channel: Channel,
    message: &str,
) -> ScenarioResult {
    let session = smoke_session(channel, persona)?;
    let reply = invoker.invoke(persona, &session, message).await?;
    if reply.text.trim().is_empty() {
        return Err(format!("{persona} returned an empty reply").into());
    }
    info!(%persona, reply = %reply.text, "agent replied");
    Ok(())
}

/// Invokes the general agent with a web-chat question.
#[must_use]
pub fn general_agent(invoker: AgentInvoker) -> Scenario {
    Scenario::new("general agent replies", move || {
        let invoker = invoker.clone();
        async move {
            expect_reply(
                &invoker,
                AgentPersona::General,
                Channel::WebChat,
                "What packages do you offer?",
            )
            .await
        }
    })
}

/// Invokes the SMS-specialist persona with a first inbound text.
#[must_use]
pub fn sms_persona(invoker: AgentInvoker) -> Scenario {
    Scenario::new("sms persona replies", move || {
        let invoker = invoker.clone();
        async move {
            expect_reply(
                &invoker,
                AgentPersona::SmsSpecialist,
                Channel::Sms,
                "Hi, I need a DJ for my wedding",
            )
            .await
        }
    })
}

/// Creates a voice room and dials the test number into it.
///
/// A SIP rejection passes: the trunk answered. The room is released
/// afterwards either way.
#[must_use]
pub fn room_and_call(bridge: Arc<TelephonyBridge>, settings: ProviderSettings) -> Scenario {
    Scenario::new("voice room and outbound call", move || {
        let bridge = Arc::clone(&bridge);
        let settings = settings.clone();
        async move {
            let room = bridge
                .create_voice_room(
                    &settings.room_prefix,
                    settings.empty_timeout,
                    settings.max_participants,
                )
                .await?;
            let request = bridge.outbound_request(&room, &settings.test_number);
            let placed = bridge.place_outbound_call(request).await;

            if let Err(err) = bridge.release_room(room).await {
                warn!(error = %err, "failed to release smoke room");
            }

            match placed? {
                CallOutcome::Connected(call) => {
                    info!(participant = %call.participant_identity, "smoke call connected");
                }
                CallOutcome::Rejected(rejection) => {
                    info!(reason = %rejection.reason, "smoke call rejected by carrier");
                }
            }
            Ok(())
        }
    })
}
