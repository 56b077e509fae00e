//! Agent invoker.
//!
//! Wraps an [`LlmBackend`] with a request-level deadline, at most one retry
//! on transient failures, and normalization of every failure into
//! [`AgentError`]. The invoker holds no conversation state: everything it
//! needs comes from the session passed in.

use crate::backend::{LlmBackend, LlmMessage, LlmRequest, LlmResponse};
use crate::error::{AgentError, LlmError};
use crate::openai::DEFAULT_BASE_URL;
use crate::persona::{DEFAULT_MODEL, PersonaCatalog, PersonaProfile};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use switchboard_conversation::{ConversationSession, LeadDetails, TurnRole};
use switchboard_core::AgentPersona;
use tracing::{debug, info, instrument, warn};

/// Pause before the single retry.
const RETRY_BACKOFF: Duration = Duration::from_millis(200);

/// Sent to the customer when the provider filtered the reply without text.
pub const CONTENT_FILTER_REFUSAL: &str =
    "Sorry, I can't help with that request. Is there anything else about your event I can help with?";

/// Agent runtime configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentConfig {
    /// Base URL of the OpenAI-compatible API.
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Bearer API key.
    #[serde(default)]
    pub api_key: String,
    /// Model used by every persona.
    #[serde(default = "default_model")]
    pub model: String,
    /// Deadline for one invocation, retry included.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Number of prior turns sent as context.
    #[serde(default = "default_history_limit")]
    pub history_limit: usize,
}

fn default_base_url() -> String {
    DEFAULT_BASE_URL.to_string()
}

fn default_model() -> String {
    DEFAULT_MODEL.to_string()
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_history_limit() -> usize {
    20
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            api_key: String::new(),
            model: default_model(),
            timeout_secs: default_timeout_secs(),
            history_limit: default_history_limit(),
        }
    }
}

impl AgentConfig {
    /// Returns the invocation deadline.
    #[must_use]
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// A successful agent reply.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reply {
    /// Reply text for the channel, trimmed.
    pub text: String,
    /// The runtime's final output, untouched.
    pub final_output: String,
    /// Model that produced the reply.
    pub model: String,
    /// Backend calls made, 1 or 2.
    pub attempts: u32,
}

/// Invokes the agent runtime for a persona.
#[derive(Clone)]
pub struct AgentInvoker {
    backend: Arc<dyn LlmBackend>,
    catalog: PersonaCatalog,
    timeout: Duration,
    history_limit: usize,
}

impl std::fmt::Debug for AgentInvoker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AgentInvoker")
            .field("backend", &self.backend.name())
            .field("timeout", &self.timeout)
            .field("history_limit", &self.history_limit)
            .finish_non_exhaustive()
    }
}

impl AgentInvoker {
    /// Creates an invoker.
    #[must_use]
    pub fn new(backend: Arc<dyn LlmBackend>, catalog: PersonaCatalog, config: &AgentConfig) -> Self {
        Self {
            backend,
            catalog,
            timeout: config.timeout(),
            history_limit: config.history_limit,
        }
    }

    /// Overrides the invocation deadline.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Returns the persona catalog.
    #[must_use]
    pub fn catalog(&self) -> &PersonaCatalog {
        &self.catalog
    }

    /// Invokes the agent for `persona` with `session` as context and
    /// `message` as the new customer message.
    ///
    /// `session` must not yet contain `message`.
    ///
    /// # Errors
    ///
    /// - [`AgentError::Timeout`] if the deadline expires, retry included
    /// - [`AgentError::Rejected`] if the agent refuses, carrying its text
    /// - [`AgentError::Unavailable`] for any other failure
    #[instrument(
        skip(self, session, message),
        fields(persona = %persona, identity = %session.identity, channel = %session.channel)
    )]
    pub async fn invoke(
        &self,
        persona: AgentPersona,
        session: &ConversationSession,
        message: &str,
    ) -> Result<Reply, AgentError> {
        let profile = self
            .catalog
            .profile(persona)
            .ok_or_else(|| AgentError::Unavailable {
                reason: format!("no profile for persona {persona}"),
            })?;
        let request = self.build_request(profile, session, message);

        let (response, attempts) = tokio::time::timeout(self.timeout, self.generate_with_retry(&request))
            .await
            .map_err(|_| {
                warn!(timeout = ?self.timeout, "agent invocation timed out");
                AgentError::Timeout
            })??;

        let reply = Self::into_reply(response, attempts)?;
        info!(attempts, model = %reply.model, "agent replied");
        Ok(reply)
    }

    async fn generate_with_retry(
        &self,
        request: &LlmRequest,
    ) -> Result<(LlmResponse, u32), AgentError> {
        match self.backend.generate(request).await {
            Ok(response) => Ok((response, 1)),
            Err(err) if err.is_transient() => {
                warn!(error = %err, "transient agent failure, retrying once");
                tokio::time::sleep(RETRY_BACKOFF).await;
                self.backend
                    .generate(request)
                    .await
                    .map(|response| (response, 2))
                    .map_err(AgentError::from)
            }
            Err(err) => Err(AgentError::from(err)),
        }
    }

    fn into_reply(response: LlmResponse, attempts: u32) -> Result<Reply, AgentError> {
        if let Some(refusal) = response.refusal.filter(|r| !r.trim().is_empty()) {
            return Err(AgentError::Rejected { message: refusal });
        }

        let text = response.content.trim();
        if response.finish_reason.as_deref() == Some("content_filter") {
            let message = if text.is_empty() {
                CONTENT_FILTER_REFUSAL.to_string()
            } else {
                text.to_string()
            };
            return Err(AgentError::Rejected { message });
        }
        if text.is_empty() {
            return Err(AgentError::from(LlmError::ResponseParseFailed {
                reason: format!(
                    "empty reply (finish_reason: {})",
                    response.finish_reason.as_deref().unwrap_or("unknown")
                ),
            }));
        }

        Ok(Reply {
            text: text.to_string(),
            final_output: response.content.clone(),
            model: response.model,
            attempts,
        })
    }

    /// Builds the runtime request: persona instructions plus customer context
    /// as the system prompt, recent turns as context, `message` as prompt.
    fn build_request(
        &self,
        profile: &PersonaProfile,
        session: &ConversationSession,
        message: &str,
    ) -> LlmRequest {
        let context = session
            .history(self.history_limit)
            .iter()
            .map(|turn| match turn.role {
                TurnRole::Customer => LlmMessage::user(&turn.text),
                TurnRole::Assistant => LlmMessage::assistant(&turn.text),
                TurnRole::System => LlmMessage::system(&turn.text),
            })
            .collect();

        let lead = LeadDetails::from_turns(&session.turns).merge(LeadDetails::extract(message));
        let system = match lead.to_context() {
            Some(details) => format!("{}\n\nCUSTOMER CONTEXT:\n{details}", profile.instructions),
            None => profile.instructions.clone(),
        };
        debug!(lead = ?lead, context_turns = session.history(self.history_limit).len(), "built agent request");

        let mut request = LlmRequest::new(&profile.model, message)
            .with_system(system)
            .with_context(context);
        request.temperature = profile.temperature;
        request.max_tokens = profile.max_tokens;
        request
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::MessageRole;
    use crate::scripted::ScriptedBackend;
    use switchboard_conversation::{SessionKey, Turn};
    use switchboard_core::{Channel, CustomerIdentity};

    fn session() -> ConversationSession {
        ConversationSession::new(
            SessionKey::new(
                CustomerIdentity::phone("+19145551234").expect("valid"),
                Channel::Sms,
            ),
            AgentPersona::SmsSpecialist,
        )
    }

    fn invoker(backend: Arc<ScriptedBackend>) -> AgentInvoker {
        AgentInvoker::new(backend, PersonaCatalog::default(), &AgentConfig::default())
    }

    fn server_error() -> LlmError {
        LlmError::ServerError {
            status: 502,
            reason: "bad gateway".to_string(),
        }
    }

    #[tokio::test]
    async fn successful_invocation() {
        let backend = Arc::new(ScriptedBackend::new().reply("  Congrats! When's the big day? 🎉 "));
        let reply = invoker(Arc::clone(&backend))
            .invoke(AgentPersona::SmsSpecialist, &session(), "Hi, I need a DJ for my wedding")
            .await
            .expect("invoke");

        assert_eq!(reply.text, "Congrats! When's the big day? 🎉");
        assert_eq!(reply.attempts, 1);
        assert_eq!(backend.calls(), 1);
    }

    #[tokio::test]
    async fn retries_once_on_transient_failure() {
        let backend = Arc::new(ScriptedBackend::new().fail(server_error()).reply("Hello!"));
        let reply = invoker(Arc::clone(&backend))
            .invoke(AgentPersona::General, &session(), "hi")
            .await
            .expect("invoke");

        assert_eq!(reply.text, "Hello!");
        assert_eq!(reply.attempts, 2);
        assert_eq!(backend.calls(), 2);
    }

    #[tokio::test]
    async fn gives_up_after_second_transient_failure() {
        let backend = Arc::new(
            ScriptedBackend::new()
                .fail(LlmError::RateLimited { retry_after_secs: None })
                .fail(server_error())
                .reply("never sent"),
        );
        let err = invoker(Arc::clone(&backend))
            .invoke(AgentPersona::General, &session(), "hi")
            .await
            .unwrap_err();

        assert!(matches!(err, AgentError::Unavailable { .. }));
        assert_eq!(backend.calls(), 2);
    }

    #[tokio::test]
    async fn never_retries_non_transient_failure() {
        let backend = Arc::new(ScriptedBackend::new().fail(LlmError::Unauthorized).reply("x"));
        let err = invoker(Arc::clone(&backend))
            .invoke(AgentPersona::General, &session(), "hi")
            .await
            .unwrap_err();

        assert!(matches!(err, AgentError::Unavailable { .. }));
        assert_eq!(backend.calls(), 1);
    }

    #[tokio::test]
    async fn content_rejection_is_not_retried() {
        let backend = Arc::new(
            ScriptedBackend::new()
                .fail(LlmError::ContentRejected {
                    message: "That request isn't allowed.".to_string(),
                })
                .reply("x"),
        );
        let err = invoker(Arc::clone(&backend))
            .invoke(AgentPersona::General, &session(), "hi")
            .await
            .unwrap_err();

        assert_eq!(
            err,
            AgentError::Rejected {
                message: "That request isn't allowed.".to_string()
            }
        );
        assert_eq!(backend.calls(), 1);
    }

    #[tokio::test]
    async fn refusal_becomes_rejection() {
        let mut response = LlmResponse::text("gpt-4o-mini", "");
        response.refusal = Some("I can't help with that.".to_string());
        let backend = Arc::new(ScriptedBackend::new().respond(response));

        let err = invoker(backend)
            .invoke(AgentPersona::General, &session(), "hi")
            .await
            .unwrap_err();
        assert_eq!(
            err,
            AgentError::Rejected {
                message: "I can't help with that.".to_string()
            }
        );
    }

    #[tokio::test]
    async fn filtered_empty_reply_becomes_rejection() {
        let mut response = LlmResponse::text("gpt-4o-mini", "");
        response.finish_reason = Some("content_filter".to_string());
        let backend = Arc::new(ScriptedBackend::new().respond(response).reply("x"));

        let err = invoker(Arc::clone(&backend))
            .invoke(AgentPersona::General, &session(), "hi")
            .await
            .unwrap_err();
        assert_eq!(
            err,
            AgentError::Rejected {
                message: CONTENT_FILTER_REFUSAL.to_string()
            }
        );
        assert_eq!(backend.calls(), 1);
    }

    #[tokio::test]
    async fn filtered_partial_reply_keeps_its_text() {
        let mut response = LlmResponse::text("gpt-4o-mini", " I'd rather not go into that. ");
        response.finish_reason = Some("content_filter".to_string());
        let backend = Arc::new(ScriptedBackend::new().respond(response));

        let err = invoker(backend)
            .invoke(AgentPersona::General, &session(), "hi")
            .await
            .unwrap_err();
        assert_eq!(
            err,
            AgentError::Rejected {
                message: "I'd rather not go into that.".to_string()
            }
        );
    }

    #[tokio::test]
    async fn empty_reply_is_unavailable() {
        let backend = Arc::new(ScriptedBackend::new().reply("   "));
        let err = invoker(backend)
            .invoke(AgentPersona::General, &session(), "hi")
            .await
            .unwrap_err();
        assert!(matches!(err, AgentError::Unavailable { .. }));
    }

    #[tokio::test]
    async fn deadline_covers_slow_backend() {
        let backend = Arc::new(
            ScriptedBackend::always("too late").with_delay(Duration::from_millis(500)),
        );
        let err = invoker(backend)
            .with_timeout(Duration::from_millis(50))
            .invoke(AgentPersona::General, &session(), "hi")
            .await
            .unwrap_err();
        assert_eq!(err, AgentError::Timeout);
    }

    #[tokio::test]
    async fn request_carries_persona_history_and_lead_context() {
        let backend = Arc::new(ScriptedBackend::always("ok"));
        let mut session = session();
        for i in 0..30 {
            session.append(Turn::customer(format!("old {i}")));
        }
        session.append(Turn::customer("my name is Sarah"));
        session.append(Turn::assistant("Hi Sarah!"));

        invoker(Arc::clone(&backend))
            .invoke(
                AgentPersona::SmsSpecialist,
                &session,
                "It's a wedding for 150 guests",
            )
            .await
            .expect("invoke");

        let requests = backend.requests();
        let request = &requests[0];
        assert_eq!(request.model, DEFAULT_MODEL);
        assert_eq!(request.prompt, "It's a wedding for 150 guests");
        assert_eq!(request.context.len(), 20);
        assert_eq!(
            request.context.last().map(|m| (m.role, m.content.as_str())),
            Some((MessageRole::Assistant, "Hi Sarah!"))
        );

        let system = request.system.as_deref().expect("system prompt");
        assert!(system.contains("under 160 characters"));
        assert!(system.contains("Name: Sarah"));
        assert!(system.contains("Event type: wedding"));
        assert!(system.contains("Guest count: 150"));
    }
}
