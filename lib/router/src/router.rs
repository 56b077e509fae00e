//! The conversation router.
//!
//! One call per inbound message: normalize, load or create the session,
//! invoke the session's persona, record the turns, answer. The session's
//! lifecycle (`new`, `active`, `idle`, `expired`) is derived from what the
//! store holds; nothing is polled.

use crate::cancel::CancelSignal;
use crate::config::SessionConfig;
use crate::error::RouteError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::fmt;
use std::sync::Arc;
use switchboard_ai::{AgentError, AgentInvoker};
use switchboard_conversation::{
    ConversationSession, InboundMessage, SessionKey, SessionState, SessionStore,
    SessionStoreError, Turn, TurnRole, normalize,
};
use switchboard_core::{AgentPersona, Channel, CustomerIdentity};
use tracing::{info, instrument, warn};

/// Sent when the agent times out or is unavailable.
pub const FALLBACK_REPLY: &str =
    "Thanks for your message! We're having trouble responding right now, please try again shortly.";

/// Where a reply's text came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReplyKind {
    /// The agent answered.
    Ai,
    /// The agent failed; the fixed fallback text was sent.
    Fallback,
    /// The agent refused; its own refusal text was sent.
    Rejected,
}

impl ReplyKind {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Ai => "ai",
            Self::Fallback => "fallback",
            Self::Rejected => "rejected",
        }
    }
}

impl fmt::Display for ReplyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The answer to one inbound message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteReply {
    /// Text to send back on the channel.
    pub text: String,
    pub kind: ReplyKind,
    pub persona: AgentPersona,
    /// Lifecycle state after the turns were recorded.
    pub state: SessionState,
    /// The session as stored after this message.
    pub session: ConversationSession,
}

/// Routes inbound messages to the agent and records the conversation.
pub struct Router {
    store: Arc<dyn SessionStore>,
    invoker: AgentInvoker,
    idle_threshold: chrono::Duration,
}

impl fmt::Debug for Router {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Router")
            .field("invoker", &self.invoker)
            .field("idle_threshold", &self.idle_threshold)
            .finish_non_exhaustive()
    }
}

impl Router {
    #[must_use]
    pub fn new(store: Arc<dyn SessionStore>, invoker: AgentInvoker, config: &SessionConfig) -> Self {
        Self {
            store,
            invoker,
            idle_threshold: config.idle_threshold(),
        }
    }

    #[must_use]
    pub fn store(&self) -> &Arc<dyn SessionStore> {
        &self.store
    }

    /// Handles one raw inbound payload.
    ///
    /// Dropping the returned future before it completes records nothing
    /// for the agent's result.
    ///
    /// # Errors
    ///
    /// - [`RouteError::Malformed`] if the payload cannot be normalized
    /// - [`RouteError::StoreUnavailable`] if the session store fails
    pub async fn handle(&self, channel: Channel, payload: &Value) -> Result<RouteReply, RouteError> {
        let message = normalize(channel, payload)?;
        self.route(message, None).await
    }

    /// Like [`Router::handle`], but abandons the request once `cancel`
    /// fires. A late agent result is discarded, never appended.
    ///
    /// # Errors
    ///
    /// As [`Router::handle`], plus [`RouteError::Cancelled`].
    pub async fn handle_with_cancel(
        &self,
        channel: Channel,
        payload: &Value,
        mut cancel: CancelSignal,
    ) -> Result<RouteReply, RouteError> {
        let message = normalize(channel, payload)?;
        self.route(message, Some(&mut cancel)).await
    }

    /// Hands a transcribed voice turn to the customer's voice session.
    ///
    /// Voice sessions are separate from the same customer's chat and SMS
    /// sessions.
    ///
    /// # Errors
    ///
    /// As [`Router::handle`].
    pub async fn inject_transcript(
        &self,
        identity: &CustomerIdentity,
        transcript: &str,
    ) -> Result<RouteReply, RouteError> {
        let payload = json!({
            "identity": identity.as_str(),
            "transcript": transcript,
        });
        self.handle(Channel::Voice, &payload).await
    }

    /// Returns the lifecycle state of a session at `now`.
    ///
    /// # Errors
    ///
    /// Returns [`RouteError::StoreUnavailable`] if the store fails.
    pub async fn lifecycle(
        &self,
        key: &SessionKey,
        now: DateTime<Utc>,
    ) -> Result<SessionState, RouteError> {
        match self.store.get(key).await {
            Ok(session) => Ok(session.state(now, self.idle_threshold)),
            Err(SessionStoreError::NotFound { .. }) => Ok(SessionState::Expired),
            Err(err) => Err(err.into()),
        }
    }

    /// Evicts sessions idle at `now`. Returns how many were removed.
    ///
    /// # Errors
    ///
    /// Returns [`RouteError::StoreUnavailable`] if the store fails.
    pub async fn evict_idle(&self, now: DateTime<Utc>) -> Result<usize, RouteError> {
        Ok(self.store.evict_idle(now, self.idle_threshold).await?)
    }

    #[instrument(
        skip(self, message, cancel),
        fields(identity = %message.identity, channel = %message.channel)
    )]
    async fn route(
        &self,
        message: InboundMessage,
        cancel: Option<&mut CancelSignal>,
    ) -> Result<RouteReply, RouteError> {
        let key = SessionKey::new(message.identity.clone(), message.channel);
        let session = self
            .store
            .create_or_get(&key, AgentPersona::for_channel(message.channel))
            .await?;
        let persona = session.persona;

        let invocation = self.invoker.invoke(persona, &session, &message.text);
        let outcome = match cancel {
            Some(signal) => {
                let outcome = tokio::select! {
                    biased;
                    () = signal.cancelled() => None,
                    outcome = invocation => Some(outcome),
                };
                match outcome {
                    Some(outcome) if !signal.is_cancelled() => outcome,
                    _ => {
                        info!(%persona, "request cancelled, discarding agent result");
                        return Err(RouteError::Cancelled);
                    }
                }
            }
            None => invocation.await,
        };

        let inbound = Turn::at(TurnRole::Customer, &message.text, message.received_at);
        let (kind, text, turns) = match outcome {
            Ok(reply) => {
                let turns = vec![inbound, Turn::assistant(&reply.text)];
                (ReplyKind::Ai, reply.text, turns)
            }
            Err(AgentError::Rejected { message }) => {
                warn!(%persona, "agent rejected the message");
                let turns = vec![inbound, Turn::assistant(&message)];
                (ReplyKind::Rejected, message, turns)
            }
            Err(err) => {
                warn!(%persona, error = %err, kind = err.kind(), "agent failed, sending fallback");
                (ReplyKind::Fallback, FALLBACK_REPLY.to_string(), vec![inbound])
            }
        };

        let session = self.append(&key, persona, turns).await?;
        let state = session.state(Utc::now(), self.idle_threshold);
        info!(%persona, kind = %kind, turns = session.turn_count(), "message routed");

        Ok(RouteReply {
            text,
            kind,
            persona,
            state,
            session,
        })
    }

    /// Appends a batch, recreating the session once if it was evicted while
    /// the agent was running.
    async fn append(
        &self,
        key: &SessionKey,
        persona: AgentPersona,
        turns: Vec<Turn>,
    ) -> Result<ConversationSession, RouteError> {
        match self.store.append_turns(key, turns.clone()).await {
            Err(SessionStoreError::NotFound { .. }) => {
                warn!(session = %key, "session evicted mid-request, recreating");
                self.store.create_or_get(key, persona).await?;
                Ok(self.store.append_turns(key, turns).await?)
            }
            other => Ok(other?),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::time::Duration;
    use switchboard_ai::{
        AgentConfig, CONTENT_FILTER_REFUSAL, LlmError, LlmResponse, PersonaCatalog, ScriptedBackend,
    };
    use switchboard_conversation::InMemorySessionStore;

    fn router_with(
        store: Arc<dyn SessionStore>,
        backend: Arc<ScriptedBackend>,
        timeout: Duration,
    ) -> Router {
        let invoker = AgentInvoker::new(backend, PersonaCatalog::default(), &AgentConfig::default())
            .with_timeout(timeout);
        Router::new(store, invoker, &SessionConfig::default())
    }

    fn router(store: &Arc<InMemorySessionStore>, backend: &Arc<ScriptedBackend>) -> Router {
        router_with(
            Arc::clone(store) as Arc<dyn SessionStore>,
            Arc::clone(backend),
            Duration::from_secs(5),
        )
    }

    fn sms(from: &str, body: &str) -> Value {
        json!({ "From": from, "To": "+19015550000", "Body": body, "MessageSid": "SM123" })
    }

    fn sms_key(from: &str) -> SessionKey {
        SessionKey::new(CustomerIdentity::phone(from).expect("valid"), Channel::Sms)
    }

    struct UnavailableStore;

    #[async_trait]
    impl SessionStore for UnavailableStore {
        async fn get(&self, _key: &SessionKey) -> Result<ConversationSession, SessionStoreError> {
            Err(down())
        }

        async fn create_or_get(
            &self,
            _key: &SessionKey,
            _default_persona: AgentPersona,
        ) -> Result<ConversationSession, SessionStoreError> {
            Err(down())
        }

        async fn append_turns(
            &self,
            _key: &SessionKey,
            _turns: Vec<Turn>,
        ) -> Result<ConversationSession, SessionStoreError> {
            Err(down())
        }

        async fn reassign_persona(
            &self,
            _key: &SessionKey,
            _persona: AgentPersona,
        ) -> Result<ConversationSession, SessionStoreError> {
            Err(down())
        }

        async fn evict_idle(
            &self,
            _now: DateTime<Utc>,
            _idle_threshold: chrono::Duration,
        ) -> Result<usize, SessionStoreError> {
            Err(down())
        }
    }

    fn down() -> SessionStoreError {
        SessionStoreError::Unavailable {
            reason: "connection refused".to_string(),
        }
    }

    #[tokio::test]
    async fn sms_wedding_inquiry_creates_sms_session() {
        let store = Arc::new(InMemorySessionStore::new());
        let backend = Arc::new(ScriptedBackend::new().reply("Congrats! When's the wedding? 🎉"));
        let router = router(&store, &backend);

        let reply = router
            .handle(Channel::Sms, &sms("+19015551234", "Hi, I need a DJ for my wedding"))
            .await
            .expect("routed");

        assert_eq!(reply.kind, ReplyKind::Ai);
        assert_eq!(reply.persona, AgentPersona::SmsSpecialist);
        assert!(!reply.text.is_empty());
        assert_eq!(reply.state, SessionState::Active);
        assert_eq!(backend.calls(), 1);

        let session = store.get(&sms_key("+19015551234")).await.expect("stored");
        let roles: Vec<_> = session.turns.iter().map(|t| t.role).collect();
        assert_eq!(roles, vec![TurnRole::Customer, TurnRole::Assistant]);
        assert_eq!(session.turns[0].text, "Hi, I need a DJ for my wedding");
        assert_eq!(session.turns[1].text, reply.text);
    }

    #[tokio::test]
    async fn agent_timeout_sends_fallback_and_keeps_inbound_turn() {
        let store = Arc::new(InMemorySessionStore::new());
        let backend =
            Arc::new(ScriptedBackend::always("too late").with_delay(Duration::from_millis(500)));
        let router = router_with(
            Arc::clone(&store) as Arc<dyn SessionStore>,
            Arc::clone(&backend),
            Duration::from_millis(50),
        );

        let reply = router
            .handle(Channel::Sms, &sms("+19015551234", "Are you free June 14?"))
            .await
            .expect("routed");

        assert_eq!(reply.kind, ReplyKind::Fallback);
        assert_eq!(reply.text, FALLBACK_REPLY);
        let session = store.get(&sms_key("+19015551234")).await.expect("stored");
        assert_eq!(session.turn_count(), 1);
        assert_eq!(session.turns[0].role, TurnRole::Customer);
    }

    #[tokio::test]
    async fn unavailable_agent_sends_fallback() {
        let store = Arc::new(InMemorySessionStore::new());
        let backend = Arc::new(ScriptedBackend::new().fail(LlmError::Unauthorized));
        let reply = router(&store, &backend)
            .handle(Channel::Sms, &sms("+19015551234", "hello"))
            .await
            .expect("routed");

        assert_eq!(reply.kind, ReplyKind::Fallback);
        assert_eq!(reply.state, SessionState::New);
    }

    #[tokio::test]
    async fn refusal_is_returned_unmasked_and_recorded() {
        let store = Arc::new(InMemorySessionStore::new());
        let mut refusal = LlmResponse::text("gpt-4o-mini", "");
        refusal.refusal = Some("I can only help with event bookings.".to_string());
        let backend = Arc::new(ScriptedBackend::new().respond(refusal));

        let reply = router(&store, &backend)
            .handle(Channel::Sms, &sms("+19015551234", "write my essay"))
            .await
            .expect("routed");

        assert_eq!(reply.kind, ReplyKind::Rejected);
        assert_eq!(reply.text, "I can only help with event bookings.");
        let session = store.get(&sms_key("+19015551234")).await.expect("stored");
        assert_eq!(session.turn_count(), 2);
        assert_eq!(session.turns[1].text, "I can only help with event bookings.");
    }

    #[tokio::test]
    async fn filtered_reply_reaches_the_channel_as_refusal() {
        let store = Arc::new(InMemorySessionStore::new());
        let mut filtered = LlmResponse::text("gpt-4o-mini", "");
        filtered.finish_reason = Some("content_filter".to_string());
        let backend = Arc::new(ScriptedBackend::new().respond(filtered));

        let reply = router(&store, &backend)
            .handle(Channel::Sms, &sms("+19015551234", "something off-topic"))
            .await
            .expect("routed");

        assert_eq!(reply.kind, ReplyKind::Rejected);
        assert_eq!(reply.text, CONTENT_FILTER_REFUSAL);
        assert_ne!(reply.text, FALLBACK_REPLY);
        let session = store.get(&sms_key("+19015551234")).await.expect("stored");
        assert_eq!(session.turn_count(), 2);
        assert_eq!(session.turns[1].role, TurnRole::Assistant);
        assert_eq!(session.turns[1].text, CONTENT_FILTER_REFUSAL);
    }

    #[tokio::test]
    async fn persona_is_chosen_once_per_session() {
        let store = Arc::new(InMemorySessionStore::new());
        let backend = Arc::new(ScriptedBackend::always("ok"));
        let router = router(&store, &backend);

        let chat = json!({
            "sessionToken": "tok-1",
            "messages": [{ "role": "user", "content": "Do you do corporate events?" }],
        });
        let first = router.handle(Channel::WebChat, &chat).await.expect("routed");
        assert_eq!(first.persona, AgentPersona::General);

        let key = SessionKey::new(CustomerIdentity::new("tok-1").expect("valid"), Channel::WebChat);
        store
            .reassign_persona(&key, AgentPersona::SmsSpecialist)
            .await
            .expect("reassign");

        for _ in 0..3 {
            let reply = router.handle(Channel::WebChat, &chat).await.expect("routed");
            assert_eq!(reply.persona, AgentPersona::SmsSpecialist);
        }
        assert_eq!(store.get(&key).await.expect("stored").turn_count(), 8);
    }

    #[tokio::test]
    async fn malformed_payload_touches_nothing() {
        let store = Arc::new(InMemorySessionStore::new());
        let backend = Arc::new(ScriptedBackend::always("ok"));
        let err = router(&store, &backend)
            .handle(Channel::Sms, &json!({ "From": "+19015551234", "Body": "   " }))
            .await
            .unwrap_err();

        assert!(matches!(err, RouteError::Malformed(_)));
        assert_eq!(backend.calls(), 0);
        assert!(store.is_empty().expect("len"));
    }

    #[tokio::test]
    async fn store_failure_fails_the_request() {
        let backend = Arc::new(ScriptedBackend::always("ok"));
        let router = router_with(Arc::new(UnavailableStore), Arc::clone(&backend), Duration::from_secs(5));

        let err = router
            .handle(Channel::Sms, &sms("+19015551234", "hello"))
            .await
            .unwrap_err();
        assert_eq!(
            err,
            RouteError::StoreUnavailable {
                reason: "connection refused".to_string()
            }
        );
        assert_eq!(backend.calls(), 0);
    }

    #[tokio::test]
    async fn cancelled_request_appends_nothing() {
        let store = Arc::new(InMemorySessionStore::new());
        let backend =
            Arc::new(ScriptedBackend::always("late").with_delay(Duration::from_millis(300)));
        let router = Arc::new(router(&store, &backend));
        let (handle, signal) = CancelSignal::new();

        let task = tokio::spawn({
            let router = Arc::clone(&router);
            async move {
                router
                    .handle_with_cancel(Channel::Sms, &sms("+19015551234", "hello"), signal)
                    .await
            }
        });
        tokio::time::sleep(Duration::from_millis(30)).await;
        handle.cancel();

        let result = task.await.expect("join");
        assert_eq!(result.unwrap_err(), RouteError::Cancelled);
        tokio::time::sleep(Duration::from_millis(400)).await;
        let session = store.get(&sms_key("+19015551234")).await.expect("created");
        assert!(session.turns.is_empty());
    }

    #[tokio::test]
    async fn dropped_request_appends_nothing() {
        let store = Arc::new(InMemorySessionStore::new());
        let backend =
            Arc::new(ScriptedBackend::always("late").with_delay(Duration::from_millis(300)));
        let router = router(&store, &backend);

        let abandoned = tokio::time::timeout(
            Duration::from_millis(30),
            router.handle(Channel::Sms, &sms("+19015551234", "hello")),
        )
        .await;
        assert!(abandoned.is_err());

        let session = store.get(&sms_key("+19015551234")).await.expect("created");
        assert!(session.turns.is_empty());
    }

    #[tokio::test]
    async fn uncancelled_signal_completes_normally() {
        let store = Arc::new(InMemorySessionStore::new());
        let backend = Arc::new(ScriptedBackend::always("Hi!"));
        let (_handle, signal) = CancelSignal::new();

        let reply = router(&store, &backend)
            .handle_with_cancel(Channel::Sms, &sms("+19015551234", "hello"), signal)
            .await
            .expect("routed");
        assert_eq!(reply.text, "Hi!");
    }

    #[tokio::test]
    async fn voice_transcript_uses_its_own_session() {
        let store = Arc::new(InMemorySessionStore::new());
        let backend = Arc::new(ScriptedBackend::always("Thanks for calling!"));
        let router = router(&store, &backend);

        router
            .handle(Channel::Sms, &sms("+19015551234", "hello"))
            .await
            .expect("sms");
        let identity = CustomerIdentity::phone("+1 (901) 555-1234").expect("valid");
        let reply = router
            .inject_transcript(&identity, "I'd like to book a DJ")
            .await
            .expect("voice");

        assert_eq!(reply.persona, AgentPersona::VoiceConcierge);
        assert_eq!(reply.session.channel, Channel::Voice);
        assert_eq!(reply.session.turn_count(), 2);
        assert_eq!(
            store.get(&sms_key("+19015551234")).await.expect("sms").turn_count(),
            2
        );
    }

    #[tokio::test]
    async fn lifecycle_follows_traffic_and_eviction() {
        let store = Arc::new(InMemorySessionStore::new());
        let backend = Arc::new(ScriptedBackend::always("Hi!"));
        let router = router(&store, &backend);
        let key = sms_key("+19015551234");

        assert_eq!(
            router.lifecycle(&key, Utc::now()).await.expect("state"),
            SessionState::Expired
        );

        router
            .handle(Channel::Sms, &sms("+19015551234", "hello"))
            .await
            .expect("routed");
        let now = Utc::now();
        assert_eq!(router.lifecycle(&key, now).await.expect("state"), SessionState::Active);

        let later = now + chrono::Duration::minutes(31);
        assert_eq!(router.lifecycle(&key, later).await.expect("state"), SessionState::Idle);

        assert_eq!(router.evict_idle(later).await.expect("evict"), 1);
        assert_eq!(
            router.lifecycle(&key, later).await.expect("state"),
            SessionState::Expired
        );
    }

    #[tokio::test]
    async fn idle_session_keeps_history_on_next_message() {
        let store = Arc::new(InMemorySessionStore::new());
        let backend = Arc::new(ScriptedBackend::always("Hi!"));
        let router = router(&store, &backend);
        let key = sms_key("+19015551234");

        router
            .handle(Channel::Sms, &sms("+19015551234", "hello"))
            .await
            .expect("first");
        let later = Utc::now() + chrono::Duration::minutes(45);
        assert_eq!(router.lifecycle(&key, later).await.expect("state"), SessionState::Idle);

        let reply = router
            .handle(Channel::Sms, &sms("+19015551234", "still there?"))
            .await
            .expect("second");
        assert_eq!(reply.state, SessionState::Active);
        assert_eq!(reply.session.turn_count(), 4);
    }

    #[tokio::test]
    async fn concurrent_messages_all_recorded() {
        let store = Arc::new(InMemorySessionStore::new());
        let backend = Arc::new(ScriptedBackend::always("ok"));
        let router = router(&store, &backend);

        let messages = (0..10).map(|i| {
            let router = &router;
            async move {
                router
                    .handle(Channel::Sms, &sms("+19015551234", &format!("message {i}")))
                    .await
                    .expect("routed")
            }
        });
        futures::future::join_all(messages).await;

        let session = store.get(&sms_key("+19015551234")).await.expect("stored");
        assert_eq!(session.turn_count(), 20);
        for pair in session.turns.chunks(2) {
            assert_eq!(pair[0].role, TurnRole::Customer);
            assert_eq!(pair[1].role, TurnRole::Assistant);
        }
    }
}
