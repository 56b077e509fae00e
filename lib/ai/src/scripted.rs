//! Scripted in-memory backend for tests and offline runs.

use crate::backend::{LlmBackend, LlmRequest, LlmResponse};
use crate::error::LlmError;
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

/// An [`LlmBackend`] that answers from a script.
///
/// Each call pops the next scripted result. Once the script is exhausted the
/// default reply is used if one is set, otherwise the call fails with
/// [`LlmError::Connection`]. Every request is recorded.
#[derive(Debug, Default)]
pub struct ScriptedBackend {
    script: Mutex<VecDeque<Result<LlmResponse, LlmError>>>,
    default_reply: Option<String>,
    delay: Option<Duration>,
    requests: Mutex<Vec<LlmRequest>>,
}

impl ScriptedBackend {
    /// Creates a backend with an empty script.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a backend that always replies with `text`.
    #[must_use]
    pub fn always(text: impl Into<String>) -> Self {
        Self {
            default_reply: Some(text.into()),
            ..Self::default()
        }
    }

    /// Queues a successful reply.
    #[must_use]
    pub fn reply(self, text: impl Into<String>) -> Self {
        self.push(Ok(LlmResponse::text("scripted", text)))
    }

    /// Queues a full response.
    #[must_use]
    pub fn respond(self, response: LlmResponse) -> Self {
        self.push(Ok(response))
    }

    /// Queues a failure.
    #[must_use]
    pub fn fail(self, err: LlmError) -> Self {
        self.push(Err(err))
    }

    /// Delays every answer by `delay`.
    #[must_use]
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Returns the number of calls made.
    #[must_use]
    pub fn calls(&self) -> usize {
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Returns every request received, in order.
    #[must_use]
    pub fn requests(&self) -> Vec<LlmRequest> {
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn push(self, step: Result<LlmResponse, LlmError>) -> Self {
        self.script
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push_back(step);
        self
    }
}

#[async_trait]
impl LlmBackend for ScriptedBackend {
    async fn generate(&self, request: &LlmRequest) -> Result<LlmResponse, LlmError> {
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(request.clone());

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        let next = self
            .script
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop_front();
        match (next, &self.default_reply) {
            (Some(step), _) => step,
            (None, Some(text)) => Ok(LlmResponse::text(&request.model, text.clone())),
            (None, None) => Err(LlmError::Connection {
                reason: "script exhausted".to_string(),
            }),
        }
    }

    fn name(&self) -> &str {
        "scripted"
    }
}
