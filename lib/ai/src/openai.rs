//! OpenAI-compatible chat-completions backend.
//!
//! Talks to `POST {base_url}/v1/chat/completions` with a bearer API key and
//! classifies failures into [`LlmError`] so the invoker can decide whether to
//! retry.

use crate::backend::{LlmBackend, LlmMessage, LlmRequest, LlmResponse, MessageRole, TokenUsage};
use crate::error::LlmError;
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, instrument, warn};

/// Default API base URL.
pub const DEFAULT_BASE_URL: &str = "https://api.openai.com";

/// Error codes the provider uses for content-policy refusals.
const CONTENT_POLICY_CODES: &[&str] = &["content_policy_violation", "content_filter"];

/// Backend for any OpenAI-compatible chat-completions API.
#[derive(Debug, Clone)]
pub struct OpenAiBackend {
    client: Client,
    base_url: String,
    api_key: String,
}

#[derive(Debug, Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: Vec<ApiMessage<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
}

#[derive(Debug, Serialize)]
struct ApiMessage<'a> {
    role: MessageRole,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    #[serde(default)]
    model: Option<String>,
    choices: Vec<Choice>,
    #[serde(default)]
    usage: Option<ApiUsage>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    refusal: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiUsage {
    #[serde(default)]
    prompt_tokens: u32,
    #[serde(default)]
    completion_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct ApiErrorResponse {
    error: ApiError,
}

#[derive(Debug, Deserialize)]
struct ApiError {
    message: String,
    #[serde(default, rename = "type")]
    error_type: Option<String>,
    #[serde(default)]
    code: Option<String>,
}

impl ApiError {
    fn is_content_policy(&self) -> bool {
        [self.code.as_deref(), self.error_type.as_deref()]
            .into_iter()
            .flatten()
            .any(|c| CONTENT_POLICY_CODES.contains(&c))
    }
}

impl OpenAiBackend {
    /// Creates a backend.
    ///
    /// `attempt_timeout` bounds each HTTP attempt; the overall deadline is
    /// the invoker's.
    ///
    /// # Errors
    ///
    /// Returns [`LlmError::InvalidConfig`] if the HTTP client cannot be built.
    pub fn new(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        attempt_timeout: Duration,
    ) -> Result<Self, LlmError> {
        let client = Client::builder()
            .timeout(attempt_timeout)
            .build()
            .map_err(|e| LlmError::InvalidConfig {
                reason: e.to_string(),
            })?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
        })
    }

    fn build_messages(request: &LlmRequest) -> Vec<ApiMessage<'_>> {
        let system = request.system.as_deref().map(|content| ApiMessage {
            role: MessageRole::System,
            content,
        });
        let context = request.context.iter().map(|m: &LlmMessage| ApiMessage {
            role: m.role,
            content: &m.content,
        });
        let prompt = ApiMessage {
            role: MessageRole::User,
            content: &request.prompt,
        };

        system
            .into_iter()
            .chain(context)
            .chain(std::iter::once(prompt))
            .collect()
    }

    fn parse_response(body: ChatCompletionResponse, requested_model: &str) -> Result<LlmResponse, LlmError> {
        let choice = body
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| LlmError::ResponseParseFailed {
                reason: "response has no choices".to_string(),
            })?;

        let usage = body.usage.map_or_else(TokenUsage::default, |u| TokenUsage {
            input_tokens: u.prompt_tokens,
            output_tokens: u.completion_tokens,
        });

        Ok(LlmResponse {
            content: choice.message.content.unwrap_or_default(),
            refusal: choice.message.refusal,
            finish_reason: choice.finish_reason,
            usage,
            model: body.model.unwrap_or_else(|| requested_model.to_string()),
        })
    }

    async fn error_from_status(status: StatusCode, response: reqwest::Response) -> LlmError {
        if status == StatusCode::TOO_MANY_REQUESTS {
            let retry_after_secs = response
                .headers()
                .get("retry-after")
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse::<u64>().ok());
            return LlmError::RateLimited { retry_after_secs };
        }

        if status == StatusCode::UNAUTHORIZED {
            return LlmError::Unauthorized;
        }

        let body = response.text().await.unwrap_or_default();
        let api_error = serde_json::from_str::<ApiErrorResponse>(&body).ok().map(|r| r.error);
        let reason = api_error
            .as_ref()
            .map_or_else(|| body.clone(), |e| e.message.clone());

        if status.is_server_error() {
            return LlmError::ServerError {
                status: status.as_u16(),
                reason,
            };
        }

        match api_error {
            Some(e) if e.is_content_policy() => LlmError::ContentRejected { message: e.message },
            _ => LlmError::RequestFailed {
                status: status.as_u16(),
                reason,
            },
        }
    }
}

#[async_trait]
impl LlmBackend for OpenAiBackend {
    #[instrument(skip(self, request), fields(model = %request.model))]
    async fn generate(&self, request: &LlmRequest) -> Result<LlmResponse, LlmError> {
        let body = ChatCompletionRequest {
            model: &request.model,
            messages: Self::build_messages(request),
            temperature: request.temperature,
            max_tokens: request.max_tokens,
        };

        let url = format!("{}/v1/chat/completions", self.base_url);
        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    LlmError::Timeout
                } else {
                    LlmError::Connection {
                        reason: e.to_string(),
                    }
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let err = Self::error_from_status(status, response).await;
            warn!(%status, error = %err, "chat completion failed");
            return Err(err);
        }

        let parsed: ChatCompletionResponse =
            response
                .json()
                .await
                .map_err(|e| LlmError::ResponseParseFailed {
                    reason: e.to_string(),
                })?;

        let result = Self::parse_response(parsed, &request.model)?;
        debug!(
            tokens = result.usage.total(),
            finish_reason = ?result.finish_reason,
            "chat completion succeeded"
        );
        Ok(result)
    }

    fn name(&self) -> &str {
        "openai"
    }
}
