//! Error types for the AI crate.
//!
//! - `LlmError`: provider-level failures, classified as transient or not
//! - `AgentError`: the normalized taxonomy the router branches on

use std::fmt;

/// Errors from LLM backend operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LlmError {
    /// The provider could not be reached.
    Connection { reason: String },
    /// A single HTTP attempt timed out.
    Timeout,
    /// Rate limit exceeded (HTTP 429).
    RateLimited { retry_after_secs: Option<u64> },
    /// The provider failed (HTTP 5xx).
    ServerError { status: u16, reason: String },
    /// The provider rejected the credentials.
    Unauthorized,
    /// The request was invalid (HTTP 4xx other than 401/429).
    RequestFailed { status: u16, reason: String },
    /// The provider refused the content.
    ContentRejected { message: String },
    /// Response parsing failed.
    ResponseParseFailed { reason: String },
    /// Invalid configuration.
    InvalidConfig { reason: String },
}

impl LlmError {
    /// Returns true if retrying the same request may succeed.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::Connection { .. }
                | Self::Timeout
                | Self::RateLimited { .. }
                | Self::ServerError { .. }
        )
    }
}

impl fmt::Display for LlmError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Connection { reason } => write!(f, "LLM provider unreachable: {reason}"),
            Self::Timeout => write!(f, "LLM request timed out"),
            Self::RateLimited { retry_after_secs } => {
                if let Some(secs) = retry_after_secs {
                    write!(f, "rate limited, retry after {secs}s")
                } else {
                    write!(f, "rate limited")
                }
            }
            Self::ServerError { status, reason } => {
                write!(f, "LLM provider error (HTTP {status}): {reason}")
            }
            Self::Unauthorized => write!(f, "LLM provider rejected the API key"),
            Self::RequestFailed { status, reason } => {
                write!(f, "LLM request failed (HTTP {status}): {reason}")
            }
            Self::ContentRejected { message } => {
                write!(f, "LLM provider rejected the content: {message}")
            }
            Self::ResponseParseFailed { reason } => {
                write!(f, "failed to parse LLM response: {reason}")
            }
            Self::InvalidConfig { reason } => {
                write!(f, "invalid LLM configuration: {reason}")
            }
        }
    }
}

impl std::error::Error for LlmError {}

/// Normalized agent invocation failures.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AgentError {
    /// The request-level deadline expired.
    Timeout,
    /// The agent refused; `message` is its own text.
    Rejected { message: String },
    /// The agent runtime failed or is unreachable.
    Unavailable { reason: String },
}

impl AgentError {
    /// Returns the name used in logs and metrics.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Timeout => "agent_timeout",
            Self::Rejected { .. } => "agent_rejected",
            Self::Unavailable { .. } => "agent_unavailable",
        }
    }
}

impl fmt::Display for AgentError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Timeout => write!(f, "agent invocation timed out"),
            Self::Rejected { message } => write!(f, "agent rejected the message: {message}"),
            Self::Unavailable { reason } => write!(f, "agent unavailable: {reason}"),
        }
    }
}

impl std::error::Error for AgentError {}

impl From<LlmError> for AgentError {
    fn from(err: LlmError) -> Self {
        match err {
            LlmError::ContentRejected { message } => Self::Rejected { message },
            other => Self::Unavailable {
                reason: other.to_string(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transient_classification() {
        assert!(LlmError::Timeout.is_transient());
        assert!(
            LlmError::Connection {
                reason: "connection refused".to_string()
            }
            .is_transient()
        );
        assert!(
            LlmError::ServerError {
                status: 503,
                reason: "overloaded".to_string()
            }
            .is_transient()
        );
        assert!(LlmError::RateLimited { retry_after_secs: None }.is_transient());

        assert!(!LlmError::Unauthorized.is_transient());
        assert!(
            !LlmError::ContentRejected {
                message: "no".to_string()
            }
            .is_transient()
        );
        assert!(
            !LlmError::RequestFailed {
                status: 400,
                reason: "bad model".to_string()
            }
            .is_transient()
        );
    }

    #[test]
    fn llm_error_normalizes_to_agent_error() {
        let rejected: AgentError = LlmError::ContentRejected {
            message: "I can't help with that.".to_string(),
        }
        .into();
        assert_eq!(
            rejected,
            AgentError::Rejected {
                message: "I can't help with that.".to_string()
            }
        );

        let unavailable: AgentError = LlmError::Unauthorized.into();
        assert!(matches!(unavailable, AgentError::Unavailable { .. }));
        assert_eq!(unavailable.kind(), "agent_unavailable");
    }

    #[test]
    fn llm_error_display() {
        let err = LlmError::ServerError {
            status: 502,
            reason: "bad gateway".to_string(),
        };
        assert!(err.to_string().contains("502"));
        assert!(err.to_string().contains("bad gateway"));
    }
}
