//! Domain error types for server operations.
//!
//! - `StartupError`: fatal failures before the server starts listening,
//!   reported through rootcause
//! - `ApiError`: request failures, rendered as JSON

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use std::fmt;
use switchboard_router::RouteError;

/// Fatal startup failures.
#[derive(Debug)]
pub enum StartupError {
    /// Configuration could not be loaded.
    Config { details: String },
    /// The database could not be reached.
    Database { details: String },
    /// The agent backend could not be built.
    Agent { details: String },
    /// The listener could not bind or serve.
    Serve { details: String },
}

impl fmt::Display for StartupError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Config { details } => write!(f, "failed to load configuration: {details}"),
            Self::Database { details } => write!(f, "failed to connect to database: {details}"),
            Self::Agent { details } => write!(f, "failed to set up agent backend: {details}"),
            Self::Serve { details } => write!(f, "server error: {details}"),
        }
    }
}

impl std::error::Error for StartupError {}

/// Request failures.
#[derive(Debug)]
pub enum ApiError {
    /// The request body could not be read or normalized.
    BadRequest { details: String },
    /// The session store failed.
    Unavailable { details: String },
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::BadRequest { details } => write!(f, "bad request: {details}"),
            Self::Unavailable { details } => write!(f, "service unavailable: {details}"),
        }
    }
}

impl std::error::Error for ApiError {}

impl From<RouteError> for ApiError {
    fn from(err: RouteError) -> Self {
        match err {
            RouteError::Malformed(err) => Self::BadRequest {
                details: err.to_string(),
            },
            other => Self::Unavailable {
                details: other.to_string(),
            },
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            Self::BadRequest { details } => (StatusCode::BAD_REQUEST, details.clone()),
            Self::Unavailable { details } => {
                tracing::error!(error = %details, "request failed");
                (
                    StatusCode::SERVICE_UNAVAILABLE,
                    "Service temporarily unavailable".to_string(),
                )
            }
        };
        (status, Json(json!({ "error": message }))).into_response()
    }
}
