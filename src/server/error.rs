//! Error responses returned by the HTTP endpoints.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;

use crate::llm::ForwardError;
use crate::relay::RelayError;

/// Endpoint-level failures, each with a fixed status and JSON body.
#[derive(Debug, Error, Clone, Eq, PartialEq)]
pub enum ApiError {
    /// Required request field missing or empty.
    #[error("Message is required")]
    MissingMessage,
    /// Request body present but not a JSON object of the expected shape.
    #[error("Invalid request body: {0}")]
    InvalidBody(String),
    /// Upstream credential absent.
    #[error("API key not configured")]
    Configuration,
    /// Upstream rejected the request.
    #[error("API request failed: HTTP {0}")]
    UpstreamStatus(u16),
    /// Upstream could not be reached.
    #[error("Network error: Unable to connect to API")]
    Connectivity,
    /// Anything else.
    #[error("Server error: {0}")]
    Unexpected(String),
}

impl ApiError {
    /// HTTP status for this error.
    #[must_use]
    pub const fn status_code(&self) -> StatusCode {
        match self {
            Self::MissingMessage | Self::InvalidBody(_) => StatusCode::BAD_REQUEST,
            Self::Configuration
            | Self::UpstreamStatus(_)
            | Self::Connectivity
            | Self::Unexpected(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn body(&self) -> serde_json::Value {
        match self {
            Self::UpstreamStatus(code) => serde_json::json!({
                "error": self.to_string(),
                "status_code": code,
            }),
            _ => serde_json::json!({ "error": self.to_string() }),
        }
    }
}

impl From<ForwardError> for ApiError {
    fn from(err: ForwardError) -> Self {
        match err {
            ForwardError::MissingApiKey => Self::Configuration,
            ForwardError::UpstreamStatus { status } => Self::UpstreamStatus(status),
            ForwardError::Network(_) => Self::Connectivity,
            ForwardError::Unexpected(detail) => Self::Unexpected(detail),
        }
    }
}

impl From<RelayError> for ApiError {
    fn from(err: RelayError) -> Self {
        match err {
            RelayError::Forward(forward) => forward.into(),
            RelayError::Store(store) => Self::Unexpected(store.to_string()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if matches!(self, Self::Configuration | Self::Unexpected(_)) {
            tracing::error!(error = %self, "request failed");
        }
        (self.status_code(), Json(self.body())).into_response()
    }
}
