//! HTTP boundary errors. Validation and auth problems are detected and
//! returned immediately; upstream failures are translated to a status, not
//! retried; anything else becomes a 500 with the detail exposed only in
//! debug builds.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use std::fmt;

use crate::ai::ExtractorError;
use crate::score::ScoreError;

#[derive(Debug)]
pub enum ApiError {
    /// Malformed request field (400).
    Validation(String),
    /// Missing or wrong API key (401).
    Unauthorized,
    /// Referenced profile/analysis does not exist (404).
    NotFound(String),
    /// Invalid job-state transition, e.g. cancelling a finished analysis (409).
    Conflict(String),
    /// LLM provider rate-limited us (429).
    RateLimited,
    /// LLM provider unreachable or misbehaving (503).
    Upstream(String),
    /// Everything else (500).
    Internal(anyhow::Error),
}

impl ApiError {
    fn kind(&self) -> &'static str {
        match self {
            ApiError::Validation(_) => "validation",
            ApiError::Unauthorized => "unauthorized",
            ApiError::NotFound(_) => "not_found",
            ApiError::Conflict(_) => "conflict",
            ApiError::RateLimited => "rate_limited",
            ApiError::Upstream(_) => "upstream",
            ApiError::Internal(_) => "internal",
        }
    }

    fn status(&self) -> StatusCode {
        match self {
            ApiError::Validation(_) => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized => StatusCode::UNAUTHORIZED,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::RateLimited => StatusCode::TOO_MANY_REQUESTS,
            ApiError::Upstream(_) => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ApiError::Validation(msg) => write!(f, "{msg}"),
            ApiError::Unauthorized => write!(f, "missing or invalid API key"),
            ApiError::NotFound(what) => write!(f, "{what} not found"),
            ApiError::Conflict(msg) => write!(f, "{msg}"),
            ApiError::RateLimited => write!(f, "upstream provider rate limit reached"),
            ApiError::Upstream(msg) => write!(f, "upstream provider unavailable: {msg}"),
            ApiError::Internal(err) => {
                if cfg!(debug_assertions) {
                    write!(f, "internal error: {err}")
                } else {
                    write!(f, "internal error")
                }
            }
        }
    }
}

impl std::error::Error for ApiError {}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = Json(json!({
            "success": false,
            "kind": self.kind(),
            "error": self.to_string(),
        }));
        (self.status(), body).into_response()
    }
}

impl From<ScoreError> for ApiError {
    fn from(value: ScoreError) -> Self {
        // Profiles are validated for a positive weight total at load, so by
        // the time scoring runs, both variants can only come from the
        // caller's request (factor names or weight overrides).
        match value {
            ScoreError::ZeroTotalWeight => ApiError::Validation(value.to_string()),
            ScoreError::UnknownFactor { .. } => ApiError::Validation(value.to_string()),
        }
    }
}

impl From<ExtractorError> for ApiError {
    fn from(value: ExtractorError) -> Self {
        match value {
            ExtractorError::RateLimited => ApiError::RateLimited,
            ExtractorError::Unavailable(msg) => ApiError::Upstream(msg),
            ExtractorError::Disabled => ApiError::Upstream(value.to_string()),
        }
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(value: anyhow::Error) -> Self {
        ApiError::Internal(value)
    }
}
