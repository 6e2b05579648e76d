//! API request and response structures

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::error;

use crate::engine::EngineError;

/// Body of `POST /timers`
///
/// Either `durationMs` or whole `minutes` may be given; `badgeNumber` is
/// accepted as an alias for `badge`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateTimerRequest {
    #[serde(alias = "badgeNumber")]
    pub badge: String,
    #[serde(default)]
    pub duration_ms: Option<u64>,
    #[serde(default)]
    pub minutes: Option<u64>,
}

impl CreateTimerRequest {
    /// Requested duration in milliseconds, 0 when none was given
    pub fn duration_ms(&self) -> u64 {
        self.duration_ms
            .or_else(|| self.minutes.map(|m| m.saturating_mul(60_000)))
            .unwrap_or(0)
    }
}

/// Response of `DELETE /timers/completed`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClearedResponse {
    pub removed: usize,
}

/// Error body returned for every failed command or query
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
}

/// Engine failures mapped onto HTTP statuses
#[derive(Debug)]
pub struct ApiError(pub EngineError);

impl From<EngineError> for ApiError {
    fn from(e: EngineError) -> Self {
        Self(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, kind) = match &self.0 {
            EngineError::NotFound(_) => (StatusCode::NOT_FOUND, "NotFound"),
            EngineError::InvalidDuration => (StatusCode::UNPROCESSABLE_ENTITY, "InvalidDuration"),
            EngineError::InvalidBadge => (StatusCode::UNPROCESSABLE_ENTITY, "InvalidBadge"),
            EngineError::InvalidTransition { .. } => (StatusCode::CONFLICT, "InvalidTransition"),
            EngineError::AlreadyExpired(_) => (StatusCode::CONFLICT, "AlreadyExpired"),
            EngineError::Store(_) => (StatusCode::INTERNAL_SERVER_ERROR, "Store"),
        };

        if status.is_server_error() {
            error!("Request failed: {}", self.0);
        }

        let body = ErrorResponse {
            error: kind.to_string(),
            message: self.0.to_string(),
        };
        (status, Json(body)).into_response()
    }
}

/// Health check response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub timestamp: DateTime<Utc>,
    pub version: String,
    pub uptime: String,
}

impl HealthResponse {
    /// Create a new health response
    pub fn ok(uptime: String) -> Self {
        Self {
            status: "ok".to_string(),
            timestamp: Utc::now(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            uptime,
        }
    }
}
