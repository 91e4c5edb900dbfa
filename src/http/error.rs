// src/http/error.rs
// Mapping proxy errors onto HTTP responses

use axum::{
    Json,
    http::{HeaderValue, StatusCode, header::RETRY_AFTER},
    response::{IntoResponse, Response},
};
use chrono::Utc;
use serde_json::json;
use tracing::{error, warn};

use crate::error::ProxyError;

/// Seconds a client is told to wait before retrying a transient failure
const RETRY_AFTER_SECS: u64 = 1;

/// Error response for the front door
#[derive(Debug)]
pub struct ApiError {
    pub message: String,
    pub status_code: StatusCode,
    pub error_code: &'static str,
    /// Sent as `Retry-After` when the same request may succeed later
    pub retry_after: Option<u64>,
}

impl ApiError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            status_code: StatusCode::BAD_REQUEST,
            error_code: "BAD_REQUEST",
            retry_after: None,
        }
    }
}

impl From<ProxyError> for ApiError {
    fn from(err: ProxyError) -> Self {
        let status_code = match &err {
            ProxyError::Busy | ProxyError::NotReady | ProxyError::ExecutorCrash(_) => {
                StatusCode::SERVICE_UNAVAILABLE
            }
            ProxyError::Timeout { .. } => StatusCode::GATEWAY_TIMEOUT,
            ProxyError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };

        Self {
            message: err.to_string(),
            status_code,
            error_code: err.code(),
            retry_after: err.is_retryable().then_some(RETRY_AFTER_SECS),
        }
    }
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for ApiError {}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if self.status_code.is_server_error() {
            error!(status = self.status_code.as_u16(), code = self.error_code, "{}", self.message);
        } else {
            warn!(status = self.status_code.as_u16(), code = self.error_code, "{}", self.message);
        }

        let body = json!({
            "success": false,
            "error": self.message,
            "code": self.error_code,
            "timestamp": Utc::now().to_rfc3339(),
        });

        let mut response = (self.status_code, Json(body)).into_response();
        if let Some(secs) = self.retry_after {
            response
                .headers_mut()
                .insert(RETRY_AFTER, HeaderValue::from(secs));
        }
        response
    }
}

pub type ApiResult<T> = Result<T, ApiError>;
