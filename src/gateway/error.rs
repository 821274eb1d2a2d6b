//! The shared non-proxy error envelope (spec §6 "Error envelope") and the
//! [`GatewayError`] taxonomy [`RequestGateway`](super) surfaces before a
//! request ever reaches the [`crate::orchestrator::Orchestrator`].
//!
//! `POST /proxy` and its alias never return this shape on error — those
//! always return a chat-completion envelope (spec §4.4.a) so the client
//! never has to branch on success before parsing. This envelope is only for
//! the admin/ops surface: `/logs`, `/ttl`, `/similarity-threshold`,
//! `/cache/*`.

use crate::policy::PolicyError;
use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use thiserror::Error;

/// Errors [`RequestGateway`](super) can raise before the Orchestrator is
/// invoked, or that an admin endpoint raises while resolving an API key.
#[derive(Debug, Error)]
pub enum GatewayError {
    /// Body exceeded the 10 KiB size cap (spec §4.5 "Size cap").
    #[error("request body exceeds the size cap")]
    RequestTooLarge,

    /// Per-IP coarse rate floor tripped (spec §4.5 "Coarse rate floor").
    #[error("rate limit exceeded")]
    RateLimitExceeded,

    /// Body was not valid JSON.
    #[error("malformed JSON request body")]
    InvalidJson,

    /// Body parsed as JSON but its root was not an object, or didn't match
    /// the expected request shape.
    #[error("request body must be a JSON object matching the expected shape")]
    InvalidDataType,

    /// An admin endpoint requires an API key and none was supplied.
    #[error("API key is required")]
    MissingApiKey,

    /// Resolving the API key for an admin endpoint failed (spec §6 "Log
    /// retrieval": "401 on missing/invalid key").
    #[error(transparent)]
    PolicyRejected(#[from] PolicyError),

    /// The resolved key's tenant does not own the resource (spec §6 "403 if
    /// the key belongs to a different tenant").
    #[error("resource belongs to a different tenant")]
    WrongTenant,

    /// The resource does not exist (spec §6 "404 if unknown").
    #[error("resource not found")]
    NotFound,

    /// `POST /cache/clear` refused: production mode, or a missing/mismatched
    /// confirmation token (spec §6 "Cache admin": "allowed only in
    /// non-production modes gated by a confirmation token header").
    #[error("admin action not permitted")]
    AdminNotPermitted,
}

#[derive(Serialize)]
struct ErrorEnvelope {
    success: bool,
    error_code: String,
    message: String,
    data: serde_json::Value,
}

impl GatewayError {
    fn status_and_code(&self) -> (StatusCode, String) {
        match self {
            GatewayError::RequestTooLarge => {
                (StatusCode::PAYLOAD_TOO_LARGE, "REQUEST_TOO_LARGE".to_string())
            }
            GatewayError::RateLimitExceeded => {
                (StatusCode::TOO_MANY_REQUESTS, "RATE_LIMIT_EXCEEDED".to_string())
            }
            GatewayError::InvalidJson => (StatusCode::BAD_REQUEST, "INVALID_JSON".to_string()),
            GatewayError::InvalidDataType => {
                (StatusCode::BAD_REQUEST, "INVALID_DATA_TYPE".to_string())
            }
            GatewayError::MissingApiKey => {
                (StatusCode::UNAUTHORIZED, "MISSING_API_KEY".to_string())
            }
            GatewayError::PolicyRejected(err) => {
                let status = StatusCode::from_u16(err.http_status())
                    .unwrap_or(StatusCode::UNAUTHORIZED);
                (status, err.error_code().to_string())
            }
            GatewayError::WrongTenant => (StatusCode::FORBIDDEN, "WRONG_TENANT".to_string()),
            GatewayError::NotFound => (StatusCode::NOT_FOUND, "NOT_FOUND".to_string()),
            GatewayError::AdminNotPermitted => {
                (StatusCode::FORBIDDEN, "ADMIN_NOT_PERMITTED".to_string())
            }
        }
    }
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        let (status, error_code) = self.status_and_code();
        let message = self.to_string();
        let body = ErrorEnvelope {
            success: false,
            error_code,
            message,
            data: serde_json::json!({}),
        };
        (status, Json(body)).into_response()
    }
}

/// Builds the same envelope shape without going through [`GatewayError`],
/// for call sites that already have a status/code pair on hand (e.g. the
/// Orchestrator's own error taxonomy, which doesn't map one-to-one onto
/// [`GatewayError`]'s variants).
pub fn error_envelope(status: StatusCode, error_code: &str, message: &str) -> Response {
    let body = ErrorEnvelope {
        success: false,
        error_code: error_code.to_string(),
        message: message.to_string(),
        data: serde_json::json!({}),
    };
    (status, Json(body)).into_response()
}
