//! Error taxonomy for the grant access service.
//!
//! Caller-facing variants are deliberately coarse: whether a presented token
//! was unknown, expired, or attached to an inactive grant is recorded only in
//! the access log's `failure_reason`, never surfaced to the caller.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AccessError {
    #[error("Grant not found")]
    NotFound,

    #[error("Invalid or expired access link")]
    InvalidOrExpired,

    #[error("Identity verification failed")]
    NameMismatch,

    #[error("Store error: {0}")]
    StoreError(#[from] sqlx::Error),

    #[error("Configuration error: {0}")]
    ConfigError(anyhow::Error),

    #[error("Delivery error: {0}")]
    DeliveryError(String),
}

impl From<lettre::error::Error> for AccessError {
    fn from(err: lettre::error::Error) -> Self {
        AccessError::DeliveryError(err.to_string())
    }
}

impl IntoResponse for AccessError {
    fn into_response(self) -> Response {
        #[derive(Serialize)]
        struct ErrorResponse {
            error: String,
            #[serde(skip_serializing_if = "Option::is_none")]
            details: Option<String>,
        }

        let (status, error_message, details) = match self {
            AccessError::NotFound => (StatusCode::NOT_FOUND, self.to_string(), None),
            AccessError::InvalidOrExpired => (StatusCode::UNAUTHORIZED, self.to_string(), None),
            AccessError::NameMismatch => (StatusCode::FORBIDDEN, self.to_string(), None),
            AccessError::StoreError(err) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Store error".to_string(),
                Some(err.to_string()),
            ),
            AccessError::ConfigError(err) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Configuration error".to_string(),
                Some(err.to_string()),
            ),
            AccessError::DeliveryError(msg) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Delivery error".to_string(),
                Some(msg),
            ),
        };

        (
            status,
            Json(ErrorResponse {
                error: error_message,
                details,
            }),
        )
            .into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn user_facing_variants_map_to_safe_statuses() {
        assert_eq!(
            AccessError::InvalidOrExpired.into_response().status(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            AccessError::NotFound.into_response().status(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            AccessError::NameMismatch.into_response().status(),
            StatusCode::FORBIDDEN
        );
    }

    #[test]
    fn invalid_or_expired_message_does_not_disclose_reason() {
        let msg = AccessError::InvalidOrExpired.to_string();
        assert!(!msg.to_lowercase().contains("status"));
        assert!(!msg.to_lowercase().contains("found"));
    }
}
