use crate::server_actors::payment_service::GatewayError;
use actix::MailboxError;
use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use common::types::api::ApiResponse;
use thiserror::Error;

/// Failures raised by the [`Storage`](crate::server_actors::storage::Storage) actor.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum StorageError {
    #[error("{0} not found")]
    NotFound(&'static str),
    #[error("{0}")]
    Forbidden(String),
    #[error("{0}")]
    Conflict(String),
    #[error("{0}")]
    Invalid(String),
    #[error("Could not secure sensitive data: {0}")]
    Crypto(String),
}

#[derive(Error, Debug)]
pub enum AppError {
    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    Unauthorized(String),

    #[error("{0}")]
    Forbidden(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Conflict(String),

    #[error("Payment gateway unavailable: {0}")]
    GatewayUnavailable(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::GatewayUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<StorageError> for AppError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::NotFound(_) => AppError::NotFound(err.to_string()),
            StorageError::Forbidden(msg) => AppError::Forbidden(msg),
            StorageError::Conflict(msg) => AppError::Conflict(msg),
            StorageError::Invalid(msg) => AppError::BadRequest(msg),
            StorageError::Crypto(_) => AppError::Internal(err.to_string()),
        }
    }
}

impl From<MailboxError> for AppError {
    fn from(err: MailboxError) -> Self {
        AppError::Internal(format!("actor mailbox: {err}"))
    }
}

impl From<GatewayError> for AppError {
    fn from(err: GatewayError) -> Self {
        match err {
            GatewayError::Rejected(reason) => AppError::BadRequest(reason),
            other => AppError::GatewayUnavailable(other.to_string()),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = ApiResponse::<()>::error(self.to_string(), status.as_u16());
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn storage_errors_map_to_http_statuses() {
        let not_found: AppError = StorageError::NotFound("Booking").into();
        assert_eq!(not_found.status(), StatusCode::NOT_FOUND);
        assert_eq!(not_found.to_string(), "Booking not found");

        let invalid: AppError = StorageError::Invalid("Start time must be in the future".into()).into();
        assert_eq!(invalid.status(), StatusCode::BAD_REQUEST);

        let conflict: AppError = StorageError::Conflict("taken".into()).into();
        assert_eq!(conflict.status(), StatusCode::CONFLICT);
    }

    #[test]
    fn gateway_rejections_are_client_errors() {
        let rejected: AppError = GatewayError::Rejected("Unsupported currency".into()).into();
        assert_eq!(rejected.status(), StatusCode::BAD_REQUEST);

        let down: AppError = GatewayError::Unavailable.into();
        assert_eq!(down.status(), StatusCode::SERVICE_UNAVAILABLE);
    }
}
