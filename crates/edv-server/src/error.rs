//! HTTP error types for the EDV server.
//!
//! Maps domain errors from `edv-core` into HTTP responses. Every error
//! variant produces a JSON body with a machine-readable `error` field and a
//! human-readable `message`.

use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use tracing::warn;

use edv_core::error::VaultError;
use edv_storage::StorageError;

/// Application-level error returned from HTTP handlers.
#[derive(Debug)]
pub enum AppError {
    /// Requested vault or document not found.
    NotFound(String),
    /// Client sent invalid input.
    BadRequest(String),
    /// The vault or document already exists.
    Conflict(String),
    /// The storage backend did not answer in time.
    GatewayTimeout(String),
    /// Internal server error.
    Internal(String),
}

/// JSON error response body.
#[derive(Serialize)]
struct ErrorBody {
    error: &'static str,
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_type, message) = match self {
            Self::NotFound(msg) => (StatusCode::NOT_FOUND, "not_found", msg),
            Self::BadRequest(msg) => (StatusCode::BAD_REQUEST, "bad_request", msg),
            Self::Conflict(msg) => (StatusCode::CONFLICT, "conflict", msg),
            Self::GatewayTimeout(msg) => (StatusCode::GATEWAY_TIMEOUT, "storage_timeout", msg),
            Self::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, "internal_error", msg),
        };

        let body = ErrorBody {
            error: error_type,
            message,
        };

        (status, axum::Json(body)).into_response()
    }
}

impl From<VaultError> for AppError {
    fn from(err: VaultError) -> Self {
        match err {
            VaultError::VaultNotFound { .. } | VaultError::DocumentNotFound { .. } => {
                Self::NotFound(err.to_string())
            }
            VaultError::DuplicateVault { .. } | VaultError::DuplicateDocument { .. } => {
                Self::Conflict(err.to_string())
            }
            VaultError::InvalidRequest { .. } => Self::BadRequest(err.to_string()),
            VaultError::Storage(ref inner) => {
                warn!(error = %inner, "storage failure");
                match inner {
                    StorageError::Timeout { .. } => Self::GatewayTimeout(err.to_string()),
                    StorageError::InvalidValue { .. } => Self::BadRequest(err.to_string()),
                    _ => Self::Internal(err.to_string()),
                }
            }
        }
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        Self::BadRequest(rejection.body_text())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn status_of(err: VaultError) -> StatusCode {
        AppError::from(err).into_response().status()
    }

    #[test]
    fn domain_errors_map_to_statuses() {
        let vault_id = "vault-1".to_owned();
        let document_id = "doc-1".to_owned();

        assert_eq!(
            status_of(VaultError::DuplicateVault {
                vault_id: vault_id.clone()
            }),
            StatusCode::CONFLICT
        );
        assert_eq!(
            status_of(VaultError::DuplicateDocument {
                vault_id: vault_id.clone(),
                document_id: document_id.clone(),
            }),
            StatusCode::CONFLICT
        );
        assert_eq!(
            status_of(VaultError::DocumentNotFound {
                vault_id: vault_id.clone(),
                document_id,
            }),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            status_of(VaultError::VaultNotFound { vault_id }),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            status_of(VaultError::InvalidRequest {
                reason: "empty".to_owned()
            }),
            StatusCode::BAD_REQUEST
        );
    }

    #[test]
    fn storage_errors_map_to_server_statuses() {
        assert_eq!(
            status_of(VaultError::Storage(StorageError::Timeout {
                operation: "get document".to_owned()
            })),
            StatusCode::GATEWAY_TIMEOUT
        );
        assert_eq!(
            status_of(VaultError::Storage(StorageError::Backend {
                operation: "check database".to_owned(),
                reason: "connection refused".to_owned(),
            })),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
