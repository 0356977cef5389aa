use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use thiserror::Error;
use tracing::{error, warn};

use storefront_auth::AuthzError;
use storefront_core::DomainError;
use storefront_infra::DispatchError;
use storefront_infra::external::GatewayError;

/// Every failure a handler can return.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Domain(#[from] DomainError),

    #[error("concurrent modification: {0}")]
    Concurrency(String),

    /// No credentials, or credentials that do not resolve to a user.
    #[error("{0}")]
    Unauthenticated(&'static str),

    #[error("{0}")]
    Forbidden(String),

    #[error("{0}")]
    NotFound(String),

    #[error(transparent)]
    Gateway(#[from] GatewayError),

    #[error("{0}")]
    Internal(String),
}

impl ApiError {
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound(message.into())
    }

    pub fn forbidden() -> Self {
        Self::Forbidden("Access denied".to_string())
    }
}

impl From<DispatchError> for ApiError {
    fn from(value: DispatchError) -> Self {
        match value {
            DispatchError::Domain(e) => ApiError::Domain(e),
            DispatchError::Concurrency(msg) => ApiError::Concurrency(msg),
            DispatchError::Deserialize(msg) => ApiError::Internal(msg),
            DispatchError::Store(e) => ApiError::Internal(e.to_string()),
        }
    }
}

impl From<AuthzError> for ApiError {
    fn from(value: AuthzError) -> Self {
        warn!(error = %value, "authorization denied");
        ApiError::forbidden()
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::Domain(e) => domain_error_to_response(e),
            ApiError::Concurrency(msg) => json_error(StatusCode::CONFLICT, "conflict", msg),
            ApiError::Unauthenticated(msg) => json_error(StatusCode::UNAUTHORIZED, "unauthorized", msg),
            ApiError::Forbidden(msg) => json_error(StatusCode::FORBIDDEN, "forbidden", msg),
            ApiError::NotFound(msg) => json_error(StatusCode::NOT_FOUND, "not_found", msg),
            ApiError::Gateway(e) => {
                error!(error = %e, "payment gateway call failed");
                match &e {
                    GatewayError::NotConfigured => json_error(
                        StatusCode::INTERNAL_SERVER_ERROR,
                        "gateway_not_configured",
                        e.to_string(),
                    ),
                    _ => json_error(StatusCode::BAD_GATEWAY, "gateway_error", e.to_string()),
                }
            }
            ApiError::Internal(msg) => {
                error!(error = %msg, "internal error");
                json_error(StatusCode::INTERNAL_SERVER_ERROR, "internal_error", msg)
            }
        }
    }
}

fn domain_error_to_response(err: DomainError) -> Response {
    match err {
        DomainError::Validation(msg) => json_error(StatusCode::BAD_REQUEST, "validation_error", msg),
        DomainError::MissingFields(fields) => (
            StatusCode::BAD_REQUEST,
            axum::Json(json!({
                "error": "missing_fields",
                "message": "Please fill in all the fields",
                "emptyFields": fields,
            })),
        )
            .into_response(),
        DomainError::Duplicate(msg) => json_error(StatusCode::BAD_REQUEST, "duplicate", msg),
        DomainError::InvalidId(msg) => json_error(StatusCode::BAD_REQUEST, "invalid_id", msg),
        DomainError::InvariantViolation(msg) => {
            json_error(StatusCode::UNPROCESSABLE_ENTITY, "invariant_violation", msg)
        }
        DomainError::NotFound(what) => json_error(StatusCode::NOT_FOUND, "not_found", not_found_message(what)),
        DomainError::Conflict(msg) => json_error(StatusCode::CONFLICT, "conflict", msg),
        DomainError::Unauthorized(msg) => json_error(StatusCode::FORBIDDEN, "forbidden", msg),
    }
}

/// Aggregates report either a full sentence ("Tracking not found") or just
/// the missing thing ("payment reference").
fn not_found_message(what: String) -> String {
    if what.to_ascii_lowercase().contains("not found") {
        what
    } else {
        format!("{what} not found")
    }
}

pub fn json_error(status: StatusCode, code: &'static str, message: impl Into<String>) -> Response {
    (
        status,
        axum::Json(json!({
            "error": code,
            "message": message.into(),
        })),
    )
        .into_response()
}
