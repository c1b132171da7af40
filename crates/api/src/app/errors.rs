use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde_json::json;

use orgcentral_core::{AuthorizationReason, DomainError};

pub fn domain_error_to_response(err: DomainError) -> axum::response::Response {
    match err {
        DomainError::Validation(msg) => json_error(StatusCode::BAD_REQUEST, "validation_error", msg),
        DomainError::NotFound { entity } => {
            json_error(StatusCode::NOT_FOUND, "not_found", format!("{entity} not found"))
        }
        DomainError::Conflict(msg) => json_error(StatusCode::CONFLICT, "conflict", msg),
        DomainError::Authorization(err) => {
            let reason = err.reason();
            match reason {
                // Never confirm that another tenant's record exists.
                AuthorizationReason::CrossTenant => {
                    json_error(StatusCode::NOT_FOUND, "not_found", "not found")
                }
                AuthorizationReason::Unauthenticated | AuthorizationReason::SessionExpired => {
                    authorization_error(StatusCode::UNAUTHORIZED, "unauthorized", reason, err.message())
                }
                _ => authorization_error(StatusCode::FORBIDDEN, "forbidden", reason, err.message()),
            }
        }
        DomainError::Repository(msg) => {
            tracing::error!(error = %msg, "repository failure");
            json_error(
                StatusCode::INTERNAL_SERVER_ERROR,
                "internal_error",
                "internal error",
            )
        }
    }
}

pub fn json_error(
    status: StatusCode,
    code: &'static str,
    message: impl Into<String>,
) -> axum::response::Response {
    (
        status,
        axum::Json(json!({
            "error": code,
            "message": message.into(),
        })),
    )
        .into_response()
}

fn authorization_error(
    status: StatusCode,
    code: &'static str,
    reason: AuthorizationReason,
    message: &str,
) -> axum::response::Response {
    (
        status,
        axum::Json(json!({
            "error": code,
            "message": message,
            "reason": reason.code(),
        })),
    )
        .into_response()
}
