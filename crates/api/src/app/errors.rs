use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde_json::json;

use clinicflow_auth::RegistrationError;
use clinicflow_core::DomainError;
use clinicflow_infra::{AuthError, StoreError};
use clinicflow_session::{ResolverError, SessionError};

pub fn session_error_to_response(err: SessionError) -> axum::response::Response {
    match err {
        SessionError::Auth(e) => auth_error_to_response(e),
        SessionError::Registration(e) => registration_error_to_response(e),
        SessionError::Resolver(e) => resolver_error_to_response(e),
        SessionError::NotAuthenticated => {
            json_error(StatusCode::UNAUTHORIZED, "unauthenticated", "sign in required")
        }
    }
}

pub fn auth_error_to_response(err: AuthError) -> axum::response::Response {
    let status = match &err {
        AuthError::InvalidCredentials | AuthError::UserNotFound => StatusCode::UNAUTHORIZED,
        AuthError::EmailNotConfirmed | AuthError::UserDisabled | AuthError::OperationNotAllowed => {
            StatusCode::FORBIDDEN
        }
        AuthError::RateLimited => StatusCode::TOO_MANY_REQUESTS,
        AuthError::WeakPassword | AuthError::InvalidEmail => StatusCode::BAD_REQUEST,
        AuthError::EmailInUse => StatusCode::CONFLICT,
        AuthError::Provider { .. } => StatusCode::BAD_GATEWAY,
    };
    json_error_owned(status, err.code().to_string(), err.user_message())
}

pub fn registration_error_to_response(err: RegistrationError) -> axum::response::Response {
    match err {
        RegistrationError::Domain(e) => domain_error_to_response(e),
        RegistrationError::Password(e) => {
            json_error(StatusCode::BAD_REQUEST, "weak_password", e.to_string())
        }
    }
}

pub fn resolver_error_to_response(err: ResolverError) -> axum::response::Response {
    match err {
        ResolverError::NotFound(id) => {
            json_error(StatusCode::NOT_FOUND, "not_found", format!("profile {id} not found"))
        }
        ResolverError::Domain(e) => domain_error_to_response(e),
        ResolverError::Store(StoreError::NotFound { .. }) => {
            json_error(StatusCode::NOT_FOUND, "not_found", "not found")
        }
        ResolverError::Store(StoreError::Conflict { collection, id }) => json_error(
            StatusCode::CONFLICT,
            "conflict",
            format!("{collection}/{id} already exists"),
        ),
        ResolverError::Store(e) => {
            tracing::error!(error = %e, "profile store failure");
            json_error(StatusCode::INTERNAL_SERVER_ERROR, "store_error", e.to_string())
        }
    }
}

pub fn domain_error_to_response(err: DomainError) -> axum::response::Response {
    match err {
        DomainError::Validation(msg) => json_error(StatusCode::BAD_REQUEST, "validation_error", msg),
        DomainError::InvalidId(msg) => json_error(StatusCode::BAD_REQUEST, "invalid_id", msg),
        DomainError::InvariantViolation(msg) => {
            json_error(StatusCode::UNPROCESSABLE_ENTITY, "invariant_violation", msg)
        }
        DomainError::Unauthorized(msg) => json_error(StatusCode::FORBIDDEN, "unauthorized", msg),
    }
}

pub fn json_error(
    status: StatusCode,
    code: &'static str,
    message: impl Into<String>,
) -> axum::response::Response {
    json_error_owned(status, code.to_string(), message)
}

fn json_error_owned(
    status: StatusCode,
    code: String,
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
