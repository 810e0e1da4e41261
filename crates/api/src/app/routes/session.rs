//! Session endpoints: sign-in, sign-up, sign-out, password reset and the
//! signed-in user's own profile.

use std::sync::Arc;

use axum::{Json, extract::Extension, http::StatusCode, response::IntoResponse};

use clinicflow_auth::ProfilePatch;

use crate::app::dto::{ResetPasswordRequest, SessionView, SignInRequest, SignUpRequest};
use crate::app::{errors, services::AppServices};

/// GET /session
pub async fn current(Extension(services): Extension<Arc<AppServices>>) -> impl IntoResponse {
    Json(SessionView::from(services.session.settled().await))
}

/// POST /session/sign-in
pub async fn sign_in(
    Extension(services): Extension<Arc<AppServices>>,
    Json(req): Json<SignInRequest>,
) -> axum::response::Response {
    match services.session.sign_in(&req.email, &req.password).await {
        Ok(session) => (StatusCode::OK, Json(SessionView::from(session))).into_response(),
        Err(e) => errors::session_error_to_response(e),
    }
}

/// POST /session/sign-up
pub async fn sign_up(
    Extension(services): Extension<Arc<AppServices>>,
    Json(req): Json<SignUpRequest>,
) -> axum::response::Response {
    let metadata = req.metadata();
    match services.session.sign_up(&req.email, &req.password, metadata).await {
        Ok(session) => (StatusCode::CREATED, Json(SessionView::from(session))).into_response(),
        Err(e) => errors::session_error_to_response(e),
    }
}

/// POST /session/sign-out
pub async fn sign_out(Extension(services): Extension<Arc<AppServices>>) -> axum::response::Response {
    match services.session.sign_out().await {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => errors::session_error_to_response(e),
    }
}

/// POST /session/reset-password
///
/// Answers 202 whether or not the address has an account.
pub async fn reset_password(
    Extension(services): Extension<Arc<AppServices>>,
    Json(req): Json<ResetPasswordRequest>,
) -> axum::response::Response {
    match services.session.reset_password(&req.email).await {
        Ok(()) => StatusCode::ACCEPTED.into_response(),
        Err(e) => errors::session_error_to_response(e),
    }
}

/// POST /session/refresh
pub async fn refresh(Extension(services): Extension<Arc<AppServices>>) -> axum::response::Response {
    match services.session.refresh_profile().await {
        Ok(session) => (StatusCode::OK, Json(SessionView::from(session))).into_response(),
        Err(e) => errors::session_error_to_response(e),
    }
}

/// PATCH /session/profile
pub async fn update_profile(
    Extension(services): Extension<Arc<AppServices>>,
    Json(patch): Json<ProfilePatch>,
) -> axum::response::Response {
    if patch.is_empty() {
        return errors::json_error(StatusCode::BAD_REQUEST, "validation_error", "nothing to update");
    }

    match services.session.update_profile(patch).await {
        Ok(profile) => (StatusCode::OK, Json(profile)).into_response(),
        Err(e) => errors::session_error_to_response(e),
    }
}
