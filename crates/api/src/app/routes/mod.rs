use std::sync::Arc;

use axum::{
    Router,
    routing::{get, patch, post},
};

use crate::app::services::AppServices;
use crate::middleware;

pub mod admin;
pub mod screens;
pub mod session;
pub mod system;

/// Router for the session endpoints and the screen guard.
pub fn router() -> Router {
    Router::new()
        .route("/session", get(session::current))
        .route("/session/sign-in", post(session::sign_in))
        .route("/session/sign-up", post(session::sign_up))
        .route("/session/sign-out", post(session::sign_out))
        .route("/session/reset-password", post(session::reset_password))
        .route("/session/refresh", post(session::refresh))
        .route("/session/profile", patch(session::update_profile))
        .route("/screens", get(screens::list))
        .route("/screens/:screen", get(screens::check))
}

/// Administrator-only endpoints, behind the admin guard.
pub fn admin_router(services: Arc<AppServices>) -> Router {
    admin::router().layer(axum::middleware::from_fn_with_state(
        services,
        middleware::admin_middleware,
    ))
}
