//! User management: list profiles, approve, reject, explain decisions.
//!
//! Every handler here runs behind `admin_middleware`, which attaches the
//! acting administrator as an [`ActorContext`].

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Extension, Path, Query},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
};
use serde_json::json;

use clinicflow_auth::explain_authorization;
use clinicflow_core::IdentityId;
use clinicflow_session::ProfileFilter;

use crate::app::dto::{ApproveProfileRequest, ExplainQuery, ProfileListQuery, ProfileListResponse};
use crate::app::{errors, services::AppServices};
use crate::context::ActorContext;

// ─────────────────────────────────────────────────────────────────────────────
// Router
// ─────────────────────────────────────────────────────────────────────────────

pub fn router() -> Router {
    Router::new()
        .route("/profiles", get(list_profiles))
        .route("/profiles/:id", get(get_profile))
        .route("/profiles/:id/approve", post(approve_profile))
        .route("/profiles/:id/reject", post(reject_profile))
        .route("/profiles/:id/explain", get(explain_profile))
}

// ─────────────────────────────────────────────────────────────────────────────
// Handlers
// ─────────────────────────────────────────────────────────────────────────────

/// GET /admin/profiles?filter=pending&search=ana
pub async fn list_profiles(
    Extension(services): Extension<Arc<AppServices>>,
    Query(query): Query<ProfileListQuery>,
) -> axum::response::Response {
    let filter = match query.filter.as_deref().unwrap_or("").parse::<ProfileFilter>() {
        Ok(filter) => filter,
        Err(msg) => return errors::json_error(StatusCode::BAD_REQUEST, "invalid_filter", msg),
    };

    match services
        .session
        .resolver()
        .list_profiles(filter, query.search.as_deref())
        .await
    {
        Ok(profiles) => {
            let count = profiles.len();
            (StatusCode::OK, Json(ProfileListResponse { profiles, count })).into_response()
        }
        Err(e) => errors::resolver_error_to_response(e),
    }
}

/// GET /admin/profiles/:id
pub async fn get_profile(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let id = IdentityId::new(id);
    match services.session.resolver().fetch(&id).await {
        Ok(Some(profile)) => (StatusCode::OK, Json(profile)).into_response(),
        Ok(None) => errors::json_error(StatusCode::NOT_FOUND, "not_found", format!("profile {id} not found")),
        Err(e) => errors::resolver_error_to_response(e),
    }
}

/// POST /admin/profiles/:id/approve {"role": "consultora"}
pub async fn approve_profile(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(actor): Extension<ActorContext>,
    Path(id): Path<String>,
    Json(req): Json<ApproveProfileRequest>,
) -> axum::response::Response {
    let id = IdentityId::new(id);
    match services
        .session
        .resolver()
        .approve(&id, req.role, actor.identity_id())
        .await
    {
        Ok(profile) => (StatusCode::OK, Json(profile)).into_response(),
        Err(e) => errors::resolver_error_to_response(e),
    }
}

/// POST /admin/profiles/:id/reject
pub async fn reject_profile(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(actor): Extension<ActorContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let id = IdentityId::new(id);
    match services.session.resolver().reject(&id, actor.identity_id()).await {
        Ok(profile) => (StatusCode::OK, Json(profile)).into_response(),
        Err(e) => errors::resolver_error_to_response(e),
    }
}

/// GET /admin/profiles/:id/explain?role=gerente - why that user can or
/// cannot reach areas requiring `role`.
pub async fn explain_profile(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
    Query(query): Query<ExplainQuery>,
) -> axum::response::Response {
    let id = IdentityId::new(id);
    let profile = match services.session.resolver().fetch(&id).await {
        Ok(profile) => profile,
        Err(e) => return errors::resolver_error_to_response(e),
    };

    let explanation = explain_authorization(profile.as_ref(), query.role);
    (StatusCode::OK, Json(json!({ "explanation": explanation }))).into_response()
}
