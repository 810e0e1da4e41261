use std::sync::Arc;

use axum::{
    Json,
    extract::{Extension, Path, Query},
    http::StatusCode,
    response::IntoResponse,
};
use serde_json::json;

use clinicflow_session::{GuardDecision, Screen, guard};

use crate::app::dto::ScreenQuery;
use crate::app::{errors, services::AppServices};

/// GET /screens - the navigation for the current session.
pub async fn list(Extension(services): Extension<Arc<AppServices>>) -> impl IntoResponse {
    let session = services.session.settled().await;
    let screens: Vec<_> = Screen::ALL
        .into_iter()
        .map(|screen| {
            json!({
                "screen": screen.slug(),
                "required_role": screen.required_role(),
                "decision": screen.guard(&session),
            })
        })
        .collect();

    Json(json!({ "screens": screens }))
}

/// GET /screens/:screen?message=X - what the guard decides for one screen.
pub async fn check(
    Extension(services): Extension<Arc<AppServices>>,
    Path(slug): Path<String>,
    Query(query): Query<ScreenQuery>,
) -> axum::response::Response {
    let screen = match slug.parse::<Screen>() {
        Ok(screen) => screen,
        Err(msg) => return errors::json_error(StatusCode::NOT_FOUND, "unknown_screen", msg),
    };

    let session = services.session.settled().await;
    let decision = guard(&session, screen.required_role(), query.message.as_deref());
    let status = match decision {
        GuardDecision::Render => StatusCode::OK,
        GuardDecision::Loading => StatusCode::SERVICE_UNAVAILABLE,
        GuardDecision::SignInRequired => StatusCode::UNAUTHORIZED,
        GuardDecision::PendingApproval | GuardDecision::Denied { .. } => StatusCode::FORBIDDEN,
    };

    (
        status,
        Json(json!({
            "screen": screen.slug(),
            "required_role": screen.required_role(),
            "decision": decision,
        })),
    )
        .into_response()
}
