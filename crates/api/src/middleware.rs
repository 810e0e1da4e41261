use std::sync::Arc;

use axum::{extract::State, middleware::Next, response::Response};

use clinicflow_auth::StaffRole;

use crate::app::services::AppServices;
use crate::authz;

/// Admit only approved administrators and attach their [`ActorContext`].
///
/// [`ActorContext`]: crate::context::ActorContext
pub async fn admin_middleware(
    State(services): State<Arc<AppServices>>,
    mut req: axum::http::Request<axum::body::Body>,
    next: Next,
) -> Response {
    let session = services.session.settled().await;

    let actor = match authz::require_role(&session, StaffRole::Admin) {
        Ok(actor) => actor,
        Err(response) => return response,
    };

    req.extensions_mut().insert(actor);
    next.run(req).await
}
