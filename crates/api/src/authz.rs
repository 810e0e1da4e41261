//! API-side role guard.
//!
//! Runs the same guard the screens use, so an endpoint and the screen that
//! calls it can never disagree about who gets in.

use axum::http::StatusCode;
use axum::response::Response;

use clinicflow_auth::{Approval, StaffRole};
use clinicflow_session::{GuardDecision, Session, guard};

use crate::app::errors::json_error;
use crate::context::ActorContext;

/// Check that the session may act with at least `required`.
pub fn require_role(session: &Session, required: StaffRole) -> Result<ActorContext, Response> {
    match guard(session, required, None) {
        GuardDecision::Render => {}
        GuardDecision::Loading => {
            return Err(json_error(
                StatusCode::SERVICE_UNAVAILABLE,
                "session_loading",
                "session is still loading",
            ));
        }
        GuardDecision::SignInRequired => {
            return Err(json_error(StatusCode::UNAUTHORIZED, "unauthenticated", "sign in required"));
        }
        GuardDecision::PendingApproval => {
            return Err(json_error(
                StatusCode::FORBIDDEN,
                "pending_approval",
                "account is awaiting approval",
            ));
        }
        GuardDecision::Denied { message } => {
            return Err(json_error(StatusCode::FORBIDDEN, "forbidden", message));
        }
    }

    // Render implies both are present and the profile is approved.
    match (&session.identity, session.approval()) {
        (Some(identity), Some(Approval::Approved(role))) => Ok(ActorContext::new(identity.id.clone(), role)),
        _ => Err(json_error(StatusCode::FORBIDDEN, "forbidden", "not an approved staff member")),
    }
}
