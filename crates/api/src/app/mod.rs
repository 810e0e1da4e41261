//! HTTP API application wiring (Axum router + service wiring).
//!
//! - `services.rs`: identity provider, record store and session wiring
//! - `routes/`: HTTP routes + handlers (one file per area)
//! - `dto.rs`: request/response DTOs
//! - `errors.rs`: consistent error responses

use std::sync::Arc;

use axum::{Extension, Router, routing::get};
use tower::ServiceBuilder;

pub mod dto;
pub mod errors;
pub mod routes;
pub mod services;

pub use services::AppServices;

/// Build the full HTTP router (public entrypoint used by `main.rs`).
pub fn build_app(services: Arc<AppServices>) -> Router {
    let admin = Router::new().nest("/admin", routes::admin_router(services.clone()));

    Router::new()
        .route("/health", get(routes::system::health))
        .merge(routes::router())
        .merge(admin)
        .layer(ServiceBuilder::new().layer(Extension(services)))
}
