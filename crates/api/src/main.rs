use std::sync::Arc;

use anyhow::Context;

use clinicflow_api::app::{build_app, services};
use clinicflow_infra::AppConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    clinicflow_observability::init();

    let config = AppConfig::from_env()?;
    let services = services::build_services(&config).await?;

    match (
        std::env::var("CLINICFLOW_ADMIN_EMAIL").ok(),
        std::env::var("CLINICFLOW_ADMIN_PASSWORD").ok(),
    ) {
        (Some(email), Some(password)) => {
            services.seed_admin(&email, &password, "Administrador").await?;
        }
        _ => tracing::warn!("CLINICFLOW_ADMIN_EMAIL not set; no administrator seeded"),
    }

    let app = build_app(Arc::new(services));

    let listener = tokio::net::TcpListener::bind(config.bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", config.bind_addr))?;

    tracing::info!("listening on {}", listener.local_addr()?);

    axum::serve(listener, app).await?;
    Ok(())
}
