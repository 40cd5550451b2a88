use anyhow::Context;

use schoolgate_api::{app, config::GatewayConfig};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    schoolgate_observability::init();

    let config = GatewayConfig::from_env()?;
    let services = app::services::build_services(&config).await?;
    let router = app::build_app(&config.jwt_secret, services);

    let listener = tokio::net::TcpListener::bind(config.bind)
        .await
        .with_context(|| format!("failed to bind {}", config.bind))?;

    tracing::info!("listening on {}", listener.local_addr()?);

    axum::serve(listener, router).await.context("server error")?;
    Ok(())
}
