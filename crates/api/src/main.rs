use std::net::SocketAddr;

use anyhow::Context;

use postguard_infra::AppConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    postguard_observability::init();

    let config = AppConfig::from_env().context("failed to load configuration")?;
    let app = postguard_api::app::build_app(&config)
        .await
        .context("failed to initialise datastores")?;

    let listener = tokio::net::TcpListener::bind(config.bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", config.bind_addr))?;

    tracing::info!("listening on {}", listener.local_addr()?);

    axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>())
        .await
        .context("server error")?;
    Ok(())
}
