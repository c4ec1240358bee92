use anyhow::Context;

use storefront_infra::StoreConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    storefront_observability::init();

    let config = StoreConfig::load();
    let bind_addr = match &config {
        Ok(config) => config.bind_addr.clone(),
        Err(e) => {
            tracing::warn!(error = %e, "configuration unavailable; catalog refresh will report it");
            std::env::var("STOREFRONT_BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:8080".to_string())
        }
    };

    let services = storefront_api::app::build_services(&config);
    match services.orchestrator().refresh().await {
        Ok(snapshot) => tracing::info!(
            offerings = snapshot.offerings().len(),
            revision = snapshot.revision(),
            "catalog loaded"
        ),
        Err(e) => tracing::warn!(error = %e, "initial catalog refresh failed"),
    }

    let app = storefront_api::app::build_app(services);

    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("failed to bind {bind_addr}"))?;

    tracing::info!(addr = %listener.local_addr()?, "listening");

    axum::serve(listener, app).await.context("server error")?;
    Ok(())
}
