use std::sync::Arc;

use anyhow::Context;
use tracing::{info, warn};

use storefront_api::app::{
    build_app,
    services::{ApiSettings, AppServices, Store},
};
use storefront_infra::AppConfig;
use storefront_infra::event_store::InMemoryEventStore;
use storefront_infra::external::PaystackGateway;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    storefront_observability::init();

    let config = AppConfig::load()?;
    info!(config = ?config, "configuration loaded");

    let store = event_store(&config).await?;
    let gateway = PaystackGateway::new(config.paystack_base_url.clone(), config.paystack_secret_key.clone())?;
    let (services, worker) =
        AppServices::build(store, Arc::new(gateway), &config.jwt_secret, ApiSettings::from(&config)).await?;

    let app = build_app(services.clone());

    let addr = format!("0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    info!(addr = %listener.local_addr()?, "listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    drop(services);
    worker.shutdown();
    info!("shut down");
    Ok(())
}

async fn event_store(config: &AppConfig) -> anyhow::Result<Store> {
    match config.database_url.as_deref() {
        #[cfg(feature = "postgres")]
        Some(url) => {
            let store = storefront_infra::event_store::PostgresEventStore::connect(url)
                .await
                .context("failed to connect to the Postgres event store")?;
            info!("using Postgres event store");
            Ok(Arc::new(store))
        }
        #[cfg(not(feature = "postgres"))]
        Some(_) => {
            warn!("DATABASE_URL is set but the postgres feature is disabled, using the in-memory event store");
            Ok(Arc::new(InMemoryEventStore::new()))
        }
        None => {
            warn!("DATABASE_URL not set, events are kept in memory only");
            Ok(Arc::new(InMemoryEventStore::new()))
        }
    }
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        warn!(error = %err, "failed to listen for ctrl-c");
        std::future::pending::<()>().await;
    }
    info!("shutdown signal received");
}
