use std::net::SocketAddr;

use anyhow::Context;
use niapay_api::{build_router, database, services::expiry_service, AppConfig, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .init();

    let config = AppConfig::from_env().context("Failed to load configuration")?;
    tracing::info!("M-Pesa environment: {}", config.mpesa_environment);
    tracing::info!("Short code: {}", config.mpesa_short_code);
    tracing::info!("Callback URL: {}", config.mpesa_callback_url);

    let store = database::open_store(&config.store)
        .await
        .context("Failed to open payment store")?;
    tracing::info!("Payment store: {}", store.backend());
    if store.backend() == "memory" {
        tracing::warn!("In-memory payment store: pending payments are lost on restart");
    }

    expiry_service::spawn_expiry_task(store.clone(), config.expiry);

    let addr: SocketAddr = format!("{}:{}", config.host, config.port)
        .parse()
        .context("HOST/PORT do not form a socket address")?;
    let app_state = AppState::new(config, store)?;
    let app = build_router(app_state);

    tracing::info!("Server starting on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;
    axum::serve(listener, app).await?;

    Ok(())
}
