//! Publer tool server: scheduling, optimal timing, and job tracking over HTTP.

use publer_api::config::Config;
use publer_api::server::{self, AppState};
use publer_client::PublerClient;
use publer_types::Forwarder;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env()?;
    let forwarder: Arc<dyn Forwarder> = Arc::new(PublerClient::new(
        config.base_url.clone(),
        config.request_timeout,
        config.max_attempts,
    ));
    let addr = config.listen;
    tracing::info!(base_url = %config.base_url, "upstream configured");

    let app = server::router(Arc::new(AppState::new(forwarder, config)));
    tracing::info!("Publer tool server listening on {}", addr);
    axum::serve(
        tokio::net::TcpListener::bind(addr).await?,
        app.into_make_service(),
    )
    .await?;
    Ok(())
}
