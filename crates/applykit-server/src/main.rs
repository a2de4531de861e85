//! ApplyKit HTTP server entry point.

mod app;

use applykit::{processor_from_config, Config, ResultStore};
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,applykit=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env()?;
    let store = ResultStore::new(&config.output_dir);
    let processor = Arc::new(processor_from_config(&config)?);

    let router = app::build_router(app::AppState { processor, store });

    let addr = std::env::var("APPLYKIT_BIND").unwrap_or_else(|_| "0.0.0.0:8080".into());
    tracing::info!("listening on {addr}");
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, router).await?;

    Ok(())
}
