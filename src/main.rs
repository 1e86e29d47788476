use std::sync::Arc;

use anyhow::Context;
use tokio::net::TcpListener;
use tracing::info;

use products_catalog::infrastructure::logger::Logger;
use products_catalog::{create_router, AppConfig, AppState, MemoryStore, PgProductSource};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = AppConfig::load().context("failed to load configuration")?;
    Logger::init(&config.rust_log);

    info!("Starting products catalog service...");

    let source = PgProductSource::new(config.store_settings());
    let memory = MemoryStore::seeded();
    info!("✅ Seeded {} in-memory products", memory.len()?);

    let state = AppState::new(Arc::new(source), Arc::new(memory));
    let app = create_router(state, config.request_timeout());

    let addr = config.bind_addr()?;
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {}", addr))?;

    info!("🚀 Products catalog running on http://{}", listener.local_addr()?);
    info!("📖 API endpoints:");
    info!("   GET    /products      - List products");
    info!("   POST   /products      - Create product");
    info!("   GET    /products/:id  - Get product");
    info!("   PUT    /products/:id  - Update product");
    info!("   DELETE /products/:id  - Delete product");
    info!("   GET    /health        - Health check");
    info!("   GET    /diagnose      - Data source diagnostics");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("failed to listen for Ctrl-C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!("failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received");
}
