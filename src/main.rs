mod cli;

use anyhow::{Context, Result};
use clap::Parser;
use flux_proxy::{create_router, AppState, Config};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use crate::cli::Cli;

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("flux_proxy=info,tower_http=info")),
        )
        .init();

    let cli = Cli::parse();

    let mut cfg = Config::load(Some(&cli.config))?;
    if let Some(bind) = cli.bind {
        cfg.service.http.bind = bind;
    }
    if let Some(port) = cli.port {
        cfg.service.http.port = port;
    }

    let addr = cfg.bind_addr();

    info!("{} v{}", cfg.service.name, env!("CARGO_PKG_VERSION"));
    info!("Server:   http://{}", addr);
    info!("GET  /api/session");
    info!("WS   /api/flux (auth required)");
    info!("GET  /health");
    info!("Provider: {} (model={})", cfg.upstream.url, cfg.upstream.model);

    let state = AppState::new(cfg);
    let shutdown = state.shutdown.clone();

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;

    axum::serve(listener, create_router(state))
        .with_graceful_shutdown(async move {
            if let Err(e) = tokio::signal::ctrl_c().await {
                error!("Failed to listen for Ctrl-C: {}", e);
                std::future::pending::<()>().await;
            }
            info!("Received shutdown signal");
            // Tear down live proxy sessions
            shutdown.cancel();
        })
        .await
        .context("HTTP server failed")?;

    info!("Server shutdown complete");

    Ok(())
}
