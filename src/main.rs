//! aihub edge function server

use std::sync::Arc;

use anyhow::Context;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use aihub::backend::{AuthService, Database, MemoryBackend, SupabaseBackend, SupabaseConfig};
use aihub::functions::{build_router, FunctionContext};
use aihub::types::config::ServerConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "aihub=debug,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = ServerConfig::from_env();
    tracing::info!("Starting aihub v{}", env!("CARGO_PKG_VERSION"));
    for (provider, configured) in config.provider_status() {
        if configured {
            tracing::info!(provider, "Provider configured");
        } else {
            tracing::warn!(provider, "Provider has no credentials; its functions will return 503");
        }
    }

    let (auth, db): (Arc<dyn AuthService>, Arc<dyn Database>) =
        match (&config.supabase_url, &config.supabase_service_key) {
            (Some(url), Some(key)) => {
                tracing::info!("Using hosted backend at {}", url);
                let backend = Arc::new(SupabaseBackend::new(SupabaseConfig {
                    url: url.clone(),
                    service_key: key.clone(),
                    timeout_secs: config.request_timeout_secs,
                }));
                (backend.clone(), backend)
            }
            _ => {
                tracing::warn!("No hosted backend configured; using in-memory backend");
                let backend = Arc::new(MemoryBackend::new());
                (backend.clone(), backend)
            }
        };

    let ctx = FunctionContext::from_config(&config, auth, db);
    let app = build_router(ctx, &config.cors_origins);

    let listener = tokio::net::TcpListener::bind(&config.bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", config.bind_addr))?;
    tracing::info!("Listening on http://{}", config.bind_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    tracing::info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
    }
}
