//! Server initialization and run loop

use anyhow::{Context, Result};
use ergon_audit::{AuditPersister, SqliteAuditStore};
use ergon_billing::{SqliteAccountStore, UsageMeter};
use ergon_core::tracking::RequestTracker;
use ergon_core::PricingTable;
use ergon_llm::{InstrumentedProvider, LlmProvider, OpenRouterConfig, OpenRouterProvider};
use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

use super::config::AppConfig;
use super::router::{build_router, AppState};
use crate::middleware::rate_limit::RateLimitLayer;

/// Load configuration, wire the pipeline, and serve until shutdown.
pub async fn run() -> Result<()> {
    let config = super::loader::load_config()?;

    // ================================================================
    // Stores
    // ================================================================
    let accounts = SqliteAccountStore::from_path(Path::new(&config.database.billing_path))
        .await
        .context("Failed to open billing store")?;
    let audit = SqliteAuditStore::from_path(Path::new(&config.database.audit_path))
        .await
        .context("Failed to open audit store")?;

    // ================================================================
    // Pipeline
    // ================================================================
    let pricing = PricingTable::new().with_overrides(config.pricing.clone());
    let tracker = Arc::new(RequestTracker::with_pricing(pricing));
    let persister = Arc::new(AuditPersister::new(tracker.clone(), Arc::new(audit)));
    let meter = Arc::new(UsageMeter::new(Arc::new(accounts)));
    let llm = build_llm_provider(&config)?;

    // ================================================================
    // Rate Limiting
    // ================================================================
    let rate_limit_layer = RateLimitLayer::new(&config.rate_limit);
    if config.rate_limit.enabled {
        rate_limit_layer
            .state()
            .spawn_sweep(config.rate_limit.sweep_interval_secs);
        info!(
            "Rate limiting ENABLED ({} req / {} ms per key)",
            config.rate_limit.max_requests, config.rate_limit.window_ms
        );
    } else {
        info!("Rate limiting DISABLED");
    }

    let app = build_router(
        AppState {
            tracker,
            persister,
            meter,
            llm,
        },
        rate_limit_layer,
    );

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port)
        .parse()
        .context("Invalid server address")?;

    info!("HTTP server listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .context("Failed to bind to address")?;

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await
    .context("HTTP server error")?;

    info!("Ergon shutdown complete");
    Ok(())
}

/// Configure the OpenRouter provider with call instrumentation.
fn build_llm_provider(config: &AppConfig) -> Result<Arc<dyn LlmProvider>> {
    let mut provider_config =
        OpenRouterConfig::from_env().context("OPENROUTER_API_KEY is required")?;

    if !config.llm.model.is_empty() {
        provider_config = provider_config.with_model(config.llm.model.clone());
    }
    provider_config = provider_config.with_timeout(Duration::from_secs(config.llm.timeout_secs));

    let provider = OpenRouterProvider::new(provider_config);
    Ok(Arc::new(InstrumentedProvider::new(provider)))
}

/// Resolve on Ctrl-C or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        let _ = tokio::signal::ctrl_c().await;
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(_) => std::future::pending::<()>().await,
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }

    info!("Shutdown signal received");
}
