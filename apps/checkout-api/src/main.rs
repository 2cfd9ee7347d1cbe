//! # Sprig Checkout API
//!
//! HTTP server for checkout sessions, coupons, orders and payment webhooks.
//!
//! ## Architecture
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Checkout API Server                              │
//! │                                                                         │
//! │  Storefront ───► HTTP (8787) ───► Services ───► SQLite                  │
//! │                                       │                                 │
//! │                                       ▼                                 │
//! │  Payment provider ◄──── sessions ── Stripe ──── webhooks ───► /webhooks │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::sync::Arc;

use anyhow::Context;
use tokio::net::TcpListener;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use checkout_api::{router, AppState, CheckoutApiConfig, StripeProvider};
use sprig_db::{Database, DbConfig};

const DEFAULT_LOG_FILTER: &str = "info,sprig=debug,checkout_api=debug,sqlx=warn";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .init();

    info!("Starting Sprig Checkout API...");

    let config = CheckoutApiConfig::load().context("invalid configuration")?;
    info!(?config, "Configuration loaded");

    let db = Database::new(DbConfig::new(&config.database_path))
        .await
        .context("failed to open database")?;
    info!("Database ready");

    let payments = StripeProvider::new(&config).context("failed to build payment client")?;
    if config.stripe_webhook_secret.is_none() {
        info!("STRIPE_WEBHOOK_SECRET not set, payment webhooks will be refused");
    }

    let addr = config.bind_address();
    let state = Arc::new(AppState {
        db: db.clone(),
        payments: Arc::new(payments),
        config,
    });

    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {}", addr))?;
    info!(%addr, "Listening");

    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    db.close().await;
    info!("Server shutdown complete");
    Ok(())
}

/// Graceful shutdown signal handler.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to listen for Ctrl+C");
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
                error!(error = %e, "Failed to install SIGTERM handler");
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

    info!("Shutdown signal received, starting graceful shutdown...");
}
