//! # Sprig Checkout API
//!
//! HTTP service that owns the authoritative half of checkout.
//!
//! ## Architecture
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Checkout API Routes                             │
//! │                                                                         │
//! │  ┌────────────────────┐  ┌────────────────────┐  ┌───────────────────┐ │
//! │  │  CheckoutService   │  │  Coupon routes     │  │  Order routes     │ │
//! │  │                    │  │                    │  │                   │ │
//! │  │ POST /checkout/    │  │ POST /rpc/         │  │ GET /orders/{id}  │ │
//! │  │      sessions      │  │   validate_coupon  │  │                   │ │
//! │  │                    │  │ POST /coupon_      │  │                   │ │
//! │  │                    │  │   redemptions      │  │                   │ │
//! │  └────────────────────┘  └────────────────────┘  └───────────────────┘ │
//! │                                                                         │
//! │  ┌────────────────────┐  ┌────────────────────┐                        │
//! │  │  Webhook route     │  │  Health route      │                        │
//! │  │                    │  │                    │                        │
//! │  │ POST /webhooks/    │  │ GET /health        │                        │
//! │  │      payment       │  │                    │                        │
//! │  └────────────────────┘  └────────────────────┘                        │
//! │                                                                         │
//! │  ┌──────────────────────────────────────────────────────────────────┐  │
//! │  │                      Infrastructure                               │  │
//! │  │                                                                   │  │
//! │  │  ┌──────────────────┐  ┌──────────────────────────────────────┐  │  │
//! │  │  │  SQLite          │  │  PaymentProvider                     │  │  │
//! │  │  │  (sprig-db)      │  │  (Stripe over HTTPS)                 │  │  │
//! │  │  └──────────────────┘  └──────────────────────────────────────┘  │  │
//! │  └──────────────────────────────────────────────────────────────────┘  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Configuration
//! Environment variables:
//! - `PORT` - HTTP port (default: 8787)
//! - `BIND_ADDR` - Bind address (default: 0.0.0.0)
//! - `DATABASE_PATH` - SQLite file (default: sprig.db)
//! - `SITE_URL` - Storefront origin for redirects (default: http://localhost:5173)
//! - `STRIPE_SECRET_KEY` - Payment provider secret key (required)
//! - `STRIPE_API_BASE` - Payment provider API base (default: https://api.stripe.com)
//! - `STRIPE_WEBHOOK_SECRET` - Webhook signing secret (optional)
//! - `REQUEST_TIMEOUT_SECS` - Outbound request timeout (default: 15)

pub mod config;
pub mod error;
pub mod payment;
pub mod services;

use std::sync::Arc;

use axum::Router;
use tower_http::trace::TraceLayer;

use sprig_db::Database;

// Re-exports
pub use config::CheckoutApiConfig;
pub use error::{ApiError, ApiResult};
pub use payment::{PaymentProvider, StripeProvider};

/// Shared application state.
pub struct AppState {
    pub db: Database,
    pub payments: Arc<dyn PaymentProvider>,
    pub config: CheckoutApiConfig,
}

/// Builds the full HTTP router.
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .merge(services::checkout_service::routes())
        .merge(services::coupon_service::routes())
        .merge(services::order_service::routes())
        .merge(services::webhook_service::routes())
        .merge(services::health_service::routes())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
