//! # sprig-client: Storefront Runtime for Sprig
//!
//! Everything the storefront process owns between "Add to cart" and the
//! order confirmation page.
//!
//! ## Architecture Overview
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Storefront Runtime                               │
//! │                                                                         │
//! │  ┌──────────────────────────────────────────────────────────────────┐  │
//! │  │                 CartStore (one per session)                      │  │
//! │  │                                                                  │  │
//! │  │  sprig_core::Cart rules behind Arc<Mutex<_>>                     │  │
//! │  │  Persisted through CartStorage after every item change           │  │
//! │  └───────────────┬──────────────────┬──────────────────┬────────────┘  │
//! │                  │                  │                  │                │
//! │                  ▼                  ▼                  ▼                │
//! │  ┌────────────────────┐ ┌────────────────────┐ ┌────────────────────┐  │
//! │  │  CouponValidator   │ │ CheckoutSession-   │ │ OrderConfirmation  │  │
//! │  │                    │ │ Builder            │ │                    │  │
//! │  │ /rpc/validate_     │ │ /checkout/sessions │ │ /orders/{id}       │  │
//! │  │ coupon, redemption │ │ + Navigator        │ │ backoff polling    │  │
//! │  └────────────────────┘ └────────────────────┘ └────────────────────┘  │
//! │                                                                         │
//! │  StorefrontConfig: defaults → storefront.toml → SPRIG_* env vars        │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//! - [`config`] - Service URL, redirect URLs, data dir, polling schedule
//! - [`error`] - `ClientError` and `CheckoutError`
//! - [`storage`] - `CartStorage` trait with file and memory backends
//! - [`store`] - `CartStore`, the owned session cart
//! - [`coupon`] - Coupon validation RPC and redemption logging
//! - [`checkout`] - Payment session request and redirect
//! - [`confirmation`] - Order lookup after the payment redirect
//!
//! ## Usage
//! ```rust,ignore
//! let config = StorefrontConfig::load(None)?;
//! let store = CartStore::open(Arc::new(FileStorage::new(config.data_dir())));
//!
//! store.add_item(NewLineItem::one_time("calm-blend", "Calm Blend", Money::from_cents(1800)));
//!
//! let coupons = CouponValidator::http(&config)?;
//! coupons.apply_coupon(&store, "save10", None).await;
//!
//! let checkout = CheckoutSessionBuilder::new(&config, navigator)?;
//! checkout.checkout(&store, CheckoutOptions::default()).await?;
//! ```

pub mod checkout;
pub mod config;
pub mod confirmation;
pub mod coupon;
pub mod error;
pub mod storage;
pub mod store;

// Re-export commonly used types
pub use checkout::{CheckoutOptions, CheckoutOutcome, CheckoutSessionBuilder, Navigator};
pub use config::StorefrontConfig;
pub use confirmation::OrderConfirmation;
pub use coupon::{CouponRpc, CouponValidator, HttpCouponRpc};
pub use error::{CheckoutError, ClientError, ClientResult};
pub use storage::{CartStorage, FileStorage, MemoryStorage};
pub use store::CartStore;

#[cfg(test)]
pub(crate) mod test_support {
    use crate::config::StorefrontConfig;

    /// Serves `app` on an ephemeral local port and returns its base URL.
    pub async fn spawn_server(app: axum::Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{}", addr)
    }

    pub fn test_config(base_url: &str) -> StorefrontConfig {
        let mut config = StorefrontConfig::default();
        config.api.base_url = base_url.to_string();
        config.api.request_timeout_secs = 5;
        config
    }
}
