//! # Order Confirmation
//!
//! Runs on the success page after the payment provider redirects back.
//! The order row is written by the payment webhook, which may land a few
//! seconds after the customer does, so the lookup is polled.
//!
//! ## Polling
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │  GET /orders/{session_id}                                               │
//! │     │                                                                   │
//! │     ├── 200 ──► clear the cart                                          │
//! │     │           return OrderDetails                                     │
//! │     │                                                                   │
//! │     └── 404 / error ──► sleep (500ms, ×1.5 … capped at 5s) ──► retry    │
//! │                          │                                              │
//! │                          └── max elapsed ──► OrderNotFound, cart kept   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The coupon redemption is not written from here. The webhook records it
//! with the amounts the session was charged at.

use backoff::backoff::Backoff;
use backoff::{ExponentialBackoff, ExponentialBackoffBuilder};
use reqwest::StatusCode;
use tracing::{debug, info, warn};
use url::Url;

use sprig_core::checkout::OrderDetails;

use crate::config::{ConfirmationSettings, StorefrontConfig};
use crate::error::{ClientError, ClientResult};
use crate::store::CartStore;

/// Confirms orders for one storefront session.
#[derive(Clone)]
pub struct OrderConfirmation {
    http: reqwest::Client,
    orders_url: Url,
    store: CartStore,
    settings: ConfirmationSettings,
}

impl OrderConfirmation {
    pub fn new(config: &StorefrontConfig, store: CartStore) -> ClientResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(config.request_timeout())
            .build()?;

        Ok(OrderConfirmation {
            http,
            orders_url: Url::parse(&config.endpoint("/orders"))?,
            store,
            settings: config.confirmation.clone(),
        })
    }

    /// Waits for the order behind `session_id` to be recorded.
    ///
    /// ## Returns
    /// The order once it exists, with the cart cleared. If the order does not
    /// appear in time, `ClientError::OrderNotFound` is returned and the cart
    /// is left as is.
    pub async fn confirm(&self, session_id: &str) -> ClientResult<OrderDetails> {
        let mut backoff = self.create_backoff();
        let mut attempt = 0u32;

        loop {
            attempt += 1;
            match self.fetch_order(session_id).await {
                Ok(Some(order)) => {
                    info!(session_id = %session_id, attempt, "Order confirmed");
                    self.store.clear_cart();
                    return Ok(order);
                }
                Ok(None) => debug!(session_id = %session_id, attempt, "Order not recorded yet"),
                Err(e) => {
                    warn!(session_id = %session_id, attempt, error = %e, "Order lookup failed")
                }
            }

            match backoff.next_backoff() {
                Some(duration) => {
                    debug!(?duration, attempt, "Waiting before next order lookup");
                    tokio::time::sleep(duration).await;
                }
                None => {
                    warn!(session_id = %session_id, attempt, "Gave up waiting for order");
                    return Err(ClientError::OrderNotFound {
                        session_id: session_id.to_string(),
                    });
                }
            }
        }
    }

    /// One `GET /orders/{session_id}`. `None` on 404.
    pub async fn fetch_order(&self, session_id: &str) -> ClientResult<Option<OrderDetails>> {
        let mut url = self.orders_url.clone();
        url.path_segments_mut()
            .map_err(|_| ClientError::InvalidUrl(self.orders_url.to_string()))?
            .push(session_id);

        let response = self.http.get(url).send().await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }

        let order = response.error_for_status()?.json::<OrderDetails>().await?;
        Ok(Some(order))
    }

    fn create_backoff(&self) -> ExponentialBackoff {
        ExponentialBackoffBuilder::new()
            .with_initial_interval(self.settings.initial_interval())
            .with_max_interval(self.settings.max_interval())
            .with_max_elapsed_time(Some(self.settings.max_elapsed()))
            .build()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{spawn_server, test_config};
    use axum::extract::Path;
    use axum::http::StatusCode as HttpStatus;
    use axum::response::IntoResponse;
    use axum::routing::{get, post};
    use axum::{Json, Router};
    use chrono::Utc;
    use sprig_core::{AppliedCoupon, Discount, Money, NewLineItem, OrderStatus};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn fast_config(base: &str) -> StorefrontConfig {
        let mut config = test_config(base);
        config.confirmation.initial_interval_ms = 20;
        config.confirmation.max_interval_secs = 1;
        config.confirmation.max_elapsed_secs = 1;
        config
    }

    fn order(session_id: &str) -> OrderDetails {
        OrderDetails {
            id: "o-1".to_string(),
            session_id: session_id.to_string(),
            customer_email: Some("fern@example.com".to_string()),
            amount_total: Money::from_cents(5400),
            status: OrderStatus::Paid,
            created_at: Utc::now(),
        }
    }

    fn store_with_coupon() -> CartStore {
        let store = CartStore::in_memory();
        store.add_item(NewLineItem {
            quantity: Some(3),
            ..NewLineItem::one_time("tea", "Calm Blend", Money::from_cents(2000))
        });
        store.set_coupon(Some(AppliedCoupon {
            code: "SAVE10".to_string(),
            discount: Discount::Percentage { bps: 1000 },
            discount_amount: Money::from_cents(600),
            coupon_id: "c-1".to_string(),
        }));
        store
    }

    #[tokio::test]
    async fn test_confirm_after_webhook_delay() {
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = hits.clone();
        let redemption_posts = Arc::new(AtomicUsize::new(0));
        let posts = redemption_posts.clone();
        let app = Router::new()
            .route(
                "/coupon_redemptions",
                post(move || {
                    let posts = posts.clone();
                    async move {
                        posts.fetch_add(1, Ordering::SeqCst);
                        HttpStatus::CREATED
                    }
                }),
            )
            .route(
                "/orders/{session_id}",
                get(move |Path(session_id): Path<String>| {
                    let counter = counter.clone();
                    async move {
                        // Webhook lands on the third lookup
                        if counter.fetch_add(1, Ordering::SeqCst) < 2 {
                            HttpStatus::NOT_FOUND.into_response()
                        } else {
                            Json(order(&session_id)).into_response()
                        }
                    }
                }),
            );
        let base = spawn_server(app).await;

        let store = store_with_coupon();
        let confirmation = OrderConfirmation::new(&fast_config(&base), store.clone()).unwrap();

        let details = confirmation.confirm("cs_test_1").await.unwrap();
        assert_eq!(details.session_id, "cs_test_1");
        assert_eq!(details.amount_total, Money::from_cents(5400));
        assert_eq!(hits.load(Ordering::SeqCst), 3);
        assert!(store.is_empty());
        assert!(store.coupon().is_none());

        // The server redeems the coupon from the webhook
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        assert_eq!(redemption_posts.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_timeout_leaves_cart_intact() {
        let app = Router::new().route(
            "/orders/{session_id}",
            get(|| async { HttpStatus::NOT_FOUND }),
        );
        let base = spawn_server(app).await;

        let store = store_with_coupon();
        let confirmation = OrderConfirmation::new(&fast_config(&base), store.clone()).unwrap();

        let err = confirmation.confirm("cs_missing").await.unwrap_err();
        assert!(matches!(
            err,
            ClientError::OrderNotFound { ref session_id } if session_id == "cs_missing"
        ));
        assert_eq!(store.item_count(), 3);
        assert!(store.coupon().is_some());
    }

    #[tokio::test]
    async fn test_fetch_order_escapes_session_id() {
        let app = Router::new().route(
            "/orders/{session_id}",
            get(|Path(session_id): Path<String>| async move { Json(order(&session_id)) }),
        );
        let base = spawn_server(app).await;

        let confirmation =
            OrderConfirmation::new(&test_config(&base), CartStore::in_memory()).unwrap();

        let found = confirmation.fetch_order("cs/with slash").await.unwrap().unwrap();
        assert_eq!(found.session_id, "cs/with slash");
    }
}
