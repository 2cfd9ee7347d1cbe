//! # Checkout Session Builder
//!
//! Snapshots the cart, asks the checkout service for a payment session and
//! hands the returned URL to the [`Navigator`].
//!
//! ## Checkout Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │  cart empty? ───────────────────────────────► Ok(EmptyCart)             │
//! │  subscriptions + one-time? ─────────────────► Err(MixedCart)            │
//! │  request already outstanding? ──────────────► Err(AlreadyInProgress)    │
//! │                                                                         │
//! │  POST /checkout/sessions                                                │
//! │    Idempotency-Key: <fresh uuid per attempt>                            │
//! │    { items, customerEmail?, successUrl?, cancelUrl?, couponCode? }      │
//! │                                                                         │
//! │    2xx {url}  ──► Navigator::redirect(url) ──► Ok(Redirected(url))      │
//! │    2xx junk   ──► Err(MalformedResponse)                                │
//! │    4xx/5xx    ──► Err(Rejected({error} | "Checkout failed (status N)")) │
//! │    no answer  ──► Err(Network)                                          │
//! │                                                                         │
//! │  The cart is never modified here. It is cleared only once the order     │
//! │  is confirmed (see confirmation.rs).                                    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use reqwest::StatusCode;
use tracing::{debug, info, warn};
use url::Url;
use uuid::Uuid;

use sprig_core::checkout::{CheckoutRequest, CheckoutResponse, ErrorBody, IDEMPOTENCY_HEADER};
use sprig_core::validation::normalize_coupon_code;

use crate::config::StorefrontConfig;
use crate::error::{CheckoutError, ClientResult};
use crate::store::CartStore;

// =============================================================================
// Navigation Seam
// =============================================================================

/// Performs the hard redirect to the payment page. The current view is
/// abandoned once this is called.
pub trait Navigator: Send + Sync {
    fn redirect(&self, url: &Url);
}

impl<F> Navigator for F
where
    F: Fn(&Url) + Send + Sync,
{
    fn redirect(&self, url: &Url) {
        self(url)
    }
}

// =============================================================================
// Options / Outcome
// =============================================================================

/// Inputs gathered from the checkout form.
#[derive(Debug, Clone, Default)]
pub struct CheckoutOptions {
    /// Code typed into the coupon field without pressing Apply.
    /// An applied coupon takes precedence.
    pub manual_code: Option<String>,
    pub customer_email: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CheckoutOutcome {
    /// Nothing to check out; no request was sent.
    EmptyCart,
    /// The navigator was sent to the payment page.
    Redirected(Url),
}

// =============================================================================
// Builder
// =============================================================================

/// Creates payment sessions for the cart.
pub struct CheckoutSessionBuilder {
    http: reqwest::Client,
    sessions_url: String,
    success_url: Option<String>,
    cancel_url: Option<String>,
    navigator: Arc<dyn Navigator>,
    in_flight: AtomicBool,
}

/// Clears the in-flight flag however the request ends.
struct InFlightGuard<'a>(&'a AtomicBool);

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

impl CheckoutSessionBuilder {
    pub fn new(config: &StorefrontConfig, navigator: Arc<dyn Navigator>) -> ClientResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(config.request_timeout())
            .build()?;

        Ok(CheckoutSessionBuilder {
            http,
            sessions_url: config.endpoint("/checkout/sessions"),
            success_url: config.checkout.success_url.clone(),
            cancel_url: config.checkout.cancel_url.clone(),
            navigator,
            in_flight: AtomicBool::new(false),
        })
    }

    /// True while a session request is outstanding (drives the disabled
    /// state of the Checkout button).
    pub fn is_in_flight(&self) -> bool {
        self.in_flight.load(Ordering::Acquire)
    }

    /// Builds the request body from the cart, or `None` for an empty cart.
    pub fn build_request(
        &self,
        store: &CartStore,
        options: &CheckoutOptions,
    ) -> Result<Option<CheckoutRequest>, CheckoutError> {
        let items = store.checkout_items();
        if items.is_empty() {
            return Ok(None);
        }
        if store.is_mixed() {
            return Err(CheckoutError::MixedCart);
        }

        let coupon_code = match store.coupon() {
            Some(coupon) => Some(coupon.code),
            None => options.manual_code.as_deref().and_then(normalize_coupon_code),
        };

        let customer_email = options
            .customer_email
            .as_deref()
            .map(str::trim)
            .filter(|email| !email.is_empty())
            .map(str::to_string);

        Ok(Some(CheckoutRequest {
            items,
            customer_email,
            success_url: self.success_url.clone(),
            cancel_url: self.cancel_url.clone(),
            coupon_code,
        }))
    }

    /// Requests a payment session and redirects to it.
    pub async fn checkout(
        &self,
        store: &CartStore,
        options: CheckoutOptions,
    ) -> Result<CheckoutOutcome, CheckoutError> {
        let Some(request) = self.build_request(store, &options)? else {
            debug!("Checkout requested with an empty cart");
            return Ok(CheckoutOutcome::EmptyCart);
        };

        if self
            .in_flight
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Err(CheckoutError::AlreadyInProgress);
        }
        let _guard = InFlightGuard(&self.in_flight);

        let idempotency_key = Uuid::new_v4().to_string();
        info!(
            idempotency_key = %idempotency_key,
            items = request.items.len(),
            coupon = request.coupon_code.as_deref().unwrap_or("-"),
            "Creating checkout session"
        );

        let response = self
            .http
            .post(&self.sessions_url)
            .header(IDEMPOTENCY_HEADER, &idempotency_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                warn!(idempotency_key = %idempotency_key, error = %e, "Checkout request failed");
                CheckoutError::Network(e.to_string())
            })?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| CheckoutError::Network(e.to_string()))?;

        if !status.is_success() {
            let message = rejection_message(status, &body);
            warn!(
                idempotency_key = %idempotency_key,
                %status,
                error = %message,
                "Checkout rejected"
            );
            return Err(CheckoutError::Rejected(message));
        }

        let url = parse_redirect(&body)?;
        info!(idempotency_key = %idempotency_key, url = %url, "Redirecting to payment page");
        self.navigator.redirect(&url);

        Ok(CheckoutOutcome::Redirected(url))
    }
}

fn rejection_message(status: StatusCode, body: &str) -> String {
    serde_json::from_str::<ErrorBody>(body)
        .ok()
        .map(|b| b.error)
        .filter(|e| !e.trim().is_empty())
        .unwrap_or_else(|| format!("Checkout failed (status {})", status.as_u16()))
}

fn parse_redirect(body: &str) -> Result<Url, CheckoutError> {
    let response: CheckoutResponse = serde_json::from_str(body)
        .map_err(|e| CheckoutError::MalformedResponse(e.to_string()))?;
    let url = Url::parse(&response.url)
        .map_err(|e| CheckoutError::MalformedResponse(format!("{}: {}", response.url, e)))?;
    match url.scheme() {
        "http" | "https" => Ok(url),
        other => Err(CheckoutError::MalformedResponse(format!(
            "unexpected redirect scheme: {}",
            other
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{spawn_server, test_config};
    use axum::http::{HeaderMap, StatusCode as HttpStatus};
    use axum::response::IntoResponse;
    use axum::routing::post;
    use axum::{Json, Router};
    use sprig_core::{AppliedCoupon, Discount, Money, NewLineItem};
    use std::sync::Mutex;
    use std::time::Duration;

    #[derive(Default)]
    struct Captured {
        bodies: Mutex<Vec<CheckoutRequest>>,
        keys: Mutex<Vec<String>>,
    }

    fn recording_navigator() -> (Arc<dyn Navigator>, Arc<Mutex<Vec<Url>>>) {
        let visited = Arc::new(Mutex::new(Vec::new()));
        let sink = visited.clone();
        let navigator: Arc<dyn Navigator> =
            Arc::new(move |url: &Url| sink.lock().unwrap().push(url.clone()));
        (navigator, visited)
    }

    async fn session_server(captured: Arc<Captured>) -> String {
        let app = Router::new().route(
            "/checkout/sessions",
            post(move |headers: HeaderMap, Json(body): Json<CheckoutRequest>| {
                let captured = captured.clone();
                async move {
                    if let Some(key) = headers.get(IDEMPOTENCY_HEADER) {
                        captured
                            .keys
                            .lock()
                            .unwrap()
                            .push(key.to_str().unwrap().to_string());
                    }
                    captured.bodies.lock().unwrap().push(body);
                    Json(CheckoutResponse {
                        url: "https://pay.example/cs_test_1".to_string(),
                    })
                }
            }),
        );
        spawn_server(app).await
    }

    fn tea_store() -> CartStore {
        let store = CartStore::in_memory();
        store.add_item(NewLineItem {
            quantity: Some(3),
            ..NewLineItem::one_time("tea", "Calm Blend", Money::from_cents(2000))
        });
        store
    }

    #[tokio::test]
    async fn test_empty_cart_is_a_no_op() {
        let (navigator, visited) = recording_navigator();
        // Nothing listens here; an empty cart must not even try
        let builder =
            CheckoutSessionBuilder::new(&test_config("http://127.0.0.1:9"), navigator).unwrap();

        let outcome = builder
            .checkout(&CartStore::in_memory(), CheckoutOptions::default())
            .await
            .unwrap();
        assert_eq!(outcome, CheckoutOutcome::EmptyCart);
        assert!(visited.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_successful_checkout_redirects() {
        let captured = Arc::new(Captured::default());
        let base = session_server(captured.clone()).await;
        let (navigator, visited) = recording_navigator();
        let builder = CheckoutSessionBuilder::new(&test_config(&base), navigator).unwrap();
        let store = tea_store();

        let outcome = builder
            .checkout(
                &store,
                CheckoutOptions {
                    manual_code: Some(" save10 ".to_string()),
                    customer_email: Some("fern@example.com".to_string()),
                },
            )
            .await
            .unwrap();

        let expected = Url::parse("https://pay.example/cs_test_1").unwrap();
        assert_eq!(outcome, CheckoutOutcome::Redirected(expected.clone()));
        assert_eq!(*visited.lock().unwrap(), vec![expected]);

        let bodies = captured.bodies.lock().unwrap();
        assert_eq!(bodies[0].coupon_code.as_deref(), Some("SAVE10"));
        assert_eq!(bodies[0].customer_email.as_deref(), Some("fern@example.com"));
        assert_eq!(bodies[0].items[0].quantity, 3);
        assert_eq!(captured.keys.lock().unwrap().len(), 1);

        // Cart untouched until the order is confirmed
        assert_eq!(store.item_count(), 3);
        assert!(!builder.is_in_flight());
    }

    #[tokio::test]
    async fn test_applied_coupon_wins_over_manual_code() {
        let captured = Arc::new(Captured::default());
        let base = session_server(captured.clone()).await;
        let (navigator, _) = recording_navigator();
        let builder = CheckoutSessionBuilder::new(&test_config(&base), navigator).unwrap();
        let store = tea_store();
        store.set_coupon(Some(AppliedCoupon {
            code: "TEATIME20".to_string(),
            discount: Discount::Percentage { bps: 2000 },
            discount_amount: Money::from_cents(1200),
            coupon_id: "c-2".to_string(),
        }));

        let options = CheckoutOptions {
            manual_code: Some("SAVE10".to_string()),
            customer_email: None,
        };
        builder.checkout(&store, options.clone()).await.unwrap();
        builder.checkout(&store, options).await.unwrap();

        let bodies = captured.bodies.lock().unwrap();
        assert_eq!(bodies[0].coupon_code.as_deref(), Some("TEATIME20"));

        // Each attempt carries its own key
        let keys = captured.keys.lock().unwrap();
        assert_eq!(keys.len(), 2);
        assert_ne!(keys[0], keys[1]);
    }

    #[tokio::test]
    async fn test_mixed_cart_rejected_before_request() {
        let (navigator, _) = recording_navigator();
        let builder =
            CheckoutSessionBuilder::new(&test_config("http://127.0.0.1:9"), navigator).unwrap();
        let store = tea_store();
        store.add_item(NewLineItem::subscription(
            "honey",
            "Wildflower Honey",
            Money::from_cents(1500),
        ));

        let err = builder
            .checkout(&store, CheckoutOptions::default())
            .await
            .unwrap_err();
        assert_eq!(err, CheckoutError::MixedCart);
    }

    #[tokio::test]
    async fn test_error_responses() {
        let app = Router::new()
            .route(
                "/with-body/checkout/sessions",
                post(|| async {
                    (
                        HttpStatus::BAD_REQUEST,
                        Json(ErrorBody {
                            error: "This coupon has expired".to_string(),
                        }),
                    )
                        .into_response()
                }),
            )
            .route(
                "/bare/checkout/sessions",
                post(|| async { HttpStatus::BAD_GATEWAY.into_response() }),
            )
            .route(
                "/junk/checkout/sessions",
                post(|| async { Json(serde_json::json!({ "id": "cs_1" })).into_response() }),
            );
        let base = spawn_server(app).await;
        let store = tea_store();

        let cases = [
            (
                "with-body",
                CheckoutError::Rejected("This coupon has expired".to_string()),
            ),
            (
                "bare",
                CheckoutError::Rejected("Checkout failed (status 502)".to_string()),
            ),
        ];
        for (prefix, expected) in cases {
            let (navigator, visited) = recording_navigator();
            let builder = CheckoutSessionBuilder::new(
                &test_config(&format!("{}/{}", base, prefix)),
                navigator,
            )
            .unwrap();
            let err = builder
                .checkout(&store, CheckoutOptions::default())
                .await
                .unwrap_err();
            assert_eq!(err, expected);
            assert!(visited.lock().unwrap().is_empty());
        }

        let (navigator, _) = recording_navigator();
        let builder =
            CheckoutSessionBuilder::new(&test_config(&format!("{}/junk", base)), navigator)
                .unwrap();
        let err = builder
            .checkout(&store, CheckoutOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, CheckoutError::MalformedResponse(_)));

        assert_eq!(store.item_count(), 3);
    }

    #[tokio::test]
    async fn test_network_failure_says_order_not_placed() {
        let (navigator, _) = recording_navigator();
        let builder =
            CheckoutSessionBuilder::new(&test_config("http://127.0.0.1:9"), navigator).unwrap();
        let store = tea_store();

        let err = builder
            .checkout(&store, CheckoutOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, CheckoutError::Network(_)));
        assert!(err.to_string().contains("not placed"));
        assert!(!builder.is_in_flight());
    }

    #[tokio::test]
    async fn test_reentrant_checkout_is_rejected() {
        let app = Router::new().route(
            "/checkout/sessions",
            post(|| async {
                tokio::time::sleep(Duration::from_millis(300)).await;
                Json(CheckoutResponse {
                    url: "https://pay.example/cs_slow".to_string(),
                })
            }),
        );
        let base = spawn_server(app).await;
        let (navigator, visited) = recording_navigator();
        let builder = CheckoutSessionBuilder::new(&test_config(&base), navigator).unwrap();
        let store = tea_store();

        let (first, second) = tokio::join!(
            builder.checkout(&store, CheckoutOptions::default()),
            async {
                tokio::time::sleep(Duration::from_millis(50)).await;
                builder.checkout(&store, CheckoutOptions::default()).await
            }
        );

        assert!(matches!(first, Ok(CheckoutOutcome::Redirected(_))));
        assert_eq!(second, Err(CheckoutError::AlreadyInProgress));
        assert_eq!(visited.lock().unwrap().len(), 1);
    }
}
