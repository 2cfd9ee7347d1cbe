//! # Checkout Session Service
//!
//! `POST /checkout/sessions`: re-prices the received cart, re-validates the
//! coupon and opens a hosted payment page.
//!
//! ## Request Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  validate items, redirect URLs, email                                   │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  claim Idempotency-Key ──► Completed ──► 200 {stored url}               │
//! │       │                └─► InFlight  ──► 409                            │
//! │       ▼ Claimed                                                         │
//! │  mode (mixed cart → 400)                                                │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  coupon: FREESHIP-QA bypass | repository check (invalid → 400)          │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  plan_session → create discount → create session                        │
//! │       │                              │ failure                          │
//! │       │                              ▼                                  │
//! │       │                     delete discount, release claim              │
//! │       ▼                                                                 │
//! │  complete claim ──► 200 {url}                                           │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::HeaderMap;
use axum::routing::post;
use axum::{Json, Router};
use tracing::{debug, info, warn};
use url::Url;

use sprig_core::checkout::{CheckoutRequest, CheckoutResponse, IDEMPOTENCY_HEADER};
use sprig_core::coupon::{CouponQuery, CouponValidation};
use sprig_core::session::{self, plan_session, CouponResolution};
use sprig_core::validation::{
    normalize_coupon_code, validate_checkout_items, validate_coupon_code, validate_email,
};
use sprig_core::FREE_SHIPPING_TEST_CODE;
use sprig_db::AttemptClaim;

use crate::error::{ApiError, ApiResult};
use crate::payment::{ProviderSession, SessionRequest, SESSION_ID_PLACEHOLDER};
use crate::AppState;

/// Longest accepted idempotency key.
const MAX_IDEMPOTENCY_KEY_LEN: usize = 255;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new().route("/checkout/sessions", post(create_session))
}

async fn create_session(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    payload: Result<Json<CheckoutRequest>, JsonRejection>,
) -> ApiResult<Json<CheckoutResponse>> {
    let Json(request) = payload?;
    let idempotency_key = idempotency_key(&headers)?;

    let response = CheckoutService::new(state)
        .create_session(request, idempotency_key)
        .await?;
    Ok(Json(response))
}

fn idempotency_key(headers: &HeaderMap) -> ApiResult<Option<String>> {
    let Some(value) = headers.get(IDEMPOTENCY_HEADER) else {
        return Ok(None);
    };

    let key = value
        .to_str()
        .map_err(|_| ApiError::BadRequest("Idempotency-Key must be ASCII".to_string()))?
        .trim();
    if key.len() > MAX_IDEMPOTENCY_KEY_LEN {
        return Err(ApiError::BadRequest(format!(
            "Idempotency-Key must be at most {} characters",
            MAX_IDEMPOTENCY_KEY_LEN
        )));
    }

    Ok((!key.is_empty()).then(|| key.to_string()))
}

// =============================================================================
// Service
// =============================================================================

/// Checkout session creation.
///
/// Unit prices are taken from the request as sent by the storefront; there is
/// no catalog on this side to look them up in. Coupon rules and shipping
/// tiers are evaluated against those prices.
pub struct CheckoutService {
    state: Arc<AppState>,
}

/// Validated request fields, ready for pricing.
struct SessionInput {
    request: CheckoutRequest,
    customer_email: Option<String>,
    success_url: String,
    cancel_url: String,
}

impl CheckoutService {
    pub fn new(state: Arc<AppState>) -> Self {
        CheckoutService { state }
    }

    /// Creates a payment session for the cart in `request`.
    ///
    /// ## Idempotency
    /// With a key, a finished attempt is answered from storage and a running
    /// one is refused. Any failure after the claim releases it so the
    /// storefront can retry with the same key.
    pub async fn create_session(
        &self,
        request: CheckoutRequest,
        idempotency_key: Option<String>,
    ) -> ApiResult<CheckoutResponse> {
        let input = self.validate(request)?;

        let Some(key) = idempotency_key else {
            let session = self.open_session(input, None).await?;
            return Ok(CheckoutResponse { url: session.url });
        };

        let attempts = self.state.db.checkout_attempts();
        match attempts.claim(&key).await? {
            AttemptClaim::Completed { url } => {
                info!(idempotency_key = %key, "Replaying completed checkout");
                return Ok(CheckoutResponse { url });
            }
            AttemptClaim::InFlight => {
                debug!(idempotency_key = %key, "Checkout already in flight");
                return Err(ApiError::Conflict(
                    "A checkout for this cart is already in progress".to_string(),
                ));
            }
            AttemptClaim::Claimed => {}
        }

        match self.open_session(input, Some(&key)).await {
            Ok(session) => {
                attempts.complete(&key, &session.id, &session.url).await?;
                Ok(CheckoutResponse { url: session.url })
            }
            Err(e) => {
                if let Err(release_err) = attempts.release(&key).await {
                    warn!(
                        idempotency_key = %key,
                        error = %release_err,
                        "Failed to release checkout claim"
                    );
                }
                Err(e)
            }
        }
    }

    fn validate(&self, request: CheckoutRequest) -> ApiResult<SessionInput> {
        validate_checkout_items(&request.items)?;

        let customer_email = request
            .customer_email
            .as_deref()
            .map(str::trim)
            .filter(|email| !email.is_empty())
            .map(validate_email)
            .transpose()?;

        let site = &self.state.config.site_url;
        let success_url = resolve_redirect(
            site,
            request.success_url.as_deref(),
            default_success_url(site),
            "successUrl",
        )?;
        let cancel_url = resolve_redirect(
            site,
            request.cancel_url.as_deref(),
            default_cancel_url(site),
            "cancelUrl",
        )?;

        Ok(SessionInput {
            request,
            customer_email,
            success_url,
            cancel_url,
        })
    }

    async fn open_session(
        &self,
        input: SessionInput,
        idempotency_key: Option<&str>,
    ) -> ApiResult<ProviderSession> {
        let items = &input.request.items;

        // Mixed carts fail here, before any coupon lookup
        let mode = session::checkout_mode(items)?;
        let cart_total = session::cart_total(items);

        let coupon = self.resolve_coupon(&input, cart_total).await?;
        let plan = plan_session(items, &coupon)?;
        let redemption = plan.redemption(
            &coupon,
            session::product_ids(items),
            input.customer_email.clone(),
        );

        let discount_id = match plan.discount {
            Some(ref discount) => {
                let key = idempotency_key.map(|k| format!("{}-discount", k));
                Some(
                    self.state
                        .payments
                        .create_discount(discount, key.as_deref())
                        .await?,
                )
            }
            None => None,
        };

        let session_request = SessionRequest {
            discount_id: discount_id.clone(),
            customer_email: input.customer_email.clone(),
            success_url: input.success_url,
            cancel_url: input.cancel_url,
            coupon_code: match coupon {
                CouponResolution::Applied { ref code, .. } => Some(code.clone()),
                CouponResolution::TestBypass => Some(FREE_SHIPPING_TEST_CODE.to_string()),
                CouponResolution::None => None,
            },
            idempotency_key: idempotency_key.map(str::to_string),
            plan,
        };

        match self.state.payments.create_session(&session_request).await {
            Ok(session) => {
                info!(
                    session_id = %session.id,
                    mode = mode.as_str(),
                    cart_total = %cart_total,
                    free_shipping = session_request.plan.free_shipping,
                    "Checkout session created"
                );
                if let Some(record) = redemption {
                    self.state
                        .db
                        .pending_redemptions()
                        .stage(&session.id, &record)
                        .await?;
                }
                Ok(session)
            }
            Err(e) => {
                if let Some(id) = discount_id {
                    if let Err(delete_err) = self.state.payments.delete_discount(&id).await {
                        warn!(
                            discount_id = %id,
                            error = %delete_err,
                            "Failed to delete orphaned discount"
                        );
                    }
                }
                Err(e.into())
            }
        }
    }

    async fn resolve_coupon(
        &self,
        input: &SessionInput,
        cart_total: sprig_core::Money,
    ) -> ApiResult<CouponResolution> {
        let Some(code) = input
            .request
            .coupon_code
            .as_deref()
            .and_then(normalize_coupon_code)
        else {
            return Ok(CouponResolution::None);
        };

        if code == FREE_SHIPPING_TEST_CODE {
            info!(code = %code, "Free shipping test code used");
            return Ok(CouponResolution::TestBypass);
        }

        let code = validate_coupon_code(&code)?;
        let query = CouponQuery {
            code: code.clone(),
            order_total: cart_total,
            product_ids: session::product_ids(&input.request.items),
            customer_email: input.customer_email.clone(),
        };

        match self.state.db.coupons().validate(&query).await?.into_validation(&code) {
            CouponValidation::Valid(applied) => Ok(CouponResolution::Applied {
                coupon_id: applied.coupon_id,
                code: applied.code,
                discount: applied.discount,
            }),
            CouponValidation::Invalid { message } => {
                debug!(code = %code, reason = %message, "Coupon rejected at checkout");
                Err(ApiError::BadRequest(message))
            }
        }
    }
}

// =============================================================================
// Redirect URLs
// =============================================================================

fn site_base(site: &Url) -> &str {
    site.as_str().trim_end_matches('/')
}

fn default_success_url(site: &Url) -> String {
    format!(
        "{}/checkout/success?session_id={}",
        site_base(site),
        SESSION_ID_PLACEHOLDER
    )
}

fn default_cancel_url(site: &Url) -> String {
    format!("{}/cart", site_base(site))
}

/// Accepts `explicit` only if it is http(s) on the storefront's own origin.
fn resolve_redirect(
    site: &Url,
    explicit: Option<&str>,
    default: String,
    field: &str,
) -> ApiResult<String> {
    let Some(raw) = explicit.map(str::trim).filter(|u| !u.is_empty()) else {
        return Ok(default);
    };

    let rejected = || ApiError::BadRequest(format!("{} must point to this site", field));
    let url = Url::parse(raw).map_err(|_| rejected())?;

    let same_origin = matches!(url.scheme(), "http" | "https")
        && url.host_str().is_some()
        && url.host_str() == site.host_str()
        && url.port_or_known_default() == site.port_or_known_default();
    if !same_origin {
        warn!(field = field, url = %raw, "Rejected foreign redirect URL");
        return Err(rejected());
    }

    // The raw string keeps the session id placeholder unescaped
    Ok(raw.to_string())
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use serde_json::json;
    use sprig_core::coupon::Discount;
    use sprig_core::Money;
    use sprig_db::NewCoupon;

    use crate::router;
    use crate::test_support::{post_json, send, test_state, FakePayments};

    fn item(product_id: &str, price: f64, quantity: u32) -> serde_json::Value {
        json!({
            "productId": product_id,
            "title": "Calm Blend",
            "variantTitle": "4oz",
            "price": price,
            "originalPrice": price,
            "quantity": quantity,
        })
    }

    fn subscription_item(price: f64, frequency: &str) -> serde_json::Value {
        json!({
            "productId": "sub-tea",
            "title": "Daily Tonic",
            "price": price,
            "originalPrice": price,
            "quantity": 1,
            "isSubscription": true,
            "subscriptionFrequency": frequency,
        })
    }

    fn with_key(mut request: Request<Body>, key: &str) -> Request<Body> {
        request
            .headers_mut()
            .insert(IDEMPOTENCY_HEADER, key.parse().unwrap());
        request
    }

    #[tokio::test]
    async fn test_payment_session_with_paid_shipping() {
        let payments = Arc::new(FakePayments::default());
        let app = router(test_state(payments.clone()).await);

        let (status, body) = send(
            app,
            post_json("/checkout/sessions", json!({ "items": [item("tea", 20.0, 2)] })),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert!(body["url"].as_str().unwrap().starts_with("https://checkout.stripe.test/"));

        let session = payments.last_session();
        assert_eq!(session.plan.cart_total, Money::from_cents(4000));
        assert_eq!(session.plan.shipping_rates.len(), 3);
        assert!(session.discount_id.is_none());
        assert_eq!(
            session.success_url,
            "https://shop.example.com/checkout/success?session_id={CHECKOUT_SESSION_ID}"
        );
        assert_eq!(session.cancel_url, "https://shop.example.com/cart");
    }

    #[tokio::test]
    async fn test_free_shipping_at_threshold() {
        let payments = Arc::new(FakePayments::default());
        let app = router(test_state(payments.clone()).await);

        let (status, _) = send(
            app,
            post_json("/checkout/sessions", json!({ "items": [item("tea", 20.0, 4)] })),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        let session = payments.last_session();
        assert!(session.plan.free_shipping);
        assert_eq!(session.plan.shipping_rates[0].display_name, "Free Standard Shipping");
    }

    #[tokio::test]
    async fn test_free_shipping_test_code_skips_lookup() {
        let payments = Arc::new(FakePayments::default());
        let app = router(test_state(payments.clone()).await);

        let (status, _) = send(
            app,
            post_json(
                "/checkout/sessions",
                json!({ "items": [item("tea", 10.0, 1)], "couponCode": "freeship-qa" }),
            ),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        let session = payments.last_session();
        assert!(session.plan.free_shipping);
        assert!(session.discount_id.is_none());
        assert!(payments.discounts.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_valid_coupon_creates_discount() {
        let payments = Arc::new(FakePayments::default());
        let state = test_state(payments.clone()).await;
        state
            .db
            .coupons()
            .insert(&NewCoupon::new("SAVE10", Discount::Percentage { bps: 1000 }))
            .await
            .unwrap();
        let app = router(state);

        let (status, _) = send(
            app,
            post_json(
                "/checkout/sessions",
                json!({ "items": [item("tea", 30.0, 2)], "couponCode": " save10 " }),
            ),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        let discounts = payments.discounts.lock().unwrap().clone();
        assert_eq!(discounts.len(), 1);
        assert_eq!(discounts[0].amount, Money::from_cents(600));
        assert_eq!(discounts[0].code, "SAVE10");

        let session = payments.last_session();
        assert_eq!(session.discount_id.as_deref(), Some("co_0"));
        assert_eq!(session.coupon_code.as_deref(), Some("SAVE10"));
    }

    #[tokio::test]
    async fn test_coupon_session_stages_charged_redemption() {
        let payments = Arc::new(FakePayments::default());
        let state = test_state(payments.clone()).await;
        let coupon = state
            .db
            .coupons()
            .insert(&NewCoupon::new("SAVE10", Discount::Percentage { bps: 1000 }))
            .await
            .unwrap();

        // Quantity raised to five after the code was applied at $20.00
        let (status, body) = send(
            router(state.clone()),
            post_json(
                "/checkout/sessions",
                json!({
                    "items": [item("tea", 20.0, 5)],
                    "couponCode": "SAVE10",
                    "customerEmail": "fern@example.com",
                }),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK);

        // Nothing is counted until the payment is reported
        assert!(state.db.redemptions().list_for_coupon(&coupon.id).await.unwrap().is_empty());

        let session_id = body["url"].as_str().unwrap().rsplit('/').next().unwrap();
        let redeemed = state.db.pending_redemptions().redeem(session_id, None).await.unwrap();
        assert!(redeemed.is_some());

        let rows = state.db.redemptions().list_for_coupon(&coupon.id).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].order_total_cents, 10000);
        assert_eq!(rows[0].discount_amount_cents, 1000);
        assert_eq!(rows[0].final_total_cents, 9000);
        assert_eq!(rows[0].customer_email.as_deref(), Some("fern@example.com"));
    }

    #[tokio::test]
    async fn test_free_shipping_test_code_stages_nothing() {
        let payments = Arc::new(FakePayments::default());
        let state = test_state(payments.clone()).await;

        let (status, body) = send(
            router(state.clone()),
            post_json(
                "/checkout/sessions",
                json!({ "items": [item("tea", 10.0, 1)], "couponCode": "FREESHIP-QA" }),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK);

        let session_id = body["url"].as_str().unwrap().rsplit('/').next().unwrap();
        let redeemed = state.db.pending_redemptions().redeem(session_id, None).await.unwrap();
        assert_eq!(redeemed, None);
    }

    #[tokio::test]
    async fn test_invalid_coupon_rejects_without_session() {
        let payments = Arc::new(FakePayments::default());
        let app = router(test_state(payments.clone()).await);

        let (status, body) = send(
            app,
            post_json(
                "/checkout/sessions",
                json!({ "items": [item("tea", 30.0, 1)], "couponCode": "NOPE" }),
            ),
        )
        .await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "Invalid coupon code");
        assert_eq!(payments.session_count(), 0);
    }

    #[tokio::test]
    async fn test_mixed_cart_rejected() {
        let payments = Arc::new(FakePayments::default());
        let app = router(test_state(payments.clone()).await);

        let (status, body) = send(
            app,
            post_json(
                "/checkout/sessions",
                json!({ "items": [item("tea", 20.0, 1), subscription_item(18.0, "monthly")] }),
            ),
        )
        .await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].as_str().unwrap().contains("checked out separately"));
        assert_eq!(payments.session_count(), 0);
    }

    #[tokio::test]
    async fn test_subscription_session() {
        let payments = Arc::new(FakePayments::default());
        let app = router(test_state(payments.clone()).await);

        let (status, _) = send(
            app,
            post_json(
                "/checkout/sessions",
                json!({ "items": [subscription_item(18.0, "weekly-ish")] }),
            ),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        let session = payments.last_session();
        assert_eq!(session.plan.mode.as_str(), "subscription");
        assert!(session.plan.shipping_rates.is_empty());
        // Unknown frequencies bill monthly
        let recurring = session.plan.lines[0].recurring.unwrap();
        assert_eq!(recurring.unit.as_str(), "month");
        assert_eq!(recurring.count, 1);
    }

    #[tokio::test]
    async fn test_invalid_bodies() {
        let payments = Arc::new(FakePayments::default());
        let state = test_state(payments.clone()).await;

        let (status, body) = send(
            router(state.clone()),
            post_json("/checkout/sessions", json!({ "items": [] })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "items is required");

        let (status, _) = send(
            router(state.clone()),
            post_json("/checkout/sessions", json!({ "items": [item("tea", 20.0, 0)] })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let malformed = Request::builder()
            .method("POST")
            .uri("/checkout/sessions")
            .header("content-type", "application/json")
            .body(Body::from("{not json"))
            .unwrap();
        let (status, body) = send(router(state), malformed).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].is_string());
        assert_eq!(payments.session_count(), 0);
    }

    #[tokio::test]
    async fn test_foreign_redirect_rejected() {
        let payments = Arc::new(FakePayments::default());
        let state = test_state(payments.clone()).await;

        let (status, body) = send(
            router(state.clone()),
            post_json(
                "/checkout/sessions",
                json!({
                    "items": [item("tea", 20.0, 1)],
                    "successUrl": "https://evil.example.net/steal",
                }),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "successUrl must point to this site");

        let (status, _) = send(
            router(state),
            post_json(
                "/checkout/sessions",
                json!({
                    "items": [item("tea", 20.0, 1)],
                    "successUrl": "https://shop.example.com/thanks?session_id={CHECKOUT_SESSION_ID}",
                }),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(
            payments.last_session().success_url,
            "https://shop.example.com/thanks?session_id={CHECKOUT_SESSION_ID}"
        );
    }

    #[tokio::test]
    async fn test_idempotent_replay() {
        let payments = Arc::new(FakePayments::default());
        let state = test_state(payments.clone()).await;
        let body = json!({ "items": [item("tea", 20.0, 1)] });

        let (first_status, first) = send(
            router(state.clone()),
            with_key(post_json("/checkout/sessions", body.clone()), "attempt-1"),
        )
        .await;
        let (second_status, second) = send(
            router(state.clone()),
            with_key(post_json("/checkout/sessions", body), "attempt-1"),
        )
        .await;

        assert_eq!(first_status, StatusCode::OK);
        assert_eq!(second_status, StatusCode::OK);
        assert_eq!(first["url"], second["url"]);
        assert_eq!(payments.session_count(), 1);
    }

    #[tokio::test]
    async fn test_in_flight_attempt_conflicts() {
        let payments = Arc::new(FakePayments::default());
        let state = test_state(payments.clone()).await;
        state.db.checkout_attempts().claim("attempt-2").await.unwrap();

        let (status, _) = send(
            router(state),
            with_key(
                post_json("/checkout/sessions", json!({ "items": [item("tea", 20.0, 1)] })),
                "attempt-2",
            ),
        )
        .await;

        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(payments.session_count(), 0);
    }

    #[tokio::test]
    async fn test_failed_session_cleans_up() {
        let payments = Arc::new(FakePayments::failing());
        let state = test_state(payments.clone()).await;
        state
            .db
            .coupons()
            .insert(&NewCoupon::new(
                "FIVE",
                Discount::FixedAmount { amount: Money::from_cents(500) },
            ))
            .await
            .unwrap();

        let (status, body) = send(
            router(state.clone()),
            with_key(
                post_json(
                    "/checkout/sessions",
                    json!({ "items": [item("tea", 20.0, 1)], "couponCode": "FIVE" }),
                ),
                "attempt-3",
            ),
        )
        .await;

        assert_eq!(status, StatusCode::BAD_GATEWAY);
        assert!(body["error"].is_string());
        assert_eq!(payments.deleted.lock().unwrap().as_slice(), ["co_0"]);

        // Claim was released, so the storefront may retry with the same key
        let claim = state.db.checkout_attempts().claim("attempt-3").await.unwrap();
        assert_eq!(claim, AttemptClaim::Claimed);
    }

    #[test]
    fn test_resolve_redirect() {
        let site = Url::parse("https://shop.example.com").unwrap();
        let default = || "https://shop.example.com/cart".to_string();

        assert_eq!(
            resolve_redirect(&site, None, default(), "cancelUrl").unwrap(),
            "https://shop.example.com/cart"
        );
        assert_eq!(
            resolve_redirect(&site, Some("  "), default(), "cancelUrl").unwrap(),
            "https://shop.example.com/cart"
        );

        let explicit = |url: &str| resolve_redirect(&site, Some(url), default(), "cancelUrl");
        assert!(explicit("javascript:alert(1)").is_err());
        assert!(explicit("https://shop.example.com:8443/cart").is_err());
        assert!(explicit("/cart").is_err());
    }
}
