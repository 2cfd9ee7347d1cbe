//! # Payment Provider
//!
//! The seam between the checkout service and the hosted payment page.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  CheckoutService                                                        │
//! │     │                                                                   │
//! │     ├── create_discount(PlannedDiscount) ──► POST   /v1/coupons         │
//! │     ├── create_session(SessionRequest) ────► POST   /v1/checkout/sessions│
//! │     └── delete_discount(id) ───────────────► DELETE /v1/coupons/{id}    │
//! │                                                                         │
//! │  StripeProvider: form-encoded bodies, bearer secret key,                │
//! │  Idempotency-Key forwarded when the storefront sent one.                │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use async_trait::async_trait;
use serde::Deserialize;
use tracing::{debug, warn};

use sprig_core::checkout::IDEMPOTENCY_HEADER;
use sprig_core::session::{PlannedDiscount, SessionPlan};
use sprig_core::CheckoutMode;

use crate::config::CheckoutApiConfig;

/// Placeholder the provider replaces with the session id in the success URL.
pub const SESSION_ID_PLACEHOLDER: &str = "{CHECKOUT_SESSION_ID}";

const CURRENCY: &str = "usd";

/// Payment provider failures.
#[derive(Debug, thiserror::Error)]
pub enum PaymentError {
    #[error("request failed: {0}")]
    Http(String),

    #[error("provider returned {status}: {message}")]
    Rejected { status: u16, message: String },

    #[error("unexpected provider response: {0}")]
    MalformedResponse(String),
}

impl From<reqwest::Error> for PaymentError {
    fn from(err: reqwest::Error) -> Self {
        PaymentError::Http(err.to_string())
    }
}

/// Everything needed to open a hosted payment page.
#[derive(Debug, Clone)]
pub struct SessionRequest {
    pub plan: SessionPlan,
    /// Provider id of the discount created for this session.
    pub discount_id: Option<String>,
    pub customer_email: Option<String>,
    pub success_url: String,
    pub cancel_url: String,
    pub coupon_code: Option<String>,
    pub idempotency_key: Option<String>,
}

/// A created session.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ProviderSession {
    pub id: String,
    pub url: String,
}

#[async_trait]
pub trait PaymentProvider: Send + Sync {
    /// Creates a one-time fixed-amount discount and returns its id.
    async fn create_discount(
        &self,
        discount: &PlannedDiscount,
        idempotency_key: Option<&str>,
    ) -> Result<String, PaymentError>;

    async fn delete_discount(&self, discount_id: &str) -> Result<(), PaymentError>;

    async fn create_session(
        &self,
        request: &SessionRequest,
    ) -> Result<ProviderSession, PaymentError>;
}

// =============================================================================
// Stripe
// =============================================================================

#[derive(Debug, Clone)]
pub struct StripeProvider {
    http: reqwest::Client,
    api_base: String,
    secret_key: String,
}

#[derive(Deserialize)]
struct CreatedObject {
    id: String,
}

#[derive(Deserialize)]
struct StripeErrorBody {
    error: StripeErrorDetail,
}

#[derive(Deserialize)]
struct StripeErrorDetail {
    message: String,
}

impl StripeProvider {
    pub fn new(config: &CheckoutApiConfig) -> Result<Self, PaymentError> {
        let http = reqwest::Client::builder()
            .timeout(config.request_timeout())
            .build()?;

        Ok(StripeProvider {
            http,
            api_base: config.stripe_api_base.trim_end_matches('/').to_string(),
            secret_key: config.stripe_secret_key.clone(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.api_base, path)
    }

    async fn send(&self, request: reqwest::RequestBuilder) -> Result<String, PaymentError> {
        let response = request.bearer_auth(&self.secret_key).send().await?;
        let status = response.status();
        let body = response.text().await?;

        if status.is_success() {
            return Ok(body);
        }

        let message = serde_json::from_str::<StripeErrorBody>(&body)
            .map(|b| b.error.message)
            .unwrap_or_else(|_| body.chars().take(200).collect());
        warn!(status = status.as_u16(), error = %message, "Payment provider rejected request");
        Err(PaymentError::Rejected {
            status: status.as_u16(),
            message,
        })
    }
}

#[async_trait]
impl PaymentProvider for StripeProvider {
    async fn create_discount(
        &self,
        discount: &PlannedDiscount,
        idempotency_key: Option<&str>,
    ) -> Result<String, PaymentError> {
        let mut request = self
            .http
            .post(self.url("/v1/coupons"))
            .form(&discount_form(discount));
        if let Some(key) = idempotency_key {
            request = request.header(IDEMPOTENCY_HEADER, key);
        }

        let body = self.send(request).await?;
        let created: CreatedObject = serde_json::from_str(&body)
            .map_err(|e| PaymentError::MalformedResponse(e.to_string()))?;
        debug!(discount_id = %created.id, code = %discount.code, "Provider discount created");
        Ok(created.id)
    }

    async fn delete_discount(&self, discount_id: &str) -> Result<(), PaymentError> {
        let request = self
            .http
            .delete(self.url(&format!("/v1/coupons/{}", discount_id)));
        self.send(request).await?;
        debug!(discount_id = %discount_id, "Provider discount deleted");
        Ok(())
    }

    async fn create_session(
        &self,
        request: &SessionRequest,
    ) -> Result<ProviderSession, PaymentError> {
        let mut http_request = self
            .http
            .post(self.url("/v1/checkout/sessions"))
            .form(&session_form(request));
        if let Some(ref key) = request.idempotency_key {
            http_request = http_request.header(IDEMPOTENCY_HEADER, key);
        }

        let body = self.send(http_request).await?;
        serde_json::from_str(&body).map_err(|e| PaymentError::MalformedResponse(e.to_string()))
    }
}

// =============================================================================
// Form Encoding
// =============================================================================

/// Form fields for a one-time fixed-amount discount.
pub fn discount_form(discount: &PlannedDiscount) -> Vec<(String, String)> {
    vec![
        ("amount_off".into(), discount.amount.cents().to_string()),
        ("currency".into(), CURRENCY.into()),
        ("duration".into(), "once".into()),
        ("max_redemptions".into(), "1".into()),
        ("name".into(), discount.code.clone()),
        ("metadata[coupon_id]".into(), discount.coupon_id.clone()),
    ]
}

/// Form fields for a checkout session, in the provider's bracket notation.
pub fn session_form(request: &SessionRequest) -> Vec<(String, String)> {
    let plan = &request.plan;
    let mut form: Vec<(String, String)> = vec![
        ("mode".into(), plan.mode.as_str().into()),
        ("success_url".into(), request.success_url.clone()),
        ("cancel_url".into(), request.cancel_url.clone()),
    ];

    if let Some(ref email) = request.customer_email {
        form.push(("customer_email".into(), email.clone()));
    }

    for (i, line) in plan.lines.iter().enumerate() {
        let prefix = format!("line_items[{}]", i);
        form.push((format!("{}[quantity]", prefix), line.quantity.to_string()));
        form.push((format!("{}[price_data][currency]", prefix), CURRENCY.into()));
        form.push((
            format!("{}[price_data][unit_amount]", prefix),
            line.unit_amount.cents().to_string(),
        ));
        form.push((
            format!("{}[price_data][product_data][name]", prefix),
            line.name.clone(),
        ));
        form.push((
            format!("{}[price_data][product_data][metadata][product_id]", prefix),
            line.product_id.clone(),
        ));
        if let Some(ref image) = line.image {
            form.push((
                format!("{}[price_data][product_data][images][0]", prefix),
                image.clone(),
            ));
        }
        if let Some(recurring) = line.recurring {
            form.push((
                format!("{}[price_data][recurring][interval]", prefix),
                recurring.unit.as_str().into(),
            ));
            form.push((
                format!("{}[price_data][recurring][interval_count]", prefix),
                recurring.count.to_string(),
            ));
        }
    }

    if let Some(ref discount_id) = request.discount_id {
        form.push(("discounts[0][coupon]".into(), discount_id.clone()));
    }

    if plan.mode == CheckoutMode::Payment {
        form.push((
            "shipping_address_collection[allowed_countries][0]".into(),
            "US".into(),
        ));
        for (i, rate) in plan.shipping_rates.iter().enumerate() {
            let prefix = format!("shipping_options[{}][shipping_rate_data]", i);
            form.push((format!("{}[type]", prefix), "fixed_amount".into()));
            form.push((format!("{}[display_name]", prefix), rate.display_name.into()));
            form.push((
                format!("{}[fixed_amount][amount]", prefix),
                rate.amount.cents().to_string(),
            ));
            form.push((format!("{}[fixed_amount][currency]", prefix), CURRENCY.into()));
            form.push((
                format!("{}[delivery_estimate][minimum][unit]", prefix),
                "business_day".into(),
            ));
            form.push((
                format!("{}[delivery_estimate][minimum][value]", prefix),
                rate.min_business_days.to_string(),
            ));
            form.push((
                format!("{}[delivery_estimate][maximum][unit]", prefix),
                "business_day".into(),
            ));
            form.push((
                format!("{}[delivery_estimate][maximum][value]", prefix),
                rate.max_business_days.to_string(),
            ));
        }
    }

    if let Some(ref code) = request.coupon_code {
        form.push(("metadata[coupon_code]".into(), code.clone()));
    }

    form
}

#[cfg(test)]
mod tests {
    use super::*;
    use sprig_core::checkout::CheckoutLineItem;
    use sprig_core::session::{plan_session, CouponResolution};
    use sprig_core::{Money, SubscriptionFrequency};

    fn item(price: i64, quantity: u32, subscription: bool) -> CheckoutLineItem {
        CheckoutLineItem {
            product_id: "tea".to_string(),
            variant_id: None,
            title: "Calm Blend".to_string(),
            variant_title: Some("4oz".to_string()),
            image: None,
            price: Money::from_cents(price),
            original_price: Money::from_cents(price),
            quantity,
            is_subscription: subscription,
            subscription_frequency: subscription.then_some(SubscriptionFrequency::EveryTwoWeeks),
        }
    }

    fn request(plan: SessionPlan) -> SessionRequest {
        SessionRequest {
            plan,
            discount_id: None,
            customer_email: None,
            success_url: "http://localhost:5173/checkout/success".to_string(),
            cancel_url: "http://localhost:5173/cart".to_string(),
            coupon_code: None,
            idempotency_key: None,
        }
    }

    fn field<'a>(form: &'a [(String, String)], key: &str) -> Option<&'a str> {
        form.iter().find(|(k, _)| k == key).map(|(_, v)| v.as_str())
    }

    #[test]
    fn test_payment_session_form() {
        let plan = plan_session(&[item(2000, 2, false)], &CouponResolution::None).unwrap();
        let mut req = request(plan);
        req.discount_id = Some("co_1".to_string());
        let form = session_form(&req);

        assert_eq!(field(&form, "mode"), Some("payment"));
        assert_eq!(field(&form, "line_items[0][price_data][unit_amount]"), Some("2000"));
        assert_eq!(
            field(&form, "line_items[0][price_data][product_data][name]"),
            Some("Calm Blend - 4oz")
        );
        assert_eq!(field(&form, "discounts[0][coupon]"), Some("co_1"));
        // $40 cart: three paid tiers
        assert_eq!(
            field(&form, "shipping_options[2][shipping_rate_data][display_name]"),
            Some("Overnight Shipping")
        );
        assert!(field(&form, "line_items[0][price_data][recurring][interval]").is_none());
    }

    #[test]
    fn test_subscription_session_form() {
        let plan = plan_session(&[item(1800, 1, true)], &CouponResolution::None).unwrap();
        let form = session_form(&request(plan));

        assert_eq!(field(&form, "mode"), Some("subscription"));
        assert_eq!(
            field(&form, "line_items[0][price_data][recurring][interval]"),
            Some("week")
        );
        assert_eq!(
            field(&form, "line_items[0][price_data][recurring][interval_count]"),
            Some("2")
        );
        assert!(!form.iter().any(|(k, _)| k.starts_with("shipping")));
    }

    #[test]
    fn test_discount_form() {
        let form = discount_form(&PlannedDiscount {
            coupon_id: "c-1".to_string(),
            code: "SAVE10".to_string(),
            amount: Money::from_cents(600),
        });
        assert_eq!(field(&form, "amount_off"), Some("600"));
        assert_eq!(field(&form, "duration"), Some("once"));
        assert_eq!(field(&form, "name"), Some("SAVE10"));
    }
}
